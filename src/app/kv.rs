use anyhow::Result;
use clap::Parser;
use mrkv::clerk::Clerk;
use mrkv::cmd::kv::{Args, Commands};
use mrkv::transport::GrpcKvCluster;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cluster = GrpcKvCluster::new(&args.servers)?;
    let mut clerk = Clerk::new(cluster);

    match args.command {
        Commands::Get { key } => {
            let value = clerk.get(&key).await?;
            println!("{value}");
        }
        Commands::Put { key, value } => clerk.put(&key, &value).await?,
        Commands::Append { key, value } => clerk.append(&key, &value).await?,
    }
    Ok(())
}

use anyhow::Result;
use clap::Parser;
use mrkv::blob::FsBlobStore;
use mrkv::cmd::worker::Args;
use mrkv::transport::GrpcCoordinator;
use mrkv::worker::Worker;
use mrkv::workload;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let workload = workload::named(&args.workload)?;
    let source = GrpcCoordinator::connect(&args.join).await?;
    let store = FsBlobStore::new(args.store);

    info!(coordinator = %args.join, workload = %args.workload, "worker joining");
    Worker::new(source, store, workload).run().await
}

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,

    /// Store replica addresses, in cluster order
    #[clap(short = 'S', long, required = true, num_args = 1..)]
    pub servers: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the current value for a key
    Get { key: String },
    /// Set a key to a value
    Put { key: String, value: String },
    /// Append a value to a key, creating it if absent
    Append { key: String, value: String },
}

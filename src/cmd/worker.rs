use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Connect to a coordinator at the given IP address and port
    #[clap(short, long)]
    pub join: String,

    /// Directory holding input units, intermediate buckets and outputs
    #[clap(short, long)]
    pub store: PathBuf,

    /// Name of the workload to run (e.g. `wc`, `grep`)
    #[clap(short, long)]
    pub workload: String,
}

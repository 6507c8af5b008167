use clap::Parser;
use std::path::PathBuf;

/// Write a file into shared memory using SysV IPC (check MD5 hash optionally).
#[derive(Parser, Debug, Clone)]
#[command(name = "producer", version)]
pub struct Args {
    /// File to hand to the consumer
    pub inputfile: PathBuf,

    /// Wait for the consumer's MD5 reply and compare it
    #[arg(short = 'm', long = "md5-check")]
    pub md5_check: bool,

    /// Set verbose flag
    #[arg(short, long)]
    pub verbose: bool,
}

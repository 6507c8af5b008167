use clap::Parser;

/// Read shared memory segment using SysV IPC (check MD5 hash optionally).
/// Write file with shared memory content.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "consumer", version)]
pub struct Args {
    /// Set verbose flag
    #[arg(short, long)]
    pub verbose: bool,

    /// Write the MD5 hash of each payload back for the producer to check
    #[arg(short = 'm', long = "md5")]
    pub md5: bool,
}

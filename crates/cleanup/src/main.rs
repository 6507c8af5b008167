use bridge::{ChannelKeys, registry};
use clap::Parser;
use common::Environment;

/// Remove the shared memory segments and semaphores left behind by a
/// consumer that did not shut down cleanly.
#[derive(Parser, Debug)]
#[command(name = "cleanup", version)]
struct Args {
    /// Set verbose flag
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    common::setup_logging(
        common::logging::default_level(args.verbose),
        Environment::from_env(),
    );

    let report = registry::remove_existing(&ChannelKeys::from_env());
    tracing::info!(
        removed = report.removed(),
        absent = report.absent(),
        failed = report.failed(),
        "Cleanup finished"
    );

    if report.failed() > 0 {
        anyhow::bail!("{} objects could not be removed", report.failed());
    }
    Ok(())
}

use bridge::{ChannelKeys, RetryConfig};
use clap::Parser;
use common::Environment;
use producer::{cli::Args, publish_file};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    common::setup_logging(
        common::logging::default_level(args.verbose),
        Environment::from_env(),
    );

    let retry = RetryConfig::default();
    let verify = args.md5_check.then_some(&retry);

    match publish_file(&args.inputfile, &ChannelKeys::from_env(), verify) {
        Ok(outcome) => {
            tracing::info!(
                "Sent {} bytes in {:.3} ms",
                outcome.bytes,
                outcome.elapsed.as_secs_f64() * 1000.0
            );
            if let Some(hash) = &outcome.digest {
                tracing::info!("MD5 hash verified: {}", hash);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            Err(e)
        }
    }
}

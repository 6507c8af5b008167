use anyhow::Context;
use bridge::{ChannelPair, Md5Digest};
use clap::Parser;
use consumer::{
    Consumer, FileSink, ShutdownToken, cli::Args, config::ConsumerConfig, logging::setup_logging,
};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ConsumerConfig::from_env(&args)?;
    setup_logging(&config);

    let shutdown = ShutdownToken::new();
    shutdown.register_termination_signals()?;

    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    if !config.output.dir.is_dir() {
        tracing::warn!(
            "Output directory {} does not exist; writes will fail",
            config.output.dir.display()
        );
    }

    let channels = ChannelPair::create(&config.keys).context(
        "Failed to create shared memory channels - is another consumer running? Run cleanup after a crash",
    )?;

    let sink = FileSink::new(config.output.clone());
    let digest = config.digest_reply.then_some(Md5Digest);
    let mut consumer =
        Consumer::new(channels, sink, digest).with_poll_interval(config.poll_interval());

    let result = consumer.run(&shutdown);

    if shutdown.is_cancelled() {
        tracing::info!("Termination signal received");
    }

    let teardown = consumer.into_channels().teardown();
    if !teardown.is_clean() {
        tracing::warn!(
            "Teardown finished with {} failed steps",
            teardown.failures().count()
        );
    }

    match result {
        Ok(()) => {
            tracing::info!("Consumer stopped gracefully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Consumer failed: {}", e);
            anyhow::bail!("Consumer error: {}", e)
        }
    }
}

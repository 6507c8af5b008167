use crate::cli::Args;
use bridge::ChannelKeys;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub use common::Environment;

/// Where consumed payloads are written: `<dir>/<basename><NN><extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub basename: String,
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            basename: "file".to_string(),
            extension: ".jpg".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub environment: Environment,
    pub keys: ChannelKeys,
    pub output: OutputConfig,
    /// Pause after an empty poll of the size channel; 0 polls back to back.
    pub poll_interval_ms: u64,
    pub verbose: bool,
    pub digest_reply: bool,
}

impl ConsumerConfig {
    /// Load configuration from environment variables and command-line flags
    pub fn from_env(args: &Args) -> anyhow::Result<Self> {
        let environment = Environment::from_env();
        let defaults = OutputConfig::default();

        let output = OutputConfig {
            dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.dir),
            basename: env::var("OUTPUT_BASENAME").unwrap_or(defaults.basename),
            extension: env::var("OUTPUT_EXTENSION").unwrap_or(defaults.extension),
        };

        let poll_interval_ms = env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Ok(Self {
            environment,
            keys: ChannelKeys::from_env(),
            output,
            poll_interval_ms,
            verbose: args.verbose,
            digest_reply: args.md5,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            keys: ChannelKeys::default(),
            output: OutputConfig::default(),
            poll_interval_ms: 1,
            verbose: false,
            digest_reply: false,
        }
    }
}

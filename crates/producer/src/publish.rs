use anyhow::Context;
use bridge::{ChannelKeys, Producer, RetryConfig};
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Outcome {
    pub bytes: usize,
    pub elapsed: Duration,
    /// Consumer's reply, present when the digest was checked.
    pub digest: Option<String>,
}

/// Read `path` and hand it to the consumer listening on `keys`.
pub fn publish_file(
    path: &Path,
    keys: &ChannelKeys,
    verify: Option<&RetryConfig>,
) -> anyhow::Result<Outcome> {
    let payload =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    tracing::debug!("Read {} bytes from {}", payload.len(), path.display());

    let start = Instant::now();

    let mut producer = Producer::open(keys).context("Shared memory not found - run consumer first")?;

    let digest = match verify {
        Some(retry) => {
            let hash = producer
                .send_and_verify(&payload, retry)
                .context("MD5 check failed")?;
            Some(hash)
        }
        None => {
            producer.send(&payload)?;
            None
        }
    };

    Ok(Outcome {
        bytes: payload.len(),
        elapsed: start.elapsed(),
        digest,
    })
}

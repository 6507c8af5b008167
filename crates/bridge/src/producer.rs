use crate::channel::ChannelPair;
use crate::digest::{self, Md5Digest, PayloadDigest};
use crate::errors::BridgeError;
use crate::keys::ChannelKeys;
use crate::length;
use crate::retry::RetryConfig;

/// Writing side of a channel pair created by the consumer.
pub struct Producer<D = Md5Digest> {
    channels: ChannelPair,
    digest: D,
}

impl Producer<Md5Digest> {
    /// Attach to existing channels. Fails with `NotFound` when no consumer
    /// has created them yet.
    pub fn open(keys: &ChannelKeys) -> Result<Self, BridgeError> {
        Ok(Self::with_digest(ChannelPair::open(keys)?, Md5Digest))
    }
}

impl<D: PayloadDigest> Producer<D> {
    pub fn with_digest(channels: ChannelPair, digest: D) -> Self {
        Self { channels, digest }
    }

    /// Publish one payload: length first, then content.
    ///
    /// Both gates are held before anything is written, so the consumer can
    /// only see the new length once it is also able to wait for the content.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), BridgeError> {
        let capacity = self.channels.content.capacity();
        if payload.len() > capacity {
            return Err(BridgeError::PayloadTooLarge {
                len: payload.len(),
                capacity,
            });
        }
        if payload.is_empty() {
            return Err(BridgeError::InvalidLength("empty payload".to_string()));
        }

        let ChannelPair { size, content } = &mut self.channels;

        tracing::debug!("Acquiring size and content semaphores");
        let mut size_guard = size.lock()?;
        let mut content_guard = content.lock()?;

        length::encode(payload.len(), &mut size_guard)?;
        size_guard.release()?;
        tracing::debug!(len = payload.len(), "Length written");

        content_guard[..payload.len()].copy_from_slice(payload);
        content_guard.release()?;
        tracing::debug!("Content written");

        Ok(())
    }

    /// Publish `payload` and wait for the consumer's digest reply.
    ///
    /// The reply is written in place into the content channel. Until the
    /// consumer has taken its turn the region still holds the payload, so each
    /// attempt compares against the locally computed digest and backs off on
    /// a miss.
    pub fn send_and_verify(
        &mut self,
        payload: &[u8],
        config: &RetryConfig,
    ) -> Result<String, BridgeError> {
        self.send(payload)?;
        let expected = self.digest.hex_digest(payload);

        let mut received = String::new();
        for attempt in 0..config.max_attempts {
            let guard = self.channels.content.lock()?;
            received = digest::read_reply(&guard, expected.len() + 1);
            guard.release()?;

            if received == expected {
                tracing::debug!(hash = %received, "Hash matched");
                return Ok(received);
            }
            if attempt + 1 < config.max_attempts {
                std::thread::sleep(config.delay_for_attempt(attempt));
            }
        }

        if digest::looks_like_digest(&received) {
            Err(BridgeError::DigestMismatch { expected, received })
        } else {
            Err(BridgeError::DigestTimeout)
        }
    }

}

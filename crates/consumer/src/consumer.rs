use crate::shutdown::ShutdownToken;
use crate::sink::{PayloadSink, SinkError};
use bridge::{BridgeError, ChannelPair, Md5Digest, PayloadDigest, length};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error(transparent)]
    Channel(#[from] BridgeError),

    #[error(transparent)]
    Persist(#[from] SinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingForLength,
    ConsumingPayload { length: usize },
}

/// Outcome of one [`Consumer::step`].
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// The size channel held the sentinel.
    Idle,
    /// A nonzero length was taken; the next step reads the content.
    LengthReceived(usize),
    /// The length field was unusable and the message was dropped.
    Rejected,
    Persisted {
        path: PathBuf,
        length: usize,
        digest: Option<String>,
    },
}

/// Reading side of the handoff protocol.
pub struct Consumer<S, D = Md5Digest> {
    channels: ChannelPair,
    sink: S,
    digest: Option<D>,
    state: State,
    poll_interval: Duration,
    consumed: u64,
}

impl<S: PayloadSink, D: PayloadDigest> Consumer<S, D> {
    /// `digest` enables the hash reply written back into the content channel.
    pub fn new(channels: ChannelPair, sink: S, digest: Option<D>) -> Self {
        Self {
            channels,
            sink,
            digest,
            state: State::WaitingForLength,
            poll_interval: Duration::ZERO,
            consumed: 0,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the channels for teardown.
    pub fn into_channels(self) -> ChannelPair {
        self.channels
    }

    /// Advance the state machine by one transition.
    pub fn step(&mut self) -> Result<Step, ConsumerError> {
        match self.state {
            State::WaitingForLength => self.wait_for_length(),
            State::ConsumingPayload { length } => self.consume_payload(length),
        }
    }

    fn wait_for_length(&mut self) -> Result<Step, ConsumerError> {
        let capacity = self.channels.content.capacity();

        let mut size = self.channels.size.lock()?;
        let decoded = length::decode_bounded(&size, capacity);
        // Back to the sentinel before release, so a stale length is never
        // read twice.
        length::reset(&mut size)?;
        if let Err(e) = size.release() {
            tracing::error!("Releasing the size semaphore failed: {}", e);
        }

        match decoded {
            Ok(0) => Ok(Step::Idle),
            Ok(length) => {
                tracing::debug!("contentsize={}", length);
                self.state = State::ConsumingPayload { length };
                Ok(Step::LengthReceived(length))
            }
            Err(e @ (BridgeError::PayloadTooLarge { .. } | BridgeError::InvalidLength(_))) => {
                tracing::error!("Dropping message: {}", e);
                Ok(Step::Rejected)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn consume_payload(&mut self, length: usize) -> Result<Step, ConsumerError> {
        let mut content = match self.channels.content.lock() {
            Ok(guard) => guard,
            // Keep the pending length; the loop decides whether to come back
            Err(BridgeError::Interrupted) => return Err(BridgeError::Interrupted.into()),
            Err(e) => {
                self.state = State::WaitingForLength;
                return Err(e.into());
            }
        };
        self.state = State::WaitingForLength;

        let payload = &content[..length];
        let path = self.sink.persist(payload)?;
        tracing::debug!("File written (size {}). Path: {}", length, path.display());

        let digest = self.digest.as_ref().map(|d| d.hex_digest(payload));
        if let Some(hash) = &digest {
            if hash.len() < content.len() {
                content[..hash.len()].copy_from_slice(hash.as_bytes());
                content[hash.len()] = 0;
                tracing::debug!("hash = {}", hash);
            } else {
                tracing::warn!("Content channel too small for hash reply");
            }
        }

        if let Err(e) = content.release() {
            tracing::error!("Releasing the content semaphore failed: {}", e);
        }

        self.consumed += 1;
        Ok(Step::Persisted {
            path,
            length,
            digest,
        })
    }

    /// Consume messages until `shutdown` is cancelled.
    ///
    /// Returns an error only for conditions the loop cannot continue from: a
    /// failed write of the output file, or a gate that was removed while the
    /// consumer was running.
    pub fn run(&mut self, shutdown: &ShutdownToken) -> Result<(), ConsumerError> {
        tracing::info!("Waiting for messages");

        while !shutdown.is_cancelled() {
            let outcome = self.step();
            let pause = backs_off(&outcome);

            match outcome {
                Ok(Step::Idle) | Ok(Step::LengthReceived(_)) | Ok(Step::Rejected) => {}
                Ok(Step::Persisted { path, length, .. }) => {
                    tracing::info!(
                        "Message #{} persisted ({} bytes) to {}",
                        self.consumed,
                        length,
                        path.display()
                    );
                }
                Err(ConsumerError::Channel(BridgeError::Interrupted)) => {
                    tracing::debug!("Semaphore wait interrupted");
                }
                Err(ConsumerError::Channel(e @ BridgeError::Removed { .. })) => {
                    tracing::error!("{}", e);
                    return Err(e.into());
                }
                Err(ConsumerError::Channel(e)) => {
                    tracing::error!("{}", e);
                }
                Err(e @ ConsumerError::Persist(_)) => {
                    tracing::error!("{}", e);
                    return Err(e);
                }
            }

            if pause && !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }

        tracing::info!("Shutdown: {} messages consumed", self.consumed);
        Ok(())
    }
}

/// Whether the loop waits one poll interval before the next step: after an
/// empty poll, and after an operation error that would otherwise repeat at
/// full speed.
fn backs_off(outcome: &Result<Step, ConsumerError>) -> bool {
    match outcome {
        Ok(Step::Idle) => true,
        Err(ConsumerError::Channel(BridgeError::Interrupted | BridgeError::Removed { .. })) => false,
        Err(ConsumerError::Channel(_)) => true,
        _ => false,
    }
}

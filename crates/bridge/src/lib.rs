pub mod channel;
pub mod digest;
pub mod errors;
pub mod gate;
pub mod keys;
pub mod length;
pub mod producer;
pub mod registry;
pub mod retry;

pub use channel::{Channel, ChannelGuard, ChannelPair, Teardown};
pub use digest::{Md5Digest, PayloadDigest};
pub use errors::{BridgeError, Resource};
pub use gate::{Gate, GateGuard};
pub use keys::{CONTENT_CHANNEL_CAPACITY, ChannelKeys, SIZE_CHANNEL_CAPACITY};
pub use producer::Producer;
pub use retry::RetryConfig;

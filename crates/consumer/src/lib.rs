pub mod cli;
pub mod config;
pub mod consumer;
pub mod logging;
pub mod shutdown;
pub mod sink;

pub use consumer::{Consumer, ConsumerError, Step};
pub use shutdown::ShutdownToken;
pub use sink::{FileSink, PayloadSink, SinkError};

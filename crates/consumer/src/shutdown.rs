use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::{SigId, flag};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag, flipped from a signal handler.
///
/// The handler only stores into the atomic. A consumer blocked in a
/// semaphore wait is woken because SysV `semop` is never restarted after a
/// handler runs; it returns `EINTR` and the loop re-checks this token.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register SIGTERM and SIGINT to cancel this token.
    pub fn register_termination_signals(&self) -> io::Result<()> {
        self.register(SIGTERM)?;
        self.register(SIGINT)?;
        Ok(())
    }

    pub fn register(&self, signal: i32) -> io::Result<SigId> {
        flag::register(signal, Arc::clone(&self.flag))
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

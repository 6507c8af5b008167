//! Centralized IPC key configuration
//!
//! This module defines the SysV keys, segment capacities, and permissions
//! shared by the consumer, the producer, and the cleanup tool. Producer and
//! consumer must agree on every value here; nothing is negotiated at runtime.

use std::env;

/// Key of the content segment and of the content semaphore.
pub const CONTENT_KEY: i32 = 42;

/// Key of the size segment and of the size semaphore.
pub const SIZE_KEY: i32 = 44;

/// Size segment capacity: decimal ASCII length plus NUL.
pub const SIZE_CHANNEL_CAPACITY: usize = 10;

/// Content segment capacity, the upper bound on one payload.
pub const CONTENT_CHANNEL_CAPACITY: usize = 5_000_000;

/// Owner read/write only.
pub const PERMISSIONS: i32 = 0o600;

/// The four keys that identify one channel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelKeys {
    pub size_region: i32,
    pub content_region: i32,
    pub size_gate: i32,
    pub content_gate: i32,
}

impl Default for ChannelKeys {
    fn default() -> Self {
        Self {
            size_region: SIZE_KEY,
            content_region: CONTENT_KEY,
            size_gate: SIZE_KEY,
            content_gate: CONTENT_KEY,
        }
    }
}

impl ChannelKeys {
    /// Load keys from environment variables, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            size_region: key_from_env("SIZE_REGION_KEY", defaults.size_region),
            content_region: key_from_env("CONTENT_REGION_KEY", defaults.content_region),
            size_gate: key_from_env("SIZE_GATE_KEY", defaults.size_gate),
            content_gate: key_from_env("CONTENT_GATE_KEY", defaults.content_gate),
        }
    }
}

fn key_from_env(var: &str, default: i32) -> i32 {
    env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

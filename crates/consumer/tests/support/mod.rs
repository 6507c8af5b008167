#![allow(dead_code)]

use bridge::ChannelKeys;
use consumer::{PayloadSink, SinkError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};

static NEXT: AtomicI32 = AtomicI32::new(0);

/// Keys unique to this test process and call.
pub fn unique_keys() -> ChannelKeys {
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let base = 0x3800_0000 | ((std::process::id() as i32 & 0xfff) << 12) | ((n & 0x3ff) << 2);
    ChannelKeys {
        size_region: base,
        content_region: base + 1,
        size_gate: base + 2,
        content_gate: base + 3,
    }
}

/// Keeps payloads in memory instead of writing files.
#[derive(Default)]
pub struct MemorySink {
    pub payloads: Vec<Vec<u8>>,
}

impl PayloadSink for MemorySink {
    fn persist(&mut self, payload: &[u8]) -> Result<PathBuf, SinkError> {
        self.payloads.push(payload.to_vec());
        Ok(PathBuf::from(format!("memory/{}", self.payloads.len())))
    }
}

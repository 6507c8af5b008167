use crate::config::OutputConfig;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Error writing file {}: {source}", .path.display())]
pub struct SinkError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Destination for consumed payloads.
pub trait PayloadSink {
    /// Store one payload and return where it went.
    fn persist(&mut self, payload: &[u8]) -> Result<PathBuf, SinkError>;
}

/// Writes each payload to its own numbered file.
///
/// The counter starts at 1 and only advances after a successful write, so
/// names have no gaps or repeats within one process.
pub struct FileSink {
    output: OutputConfig,
    counter: u64,
}

impl FileSink {
    pub fn new(output: OutputConfig) -> Self {
        Self { output, counter: 1 }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn next_path(&self) -> PathBuf {
        self.output.dir.join(format!(
            "{}{:02}{}",
            self.output.basename, self.counter, self.output.extension
        ))
    }
}

impl PayloadSink for FileSink {
    fn persist(&mut self, payload: &[u8]) -> Result<PathBuf, SinkError> {
        let path = self.next_path();
        let write = || -> io::Result<()> {
            let mut file = File::create(&path)?;
            file.write_all(payload)?;
            file.flush()
        };

        match write() {
            Ok(()) => {
                self.counter += 1;
                Ok(path)
            }
            Err(source) => Err(SinkError { path, source }),
        }
    }
}

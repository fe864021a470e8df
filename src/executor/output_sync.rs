// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Thread-safe output sinks that keep concurrent hosts from interleaving
//! mid-line on stdout/stderr.

use once_cell::sync::Lazy;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Process-wide stdout sink
static STDOUT_SINK: Lazy<OutputSink> = Lazy::new(|| OutputSink::new(io::stdout()));

/// Process-wide stderr sink
static STDERR_SINK: Lazy<OutputSink> = Lazy::new(|| OutputSink::new(io::stderr()));

/// A shared, mutex-guarded writer.
///
/// Every [`write_atomic`](OutputSink::write_atomic) call holds the lock for the
/// whole buffer, so one call never interleaves with another.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutputSink")
    }
}

impl OutputSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        STDOUT_SINK.clone()
    }

    pub fn stderr() -> Self {
        STDERR_SINK.clone()
    }

    /// Write and flush `bytes` while holding the sink lock.
    pub fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("output sink lock poisoned"))?;
        writer.write_all(bytes)?;
        writer.flush()
    }
}

/// The pair of sinks a batch writes to.
#[derive(Debug, Clone)]
pub struct OutputSinks {
    pub stdout: OutputSink,
    pub stderr: OutputSink,
}

impl Default for OutputSinks {
    fn default() -> Self {
        Self {
            stdout: OutputSink::stdout(),
            stderr: OutputSink::stderr(),
        }
    }
}

impl OutputSinks {
    /// Sinks backed by in-memory buffers, for capturing a batch's output.
    pub fn capture() -> (Self, SharedBuffer, SharedBuffer) {
        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();
        let sinks = Self {
            stdout: OutputSink::new(stdout.clone()),
            stderr: OutputSink::new(stderr.clone()),
        };
        (sinks, stdout, stderr)
    }
}

/// Cloneable in-memory writer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().map(|buf| buf.clone()).unwrap_or_default()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("buffer lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sinks_record_writes() {
        let (sinks, stdout, stderr) = OutputSinks::capture();
        sinks.stdout.write_atomic(b"out\n").unwrap();
        sinks.stderr.write_atomic(b"err\n").unwrap();
        assert_eq!(stdout.contents(), b"out\n");
        assert_eq!(stderr.contents_lossy(), "err\n");
    }

    #[test]
    fn test_concurrent_writes_stay_whole() {
        let buffer = SharedBuffer::default();
        let sink = OutputSink::new(buffer.clone());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let line = format!("{}\n", i.to_string().repeat(64));
                        sink.write_atomic(line.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = buffer.contents_lossy();
        assert_eq!(text.lines().count(), 400);
        for line in text.lines() {
            let first = line.chars().next().unwrap();
            assert!(line.chars().all(|c| c == first), "interleaved line: {line}");
        }
    }
}

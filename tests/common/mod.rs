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

//! In-memory remote shell used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mmh::host::Host;
use mmh::inventory::Inventory;
use mmh::ssh::{
    session_signals, BoxedReader, Connection, Connector, Session, SessionSignals, ShellError,
    SignalEmitter,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};

/// What a fake host does when asked to run a command.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write the chunks, then finish with `exit_code`.
    Output {
        stdout: Vec<Vec<u8>>,
        stderr: Vec<Vec<u8>>,
        exit_code: u32,
    },
    FailConnect,
    /// Never finish connecting.
    HangConnect,
    FailSession,
    FailExec,
    /// Start streaming, then never finish.
    Hang,
    /// Remote stdout yields `before`, then fails with a read error.
    BrokenStream { before: Vec<u8> },
    /// Write `stdout`, fire done, and only then publish the exit status.
    ErrorAfterDone { stdout: Vec<u8>, exit_code: u32 },
}

impl Behavior {
    pub fn stdout(text: &str) -> Self {
        Behavior::Output {
            stdout: vec![text.as_bytes().to_vec()],
            stderr: Vec::new(),
            exit_code: 0,
        }
    }

    pub fn chunks(chunks: &[&[u8]]) -> Self {
        Behavior::Output {
            stdout: chunks.iter().map(|c| c.to_vec()).collect(),
            stderr: Vec::new(),
            exit_code: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    behaviors: HashMap<String, Behavior>,
    pub counters: Arc<Counters>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, name: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(name.to_string(), behavior);
        self
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, host: &Host) -> Result<Box<dyn Connection>, ShellError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .get(&host.name)
            .cloned()
            .unwrap_or_else(|| Behavior::stdout(""));

        // Let sibling tasks interleave.
        tokio::time::sleep(Duration::from_millis(5)).await;

        match behavior {
            Behavior::FailConnect => Err(ShellError::other("connection refused")),
            Behavior::HangConnect => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            behavior => Ok(Box::new(FakeConnection {
                behavior,
                counters: Arc::clone(&self.counters),
                closed: AtomicBool::new(false),
            })),
        }
    }
}

struct FakeConnection {
    behavior: Behavior,
    counters: Arc<Counters>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn new_session(&self) -> Result<Box<dyn Session>, ShellError> {
        if let Behavior::FailSession = self.behavior {
            return Err(ShellError::other("channel open refused"));
        }
        Ok(Box::new(FakeSession::new(self.behavior.clone())))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct FakeSession {
    behavior: Behavior,
    writers: Mutex<Option<(DuplexStream, DuplexStream)>>,
    stdout: Mutex<Option<BoxedReader>>,
    stderr: Mutex<Option<BoxedReader>>,
    emitter: SignalEmitter,
    signals: SessionSignals,
}

impl FakeSession {
    fn new(behavior: Behavior) -> Self {
        let (out_writer, out_reader) = tokio::io::duplex(64);
        let (err_writer, err_reader) = tokio::io::duplex(64);
        let (emitter, signals) = session_signals();
        let stdout: BoxedReader = match &behavior {
            Behavior::BrokenStream { before } => Box::new(BrokenReader {
                data: before.clone(),
                pos: 0,
            }),
            _ => Box::new(out_reader),
        };
        Self {
            behavior,
            writers: Mutex::new(Some((out_writer, err_writer))),
            stdout: Mutex::new(Some(stdout)),
            stderr: Mutex::new(Some(Box::new(err_reader))),
            emitter,
            signals,
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn pipe_exec(&self, _command: &str) -> Result<(), ShellError> {
        let writers = self.writers.lock().unwrap().take();
        let (mut out, mut err) = writers.ok_or(ShellError::SessionConsumed)?;

        match &self.behavior {
            Behavior::FailExec => Err(ShellError::other("exec request refused")),
            Behavior::Hang => {
                self.emitter.ready();
                let _ = out.write_all(b"started\n").await;
                std::future::pending::<()>().await;
                Ok(())
            }
            Behavior::Output {
                stdout,
                stderr,
                exit_code,
            } => {
                self.emitter.ready();
                for chunk in stdout {
                    out.write_all(chunk).await?;
                    tokio::task::yield_now().await;
                }
                for chunk in stderr {
                    err.write_all(chunk).await?;
                }
                drop(out);
                drop(err);
                if *exit_code != 0 {
                    self.emitter.error(ShellError::ExitStatus(*exit_code));
                }
                self.emitter.done();
                Ok(())
            }
            Behavior::BrokenStream { .. } => {
                self.emitter.ready();
                drop(out);
                drop(err);
                self.emitter.done();
                Ok(())
            }
            Behavior::ErrorAfterDone { stdout, exit_code } => {
                self.emitter.ready();
                out.write_all(stdout).await?;
                drop(out);
                drop(err);
                self.emitter.done();
                // Give the task time to stop watching for errors.
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.emitter.error(ShellError::ExitStatus(*exit_code));
                Ok(())
            }
            _ => unreachable!("connect and session failures never reach exec"),
        }
    }

    fn take_stdout(&self) -> Option<BoxedReader> {
        self.stdout.lock().unwrap().take()
    }

    fn take_stderr(&self) -> Option<BoxedReader> {
        self.stderr.lock().unwrap().take()
    }

    fn signals(&self) -> &SessionSignals {
        &self.signals
    }

    async fn close(&self) {}
}

/// Yields `data`, then fails every later read.
struct BrokenReader {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos < self.data.len() {
            let n = buf.remaining().min(self.data.len() - self.pos);
            let start = self.pos;
            buf.put_slice(&self.data[start..start + n]);
            self.pos += n;
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        )))
    }
}

/// Hosts `name` tagged with `tag`, in order.
pub fn tagged_inventory(tag: &str, names: &[&str]) -> Inventory {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Host::new(*name, format!("10.0.0.{}", i + 1), 22, "root").with_tags([tag])
        })
        .collect()
}

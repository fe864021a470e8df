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

//! Remote shell abstraction consumed by the task executor.
//!
//! A [`Connector`] opens a [`Connection`] to a host, a connection opens
//! [`Session`]s, and a session runs exactly one command. While the command
//! runs the session reports progress through three independent signals:
//!
//! - **ready**: output streaming has begun
//! - **done**: the remote command finished and its streams are drained
//! - **error**: a protocol or streaming error occurred (one-slot buffer)

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use super::error::ShellError;
use crate::host::Host;

/// Boxed remote output stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Opens connections to hosts.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &Host) -> Result<Box<dyn Connection>, ShellError>;
}

/// An established, authenticated connection to one host.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn Session>, ShellError>;

    /// Tear down the local side of the connection. Idempotent.
    async fn close(&self);
}

/// A command execution context on a connection.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run `command` remotely, pumping its output into the session streams.
    ///
    /// Resolves after the done signal has fired, or with an error when the
    /// command could not be started at all.
    async fn pipe_exec(&self, command: &str) -> Result<(), ShellError>;

    /// Remote standard output. Yields `Some` only on the first call.
    fn take_stdout(&self) -> Option<BoxedReader>;

    /// Remote standard error. Yields `Some` only on the first call.
    fn take_stderr(&self) -> Option<BoxedReader>;

    fn signals(&self) -> &SessionSignals;

    async fn close(&self);
}

/// A one-shot, idempotent notification that any number of waiters can observe.
#[derive(Debug, Clone, Default)]
pub struct Latch(CancellationToken);

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.cancel();
    }

    pub fn is_fired(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn wait(&self) {
        self.0.cancelled().await
    }
}

/// Receiving side of a session's notifications.
#[derive(Debug)]
pub struct SessionSignals {
    ready: Latch,
    done: Latch,
    errors: AsyncMutex<mpsc::Receiver<ShellError>>,
}

/// Sending side of a session's notifications, held by the backend.
#[derive(Debug, Clone)]
pub struct SignalEmitter {
    ready: Latch,
    done: Latch,
    errors: mpsc::Sender<ShellError>,
}

/// Create a connected emitter/receiver pair.
pub fn session_signals() -> (SignalEmitter, SessionSignals) {
    let ready = Latch::new();
    let done = Latch::new();
    let (tx, rx) = mpsc::channel(1);
    (
        SignalEmitter {
            ready: ready.clone(),
            done: done.clone(),
            errors: tx,
        },
        SessionSignals {
            ready,
            done,
            errors: AsyncMutex::new(rx),
        },
    )
}

impl SessionSignals {
    pub fn ready(&self) -> &Latch {
        &self.ready
    }

    pub fn done(&self) -> &Latch {
        &self.done
    }

    /// Wait for the next error. `None` once the emitter is gone and the slot is empty.
    pub async fn next_error(&self) -> Option<ShellError> {
        self.errors.lock().await.recv().await
    }

    /// Take a pending error without waiting.
    pub fn try_error(&self) -> Option<ShellError> {
        self.errors.try_lock().ok()?.try_recv().ok()
    }
}

impl SignalEmitter {
    pub fn ready(&self) {
        self.ready.fire();
    }

    pub fn done(&self) {
        self.done.fire();
    }

    /// Publish an error without blocking. Returns `false` if the slot was full.
    pub fn error(&self, error: ShellError) -> bool {
        match self.errors.try_send(error) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::debug!("Session error slot full, dropping: {}", dropped);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Take-once holder for a session stream.
pub(crate) struct StreamSlot(Mutex<Option<BoxedReader>>);

impl StreamSlot {
    pub(crate) fn new(reader: BoxedReader) -> Self {
        Self(Mutex::new(Some(reader)))
    }

    pub(crate) fn take(&self) -> Option<BoxedReader> {
        self.0.lock().ok()?.take()
    }
}

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

//! Batch-wide cancellation.
//!
//! A [`CancellationController`] is the single writer of the batch token.
//! Tasks only ever see an [`ExecutionContext`], which can observe the token
//! but not fire it.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Read-only view of the batch cancellation token, shared by every task.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    token: CancellationToken,
}

impl ExecutionContext {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the batch has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// A token cancelled together with the batch, which the caller may also
    /// cancel on its own without affecting anyone else.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Owns the batch token and fires it at most once.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> ExecutionContext {
        ExecutionContext {
            token: self.token.clone(),
        }
    }

    /// Cancel the batch. Later calls are no-ops.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Cancelling all running tasks");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a listener that cancels the batch on the first SIGHUP, SIGINT,
    /// SIGTERM or SIGQUIT.
    ///
    /// The listener exits after the first signal, or as soon as the batch is
    /// cancelled some other way. Abort the handle once the batch finishes.
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        let controller = self.clone();

        #[cfg(unix)]
        let listener = {
            use tokio::signal::unix::{signal, SignalKind};

            let mut hangup = signal(SignalKind::hangup())?;
            let mut interrupt = signal(SignalKind::interrupt())?;
            let mut terminate = signal(SignalKind::terminate())?;
            let mut quit = signal(SignalKind::quit())?;

            tokio::spawn(async move {
                let name = tokio::select! {
                    _ = hangup.recv() => "SIGHUP",
                    _ = interrupt.recv() => "SIGINT",
                    _ = terminate.recv() => "SIGTERM",
                    _ = quit.recv() => "SIGQUIT",
                    _ = controller.token.cancelled() => return,
                };
                tracing::debug!("Received {}", name);
                controller.cancel();
            })
        };

        #[cfg(not(unix))]
        let listener = tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                        return;
                    }
                }
                _ = controller.token.cancelled() => return,
            }
            tracing::debug!("Received Ctrl+C");
            controller.cancel();
        });

        Ok(listener)
    }
}

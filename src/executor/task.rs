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

//! Execution of one command on one host.
//!
//! A task connects, opens a session and then runs three sub-activities in a
//! task-scoped [`JoinSet`]:
//!
//! - the command itself (`pipe_exec`)
//! - the output relay, which starts once the session is ready
//! - the error relay, which forwards session errors to the task's channel
//!
//! The task ends when the command finishes, fails to start, or the batch is
//! cancelled. The connection is then closed, every sub-activity is joined and
//! the session's error slot is drained one last time.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::formatter::OutputFormatter;
use super::output_mode::ExecMode;
use super::output_sync::OutputSinks;
use crate::cancel::ExecutionContext;
use crate::error::TaskError;
use crate::host::Host;
use crate::ssh::{Connector, Latch, Session};

/// Sending half of a task's one-slot error channel.
///
/// Never blocks. Once the slot holds an error, later reports are dropped, so a
/// task delivers at most one error.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    host: String,
    tx: mpsc::Sender<TaskError>,
}

impl ErrorReporter {
    pub fn channel(host: &str) -> (Self, mpsc::Receiver<TaskError>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                host: host.to_string(),
                tx,
            },
            rx,
        )
    }

    /// Returns `true` if this error took the slot.
    pub fn report(&self, error: TaskError) -> bool {
        match self.tx.try_send(error) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::debug!(
                    "{} already reported an error, dropping {} error: {}",
                    self.host,
                    dropped.kind(),
                    dropped
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// One host's share of a batch.
#[derive(Debug)]
pub struct Task {
    pub host: Host,
    pub command: Arc<str>,
    pub mode: ExecMode,
    reporter: ErrorReporter,
}

impl Task {
    pub fn new(host: Host, command: Arc<str>, mode: ExecMode, reporter: ErrorReporter) -> Self {
        Self {
            host,
            command,
            mode,
            reporter,
        }
    }
}

/// Runs tasks against a remote shell backend.
#[derive(Clone)]
pub struct TaskExecutor {
    connector: Arc<dyn Connector>,
    sinks: OutputSinks,
    colors: bool,
}

impl TaskExecutor {
    pub fn new(connector: Arc<dyn Connector>, sinks: OutputSinks, colors: bool) -> Self {
        Self {
            connector,
            sinks,
            colors,
        }
    }

    /// Run `task` to completion. Every failure goes to the task's reporter.
    pub async fn run(&self, ctx: ExecutionContext, task: Task) {
        let Task {
            host,
            command,
            mode,
            reporter,
        } = task;

        let connection = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                tracing::debug!("{}: cancelled before connecting", host.name);
                return;
            }
            result = self.connector.connect(&host) => match result {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::warn!("Failed to connect to {}: {}", host, e);
                    reporter.report(TaskError::Connection(e));
                    return;
                }
            },
        };

        let session: Arc<dyn Session> = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                connection.close().await;
                return;
            }
            result = connection.new_session() => match result {
                Ok(session) => Arc::from(session),
                Err(e) => {
                    tracing::warn!("Failed to open session on {}: {}", host.name, e);
                    reporter.report(TaskError::Session(e));
                    connection.close().await;
                    return;
                }
            },
        };

        let formatter = OutputFormatter::new(&host.name, mode, self.colors);
        let output_scope = ctx.child_token();
        let error_scope = CancellationToken::new();
        let stopped = Latch::new();
        let mut group = JoinSet::new();

        group.spawn(run_command(
            Arc::clone(&session),
            command,
            reporter.clone(),
            stopped.clone(),
        ));
        group.spawn(relay_output(
            Arc::clone(&session),
            formatter,
            self.sinks.clone(),
            reporter.clone(),
            output_scope.clone(),
        ));
        group.spawn(relay_errors(
            Arc::clone(&session),
            reporter.clone(),
            error_scope.clone(),
        ));

        let signals = session.signals();
        let cancelled = tokio::select! {
            _ = ctx.cancelled() => true,
            _ = signals.done().wait() => false,
            _ = stopped.wait() => false,
        };

        error_scope.cancel();
        let streaming = signals.ready().is_fired() || signals.done().is_fired();
        if cancelled || !streaming {
            output_scope.cancel();
        }
        if cancelled {
            tracing::debug!("{}: cancelled, closing connection", host.name);
            group.abort_all();
        }

        session.close().await;
        connection.close().await;

        while let Some(joined) = group.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    tracing::error!("{}: sub-task failed: {}", host.name, e);
                    reporter.report(TaskError::Panicked(e.to_string()));
                }
            }
        }

        if let Some(e) = signals.try_error() {
            reporter.report(TaskError::Protocol(e));
        }
        tracing::debug!("{}: task finished", host.name);
    }
}

async fn run_command(
    session: Arc<dyn Session>,
    command: Arc<str>,
    reporter: ErrorReporter,
    stopped: Latch,
) {
    if let Err(e) = session.pipe_exec(&command).await {
        reporter.report(TaskError::Protocol(e));
    }
    stopped.fire();
}

async fn relay_output(
    session: Arc<dyn Session>,
    formatter: OutputFormatter,
    sinks: OutputSinks,
    reporter: ErrorReporter,
    scope: CancellationToken,
) {
    let signals = session.signals();
    tokio::select! {
        biased;
        _ = scope.cancelled() => return,
        _ = signals.ready().wait() => {}
        _ = signals.done().wait() => {}
    }

    let stdout = session.take_stdout();
    let stderr = session.take_stderr();

    let relay_stdout = async {
        match stdout {
            Some(reader) => formatter.relay(reader, &sinks.stdout).await.map(drop),
            None => Ok(()),
        }
    };
    let relay_stderr = async {
        match stderr {
            Some(reader) => formatter.relay(reader, &sinks.stderr).await.map(drop),
            None => Ok(()),
        }
    };

    tokio::select! {
        _ = scope.cancelled() => {}
        (out, err) = async { tokio::join!(relay_stdout, relay_stderr) } => {
            if let Err(e) = out.and(err) {
                reporter.report(TaskError::Stream(e));
            }
        }
    }
}

async fn relay_errors(
    session: Arc<dyn Session>,
    reporter: ErrorReporter,
    scope: CancellationToken,
) {
    let signals = session.signals();
    loop {
        tokio::select! {
            _ = scope.cancelled() => break,
            error = signals.next_error() => match error {
                Some(e) => {
                    reporter.report(TaskError::Protocol(e));
                }
                None => break,
            },
        }
    }
}

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

//! Fan-out of one command over the resolved hosts.

use futures::future::join_all;
use std::sync::Arc;

use super::formatter::render_failure;
use super::output_mode::{should_use_colors, ExecMode};
use super::output_sync::OutputSinks;
use super::task::{ErrorReporter, Task, TaskExecutor};
use crate::cancel::ExecutionContext;
use crate::error::{ResolutionError, TaskError};
use crate::host::Host;
use crate::inventory::HostInventory;
use crate::ssh::Connector;

/// An error attributed to the host whose task produced it.
#[derive(Debug)]
pub struct HostFailure {
    pub host: String,
    pub error: TaskError,
}

/// Outcome of a batch once every task has terminated.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub spawned: usize,
    pub failures: Vec<HostFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_hosts(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.host.as_str()).collect()
    }
}

/// Resolve `target` to the hosts a batch will run on.
///
/// Single mode looks the target up as a host name, multi mode as a tag.
/// An empty result is an error, so a batch never starts with zero tasks.
pub fn resolve_targets(
    inventory: &dyn HostInventory,
    target: &str,
    mode: ExecMode,
) -> Result<Vec<Host>, ResolutionError> {
    match mode {
        ExecMode::Single => inventory
            .find_host_by_name(target)
            .map(|host| vec![host])
            .ok_or_else(|| ResolutionError::HostNotFound {
                name: target.to_string(),
            }),
        ExecMode::Multi => {
            let hosts = inventory.find_hosts_by_tag(target);
            if hosts.is_empty() {
                Err(ResolutionError::NoTaggedHosts {
                    tag: target.to_string(),
                })
            } else {
                Ok(hosts)
            }
        }
    }
}

/// Spawns one task per host and collects their errors.
pub struct Dispatcher {
    connector: Arc<dyn Connector>,
    sinks: OutputSinks,
    colors: bool,
}

impl Dispatcher {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sinks: OutputSinks::default(),
            colors: should_use_colors(),
        }
    }

    pub fn with_sinks(mut self, sinks: OutputSinks) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Resolve, execute and print failures.
    ///
    /// Only resolution can fail; per-host failures end up in the report.
    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        inventory: &dyn HostInventory,
        target: &str,
        command: &str,
        mode: ExecMode,
    ) -> Result<BatchReport, ResolutionError> {
        let hosts = resolve_targets(inventory, target, mode)?;
        tracing::info!(
            "Executing '{}' on {} host(s) ({:?} mode)",
            command,
            hosts.len(),
            mode
        );

        let report = self.execute(ctx, hosts, command, mode).await;
        self.print_failures(&report, mode);
        Ok(report)
    }

    /// Run `command` on every host and wait for all of them.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        hosts: Vec<Host>,
        command: &str,
        mode: ExecMode,
    ) -> BatchReport {
        let executor =
            TaskExecutor::new(Arc::clone(&self.connector), self.sinks.clone(), self.colors);
        let command: Arc<str> = Arc::from(command);

        let mut channels = Vec::with_capacity(hosts.len());
        let mut handles = Vec::with_capacity(hosts.len());

        for host in hosts {
            let (reporter, rx) = ErrorReporter::channel(&host.name);
            channels.push((host.name.clone(), reporter.clone(), rx));

            let task = Task::new(host, Arc::clone(&command), mode, reporter);
            let executor = executor.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move { executor.run(ctx, task).await }));
        }

        let spawned = handles.len();
        let results = join_all(handles).await;

        let mut failures = Vec::new();
        for ((host, reporter, mut rx), result) in channels.into_iter().zip(results) {
            if let Err(e) = result {
                tracing::error!("Task for {} failed: {}", host, e);
                reporter.report(TaskError::Panicked(e.to_string()));
            }
            if let Ok(error) = rx.try_recv() {
                tracing::warn!("{}: {} error: {}", host, error.kind(), error);
                failures.push(HostFailure { host, error });
            }
        }

        tracing::debug!("{} task(s) finished, {} failed", spawned, failures.len());
        BatchReport { spawned, failures }
    }

    /// Print every failure to stderr: `host: error` in multi mode, the bare
    /// error in single mode.
    pub fn print_failures(&self, report: &BatchReport, mode: ExecMode) {
        for failure in &report.failures {
            let message = if mode.is_single() {
                failure.error.to_string()
            } else {
                format!("{}: {}", failure.host, failure.error)
            };
            let line = format!("{}\n", render_failure(&message, self.colors));
            if let Err(e) = self.sinks.stderr.write_atomic(line.as_bytes()) {
                tracing::warn!("Failed to print error for {}: {}", failure.host, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Inventory;

    fn inventory() -> Inventory {
        Inventory::new(vec![
            Host::new("web1", "10.0.0.1", 22, "root").with_tags(vec!["web".to_string()]),
            Host::new("web2", "10.0.0.2", 22, "root").with_tags(vec!["web".to_string()]),
            Host::new("db1", "10.0.0.3", 22, "root").with_tags(vec!["db".to_string()]),
        ])
    }

    #[test]
    fn test_resolve_single_by_name() {
        let hosts = resolve_targets(&inventory(), "db1", ExecMode::Single).unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name, "db1");
    }

    #[test]
    fn test_resolve_single_ignores_tags() {
        let err = resolve_targets(&inventory(), "web", ExecMode::Single).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::HostNotFound {
                name: "web".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_multi_by_tag() {
        let hosts = resolve_targets(&inventory(), "web", ExecMode::Multi).unwrap();
        let names: Vec<_> = hosts.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["web1", "web2"]);
    }

    #[test]
    fn test_resolve_unknown_tag() {
        let err = resolve_targets(&inventory(), "nonexistent", ExecMode::Multi).unwrap_err();
        assert!(err.to_string().contains("no tagged hosts found"));
    }

    #[test]
    fn test_batch_report_helpers() {
        let report = BatchReport {
            spawned: 2,
            failures: vec![HostFailure {
                host: "b".to_string(),
                error: TaskError::Panicked("boom".to_string()),
            }],
        };
        assert!(!report.is_success());
        assert_eq!(report.failed_hosts(), vec!["b"]);
        assert!(BatchReport::default().is_success());
    }
}

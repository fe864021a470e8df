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

//! Error types for host resolution and per-host task execution.

use crate::ssh::ShellError;
use std::io;
use thiserror::Error;

/// Target resolution failed; the whole batch is aborted before any task starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("server not found: '{name}'")]
    HostNotFound { name: String },

    #[error("no tagged hosts found for tag '{tag}'")]
    NoTaggedHosts { tag: String },
}

/// Failure of a single host's task. Never aborts sibling tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to connect: {0}")]
    Connection(#[source] ShellError),

    #[error("failed to open session: {0}")]
    Session(#[source] ShellError),

    #[error("output stream failed: {0}")]
    Stream(#[source] io::Error),

    #[error("{0}")]
    Protocol(#[source] ShellError),

    #[error("task execution failed: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Short category name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Connection(_) => "connection",
            TaskError::Session(_) => "session",
            TaskError::Stream(_) => "stream",
            TaskError::Protocol(_) => "protocol",
            TaskError::Panicked(_) => "panic",
        }
    }
}

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

use std::io;
use thiserror::Error;

/// Errors raised by the remote shell layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShellError {
    #[error("could not resolve address '{address}': {source}")]
    AddressInvalid {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("connection timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("host key verification failed")]
    ServerCheckFailed,

    #[error("invalid private key: {0}")]
    KeyInvalid(#[source] russh::keys::Error),

    #[error("authentication failed for user '{user}' (tried: {methods})")]
    AuthFailed { user: String, methods: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("remote command exited with status {0}")]
    ExitStatus(u32),

    #[error("remote command terminated by signal {0}")]
    ExitSignal(String),

    #[error("remote command ended without reporting an exit status")]
    MissingExitStatus,

    #[error("the session has already executed a command")]
    SessionConsumed,

    #[error("{0}")]
    Other(String),
}

impl ShellError {
    pub fn other(message: impl Into<String>) -> Self {
        ShellError::Other(message.into())
    }
}

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

//! Execution mode and terminal capability detection.
//!
//! The mode decides two things at once: how the target is resolved
//! (host name or tag) and how remote output is rendered:
//! - Single: one host, raw byte passthrough
//! - Multi: every host carrying a tag, colored `name: line` attribution

/// Single- or multi-host execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Target is a host name; output is passed through untouched.
    Single,

    /// Target is a tag; every output line is prefixed with its host name.
    #[default]
    Multi,
}

impl ExecMode {
    pub fn from_single_flag(single: bool) -> Self {
        if single {
            ExecMode::Single
        } else {
            ExecMode::Multi
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, ExecMode::Single)
    }
}

/// Check if stdout is a TTY
///
/// Piped or redirected output, and CI runners, count as non-interactive.
pub fn is_tty() -> bool {
    use std::io::IsTerminal;

    let is_terminal = std::io::stdout().is_terminal();

    let is_ci = std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
        || std::env::var("TRAVIS").is_ok();

    is_terminal && !is_ci
}

/// Check if colors should be enabled
///
/// Colors are enabled when:
/// - Output is a TTY
/// - NO_COLOR environment variable is not set
/// - TERM is not "dumb"
pub fn should_use_colors() -> bool {
    if !is_tty() {
        return false;
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

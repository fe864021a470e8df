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

//! Concurrent execution engine: dispatcher, per-host tasks and output rendering.

mod dispatcher;
mod formatter;
mod output_mode;
mod output_sync;
mod task;

// Re-export public types
pub use dispatcher::{resolve_targets, BatchReport, Dispatcher, HostFailure};
pub use formatter::{host_color, render_failure, OutputFormatter};
pub use output_mode::{is_tty, should_use_colors, ExecMode};
pub use output_sync::{OutputSink, OutputSinks, SharedBuffer};
pub use task::{ErrorReporter, Task, TaskExecutor};

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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::executor::ExecMode;

#[derive(Parser, Debug)]
#[command(
    name = "mmh",
    version,
    about = "Run one shell command on one or many SSH hosts concurrently",
    long_about = "mmh sends a single shell command to a named server, or to every server carrying a tag, over SSH.\nHosts run concurrently; one host failing never blocks the others.\nWith several hosts every output line is prefixed with its host name in a stable color.",
    after_help = "EXAMPLES:\n  Run on every server tagged 'web':  mmh exec web uptime\n  Run on the server named 'db1':     mmh exec --single db1 \"df -h\"\n  Use another inventory file:        mmh --config ./hosts.yaml exec prod hostname"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        help = "Configuration file path\nConfig loading priority:\n  1. This flag's value (must exist)\n  2. $MMH_CONFIG\n  3. Current directory (./mmh.yaml)\n  4. $XDG_CONFIG_HOME/mmh/config.yaml\n  5. ~/.config/mmh/config.yaml"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        visible_alias = "mexec",
        about = "Execute a command on one server or on every server with a tag",
        long_about = "Executes the command on all target hosts simultaneously and streams their output.\nBy default TARGET is a tag and every output line is prefixed with its host name.\nWith --single, TARGET is a server name and output is passed through unchanged.\n\nExit codes: 0 (command dispatched, even if some hosts failed), 1 (no matching server)",
        after_help = "Examples:\n  mmh exec web uptime\n  mmh exec -s web1 'tail -f /var/log/syslog'"
    )]
    Exec {
        #[arg(
            short = 's',
            long,
            help = "Treat TARGET as a server name and pass its output through unchanged"
        )]
        single: bool,

        #[arg(help = "Tag to run on, or server name with --single")]
        target: String,

        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Command to execute on remote hosts"
        )]
        command: Vec<String>,
    },
}

impl Commands {
    /// Remote command line, words joined by single spaces.
    pub fn command_line(&self) -> String {
        match self {
            Commands::Exec { command, .. } => command.join(" "),
        }
    }

    pub fn mode(&self) -> ExecMode {
        match self {
            Commands::Exec { single, .. } => ExecMode::from_single_flag(*single),
        }
    }
}

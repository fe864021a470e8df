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

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use mmh::{
    cli::{Cli, Commands},
    config::Config,
    executor::{render_failure, should_use_colors, Dispatcher},
    ssh::SshConnector,
    utils::init_logging,
    CancellationController,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_with_priority(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    let inventory = config.inventory();
    tracing::debug!("Loaded {} server(s) from configuration", inventory.len());

    let colors = !cli.no_color && should_use_colors();
    let connector = Arc::new(SshConnector::new(config.connect_settings()));
    let dispatcher = Dispatcher::new(connector).with_colors(colors);

    let controller = CancellationController::new();
    let listener = controller
        .listen_for_signals()
        .context("Failed to install signal handlers")?;

    let command_line = cli.command.command_line();
    let mode = cli.command.mode();
    let result = match &cli.command {
        Commands::Exec { target, .. } => {
            dispatcher
                .dispatch(&controller.context(), &inventory, target, &command_line, mode)
                .await
        }
    };
    listener.abort();

    match result {
        Ok(report) => {
            tracing::debug!(
                "Batch finished: {} task(s), {} failure(s)",
                report.spawned,
                report.failures.len()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", render_failure(&e.to_string(), colors));
            std::process::exit(1);
        }
    }
}

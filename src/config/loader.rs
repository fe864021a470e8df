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

//! Configuration loading and priority management.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::types::Config;
use super::utils::expand_tilde;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "MMH_CONFIG";

const LOCAL_CONFIG_FILE: &str = "mmh.yaml";

impl Config {
    /// Load configuration from a file that must exist.
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);

        let content = fs::read_to_string(&expanded_path)
            .await
            .with_context(|| format!("Failed to read configuration file at {}. Please check the path and file permissions.", expanded_path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration file at {}", expanded_path.display()))
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document is an empty configuration.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(content).context("Failed to parse YAML configuration. Please check the YAML syntax is valid (indent with spaces, not tabs).")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject entries the inventory cannot represent.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                anyhow::bail!("Server entry with address '{}' has no name", server.address);
            }
            if server.address.trim().is_empty() {
                anyhow::bail!("Server '{}' has no address", server.name);
            }
            if !seen.insert(server.name.as_str()) {
                anyhow::bail!("Duplicate server name '{}'", server.name);
            }
        }
        Ok(())
    }

    /// Load configuration with priority order:
    /// 1. Explicit --config path (must exist)
    /// 2. MMH_CONFIG environment variable (must exist)
    /// 3. Current directory mmh.yaml
    /// 4. $XDG_CONFIG_HOME/mmh/config.yaml
    /// 5. ~/.config/mmh/config.yaml
    ///
    /// With no file anywhere the configuration is empty.
    pub async fn load_with_priority(cli_config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_config_path {
            tracing::debug!("Using explicitly specified config file: {:?}", path);
            return Self::load(path).await;
        }

        if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
            let path = PathBuf::from(path);
            tracing::debug!("Using config file from {}: {:?}", CONFIG_ENV_VAR, path);
            return Self::load(&path).await;
        }

        for candidate in Self::standard_locations() {
            tracing::debug!("Checking config path: {:?}", candidate);
            if candidate.exists() {
                tracing::debug!("Found config at {:?}", candidate);
                return Self::load(&candidate).await;
            }
        }

        tracing::debug!("No config file found, using default empty configuration");
        Ok(Self::default())
    }

    fn standard_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(LOCAL_CONFIG_FILE)];

        if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME").filter(|p| !p.is_empty()) {
            locations.push(PathBuf::from(xdg_config_home).join("mmh").join("config.yaml"));
        }
        if let Some(dirs) = directories::BaseDirs::new() {
            let home_config = dirs.home_dir().join(".config").join("mmh").join("config.yaml");
            if !locations.contains(&home_config) {
                locations.push(home_config);
            }
        }

        locations
    }
}

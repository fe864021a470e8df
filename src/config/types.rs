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

//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

/// Settings applied to every server that does not override them.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Defaults {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub private_key: Option<String>,
    /// Seconds allowed for TCP connect plus authentication.
    /// Default: 10
    pub connect_timeout: Option<u64>,
    /// SSH keepalive interval in seconds.
    /// Default: 60 seconds. Set to 0 to disable.
    pub server_alive_interval: Option<u64>,
    /// Maximum keepalive messages without response before disconnect.
    /// Default: 3
    pub server_alive_count_max: Option<usize>,
    /// Verify host keys against `~/.ssh/known_hosts`.
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

/// One entry of the `servers` list.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub address: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub private_key_password: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

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

//! Turning configuration into an inventory snapshot and connection settings.

use std::time::Duration;
use zeroize::Zeroizing;

use super::types::{Config, ServerConfig};
use super::utils::{expand_path, get_current_username};
use crate::host::{Host, HostCredentials};
use crate::inventory::Inventory;
use crate::ssh::{ConnectSettings, HostKeyCheck};

const DEFAULT_PORT: u16 = 22;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 60;
const DEFAULT_KEEPALIVE_MAX: usize = 3;

impl Config {
    /// Read-only host snapshot for one invocation.
    pub fn inventory(&self) -> Inventory {
        self.servers.iter().map(|server| self.resolve_host(server)).collect()
    }

    /// Apply defaults to one server entry.
    pub fn resolve_host(&self, server: &ServerConfig) -> Host {
        let port = server.port.or(self.defaults.port).unwrap_or(DEFAULT_PORT);
        let user = server
            .user
            .clone()
            .or_else(|| self.defaults.user.clone())
            .unwrap_or_else(get_current_username);

        let credentials = HostCredentials {
            private_key: server
                .private_key
                .as_deref()
                .or(self.defaults.private_key.as_deref())
                .map(expand_path),
            private_key_password: server.private_key_password.clone().map(Zeroizing::new),
            password: server.password.clone().map(Zeroizing::new),
        };

        Host::new(&server.name, &server.address, port, user)
            .with_tags(server.tags.iter().cloned())
            .with_credentials(credentials)
    }

    pub fn connect_settings(&self) -> ConnectSettings {
        let defaults = &self.defaults;
        let keepalive_secs = defaults
            .server_alive_interval
            .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL_SECS);

        ConnectSettings {
            connect_timeout: Duration::from_secs(
                defaults
                    .connect_timeout
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            keepalive_interval: (keepalive_secs > 0).then(|| Duration::from_secs(keepalive_secs)),
            keepalive_max: defaults
                .server_alive_count_max
                .unwrap_or(DEFAULT_KEEPALIVE_MAX),
            host_key_check: if defaults.strict_host_key_checking {
                HostKeyCheck::KnownHosts
            } else {
                HostKeyCheck::NoCheck
            },
        }
    }
}

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

//! Read-only host lookup used by the dispatcher.

use crate::host::Host;

/// Lookup capability the dispatcher needs from a host inventory.
pub trait HostInventory: Send + Sync {
    fn find_host_by_name(&self, name: &str) -> Option<Host>;

    /// Every host carrying `tag`, in inventory order. Empty when none match.
    fn find_hosts_by_tag(&self, tag: &str) -> Vec<Host>;
}

/// Immutable snapshot of the configured hosts for one invocation.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    hosts: Vec<Host>,
}

impl Inventory {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self { hosts }
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl HostInventory for Inventory {
    fn find_host_by_name(&self, name: &str) -> Option<Host> {
        self.hosts.iter().find(|h| h.name == name).cloned()
    }

    fn find_hosts_by_tag(&self, tag: &str) -> Vec<Host> {
        self.hosts.iter().filter(|h| h.has_tag(tag)).cloned().collect()
    }
}

impl FromIterator<Host> for Inventory {
    fn from_iter<I: IntoIterator<Item = Host>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Inventory {
        Inventory::new(vec![
            Host::new("web1", "10.0.0.1", 22, "root").with_tags(["web"]),
            Host::new("web2", "10.0.0.2", 22, "root").with_tags(["web", "canary"]),
            Host::new("db1", "10.0.1.1", 22, "root").with_tags(["db"]),
        ])
    }

    #[test]
    fn test_find_host_by_name() {
        let inventory = sample();
        assert_eq!(inventory.find_host_by_name("db1").unwrap().address, "10.0.1.1");
        assert!(inventory.find_host_by_name("db2").is_none());
    }

    #[test]
    fn test_find_hosts_by_tag_preserves_order() {
        let inventory = sample();
        let names: Vec<_> = inventory
            .find_hosts_by_tag("web")
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["web1", "web2"]);
    }

    #[test]
    fn test_find_hosts_by_unknown_tag_is_empty() {
        assert!(sample().find_hosts_by_tag("nonexistent").is_empty());
    }
}

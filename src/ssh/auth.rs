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

//! SSH authentication for host connections.
//!
//! Each host yields an ordered list of [`AuthMethod`]s built from its
//! credentials. They are tried in turn until the server accepts one.

use russh::client::{Handle, Handler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::error::ShellError;
use crate::host::HostCredentials;

/// Key files probed when a host names no key of its own.
const DEFAULT_KEY_FILES: &[&str] = &["id_ed25519", "id_ecdsa", "id_rsa"];

/// An authentication attempt.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthMethod {
    Password(Zeroizing<String>),
    PrivateKeyFile {
        key_file_path: PathBuf,
        key_pass: Option<Zeroizing<String>>,
    },
    #[cfg(not(target_os = "windows"))]
    Agent,
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::PrivateKeyFile { key_file_path, .. } => f
                .debug_struct("PrivateKeyFile")
                .field("key_file_path", key_file_path)
                .finish_non_exhaustive(),
            #[cfg(not(target_os = "windows"))]
            AuthMethod::Agent => f.write_str("Agent"),
        }
    }
}

impl AuthMethod {
    pub fn with_password(password: &str) -> Self {
        Self::Password(Zeroizing::new(password.to_string()))
    }

    pub fn with_key_file<T: AsRef<Path>>(key_file_path: T, passphrase: Option<&str>) -> Self {
        Self::PrivateKeyFile {
            key_file_path: key_file_path.as_ref().to_path_buf(),
            key_pass: passphrase.map(|p| Zeroizing::new(p.to_string())),
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::PrivateKeyFile { .. } => "publickey",
            #[cfg(not(target_os = "windows"))]
            AuthMethod::Agent => "agent",
        }
    }

    /// Build the ordered method list for a host: key file, password, agent.
    ///
    /// Hosts without an explicit key fall back to the usual `~/.ssh` keys.
    pub fn chain_for(credentials: &HostCredentials) -> Vec<AuthMethod> {
        let mut methods = Vec::new();

        match &credentials.private_key {
            Some(path) => methods.push(AuthMethod::PrivateKeyFile {
                key_file_path: path.clone(),
                key_pass: credentials.private_key_password.clone(),
            }),
            None => {
                if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().join(".ssh"))
                {
                    methods.extend(
                        DEFAULT_KEY_FILES
                            .iter()
                            .map(|name| home.join(name))
                            .filter(|path| path.exists())
                            .map(|path| AuthMethod::with_key_file(path, None)),
                    );
                }
            }
        }

        if let Some(password) = &credentials.password {
            methods.push(AuthMethod::Password(password.clone()));
        }

        #[cfg(not(target_os = "windows"))]
        if std::env::var_os("SSH_AUTH_SOCK").is_some() {
            methods.push(AuthMethod::Agent);
        }

        methods
    }
}

/// Try each method in order until one succeeds.
pub(super) async fn authenticate<H>(
    handle: &mut Handle<H>,
    username: &str,
    methods: &[AuthMethod],
) -> Result<(), ShellError>
where
    H: Handler<Error = ShellError>,
{
    for method in methods {
        match try_method(handle, username, method).await {
            Ok(true) => {
                tracing::debug!("Authenticated as {} using {}", username, method.name());
                return Ok(());
            }
            Ok(false) => {
                tracing::debug!("Server rejected {} authentication", method.name());
            }
            Err(e) => {
                tracing::debug!("{} authentication failed: {}", method.name(), e);
            }
        }
    }

    Err(ShellError::AuthFailed {
        user: username.to_string(),
        methods: if methods.is_empty() {
            "none available".to_string()
        } else {
            methods
                .iter()
                .map(AuthMethod::name)
                .collect::<Vec<_>>()
                .join(", ")
        },
    })
}

async fn try_method<H>(
    handle: &mut Handle<H>,
    username: &str,
    method: &AuthMethod,
) -> Result<bool, ShellError>
where
    H: Handler<Error = ShellError>,
{
    match method {
        AuthMethod::Password(password) => {
            let result = handle
                .authenticate_password(username, password.as_str())
                .await?;
            Ok(result.success())
        }
        AuthMethod::PrivateKeyFile {
            key_file_path,
            key_pass,
        } => {
            let passphrase = key_pass.as_ref().map(|p| p.as_str());
            let key = russh::keys::load_secret_key(key_file_path, passphrase)
                .map_err(ShellError::KeyInvalid)?;
            let result = handle
                .authenticate_publickey(
                    username,
                    russh::keys::PrivateKeyWithHashAlg::new(
                        Arc::new(key),
                        handle.best_supported_rsa_hash().await?.flatten(),
                    ),
                )
                .await?;
            Ok(result.success())
        }
        #[cfg(not(target_os = "windows"))]
        AuthMethod::Agent => {
            let mut agent = russh::keys::agent::client::AgentClient::connect_env()
                .await
                .map_err(|e| ShellError::other(format!("cannot reach SSH agent: {e}")))?;
            let identities = agent
                .request_identities()
                .await
                .map_err(|e| ShellError::other(format!("SSH agent refused identities: {e}")))?;

            for identity in identities {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                let result = handle
                    .authenticate_publickey_with(username, identity, hash_alg, &mut agent)
                    .await;
                if let Ok(auth_result) = result {
                    if auth_result.success() {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_prefers_explicit_key_then_password() {
        let credentials = HostCredentials {
            private_key: Some(PathBuf::from("/keys/web")),
            private_key_password: None,
            password: Some(Zeroizing::new("secret".to_string())),
        };
        let methods = AuthMethod::chain_for(&credentials);
        assert_eq!(methods[0], AuthMethod::with_key_file("/keys/web", None));
        assert_eq!(methods[1], AuthMethod::with_password("secret"));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(AuthMethod::with_password("x").name(), "password");
        assert_eq!(AuthMethod::with_key_file("/k", None).name(), "publickey");
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", AuthMethod::with_password("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}

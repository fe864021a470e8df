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

//! russh-backed implementation of the remote shell traits.

use async_trait::async_trait;
use russh::client::{Config, Handle, Handler, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex as AsyncMutex;

use super::auth::{authenticate, AuthMethod};
use super::error::ShellError;
use super::session::{
    session_signals, BoxedReader, Connection, Connector, Session, SessionSignals, SignalEmitter,
    StreamSlot,
};
use crate::host::Host;

/// In-process pipe capacity between the SSH channel and the output relays.
/// Matches the typical SSH channel packet size so one packet fits without blocking.
const SSH_PIPE_BUFFER_SIZE: usize = 32 * 1024;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// How the server's host key is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyCheck {
    /// Accept any host key.
    #[default]
    NoCheck,
    /// Require a matching entry in `~/.ssh/known_hosts`.
    KnownHosts,
}

/// Connection parameters shared by every host in a batch.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub connect_timeout: Duration,
    /// `None` disables keepalive.
    pub keepalive_interval: Option<Duration>,
    pub keepalive_max: usize,
    pub host_key_check: HostKeyCheck,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            keepalive_interval: Some(Duration::from_secs(60)),
            keepalive_max: 3,
            host_key_check: HostKeyCheck::default(),
        }
    }
}

/// Opens SSH connections with russh.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    settings: ConnectSettings,
}

impl SshConnector {
    pub fn new(settings: ConnectSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConnectSettings {
        &self.settings
    }

    fn client_config(&self) -> Config {
        Config {
            keepalive_interval: self.settings.keepalive_interval,
            keepalive_max: self.settings.keepalive_max,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, host: &Host) -> Result<Box<dyn Connection>, ShellError> {
        tracing::debug!("Connecting to {}", host);

        let config = Arc::new(self.client_config());
        let handler =
            ClientHandler::new(host.address.clone(), host.port, self.settings.host_key_check);
        let methods = AuthMethod::chain_for(&host.credentials);

        let establish = async {
            let addrs = resolve(host).await?;
            let mut handle = russh::client::connect(config, &addrs[..], handler).await?;
            authenticate(&mut handle, &host.user, &methods).await?;
            Ok::<_, ShellError>(handle)
        };

        let handle = tokio::time::timeout(self.settings.connect_timeout, establish)
            .await
            .map_err(|_| ShellError::ConnectTimeout(self.settings.connect_timeout.as_secs()))??;

        tracing::debug!("Connected and authenticated to {}", host.name);
        Ok(Box::new(SshConnection {
            handle: Arc::new(handle),
            host: host.name.clone(),
        }))
    }
}

/// Resolve the host's address. An unknown name fails before any socket is opened.
async fn resolve(host: &Host) -> Result<Vec<SocketAddr>, ShellError> {
    let invalid = |source| ShellError::AddressInvalid {
        address: host.socket_address(),
        source,
    };
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.address.as_str(), host.port))
        .await
        .map_err(invalid)?
        .collect();
    if addrs.is_empty() {
        return Err(invalid(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no addresses found",
        )));
    }
    Ok(addrs)
}

/// An authenticated russh connection.
pub struct SshConnection {
    handle: Arc<Handle<ClientHandler>>,
    host: String,
}

#[async_trait]
impl Connection for SshConnection {
    async fn new_session(&self) -> Result<Box<dyn Session>, ShellError> {
        let channel = self.handle.channel_open_session().await?;
        Ok(Box::new(SshSession::new(channel, self.host.clone())))
    }

    async fn close(&self) {
        if self.handle.is_closed() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            tracing::debug!("Disconnect from {} failed: {}", self.host, e);
        }
    }
}

/// One exec channel with its output pipes and signals.
pub struct SshSession {
    host: String,
    channel: AsyncMutex<Option<Channel<Msg>>>,
    writers: Mutex<Option<(DuplexStream, DuplexStream)>>,
    stdout: StreamSlot,
    stderr: StreamSlot,
    emitter: SignalEmitter,
    signals: SessionSignals,
}

impl SshSession {
    fn new(channel: Channel<Msg>, host: String) -> Self {
        let (stdout_writer, stdout_reader) = tokio::io::duplex(SSH_PIPE_BUFFER_SIZE);
        let (stderr_writer, stderr_reader) = tokio::io::duplex(SSH_PIPE_BUFFER_SIZE);
        let (emitter, signals) = session_signals();

        Self {
            host,
            channel: AsyncMutex::new(Some(channel)),
            writers: Mutex::new(Some((stdout_writer, stderr_writer))),
            stdout: StreamSlot::new(Box::new(stdout_reader)),
            stderr: StreamSlot::new(Box::new(stderr_reader)),
            emitter,
            signals,
        }
    }

    fn take_writers(&self) -> Result<(DuplexStream, DuplexStream), ShellError> {
        self.writers
            .lock()
            .map_err(|_| ShellError::other("session writer lock poisoned"))?
            .take()
            .ok_or(ShellError::SessionConsumed)
    }
}

/// Forward one chunk into a pipe. A vanished reader only stops that pipe.
async fn forward(pipe: &mut Option<DuplexStream>, data: &[u8], host: &str) {
    if let Some(writer) = pipe {
        if let Err(e) = writer.write_all(data).await {
            tracing::debug!("Discarding further output from {}: {}", host, e);
            *pipe = None;
        }
    }
}

#[async_trait]
impl Session for SshSession {
    async fn pipe_exec(&self, command: &str) -> Result<(), ShellError> {
        let mut channel = self
            .channel
            .lock()
            .await
            .take()
            .ok_or(ShellError::SessionConsumed)?;
        let (stdout, stderr) = self.take_writers()?;
        let (mut stdout, mut stderr) = (Some(stdout), Some(stderr));

        channel.exec(true, command).await?;
        self.emitter.ready();

        let mut exit_status = None;
        let mut exit_signal = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => forward(&mut stdout, data, &self.host).await,
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                    forward(&mut stderr, data, &self.host).await
                }
                // The exit status may arrive before the last data packet,
                // so keep reading until the channel closes.
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    exit_signal = Some(format!("{signal_name:?}"))
                }
                _ => {}
            }
        }

        // Closing the writers lets the relays reach end-of-stream.
        drop(stdout);
        drop(stderr);

        match (exit_status, exit_signal) {
            (Some(0), _) => {}
            (Some(code), _) => {
                self.emitter.error(ShellError::ExitStatus(code));
            }
            (None, Some(signal)) => {
                self.emitter.error(ShellError::ExitSignal(signal));
            }
            (None, None) => {
                self.emitter.error(ShellError::MissingExitStatus);
            }
        }
        tracing::debug!("Command on {} finished with status {:?}", self.host, exit_status);
        self.emitter.done();
        Ok(())
    }

    fn take_stdout(&self) -> Option<BoxedReader> {
        self.stdout.take()
    }

    fn take_stderr(&self) -> Option<BoxedReader> {
        self.stderr.take()
    }

    fn signals(&self) -> &SessionSignals {
        &self.signals
    }

    async fn close(&self) {
        // Only reachable before `pipe_exec` took the channel; afterwards the
        // channel dies with the connection.
        if let Some(channel) = self.channel.lock().await.take() {
            if let Err(e) = channel.close().await {
                tracing::debug!("Closing channel on {} failed: {}", self.host, e);
            }
        }
    }
}

/// Host key verification for russh.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    hostname: String,
    port: u16,
    check: HostKeyCheck,
}

impl ClientHandler {
    pub fn new(hostname: String, port: u16, check: HostKeyCheck) -> Self {
        Self {
            hostname,
            port,
            check,
        }
    }
}

impl Handler for ClientHandler {
    type Error = ShellError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.check {
            HostKeyCheck::NoCheck => Ok(true),
            HostKeyCheck::KnownHosts => {
                russh::keys::check_known_hosts(&self.hostname, self.port, server_public_key)
                    .map_err(|_| ShellError::ServerCheckFailed)
            }
        }
    }
}

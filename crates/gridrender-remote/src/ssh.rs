//! SSH implementation of [`RemoteCommandChannel`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tracing::{debug, info};

use crate::channel::{CommandOutput, RemoteCommandChannel};
use crate::error::RemoteError;

/// SSH extended-data stream carrying stderr.
const STDERR_STREAM: u32 = 1;

/// Idle time before the client probes the server.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered probes before the session is declared dead.
const KEEPALIVE_MAX: usize = 3;

/// Idle sessions are probed, never dropped for inactivity.
fn session_config() -> client::Config {
    client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        ..Default::default()
    }
}

/// Where and as whom to log in.
#[derive(Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl SshTarget {
    /// Create a password-authenticated target.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

impl fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Accepts any host key, logging its fingerprint.
struct TrustOnConnect {
    host: String,
}

#[async_trait]
impl client::Handler for TrustOnConnect {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "Accepting server host key"
        );
        Ok(true)
    }
}

/// An authenticated SSH session. Each command runs on its own channel.
pub struct SshChannel {
    handle: Handle<TrustOnConnect>,
    target: String,
}

impl SshChannel {
    /// Connect and log in with a password.
    pub async fn connect(target: &SshTarget) -> Result<Self, RemoteError> {
        info!(target = %target, "Connecting to remote host");

        let config = Arc::new(session_config());
        let handler = TrustOnConnect {
            host: target.host.clone(),
        };

        let mut handle = client::connect(config, (target.host.as_str(), target.port), handler)
            .await
            .map_err(|e| RemoteError::Connection {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        let authenticated = handle
            .authenticate_password(target.username.as_str(), target.password.as_str())
            .await?;
        if !authenticated {
            return Err(RemoteError::AuthenticationFailed {
                user: target.username.clone(),
            });
        }

        info!(target = %target, "Authenticated");
        Ok(Self {
            handle,
            target: target.to_string(),
        })
    }

    /// Close the session.
    pub async fn close(self) -> Result<(), RemoteError> {
        debug!(target = %self.target, "Disconnecting");
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteCommandChannel for SshChannel {
    async fn execute(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        debug!(target = %self.target, command = %command, "Executing remote command");

        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus {
                    exit_status: status,
                } => exit_status = Some(status),
                _ => {}
            }
        }

        let output = CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };
        debug!(
            command = %command,
            exit_status = ?output.exit_status,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "Remote command completed"
        );
        Ok(output)
    }
}

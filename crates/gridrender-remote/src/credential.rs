//! Grid proxy credential acquisition.
//!
//! The provider asks the remote session for its current proxy and re-issues
//! one when the reported proxy is expired. The certificate itself is read
//! back over the same channel and base64-encoded for the `PROXY` header.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use gridrender_core::{Credential, EncodedProxy, ProxyInfo};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::channel::{shell_quote, RemoteCommandChannel};
use crate::error::RemoteError;

/// Reports the current proxy.
pub const PROXY_INFO_COMMAND: &str = "grid-proxy-info";

/// Issues a fresh proxy and reports it in the same invocation.
pub const PROXY_INIT_COMMAND: &str = "grid-proxy-init -q && grid-proxy-info";

/// Default remaining lifetime below which a cached proxy is re-issued.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(600);

/// Supplies the encoded proxy attached to every job and storage request.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// A proxy that is valid now.
    async fn proxy(&self) -> Result<EncodedProxy, RemoteError>;
}

struct CachedProxy {
    credential: Credential,
    proxy: EncodedProxy,
}

/// Acquires, encodes and caches the grid proxy of a remote session.
pub struct CredentialProvider<C> {
    channel: C,
    refresh_margin: Duration,
    cached: Mutex<Option<CachedProxy>>,
}

impl<C: RemoteCommandChannel> CredentialProvider<C> {
    /// Create a provider over `channel`.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            cached: Mutex::new(None),
        }
    }

    /// Set the refresh margin.
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Consume the provider, returning the channel.
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Return the current proxy if it is valid, otherwise issue a new one.
    ///
    /// Runs at most two remote commands.
    pub async fn acquire(&self) -> Result<Credential, RemoteError> {
        let output = self.channel.execute(PROXY_INFO_COMMAND).await?;

        if output.is_success() {
            let info = ProxyInfo::parse(output.stdout_lines());
            if let Some(credential) = info.into_credential(Instant::now()) {
                info!(
                    path = %credential.path,
                    timeleft = %credential.timeleft,
                    "Using existing grid proxy"
                );
                return Ok(credential);
            }
            info!("Grid proxy expired or incomplete, issuing a new one");
        } else {
            warn!(
                exit_status = ?output.exit_status,
                stderr = %output.stderr.trim_end(),
                "Grid proxy query failed, issuing a new one"
            );
        }

        self.reissue().await
    }

    /// Issue a new proxy unconditionally.
    pub async fn reissue(&self) -> Result<Credential, RemoteError> {
        let output = self.channel.execute_checked(PROXY_INIT_COMMAND).await?;
        let credential = ProxyInfo::parse(output.stdout_lines())
            .into_credential(Instant::now())
            .ok_or_else(|| {
                RemoteError::CredentialUnavailable(
                    "re-issued proxy is expired or has no path".to_string(),
                )
            })?;

        info!(
            path = %credential.path,
            timeleft = %credential.timeleft,
            "Issued new grid proxy"
        );
        Ok(credential)
    }

    /// Read the certificate at the credential's path and encode it.
    pub async fn encode(&self, credential: &Credential) -> Result<EncodedProxy, RemoteError> {
        let command = format!("cat {}", shell_quote(&credential.path));
        let output = self.channel.execute_checked(&command).await?;
        if output.stdout.trim().is_empty() {
            return Err(RemoteError::CredentialUnavailable(format!(
                "certificate at {} is empty",
                credential.path
            )));
        }
        Ok(EncodedProxy::encode(output.stdout.as_bytes()))
    }
}

#[async_trait]
impl<C: RemoteCommandChannel> ProxySource for CredentialProvider<C> {
    async fn proxy(&self) -> Result<EncodedProxy, RemoteError> {
        let mut cached = self.cached.lock().await;

        let credential = match cached.as_ref() {
            Some(entry)
                if !entry
                    .credential
                    .needs_refresh_at(Instant::now(), self.refresh_margin) =>
            {
                return Ok(entry.proxy.clone());
            }
            Some(entry) => {
                info!(
                    path = %entry.credential.path,
                    margin_secs = self.refresh_margin.as_secs(),
                    "Grid proxy close to expiry, re-issuing"
                );
                self.reissue().await?
            }
            None => self.acquire().await?,
        };

        let proxy = self.encode(&credential).await?;
        *cached = Some(CachedProxy {
            credential,
            proxy: proxy.clone(),
        });
        Ok(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::CommandOutput;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    /// Replays canned outputs and records every command.
    #[derive(Default)]
    struct ScriptedChannel {
        replies: StdMutex<VecDeque<CommandOutput>>,
        commands: StdMutex<Vec<String>>,
    }

    impl ScriptedChannel {
        fn new(replies: Vec<CommandOutput>) -> Self {
            Self {
                replies: StdMutex::new(replies.into()),
                commands: StdMutex::new(Vec::new()),
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteCommandChannel for ScriptedChannel {
        async fn execute(&self, command: &str) -> Result<CommandOutput, RemoteError> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected remote command"))
        }
    }

    fn info(path: &str, timeleft: &str) -> CommandOutput {
        CommandOutput::success(format!(
            "subject  : /C=PL/O=GRID/CN=plgjdoe\npath     : {}\ntimeleft : {}\n",
            path, timeleft
        ))
    }

    #[tokio::test]
    async fn test_valid_proxy_used_without_reissue() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![info(
            "/tmp/x509up_u1",
            "11:00:00",
        )]));

        let credential = provider.acquire().await.unwrap();
        assert_eq!(credential.path, "/tmp/x509up_u1");
        assert_eq!(provider.channel().commands(), vec![PROXY_INFO_COMMAND]);
    }

    #[tokio::test]
    async fn test_expired_proxy_reissued_once() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![
            info("/tmp/old", "00:00:00"),
            info("/tmp/new", "01:00:00"),
        ]));

        let credential = provider.acquire().await.unwrap();
        assert_eq!(credential.path, "/tmp/new");
        assert_eq!(credential.remaining_lifetime, Some(Duration::from_secs(3600)));
        assert_eq!(
            provider.channel().commands(),
            vec![PROXY_INFO_COMMAND, PROXY_INIT_COMMAND]
        );
    }

    #[tokio::test]
    async fn test_reissued_proxy_also_expired() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![
            info("/tmp/old", "00:00:00"),
            info("/tmp/new", "00:00:00"),
        ]));

        let err = provider.acquire().await.unwrap_err();
        assert!(matches!(err, RemoteError::CredentialUnavailable(_)));
        assert_eq!(provider.channel().commands().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_query_triggers_reissue() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![
            CommandOutput::failure(1, "ERROR: Couldn't find a valid proxy.\n"),
            info("/tmp/new", "12:00:00"),
        ]));

        let credential = provider.acquire().await.unwrap();
        assert_eq!(credential.path, "/tmp/new");
    }

    #[tokio::test]
    async fn test_failed_reissue_is_command_failure() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![
            info("/tmp/old", "00:00:00"),
            CommandOutput::failure(1, "grid-proxy-init: no user key found\n"),
        ]));

        let err = provider.acquire().await.unwrap_err();
        assert!(matches!(err, RemoteError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_proxy_encodes_and_caches() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![
            info("/tmp/x509up_u1", "11:00:00"),
            CommandOutput::success(CERT),
        ]));

        let first = provider.proxy().await.unwrap();
        let second = provider.proxy().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, EncodedProxy::encode(CERT.as_bytes()));
        assert_eq!(
            provider.channel().commands(),
            vec![PROXY_INFO_COMMAND, "cat '/tmp/x509up_u1'"]
        );
    }

    #[tokio::test]
    async fn test_proxy_near_expiry_is_reissued() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![
            info("/tmp/short", "00:05:00"),
            CommandOutput::success(CERT),
            info("/tmp/fresh", "12:00:00"),
            CommandOutput::success(CERT),
        ]))
        .with_refresh_margin(Duration::from_secs(600));

        provider.proxy().await.unwrap();
        provider.proxy().await.unwrap();

        assert_eq!(
            provider.channel().commands(),
            vec![
                PROXY_INFO_COMMAND,
                "cat '/tmp/short'",
                PROXY_INIT_COMMAND,
                "cat '/tmp/fresh'",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_certificate_rejected() {
        let provider = CredentialProvider::new(ScriptedChannel::new(vec![
            info("/tmp/x509up_u1", "11:00:00"),
            CommandOutput::success(""),
        ]));

        let err = provider.proxy().await.unwrap_err();
        assert!(matches!(err, RemoteError::CredentialUnavailable(_)));
    }
}

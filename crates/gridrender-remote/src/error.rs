//! Error types for remote operations.

use thiserror::Error;

/// Errors that can occur while talking to the remote host.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Failed to establish the SSH connection.
    #[error("connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// The server rejected the credentials.
    #[error("authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH protocol error.
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// A remote command reported failure.
    #[error("remote command '{command}' failed (exit status {exit_status:?}): {stderr}")]
    CommandFailed {
        command: String,
        exit_status: Option<u32>,
        stderr: String,
    },

    /// Neither the existing nor a re-issued proxy is usable.
    #[error("no usable grid credential: {0}")]
    CredentialUnavailable(String),
}

//! Command channel abstraction.

use async_trait::async_trait;

use crate::error::RemoteError;

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status, if the server reported one.
    pub exit_status: Option<u32>,
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with status 0.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a command that exited with `status`.
    pub fn failure(status: u32, stderr: impl Into<String>) -> Self {
        Self {
            exit_status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// A non-zero exit status fails the command. Without an exit status,
    /// any stderr output does.
    pub fn is_success(&self) -> bool {
        match self.exit_status {
            Some(status) => status == 0,
            None => self.stderr.trim().is_empty(),
        }
    }

    /// Stdout split into lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    /// Convert a failed command into [`RemoteError::CommandFailed`].
    pub fn into_checked(self, command: &str) -> Result<Self, RemoteError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RemoteError::CommandFailed {
                command: command.to_string(),
                exit_status: self.exit_status,
                stderr: self.stderr.trim_end().to_string(),
            })
        }
    }
}

/// Executes shell commands on an authenticated remote session.
#[async_trait]
pub trait RemoteCommandChannel: Send + Sync {
    /// Run `command` and capture its output, whatever its exit status.
    async fn execute(&self, command: &str) -> Result<CommandOutput, RemoteError>;

    /// Run `command` and fail unless it succeeded.
    async fn execute_checked(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        self.execute(command).await?.into_checked(command)
    }
}

/// Quote a value for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

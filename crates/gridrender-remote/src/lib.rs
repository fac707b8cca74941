//! Remote session access for gridrender.
//!
//! Provides the command channel abstraction, its SSH implementation and the
//! grid proxy credential provider built on top of it.

pub mod channel;
pub mod credential;
pub mod error;
pub mod ssh;

pub use channel::{CommandOutput, RemoteCommandChannel};
pub use credential::{CredentialProvider, ProxySource, PROXY_INFO_COMMAND, PROXY_INIT_COMMAND};
pub use error::RemoteError;
pub use ssh::{SshChannel, SshTarget};

//! Runtime configuration.
//!
//! Connection settings come from the environment (optionally a `.env` file)
//! and are read once at startup. Run parameters come from the command line.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use gridrender_client::JobRequest;
use gridrender_core::{ArtifactNaming, PollPolicy, ScriptTemplate};
use gridrender_remote::SshTarget;
use thiserror::Error;

/// Errors raised while building the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Connection settings for the grid site.
#[derive(Clone)]
pub struct Config {
    /// Grid account name.
    pub username: String,
    /// Grid account password.
    pub password: String,
    /// Cluster login host; also the host jobs run on.
    pub host: String,
    /// SSH port of the login host.
    pub ssh_port: u16,
    /// Job collection endpoint.
    pub jobs_url: String,
    /// Storage service base URL.
    pub data_url: String,
    /// Storage site prefix in download paths.
    pub storage_site: String,
    /// Parent of user home directories.
    pub home_root: String,
}

impl Config {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let ssh_port: u16 = match lookup("GRID_SSH_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "GRID_SSH_PORT",
                value,
            })?,
            None => 22,
        };

        Ok(Self {
            username: required("GRID_USERNAME")?,
            password: required("GRID_PASSWORD")?,
            host: optional("GRID_HOST", "ares.cyfronet.pl"),
            ssh_port,
            jobs_url: optional("GRID_JOBS_URL", "https://submit.plgrid.pl/api/jobs"),
            data_url: optional("GRID_DATA_URL", "https://data.plgrid.pl"),
            storage_site: optional("GRID_STORAGE_SITE", "ares"),
            home_root: optional("GRID_HOME_ROOT", "/net/people/plgrid"),
        })
    }

    /// The user's home directory on the cluster.
    pub fn home_dir(&self) -> String {
        format!("{}/{}", self.home_root.trim_end_matches('/'), self.username)
    }

    /// The home directory as addressed by the storage service.
    pub fn storage_dir(&self) -> String {
        format!("{}{}", self.storage_site, self.home_dir())
    }

    /// SSH login target.
    pub fn ssh_target(&self) -> SshTarget {
        SshTarget::new(&self.host, self.ssh_port, &self.username, &self.password)
    }

    /// Job request shared by every unit; only the script changes.
    pub fn job_request(&self) -> JobRequest {
        JobRequest::new(&self.host, self.home_dir())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("ssh_port", &self.ssh_port)
            .field("jobs_url", &self.jobs_url)
            .field("data_url", &self.data_url)
            .field("storage_site", &self.storage_site)
            .field("home_root", &self.home_root)
            .finish()
    }
}

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Number of render units to submit.
    pub units: u32,
    /// Status polling policy.
    pub poll: PollPolicy,
    /// Pause between artifact downloads.
    pub download_interval: Duration,
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    /// Re-issue the proxy when less than this lifetime is left.
    pub refresh_margin: Duration,
    /// Batch script template.
    pub template: ScriptTemplate,
    /// Artifact naming scheme.
    pub naming: ArtifactNaming,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            units: 10,
            poll: PollPolicy::default(),
            download_interval: Duration::from_secs(5),
            output_dir: PathBuf::from("."),
            refresh_margin: Duration::from_secs(600),
            template: ScriptTemplate::default(),
            naming: ArtifactNaming::default(),
        }
    }
}

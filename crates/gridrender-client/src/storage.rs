//! Storage download client.

use std::path::Path;

use async_trait::async_trait;
use gridrender_core::EncodedProxy;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::PROXY_HEADER;

/// Fetches finished artifacts to local files.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download `name` into `dest`, returning the bytes written.
    ///
    /// Anything but HTTP 200 is [`ClientError::DownloadFailed`] and leaves
    /// no file behind.
    async fn download(
        &self,
        name: &str,
        dest: &Path,
        proxy: &EncodedProxy,
    ) -> Result<u64, ClientError>;
}

/// HTTP client for `GET {base}/download/{remote_dir}/{name}`.
pub struct StorageClient {
    inner: reqwest::Client,
    base_url: String,
    remote_dir: String,
}

impl StorageClient {
    /// Create a client. `remote_dir` is the site-qualified home directory,
    /// e.g. `ares/net/people/plgrid/plgjdoe`.
    pub fn new(base_url: &str, remote_dir: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, remote_dir)
    }

    /// Create a client reusing an existing connection pool.
    pub fn with_client(inner: reqwest::Client, base_url: &str, remote_dir: &str) -> Self {
        Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
            remote_dir: remote_dir.trim_matches('/').to_string(),
        }
    }

    /// Download URL for `name`.
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/download/{}/{}", self.base_url, self.remote_dir, name)
    }
}

#[async_trait]
impl ArtifactStore for StorageClient {
    async fn download(
        &self,
        name: &str,
        dest: &Path,
        proxy: &EncodedProxy,
    ) -> Result<u64, ClientError> {
        let url = self.url_for(name);
        debug!(url = %url, dest = %dest.display(), "GET artifact");

        let mut response = self
            .inner
            .get(&url)
            .header(PROXY_HEADER, proxy.as_str())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ClientError::DownloadFailed {
                name: name.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = File::create(dest).await?;
        let mut written = 0u64;
        let result: Result<(), ClientError> = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                warn!(dest = %dest.display(), error = %remove_err, "Failed to remove partial download");
            }
            return Err(e);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let client = StorageClient::new("https://data.plgrid.pl/", "/ares/net/people/plgrid/plgjdoe/");
        assert_eq!(
            client.url_for("planet_00ani001.png"),
            "https://data.plgrid.pl/download/ares/net/people/plgrid/plgjdoe/planet_00ani001.png"
        );
    }
}

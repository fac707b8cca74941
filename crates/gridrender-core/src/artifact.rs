//! Output artifact naming.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::RenderUnit;

/// Maps frame indices to the file names the renderer writes.
///
/// Names are `{stem}{frame:03}.{extension}`; zero padding only widens short
/// numbers, so distinct frames always yield distinct names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    stem: String,
    extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self::new("planet_00ani", "png")
    }
}

impl ArtifactNaming {
    /// Create a naming scheme from a stem and a file extension.
    pub fn new(stem: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            extension: extension.into(),
        }
    }

    /// File name for a single frame.
    pub fn name_for(&self, frame: u32) -> String {
        format!("{}{:03}.{}", self.stem, frame, self.extension)
    }

    /// Artifacts for every frame of a unit, in increasing frame order.
    pub fn artifacts_for(&self, unit: &RenderUnit) -> Vec<Artifact> {
        unit.frames()
            .map(|frame| Artifact::new(frame, self.name_for(frame)))
            .collect()
    }
}

/// One output file of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Frame this file was rendered from.
    pub frame: u32,
    /// Remote file name.
    pub name: String,
    /// Where the file was written, once fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Bytes written, once fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl Artifact {
    /// Create a not-yet-fetched artifact.
    pub fn new(frame: u32, name: impl Into<String>) -> Self {
        Self {
            frame,
            name: name.into(),
            local_path: None,
            size_bytes: None,
        }
    }

    /// Mark the artifact as fetched.
    pub fn fetched(mut self, local_path: PathBuf, size_bytes: u64) -> Self {
        self.local_path = Some(local_path);
        self.size_bytes = Some(size_bytes);
        self
    }

    /// Whether the artifact has been written locally.
    pub fn is_fetched(&self) -> bool {
        self.local_path.is_some()
    }
}

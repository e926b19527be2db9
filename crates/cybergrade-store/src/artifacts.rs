//! Filesystem artifact lookup for `file_exists` flags.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use cybergrade_core::traits::ArtifactLookup;

/// Looks for `<root>/<lab_id>/<artifact_name>`.
#[derive(Debug, Clone)]
pub struct LocalArtifacts {
    root: PathBuf,
}

impl LocalArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an artifact, or `None` if either part would leave the lab's
    /// directory.
    pub fn resolve(&self, lab_id: &str, artifact_name: &str) -> Option<PathBuf> {
        let lab = single_level(lab_id)?;
        let name = relative_inside(artifact_name)?;
        Some(self.root.join(lab).join(name))
    }
}

/// A plain relative path made only of normal components.
fn relative_inside(raw: &str) -> Option<&Path> {
    let path = Path::new(raw);
    let mut components = path.components().peekable();
    components.peek()?;
    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(path)
}

fn single_level(raw: &str) -> Option<&Path> {
    relative_inside(raw).filter(|p| p.components().count() == 1)
}

#[async_trait]
impl ArtifactLookup for LocalArtifacts {
    async fn exists(&self, lab_id: &str, artifact_name: &str) -> Result<bool> {
        let Some(path) = self.resolve(lab_id, artifact_name) else {
            tracing::warn!(lab = lab_id, artifact = artifact_name, "rejected artifact path");
            return Ok(false);
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to stat artifact: {}", path.display())),
        }
    }
}

//! Engine wiring shared by the commands that grade or report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use cybergrade_content::{load_config_from, load_roster, CybergradeConfig, DirectoryContentSource};
use cybergrade_core::report::UserIdentity;
use cybergrade_core::{ContentCatalog, GradingEngine};
use cybergrade_store::{JournalStore, LocalArtifacts};

/// A loaded config plus an engine over its content, journal and artifacts.
pub struct Workspace {
    pub config: CybergradeConfig,
    pub engine: GradingEngine,
}

impl Workspace {
    pub async fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_from(config_path)?;

        let store = JournalStore::open(&config.journal_path).await?;
        let artifacts = LocalArtifacts::new(&config.artifact_root);
        let engine = GradingEngine::new(
            Arc::new(ContentCatalog::empty()),
            Arc::new(store),
            Arc::new(artifacts),
        );

        let source = DirectoryContentSource::new(&config.content_root, config.load_options());
        engine.sync(&source).await.with_context(|| {
            format!("failed to load content from {}", config.content_root.display())
        })?;

        tracing::debug!(
            content = %config.content_root.display(),
            journal = %config.journal_path.display(),
            "workspace ready"
        );
        Ok(Self { config, engine })
    }

    /// The configured roster, or nobody if none is configured.
    pub fn roster(&self) -> Result<Vec<UserIdentity>> {
        match &self.config.roster {
            Some(path) => load_roster(path),
            None => Ok(Vec::new()),
        }
    }
}

pub async fn open(config_path: Option<PathBuf>) -> Result<Workspace> {
    Workspace::open(config_path.as_deref()).await
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

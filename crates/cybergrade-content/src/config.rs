//! cybergrade configuration and roster loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cybergrade_core::report::UserIdentity;

use crate::loader::LoadOptions;

/// Top-level cybergrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CybergradeConfig {
    /// Directory holding `labs/`, `quizzes/` and `exams/`.
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,
    /// JSON-lines submission journal.
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
    /// Root under which `file_exists` flags look for `<lab_id>/<name>`.
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,
    /// Optional roster of users to include in exports.
    #[serde(default)]
    pub roster: Option<PathBuf>,
    /// Label for loaded content versions. Defaults to the load date.
    #[serde(default)]
    pub version_label: Option<String>,
    /// Make `exact` flags case-insensitive unless a flag says otherwise.
    #[serde(default)]
    pub case_insensitive_flags: bool,
}

fn default_content_root() -> PathBuf {
    PathBuf::from("./content")
}
fn default_journal_path() -> PathBuf {
    PathBuf::from("./cybergrade-data/journal.jsonl")
}
fn default_artifact_root() -> PathBuf {
    PathBuf::from("./cybergrade-data/artifacts")
}

impl Default for CybergradeConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            journal_path: default_journal_path(),
            artifact_root: default_artifact_root(),
            roster: None,
            version_label: None,
            case_insensitive_flags: false,
        }
    }
}

impl CybergradeConfig {
    /// Options for [`crate::load_content_dir`].
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            version_label: self.version_label.clone(),
            case_insensitive_flags: self.case_insensitive_flags,
        }
    }

    fn resolve(mut self) -> Self {
        let resolve_path = |p: &Path| PathBuf::from(resolve_env_vars(&p.to_string_lossy()));
        self.content_root = resolve_path(&self.content_root);
        self.journal_path = resolve_path(&self.journal_path);
        self.artifact_root = resolve_path(&self.artifact_root);
        self.roster = self.roster.as_deref().map(resolve_path);
        self.version_label = self.version_label.as_deref().map(resolve_env_vars);
        self
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not expanded again.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `cybergrade.toml` in the current directory
/// 2. `~/.config/cybergrade/config.toml`
///
/// Environment variable overrides: `CYBERGRADE_CONTENT_ROOT`, `CYBERGRADE_JOURNAL`.
pub fn load_config() -> Result<CybergradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CybergradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("cybergrade.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<CybergradeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => CybergradeConfig::default(),
    };

    if let Ok(root) = std::env::var("CYBERGRADE_CONTENT_ROOT") {
        config.content_root = PathBuf::from(root);
    }
    if let Ok(journal) = std::env::var("CYBERGRADE_JOURNAL") {
        config.journal_path = PathBuf::from(journal);
    }

    Ok(config.resolve())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("cybergrade"))
}

#[derive(Debug, Deserialize)]
struct TomlRoster {
    #[serde(default)]
    users: Vec<UserIdentity>,
}

/// Load a roster file:
///
/// ```toml
/// [[users]]
/// user_id = "alice"
/// email = "alice@example.edu"
/// student_id = "S-1001"
/// ```
pub fn load_roster(path: &Path) -> Result<Vec<UserIdentity>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster: {}", path.display()))?;
    let roster: TomlRoster = toml::from_str(&content)
        .with_context(|| format!("failed to parse roster: {}", path.display()))?;
    if let Some(blank) = roster.users.iter().position(|u| u.user_id.trim().is_empty()) {
        anyhow::bail!("roster entry {} has an empty user_id", blank + 1);
    }
    Ok(roster.users)
}

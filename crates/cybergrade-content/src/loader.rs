//! TOML content loader.
//!
//! A content directory holds `labs/*.toml`, `quizzes/*.toml` and
//! `exams/*.toml`, one item per file. Files are read in name order. A file
//! that fails to parse fails the whole load.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use cybergrade_core::error::GradeError;
use cybergrade_core::flag::check_from_parts;
use cybergrade_core::model::{
    Choice, ContentVersion, ExamDefinition, FlagRule, LabDefinition, Question, QuestionKind,
    QuizDefinition, Stage, StageGrading,
};
use cybergrade_core::traits::ContentSource;

/// Knobs that apply to a whole load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Label for the resulting version. Defaults to the load date.
    pub version_label: Option<String>,
    /// Default for `case_sensitive` on `exact` flags that do not set it.
    pub case_insensitive_flags: bool,
}

// ---------------------------------------------------------------------------
// File shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TomlLab {
    id: String,
    title: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    instructions: String,
    #[serde(default)]
    flags: Vec<TomlFlag>,
}

#[derive(Debug, Deserialize)]
struct TomlFlag {
    name: String,
    #[serde(default)]
    prompt: String,
    validator: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    case_sensitive: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TomlQuiz {
    id: String,
    title: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    #[serde(default)]
    prompt: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    choices: Vec<TomlChoice>,
    #[serde(default)]
    answer: String,
    #[serde(default = "default_points")]
    points: u32,
}

#[derive(Debug, Deserialize)]
struct TomlChoice {
    key: String,
    #[serde(default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct TomlExam {
    id: String,
    title: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    stages: Vec<TomlStage>,
}

#[derive(Debug, Deserialize)]
struct TomlStage {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_max_score")]
    max_score: u32,
    #[serde(default)]
    grading: Option<String>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

fn default_points() -> u32 {
    1
}

fn default_max_score() -> u32 {
    10
}

/// Version used for items and snapshots that do not name one.
pub fn default_version() -> String {
    chrono::Utc::now().format("%Y.%m.%d").to_string()
}

fn configuration(path: &Path, err: impl std::fmt::Display) -> anyhow::Error {
    anyhow::Error::new(GradeError::Configuration(format!("{}: {err}", path.display())))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one lab definition.
pub fn parse_lab_str(content: &str, source_path: &Path, options: &LoadOptions) -> Result<LabDefinition> {
    let raw: TomlLab = toml::from_str(content).map_err(|e| configuration(source_path, e))?;

    let flags = raw
        .flags
        .into_iter()
        .map(|f| {
            let case_sensitive = f.case_sensitive.unwrap_or(!options.case_insensitive_flags);
            let check = check_from_parts(&f.validator, f.pattern, f.value, case_sensitive)
                .map_err(|e| configuration(source_path, format!("flag '{}': {e}", f.name)))?;
            Ok(FlagRule {
                name: f.name,
                prompt: f.prompt,
                check,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LabDefinition {
        id: raw.id,
        title: raw.title,
        version: raw.version.unwrap_or_else(default_version),
        instructions: raw.instructions,
        flags,
    })
}

fn convert_questions(raw: Vec<TomlQuestion>, source_path: &Path) -> Result<Vec<Question>> {
    raw.into_iter()
        .map(|q| {
            let kind: QuestionKind = q
                .kind
                .parse()
                .map_err(|e| configuration(source_path, format!("question '{}': {e}", q.id)))?;
            Ok(Question {
                id: q.id,
                prompt: q.prompt,
                kind,
                choices: q
                    .choices
                    .into_iter()
                    .map(|c| Choice {
                        key: c.key,
                        label: c.label,
                    })
                    .collect(),
                answer: q.answer,
                points: q.points,
            })
        })
        .collect()
}

/// Parse one quiz definition.
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<QuizDefinition> {
    let raw: TomlQuiz = toml::from_str(content).map_err(|e| configuration(source_path, e))?;
    Ok(QuizDefinition {
        id: raw.id,
        title: raw.title,
        version: raw.version.unwrap_or_else(default_version),
        questions: convert_questions(raw.questions, source_path)?,
    })
}

/// Parse one exam definition.
pub fn parse_exam_str(content: &str, source_path: &Path) -> Result<ExamDefinition> {
    let raw: TomlExam = toml::from_str(content).map_err(|e| configuration(source_path, e))?;

    let stages = raw
        .stages
        .into_iter()
        .map(|s| {
            let grading = match s.grading.as_deref() {
                Some(g) => g
                    .parse::<StageGrading>()
                    .map_err(|e| configuration(source_path, format!("stage '{}': {e}", s.id)))?,
                None => StageGrading::default(),
            };
            Ok(Stage {
                id: s.id,
                title: s.title,
                description: s.description,
                max_score: s.max_score,
                grading,
                questions: convert_questions(s.questions, source_path)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ExamDefinition {
        id: raw.id,
        title: raw.title,
        version: raw.version.unwrap_or_else(default_version),
        stages,
    })
}

// ---------------------------------------------------------------------------
// Directory loading
// ---------------------------------------------------------------------------

/// `.toml` files directly inside `dir`, sorted by name. A missing directory
/// yields nothing.
fn toml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::debug!("no content directory at {}", dir.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_each<T>(dir: &Path, parse: impl Fn(&str, &Path) -> Result<T>) -> Result<Vec<T>> {
    toml_files(dir)?
        .into_iter()
        .map(|path| {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read content file: {}", path.display()))?;
            parse(&content, &path)
        })
        .collect()
}

/// Load and validate every definition under `root`.
pub fn load_content_dir(root: &Path, options: &LoadOptions) -> Result<ContentVersion> {
    if !root.is_dir() {
        anyhow::bail!("content root is not a directory: {}", root.display());
    }

    let labs = load_each(&root.join("labs"), |c, p| parse_lab_str(c, p, options))?;
    let quizzes = load_each(&root.join("quizzes"), parse_quiz_str)?;
    let exams = load_each(&root.join("exams"), parse_exam_str)?;

    let label = options.version_label.clone().unwrap_or_else(default_version);
    let content = ContentVersion::new(label, labs, quizzes, exams)
        .with_context(|| format!("invalid content in {}", root.display()))?;
    content
        .validate()
        .with_context(|| format!("invalid content in {}", root.display()))?;

    tracing::debug!(
        root = %root.display(),
        labs = content.labs.len(),
        quizzes = content.quizzes.len(),
        exams = content.exams.len(),
        "content loaded"
    );
    Ok(content)
}

/// [`ContentSource`] over a content directory.
#[derive(Debug, Clone)]
pub struct DirectoryContentSource {
    root: PathBuf,
    options: LoadOptions,
}

impl DirectoryContentSource {
    pub fn new(root: impl Into<PathBuf>, options: LoadOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentSource for DirectoryContentSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    async fn load_content(&self) -> Result<ContentVersion> {
        load_content_dir(&self.root, &self.options)
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// A non-fatal problem found in loaded content.
#[derive(Debug, Clone)]
pub struct ContentWarning {
    pub item_id: String,
    pub message: String,
}

/// Check loaded content for things that are legal but probably mistakes.
pub fn content_warnings(content: &ContentVersion) -> Vec<ContentWarning> {
    let mut warnings = Vec::new();
    let mut warn = |item_id: &str, message: String| {
        warnings.push(ContentWarning {
            item_id: item_id.to_string(),
            message,
        })
    };

    for lab in content.labs.values() {
        if lab.flags.is_empty() {
            warn(&lab.id, "lab has no flags".into());
        }
        if lab.instructions.trim().is_empty() {
            warn(&lab.id, "lab has no instructions reference".into());
        }
        for flag in lab.flags.iter().filter(|f| f.prompt.trim().is_empty()) {
            warn(&lab.id, format!("flag '{}' has an empty prompt", flag.name));
        }
    }

    for quiz in content.quizzes.values() {
        if quiz.questions.is_empty() {
            warn(&quiz.id, "quiz has no questions".into());
        }
        for q in quiz.questions.iter().filter(|q| q.prompt.trim().is_empty()) {
            warn(&quiz.id, format!("question '{}' has an empty prompt", q.id));
        }
        for q in quiz.questions.iter().filter(|q| q.points == 0) {
            warn(&quiz.id, format!("question '{}' is worth 0 points", q.id));
        }
    }

    for exam in content.exams.values() {
        for stage in &exam.stages {
            if stage.grading == StageGrading::Manual && !stage.questions.is_empty() {
                warn(
                    &exam.id,
                    format!("manual stage '{}' lists questions that are never graded", stage.id),
                );
            }
            if stage.description.trim().is_empty() {
                warn(&exam.id, format!("stage '{}' has no description", stage.id));
            }
        }
    }

    warnings
}

//! Content definitions: labs, quizzes, exams and the versioned snapshot that
//! holds them.
//!
//! These types are produced by a content source (see
//! [`ContentSource`](crate::traits::ContentSource)) and are never mutated once
//! they are part of a [`ContentVersion`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, GradeError, Result};
use crate::flag::PatternCache;

// ---------------------------------------------------------------------------
// Labs and flags
// ---------------------------------------------------------------------------

/// A hands-on lab with one or more flags to capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabDefinition {
    pub id: String,
    pub title: String,
    pub version: String,
    /// Reference to the lab instructions. Opaque to the core.
    #[serde(default)]
    pub instructions: String,
    /// Flags in display order.
    #[serde(default)]
    pub flags: Vec<FlagRule>,
}

impl LabDefinition {
    /// Look up a flag rule by name.
    pub fn flag(&self, name: &str) -> Result<&FlagRule> {
        self.flags
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| GradeError::not_found(EntityKind::Flag, format!("{}/{name}", self.id)))
    }
}

/// One flag of a lab and how submissions for it are checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRule {
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(flatten)]
    pub check: FlagCheck,
}

impl FlagRule {
    pub fn kind(&self) -> FlagKind {
        match self.check {
            FlagCheck::Exact { .. } => FlagKind::Exact,
            FlagCheck::Regex { .. } => FlagKind::Regex,
            FlagCheck::FileExists => FlagKind::FileExists,
        }
    }
}

/// The validator attached to a flag, with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "validator", rename_all = "snake_case")]
pub enum FlagCheck {
    /// Trimmed submission must equal `pattern`.
    Exact {
        pattern: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
    },
    /// Trimmed submission must match `pattern` as a whole.
    Regex { pattern: String },
    /// The named artifact must exist, as reported by an
    /// [`ArtifactLookup`](crate::traits::ArtifactLookup).
    FileExists,
}

/// Validator kinds without their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Exact,
    Regex,
    FileExists,
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagKind::Exact => write!(f, "exact"),
            FlagKind::Regex => write!(f, "regex"),
            FlagKind::FileExists => write!(f, "file_exists"),
        }
    }
}

impl FromStr for FlagKind {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(FlagKind::Exact),
            "regex" => Ok(FlagKind::Regex),
            "file_exists" => Ok(FlagKind::FileExists),
            other => Err(GradeError::Configuration(format!(
                "unknown validator kind: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Quizzes
// ---------------------------------------------------------------------------

/// An auto-graded quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    /// Sum of all question points, answered or not.
    pub fn max_score(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

/// A single objective question. Shared by quizzes and auto-graded exam stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Canonical answer: a choice key or the expected short answer.
    pub answer: String,
    #[serde(default = "default_points")]
    pub points: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    ShortAnswer,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::MultipleChoice => write!(f, "multiple_choice"),
            QuestionKind::ShortAnswer => write!(f, "short_answer"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            "short_answer" => Ok(QuestionKind::ShortAnswer),
            other => Err(GradeError::Configuration(format!(
                "unknown question type: '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Exams
// ---------------------------------------------------------------------------

/// A multi-stage exam. Stages must be attempted in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamDefinition {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl ExamDefinition {
    /// Position and definition of a stage.
    pub fn stage(&self, stage_id: &str) -> Result<(usize, &Stage)> {
        self.stages
            .iter()
            .enumerate()
            .find(|(_, s)| s.id == stage_id)
            .ok_or_else(|| {
                GradeError::not_found(EntityKind::Stage, format!("{}/{stage_id}", self.id))
            })
    }

    /// Sum of stage maxima. Validated content keeps this within `u32`.
    pub fn max_score(&self) -> u32 {
        self.stages.iter().map(|s| s.max_score).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_stage_max_score")]
    pub max_score: u32,
    #[serde(default)]
    pub grading: StageGrading,
    /// Objective questions; required for auto-graded stages.
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// How a stage submission gets its score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageGrading {
    Auto,
    #[default]
    Manual,
}

impl fmt::Display for StageGrading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageGrading::Auto => write!(f, "auto"),
            StageGrading::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for StageGrading {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(StageGrading::Auto),
            "manual" => Ok(StageGrading::Manual),
            other => Err(GradeError::Configuration(format!(
                "unknown stage grading: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Content snapshot
// ---------------------------------------------------------------------------

/// The kind of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Lab,
    Quiz,
    Exam,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Lab => write!(f, "lab"),
            ContentKind::Quiz => write!(f, "quiz"),
            ContentKind::Exam => write!(f, "exam"),
        }
    }
}

/// One immutable snapshot of all content definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVersion {
    /// Version label (e.g. a date or commit).
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub labs: BTreeMap<String, LabDefinition>,
    pub quizzes: BTreeMap<String, QuizDefinition>,
    pub exams: BTreeMap<String, ExamDefinition>,
    #[serde(skip)]
    patterns: PatternCache,
}

impl ContentVersion {
    /// Build a snapshot, rejecting duplicate ids within each kind.
    pub fn new(
        label: impl Into<String>,
        labs: Vec<LabDefinition>,
        quizzes: Vec<QuizDefinition>,
        exams: Vec<ExamDefinition>,
    ) -> Result<Self> {
        Ok(Self {
            label: label.into(),
            created_at: Utc::now(),
            labs: index_by_id(labs, |l| &l.id, ContentKind::Lab)?,
            quizzes: index_by_id(quizzes, |q| &q.id, ContentKind::Quiz)?,
            exams: index_by_id(exams, |e| &e.id, ContentKind::Exam)?,
            patterns: PatternCache::default(),
        })
    }

    /// A snapshot with no content, used before the first sync.
    pub fn empty() -> Self {
        Self {
            label: "empty".into(),
            created_at: Utc::now(),
            labs: BTreeMap::new(),
            quizzes: BTreeMap::new(),
            exams: BTreeMap::new(),
            patterns: PatternCache::default(),
        }
    }

    /// Compiled regex flag patterns of this snapshot.
    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    pub fn lab(&self, id: &str) -> Result<&LabDefinition> {
        self.labs
            .get(id)
            .ok_or_else(|| GradeError::not_found(EntityKind::Lab, id))
    }

    pub fn quiz(&self, id: &str) -> Result<&QuizDefinition> {
        self.quizzes
            .get(id)
            .ok_or_else(|| GradeError::not_found(EntityKind::Quiz, id))
    }

    pub fn exam(&self, id: &str) -> Result<&ExamDefinition> {
        self.exams
            .get(id)
            .ok_or_else(|| GradeError::not_found(EntityKind::Exam, id))
    }

    /// Which kind of item an id names, if any.
    pub fn kind_of(&self, id: &str) -> Option<ContentKind> {
        if self.labs.contains_key(id) {
            Some(ContentKind::Lab)
        } else if self.quizzes.contains_key(id) {
            Some(ContentKind::Quiz)
        } else if self.exams.contains_key(id) {
            Some(ContentKind::Exam)
        } else {
            None
        }
    }

    pub fn item_count(&self) -> usize {
        self.labs.len() + self.quizzes.len() + self.exams.len()
    }
}

fn index_by_id<T>(
    items: Vec<T>,
    id: impl Fn(&T) -> &String,
    kind: ContentKind,
) -> Result<BTreeMap<String, T>> {
    let mut map = BTreeMap::new();
    for item in items {
        let key = id(&item).clone();
        if map.contains_key(&key) {
            return Err(GradeError::Configuration(format!("duplicate {kind} id: {key}")));
        }
        map.insert(key, item);
    }
    Ok(map)
}

fn default_true() -> bool {
    true
}

fn default_points() -> u32 {
    1
}

fn default_stage_max_score() -> u32 {
    10
}

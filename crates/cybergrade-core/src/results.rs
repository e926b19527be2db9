//! Submission records.
//!
//! Every grading call produces exactly one of these. They are immutable once
//! recorded, with a single exception: a pending manual exam-stage submission
//! receives its final score once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ContentKind;

/// A single answer in a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub question_id: String,
    pub answer: String,
}

/// One flag attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabFlagSubmission {
    pub id: Uuid,
    pub user_id: String,
    pub lab_id: String,
    pub flag_name: String,
    pub submitted_value: String,
    pub correct: bool,
    pub submitted_at: DateTime<Utc>,
}

/// One graded quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub id: Uuid,
    pub user_id: String,
    pub quiz_id: String,
    pub answers: Vec<QuizAnswer>,
    pub score: u32,
    pub max_score: u32,
    pub submitted_at: DateTime<Utc>,
}

/// One exam stage attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamStageSubmission {
    pub id: Uuid,
    pub user_id: String,
    pub exam_id: String,
    pub stage_id: String,
    pub answers: BTreeMap<String, String>,
    /// `None` while waiting for manual review.
    pub score: Option<u32>,
    pub max_score: u32,
    pub submitted_at: DateTime<Utc>,
    pub graded: bool,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
}

/// Any recorded attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    Flag(LabFlagSubmission),
    Quiz(QuizSubmission),
    ExamStage(ExamStageSubmission),
}

impl Submission {
    pub fn id(&self) -> Uuid {
        match self {
            Submission::Flag(s) => s.id,
            Submission::Quiz(s) => s.id,
            Submission::ExamStage(s) => s.id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Submission::Flag(s) => &s.user_id,
            Submission::Quiz(s) => &s.user_id,
            Submission::ExamStage(s) => &s.user_id,
        }
    }

    /// The lab, quiz or exam this attempt belongs to.
    pub fn content_id(&self) -> &str {
        match self {
            Submission::Flag(s) => &s.lab_id,
            Submission::Quiz(s) => &s.quiz_id,
            Submission::ExamStage(s) => &s.exam_id,
        }
    }

    pub fn content_kind(&self) -> ContentKind {
        match self {
            Submission::Flag(_) => ContentKind::Lab,
            Submission::Quiz(_) => ContentKind::Quiz,
            Submission::ExamStage(_) => ContentKind::Exam,
        }
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        match self {
            Submission::Flag(s) => s.submitted_at,
            Submission::Quiz(s) => s.submitted_at,
            Submission::ExamStage(s) => s.submitted_at,
        }
    }

    /// Key under which the ledger serializes writes for this attempt.
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.user_id(), self.content_id())
    }

    pub fn as_flag(&self) -> Option<&LabFlagSubmission> {
        match self {
            Submission::Flag(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_quiz(&self) -> Option<&QuizSubmission> {
        match self {
            Submission::Quiz(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_exam_stage(&self) -> Option<&ExamStageSubmission> {
        match self {
            Submission::ExamStage(s) => Some(s),
            _ => None,
        }
    }
}

/// (user, content item) pair. Distinct keys never conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub user_id: String,
    pub content_id: String,
}

impl LedgerKey {
    pub fn new(user_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content_id: content_id.into(),
        }
    }
}

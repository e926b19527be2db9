//! Collaborator traits and the request/response shapes external clients use.
//!
//! Content loading, persistence and artifact lookup live outside the core;
//! the `cybergrade-content` and `cybergrade-store` crates implement these
//! traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ContentVersion;
use crate::results::{
    ExamStageSubmission, LabFlagSubmission, QuizAnswer, QuizSubmission, Submission,
};

// ---------------------------------------------------------------------------
// Content source
// ---------------------------------------------------------------------------

/// Produces a fresh content snapshot. Invoked at startup and on sync.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable description of where content comes from.
    fn describe(&self) -> String;

    /// Load every lab, quiz and exam definition.
    async fn load_content(&self) -> anyhow::Result<ContentVersion>;
}

// ---------------------------------------------------------------------------
// Submission store
// ---------------------------------------------------------------------------

/// Result of trying to finalize a manual exam-stage submission.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// This call recorded the final score.
    Finalized(ExamStageSubmission),
    /// Someone else already did; the stored submission is returned unchanged.
    AlreadyGraded(ExamStageSubmission),
    NotFound,
}

/// Append-only persistence for submissions.
///
/// Implementations must make `append` and `finalize_stage` atomic per
/// (user, content item) key.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn append(&self, submission: Submission) -> anyhow::Result<()>;

    /// Attempts for one (user, content item), oldest first.
    async fn query(&self, user_id: &str, content_id: &str) -> anyhow::Result<Vec<Submission>>;

    /// Attempts by one user, oldest first.
    async fn query_user(&self, user_id: &str) -> anyhow::Result<Vec<Submission>>;

    /// Every attempt, oldest first.
    async fn all(&self) -> anyhow::Result<Vec<Submission>>;

    /// Every user id with at least one attempt.
    async fn users(&self) -> anyhow::Result<Vec<String>>;

    async fn get(&self, submission_id: Uuid) -> anyhow::Result<Option<Submission>>;

    /// Set the score of a pending exam-stage submission, exactly once.
    async fn finalize_stage(
        &self,
        submission_id: Uuid,
        score: u32,
        graded_at: DateTime<Utc>,
    ) -> anyhow::Result<FinalizeOutcome>;
}

// ---------------------------------------------------------------------------
// Artifact lookup
// ---------------------------------------------------------------------------

/// Answers "does this artifact exist?" for `file_exists` flags.
#[async_trait]
pub trait ArtifactLookup: Send + Sync {
    async fn exists(&self, lab_id: &str, artifact_name: &str) -> anyhow::Result<bool>;
}

/// Lookup for deployments without artifacts: nothing exists.
pub struct NoArtifacts;

#[async_trait]
impl ArtifactLookup for NoArtifacts {
    async fn exists(&self, _: &str, _: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Request/response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagSubmitRequest {
    pub user_id: String,
    pub submission: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagSubmitResponse {
    pub correct: bool,
    pub user_id: String,
    pub lab_id: String,
    pub flag_name: String,
    pub submitted_at: DateTime<Utc>,
}

impl From<&LabFlagSubmission> for FlagSubmitResponse {
    fn from(s: &LabFlagSubmission) -> Self {
        Self {
            correct: s.correct,
            user_id: s.user_id.clone(),
            lab_id: s.lab_id.clone(),
            flag_name: s.flag_name.clone(),
            submitted_at: s.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmitRequest {
    pub user_id: String,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmitResponse {
    pub user_id: String,
    pub quiz_id: String,
    pub score: u32,
    pub max_score: u32,
    pub submitted_at: DateTime<Utc>,
}

impl From<&QuizSubmission> for QuizSubmitResponse {
    fn from(s: &QuizSubmission) -> Self {
        Self {
            user_id: s.user_id.clone(),
            quiz_id: s.quiz_id.clone(),
            score: s.score,
            max_score: s.max_score,
            submitted_at: s.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSubmitRequest {
    pub user_id: String,
    pub stage_id: String,
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSubmitResponse {
    pub user_id: String,
    pub exam_id: String,
    pub stage_id: String,
    /// `null` while pending manual review.
    pub score: Option<u32>,
    pub max_score: u32,
    pub submitted_at: DateTime<Utc>,
}

impl From<&ExamStageSubmission> for ExamSubmitResponse {
    fn from(s: &ExamStageSubmission) -> Self {
        Self {
            user_id: s.user_id.clone(),
            exam_id: s.exam_id.clone(),
            stage_id: s.stage_id.clone(),
            score: s.score,
            max_score: s.max_score,
            submitted_at: s.submitted_at,
        }
    }
}

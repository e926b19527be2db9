//! Grading error types.
//!
//! Every operation in the core reports failures through [`GradeError`]. The
//! variants are deliberately coarse so that callers (HTTP handlers, the CLI)
//! can map them onto status codes without string matching.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// A specialized `Result` type for grading operations.
pub type Result<T> = std::result::Result<T, GradeError>;

/// The kind of entity a [`GradeError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Lab,
    Flag,
    Quiz,
    Exam,
    Stage,
    User,
    Submission,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Lab => write!(f, "lab"),
            EntityKind::Flag => write!(f, "flag"),
            EntityKind::Quiz => write!(f, "quiz"),
            EntityKind::Exam => write!(f, "exam"),
            EntityKind::Stage => write!(f, "stage"),
            EntityKind::User => write!(f, "user"),
            EntityKind::Submission => write!(f, "submission"),
        }
    }
}

/// Errors produced by the grading core.
#[derive(Debug, Error)]
pub enum GradeError {
    /// Content is malformed (unknown validator kind, duplicate ids, missing
    /// canonical answer). Fatal to a sync; the previous catalog stays active.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The submission itself is malformed (missing or empty required field).
    #[error("invalid submission: {0}")]
    Validation(String),

    /// An exam stage was submitted before its prerequisite stage.
    #[error("stage '{stage_id}' of exam '{exam_id}' is locked until '{prerequisite}' has a submission")]
    OrderingViolation {
        exam_id: String,
        stage_id: String,
        prerequisite: String,
    },

    /// Unknown lab/quiz/exam/stage/user/submission id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A final score was already recorded for this submission.
    #[error("submission {submission_id} is already graded")]
    AlreadyGraded { submission_id: Uuid },

    /// A persistence, filesystem or network collaborator failed.
    #[error("infrastructure error: {0:#}")]
    Infrastructure(#[source] anyhow::Error),
}

impl GradeError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        GradeError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Classify an error returned by a collaborator.
    ///
    /// Collaborators speak `anyhow`; a `GradeError` they raised (usually a
    /// `Configuration` error from the content loader) keeps its kind and picks
    /// up the collaborator's context chain. Anything else is infrastructure.
    pub fn from_collaborator(err: anyhow::Error) -> Self {
        match err.downcast_ref::<GradeError>() {
            Some(GradeError::Configuration(_)) => GradeError::Configuration(format!("{err:#}")),
            Some(GradeError::Validation(_)) => GradeError::Validation(format!("{err:#}")),
            _ => GradeError::Infrastructure(err),
        }
    }

    /// Stable snake_case label for logs and machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            GradeError::Configuration(_) => "configuration_error",
            GradeError::Validation(_) => "validation_error",
            GradeError::OrderingViolation { .. } => "ordering_violation",
            GradeError::NotFound { .. } => "not_found",
            GradeError::AlreadyGraded { .. } => "already_graded",
            GradeError::Infrastructure(_) => "infrastructure_error",
        }
    }

    /// Returns `true` if the caller sent something wrong and retrying the same
    /// request cannot succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GradeError::Validation(_)
                | GradeError::OrderingViolation { .. }
                | GradeError::NotFound { .. }
                | GradeError::AlreadyGraded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn collaborator_configuration_error_keeps_kind_and_context() {
        let err = Err::<(), _>(GradeError::Configuration("unknown validator 'fuzzy'".into()))
            .context("failed to load labs/web.toml")
            .unwrap_err();
        let classified = GradeError::from_collaborator(err);
        assert_eq!(classified.kind(), "configuration_error");
        let msg = classified.to_string();
        assert!(msg.contains("labs/web.toml"), "got: {msg}");
        assert!(msg.contains("fuzzy"), "got: {msg}");
    }

    #[test]
    fn collaborator_io_error_is_infrastructure() {
        let err = anyhow::anyhow!("disk on fire");
        let classified = GradeError::from_collaborator(err);
        assert!(matches!(classified, GradeError::Infrastructure(_)));
        assert!(!classified.is_client_error());
    }

    #[test]
    fn not_found_display() {
        let err = GradeError::not_found(EntityKind::Quiz, "week-1");
        assert_eq!(err.to_string(), "quiz not found: week-1");
        assert!(err.is_client_error());
    }
}

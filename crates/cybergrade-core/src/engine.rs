//! Grading engine facade.
//!
//! Ties the catalog, the grading rules and the collaborators together. Every
//! operation takes one catalog snapshot at entry and grades against it even if
//! a sync replaces the catalog halfway through.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::catalog::{ContentCatalog, SyncReport};
use crate::error::{EntityKind, GradeError, Result};
use crate::exam;
use crate::flag::{self, FlagAttempt};
use crate::ledger::SubmissionLedger;
use crate::model::{ContentVersion, FlagCheck};
use crate::quiz;
use crate::report::{self, DashboardSummary, ExamStatus, PivotTable, UserIdentity};
use crate::results::{ExamStageSubmission, LabFlagSubmission, QuizSubmission, Submission};
use crate::traits::{
    ArtifactLookup, ContentSource, ExamSubmitRequest, ExamSubmitResponse, FinalizeOutcome,
    FlagSubmitRequest, FlagSubmitResponse, NoArtifacts, QuizSubmitRequest, QuizSubmitResponse,
    SubmissionStore,
};

/// The grading engine.
pub struct GradingEngine {
    catalog: Arc<ContentCatalog>,
    store: Arc<dyn SubmissionStore>,
    artifacts: Arc<dyn ArtifactLookup>,
}

impl GradingEngine {
    pub fn new(
        catalog: Arc<ContentCatalog>,
        store: Arc<dyn SubmissionStore>,
        artifacts: Arc<dyn ArtifactLookup>,
    ) -> Self {
        Self {
            catalog,
            store,
            artifacts,
        }
    }

    /// Engine over an in-memory ledger with no artifacts.
    pub fn in_memory(content: ContentVersion) -> Result<Self> {
        Ok(Self::new(
            Arc::new(ContentCatalog::new(content)?),
            Arc::new(SubmissionLedger::new()),
            Arc::new(NoArtifacts),
        ))
    }

    pub fn catalog(&self) -> &Arc<ContentCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    /// Decode a JSON request body. Malformed JSON and missing fields are
    /// validation errors.
    pub fn parse_request<T: DeserializeOwned>(json: &str) -> Result<T> {
        serde_json::from_str(json)
            .map_err(|e| GradeError::Validation(format!("invalid request: {e}")))
    }

    // -----------------------------------------------------------------------
    // Grading
    // -----------------------------------------------------------------------

    /// Validate one flag attempt and record it.
    pub async fn submit_flag(
        &self,
        lab_id: &str,
        flag_name: &str,
        request: FlagSubmitRequest,
    ) -> Result<FlagSubmitResponse> {
        ensure_user(&request.user_id)?;
        let content = self.catalog.current();
        let lab = content.lab(lab_id)?;
        let rule = lab.flag(flag_name)?;

        let value = request.submission.trim();
        let artifact_exists = match rule.check {
            FlagCheck::FileExists if !value.is_empty() => self
                .artifacts
                .exists(lab_id, value)
                .await
                .map_err(GradeError::from_collaborator)?,
            _ => false,
        };
        let correct = flag::validate_cached(
            rule,
            FlagAttempt::with_artifact(value, artifact_exists),
            content.patterns(),
        )?;

        let record = LabFlagSubmission {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            lab_id: lab.id.clone(),
            flag_name: rule.name.clone(),
            submitted_value: request.submission,
            correct,
            submitted_at: Utc::now(),
        };
        let response = FlagSubmitResponse::from(&record);
        self.append(Submission::Flag(record)).await?;

        tracing::info!(
            user = %response.user_id,
            lab = %response.lab_id,
            flag = %response.flag_name,
            correct,
            "flag submitted"
        );
        Ok(response)
    }

    /// Grade a full quiz answer set and record it.
    pub async fn submit_quiz(
        &self,
        quiz_id: &str,
        request: QuizSubmitRequest,
    ) -> Result<QuizSubmitResponse> {
        ensure_user(&request.user_id)?;
        let content = self.catalog.current();
        let quiz = content.quiz(quiz_id)?;
        let grade = quiz::grade(quiz, &request.answers);

        let record = QuizSubmission {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            quiz_id: quiz.id.clone(),
            answers: request.answers,
            score: grade.score,
            max_score: grade.max_score,
            submitted_at: Utc::now(),
        };
        let response = QuizSubmitResponse::from(&record);
        self.append(Submission::Quiz(record)).await?;

        tracing::info!(
            user = %response.user_id,
            quiz = %response.quiz_id,
            score = response.score,
            max_score = response.max_score,
            "quiz graded"
        );
        Ok(response)
    }

    /// Submit one exam stage. Auto stages are graded immediately; manual
    /// stages are recorded pending review.
    pub async fn submit_exam_stage(
        &self,
        exam_id: &str,
        request: ExamSubmitRequest,
    ) -> Result<ExamSubmitResponse> {
        ensure_user(&request.user_id)?;
        let content = self.catalog.current();
        let exam_def = content.exam(exam_id)?;
        let attempts = self.query(&request.user_id, &exam_def.id).await?;

        let stage = match exam::ensure_unlocked(exam_def, &request.stage_id, &attempts) {
            Ok(stage) => stage,
            Err(e) => {
                tracing::warn!(user = %request.user_id, exam = %exam_id, error = %e, "stage submission rejected");
                return Err(e);
            }
        };
        let score = exam::score_stage(stage, &request.answers);
        let now = Utc::now();

        let record = ExamStageSubmission {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            exam_id: exam_def.id.clone(),
            stage_id: stage.id.clone(),
            answers: request.answers,
            score,
            max_score: stage.max_score,
            submitted_at: now,
            graded: score.is_some(),
            graded_at: score.map(|_| now),
        };
        let response = ExamSubmitResponse::from(&record);
        self.append(Submission::ExamStage(record)).await?;

        tracing::info!(
            user = %response.user_id,
            exam = %response.exam_id,
            stage = %response.stage_id,
            score = ?response.score,
            "exam stage submitted"
        );
        Ok(response)
    }

    /// Record the manual score for the latest attempt at a stage.
    pub async fn set_final_score(
        &self,
        exam_id: &str,
        stage_id: &str,
        user_id: &str,
        score: u32,
    ) -> Result<ExamSubmitResponse> {
        ensure_user(user_id)?;
        let content = self.catalog.current();
        let exam_def = content.exam(exam_id)?;
        let (_, stage) = exam_def.stage(stage_id)?;
        let attempts = self.query(user_id, &exam_def.id).await?;
        let latest = exam::latest_attempt(&exam_def.id, &stage.id, &attempts).ok_or_else(|| {
            GradeError::not_found(
                EntityKind::Submission,
                format!("{user_id}/{exam_id}/{stage_id}"),
            )
        })?;

        exam::check_final_score(stage, latest, score)?;
        self.finalize(latest.id, score).await
    }

    /// Record the manual score for a specific exam-stage submission.
    pub async fn finalize_submission(
        &self,
        submission_id: Uuid,
        score: u32,
    ) -> Result<ExamSubmitResponse> {
        let submission = self
            .store
            .get(submission_id)
            .await
            .map_err(GradeError::from_collaborator)?
            .ok_or_else(|| GradeError::not_found(EntityKind::Submission, submission_id.to_string()))?;
        let Submission::ExamStage(attempt) = submission else {
            return Err(GradeError::Validation(format!(
                "submission {submission_id} is not an exam stage attempt"
            )));
        };

        let content = self.catalog.current();
        let (_, stage) = content.exam(&attempt.exam_id)?.stage(&attempt.stage_id)?;
        exam::check_final_score(stage, &attempt, score)?;
        self.finalize(submission_id, score).await
    }

    async fn finalize(&self, submission_id: Uuid, score: u32) -> Result<ExamSubmitResponse> {
        let outcome = self
            .store
            .finalize_stage(submission_id, score, Utc::now())
            .await
            .map_err(GradeError::from_collaborator)?;

        match outcome {
            FinalizeOutcome::Finalized(graded) => {
                tracing::info!(
                    submission = %submission_id,
                    user = %graded.user_id,
                    exam = %graded.exam_id,
                    stage = %graded.stage_id,
                    score,
                    "final score recorded"
                );
                Ok(ExamSubmitResponse::from(&graded))
            }
            FinalizeOutcome::AlreadyGraded(existing) => {
                tracing::warn!(
                    submission = %submission_id,
                    existing = ?existing.score,
                    "final score rejected, submission already graded"
                );
                Err(GradeError::AlreadyGraded { submission_id })
            }
            FinalizeOutcome::NotFound => Err(GradeError::not_found(
                EntityKind::Submission,
                submission_id.to_string(),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    pub async fn exam_status(&self, exam_id: &str, user_id: &str) -> Result<ExamStatus> {
        ensure_user(user_id)?;
        let content = self.catalog.current();
        let exam_def = content.exam(exam_id)?;
        let attempts = self.query(user_id, &exam_def.id).await?;
        Ok(report::exam_status(exam_def, &attempts))
    }

    pub async fn summarize(&self, user_id: &str) -> Result<DashboardSummary> {
        ensure_user(user_id)?;
        let content = self.catalog.current();
        let attempts = self
            .store
            .query_user(user_id)
            .await
            .map_err(GradeError::from_collaborator)?;
        Ok(report::summarize(&content, user_id, &attempts))
    }

    /// Pivot over the roster plus every user with an attempt.
    pub async fn build_pivot(&self, roster: &[UserIdentity]) -> Result<PivotTable> {
        let content = self.catalog.current();
        let all = self.export().await?;
        Ok(report::build_pivot(&content, roster, &all))
    }

    /// Every recorded attempt, oldest first.
    pub async fn export(&self) -> Result<Vec<Submission>> {
        self.store.all().await.map_err(GradeError::from_collaborator)
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Reload content and replace the catalog. On failure the previous
    /// catalog stays active.
    pub async fn sync(&self, source: &dyn ContentSource) -> Result<SyncReport> {
        tracing::info!(source = %source.describe(), "syncing content");
        let result = match source.load_content().await {
            Ok(next) => self.catalog.replace(next),
            Err(e) => Err(GradeError::from_collaborator(e)),
        };
        if let Err(e) = &result {
            tracing::error!(
                error = %e,
                kind = e.kind(),
                active = %self.catalog.current().label,
                "content sync failed, keeping active catalog"
            );
        }
        result
    }

    async fn query(&self, user_id: &str, content_id: &str) -> Result<Vec<Submission>> {
        self.store
            .query(user_id, content_id)
            .await
            .map_err(GradeError::from_collaborator)
    }

    async fn append(&self, submission: Submission) -> Result<()> {
        tracing::debug!(id = %submission.id(), kind = %submission.content_kind(), "recording submission");
        self.store
            .append(submission)
            .await
            .map_err(GradeError::from_collaborator)
    }
}

fn ensure_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(GradeError::Validation("user_id must not be empty".into()));
    }
    Ok(())
}

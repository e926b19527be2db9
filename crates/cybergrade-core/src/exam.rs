//! Exam stage progression.
//!
//! Each (user, exam, stage) is in one of four states:
//!
//! - `Locked` -> `Unlocked` once the previous stage has any submission
//!   (the first stage starts `Unlocked`)
//! - `Unlocked` -> `Graded` on an auto-graded submission
//! - `Unlocked` -> `Submitted` on a manual submission, then `Submitted` ->
//!   `Graded` on the single `set_final_score` call
//!
//! A new attempt at a `Submitted` or `Graded` stage is recorded alongside the
//! earlier ones; the state reflects the latest attempt.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result};
use crate::ledger::best_stage_score;
use crate::model::{ExamDefinition, Stage, StageGrading};
use crate::quiz::grade_questions;
use crate::results::{ExamStageSubmission, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Locked,
    Unlocked,
    Submitted,
    Graded,
}

impl StageState {
    /// Whether a new submission for the stage is accepted.
    pub const fn accepts_submissions(&self) -> bool {
        !matches!(self, Self::Locked)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::Locked => write!(f, "locked"),
            StageState::Unlocked => write!(f, "unlocked"),
            StageState::Submitted => write!(f, "submitted"),
            StageState::Graded => write!(f, "graded"),
        }
    }
}

/// Progress of one user through one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub stage_id: String,
    pub title: String,
    pub grading: StageGrading,
    pub state: StageState,
    pub attempts: usize,
    pub best_score: Option<u32>,
    pub max_score: u32,
    /// The latest attempt is waiting for manual review.
    pub pending_review: bool,
}

/// The attempts of one user at one stage, oldest first.
fn stage_attempts<'a>(
    exam_id: &'a str,
    stage_id: &'a str,
    attempts: &'a [Submission],
) -> impl Iterator<Item = &'a ExamStageSubmission> + 'a {
    attempts
        .iter()
        .filter_map(Submission::as_exam_stage)
        .filter(move |a| a.exam_id == exam_id && a.stage_id == stage_id)
}

fn has_attempt(exam_id: &str, stage_id: &str, attempts: &[Submission]) -> bool {
    stage_attempts(exam_id, stage_id, attempts).next().is_some()
}

/// State of every stage of `exam` for the user whose attempts are given.
pub fn stage_states(exam: &ExamDefinition, attempts: &[Submission]) -> Vec<StageProgress> {
    let mut progress = Vec::with_capacity(exam.stages.len());
    let mut previous_done = true;

    for stage in &exam.stages {
        let latest = stage_attempts(&exam.id, &stage.id, attempts).last();
        let count = stage_attempts(&exam.id, &stage.id, attempts).count();

        let state = match latest {
            Some(a) if a.graded => StageState::Graded,
            Some(_) => StageState::Submitted,
            None if previous_done => StageState::Unlocked,
            None => StageState::Locked,
        };

        progress.push(StageProgress {
            stage_id: stage.id.clone(),
            title: stage.title.clone(),
            grading: stage.grading,
            state,
            attempts: count,
            best_score: best_stage_score(&exam.id, &stage.id, attempts),
            max_score: stage.max_score,
            pending_review: latest.is_some_and(|a| !a.graded),
        });
        previous_done = latest.is_some();
    }

    progress
}

/// Find a stage and make sure it may be submitted now.
pub fn ensure_unlocked<'a>(
    exam: &'a ExamDefinition,
    stage_id: &str,
    attempts: &[Submission],
) -> Result<&'a Stage> {
    let (index, stage) = exam.stage(stage_id)?;
    if index > 0 {
        let prerequisite = &exam.stages[index - 1];
        if !has_attempt(&exam.id, &prerequisite.id, attempts) {
            return Err(GradeError::OrderingViolation {
                exam_id: exam.id.clone(),
                stage_id: stage.id.clone(),
                prerequisite: prerequisite.id.clone(),
            });
        }
    }
    Ok(stage)
}

/// Score a stage submission. Auto stages are graded like a quiz; manual stages
/// return `None` and wait for review.
pub fn score_stage(stage: &Stage, answers: &BTreeMap<String, String>) -> Option<u32> {
    match stage.grading {
        StageGrading::Auto => {
            let grade = grade_questions(&stage.questions, |id| answers.get(id).map(String::as_str));
            Some(grade.score)
        }
        StageGrading::Manual => None,
    }
}

/// Check that a manual score can be applied to a submission.
pub fn check_final_score(stage: &Stage, submission: &ExamStageSubmission, score: u32) -> Result<()> {
    if submission.graded {
        return Err(GradeError::AlreadyGraded {
            submission_id: submission.id,
        });
    }
    if score > stage.max_score {
        return Err(GradeError::Validation(format!(
            "score {score} exceeds max_score {} for stage '{}'",
            stage.max_score, stage.id
        )));
    }
    Ok(())
}

/// Latest attempt of a user at a stage.
pub fn latest_attempt<'a>(
    exam_id: &str,
    stage_id: &str,
    attempts: &'a [Submission],
) -> Option<&'a ExamStageSubmission> {
    attempts
        .iter()
        .filter_map(Submission::as_exam_stage)
        .filter(|a| a.exam_id == exam_id && a.stage_id == stage_id)
        .last()
}

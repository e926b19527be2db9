//! The active content snapshot.
//!
//! [`ContentCatalog`] hands out `Arc<ContentVersion>` snapshots. Replacing the
//! catalog validates the new version first and then swaps the pointer, so a
//! reader holds either the old snapshot or the new one in full. Grading
//! operations take one snapshot at entry and use it until they finish.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result};
use crate::model::{
    ContentKind, ContentVersion, FlagCheck, Question, QuestionKind, StageGrading,
};

/// Summary of a successful replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub version: String,
    pub labs: usize,
    pub quizzes: usize,
    pub exams: usize,
    pub replaced_at: DateTime<Utc>,
}

/// Single-writer, many-reader holder of the active [`ContentVersion`].
pub struct ContentCatalog {
    active: RwLock<Arc<ContentVersion>>,
    replace_lock: Mutex<()>,
}

impl ContentCatalog {
    /// Create a catalog from an initial version, validating it.
    pub fn new(initial: ContentVersion) -> Result<Self> {
        validate(&initial)?;
        Ok(Self {
            active: RwLock::new(Arc::new(initial)),
            replace_lock: Mutex::new(()),
        })
    }

    /// A catalog holding no content.
    pub fn empty() -> Self {
        Self {
            active: RwLock::new(Arc::new(ContentVersion::empty())),
            replace_lock: Mutex::new(()),
        }
    }

    /// The active snapshot.
    pub fn current(&self) -> Arc<ContentVersion> {
        Arc::clone(&self.active.read())
    }

    /// Validate and install a new snapshot.
    ///
    /// On error the active snapshot is untouched. Concurrent replaces run one
    /// at a time; readers are only excluded for the pointer store.
    pub fn replace(&self, next: ContentVersion) -> Result<SyncReport> {
        let _guard = self.replace_lock.lock();
        validate(&next)?;
        check_shape_stability(&self.current(), &next)?;

        let report = SyncReport {
            version: next.label.clone(),
            labs: next.labs.len(),
            quizzes: next.quizzes.len(),
            exams: next.exams.len(),
            replaced_at: Utc::now(),
        };
        *self.active.write() = Arc::new(next);

        tracing::info!(
            version = %report.version,
            labs = report.labs,
            quizzes = report.quizzes,
            exams = report.exams,
            "content catalog replaced"
        );
        Ok(report)
    }
}

impl ContentVersion {
    /// See [`validate`].
    pub fn validate(&self) -> Result<()> {
        validate(self)
    }
}

/// Check a content version for the errors that make it unusable for grading.
pub fn validate(content: &ContentVersion) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    let all_ids = content
        .labs
        .keys()
        .chain(content.quizzes.keys())
        .chain(content.exams.keys());
    for id in all_ids {
        if !seen.insert(id.as_str()) {
            return Err(config_err(id, "id is used by more than one kind of item"));
        }
    }

    for (key, lab) in &content.labs {
        ensure_key_matches(key, &lab.id)?;
        ensure_unique(&lab.id, "flag name", lab.flags.iter().map(|f| f.name.as_str()))?;
        for flag in &lab.flags {
            match &flag.check {
                FlagCheck::Exact { pattern, .. } if pattern.trim().is_empty() => {
                    return Err(config_err(
                        &lab.id,
                        &format!("flag '{}': exact validator requires a value", flag.name),
                    ));
                }
                FlagCheck::Regex { pattern } => {
                    content.patterns().get(pattern).map_err(|e| {
                        config_err(&lab.id, &format!("flag '{}': {e}", flag.name))
                    })?;
                }
                _ => {}
            }
        }
    }

    for (key, quiz) in &content.quizzes {
        ensure_key_matches(key, &quiz.id)?;
        validate_questions(&quiz.id, &quiz.questions)?;
        total_points(&quiz.id, quiz.questions.iter().map(|q| q.points))?;
    }

    for (key, exam) in &content.exams {
        ensure_key_matches(key, &exam.id)?;
        if exam.stages.is_empty() {
            return Err(config_err(&exam.id, "exam has no stages"));
        }
        ensure_unique(&exam.id, "stage id", exam.stages.iter().map(|s| s.id.as_str()))?;
        total_points(&exam.id, exam.stages.iter().map(|s| s.max_score))?;
        for stage in &exam.stages {
            let scope = format!("{}/{}", exam.id, stage.id);
            validate_questions(&scope, &stage.questions)?;
            if stage.grading == StageGrading::Auto {
                if stage.questions.is_empty() {
                    return Err(config_err(&scope, "auto-graded stage has no questions"));
                }
                let points = total_points(&scope, stage.questions.iter().map(|q| q.points))?;
                if points != stage.max_score {
                    return Err(config_err(
                        &scope,
                        &format!(
                            "question points sum to {points} but max_score is {}",
                            stage.max_score
                        ),
                    ));
                }
            }
        }
    }

    Ok(())
}

/// An id may not change kind between versions.
pub fn check_shape_stability(current: &ContentVersion, next: &ContentVersion) -> Result<()> {
    let next_items = next
        .labs
        .keys()
        .map(|id| (id, ContentKind::Lab))
        .chain(next.quizzes.keys().map(|id| (id, ContentKind::Quiz)))
        .chain(next.exams.keys().map(|id| (id, ContentKind::Exam)));

    for (id, kind) in next_items {
        if let Some(previous) = current.kind_of(id) {
            if previous != kind {
                return Err(config_err(
                    id,
                    &format!("id was a {previous} and cannot become a {kind}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_questions(scope: &str, questions: &[Question]) -> Result<()> {
    ensure_unique(scope, "question id", questions.iter().map(|q| q.id.as_str()))?;
    for q in questions {
        if q.answer.trim().is_empty() {
            return Err(config_err(
                scope,
                &format!("question '{}' has no canonical answer", q.id),
            ));
        }
        if q.kind == QuestionKind::MultipleChoice {
            if q.choices.is_empty() {
                return Err(config_err(
                    scope,
                    &format!("multiple choice question '{}' has no choices", q.id),
                ));
            }
            if !q.choices.iter().any(|c| c.key == q.answer) {
                return Err(config_err(
                    scope,
                    &format!("answer of question '{}' is not one of its choice keys", q.id),
                ));
            }
        }
    }
    Ok(())
}

/// Sum point values, rejecting totals that do not fit a score.
fn total_points(scope: &str, mut points: impl Iterator<Item = u32>) -> Result<u32> {
    points.try_fold(0u32, |total, p| {
        total
            .checked_add(p)
            .ok_or_else(|| config_err(scope, "point total overflows"))
    })
}

fn ensure_key_matches(key: &str, id: &str) -> Result<()> {
    if key == id {
        Ok(())
    } else {
        Err(config_err(id, &format!("indexed under mismatched key '{key}'")))
    }
}

fn ensure_unique<'a>(
    scope: &str,
    what: &str,
    values: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for v in values {
        if !seen.insert(v) {
            return Err(config_err(scope, &format!("duplicate {what}: {v}")));
        }
    }
    Ok(())
}

fn config_err(scope: &str, message: &str) -> GradeError {
    GradeError::Configuration(format!("{scope}: {message}"))
}

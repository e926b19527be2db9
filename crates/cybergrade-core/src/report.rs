//! Per-user dashboard rollups and the wide export pivot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exam::{stage_states, StageProgress};
use crate::ledger::{best_lab_score, best_quiz_score, best_stage_score};
use crate::model::{ContentKind, ContentVersion, ExamDefinition, FlagKind};
use crate::results::Submission;

/// Everything the student dashboard shows for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub user_id: String,
    /// Label of the content version the summary was computed against.
    pub version: String,
    pub labs: Vec<LabStatus>,
    pub quizzes: Vec<QuizStatus>,
    pub exams: Vec<ExamStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabStatus {
    pub lab_id: String,
    pub title: String,
    pub version: String,
    pub instructions: String,
    pub score: u32,
    pub total: u32,
    pub flags: Vec<FlagStatus>,
}

/// Flag state as shown to students. Never carries the expected value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagStatus {
    pub name: String,
    pub prompt: String,
    pub validator: FlagKind,
    pub solved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStatus {
    pub quiz_id: String,
    pub title: String,
    pub version: String,
    pub best_score: Option<u32>,
    pub max_score: u32,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamStatus {
    pub exam_id: String,
    pub title: String,
    pub version: String,
    pub stages: Vec<StageProgress>,
    /// Sum of best graded stage scores, `None` until any stage is graded.
    pub total: Option<u32>,
    pub max_score: u32,
}

/// Build the dashboard for one user from their attempts.
pub fn summarize(content: &ContentVersion, user_id: &str, attempts: &[Submission]) -> DashboardSummary {
    let labs = content
        .labs
        .values()
        .map(|lab| {
            let score = best_lab_score(lab, attempts);
            LabStatus {
                lab_id: lab.id.clone(),
                title: lab.title.clone(),
                version: lab.version.clone(),
                instructions: lab.instructions.clone(),
                score: score.score,
                total: score.total,
                flags: lab
                    .flags
                    .iter()
                    .map(|f| FlagStatus {
                        name: f.name.clone(),
                        prompt: f.prompt.clone(),
                        validator: f.kind(),
                        solved: score.solved.contains(&f.name),
                    })
                    .collect(),
            }
        })
        .collect();

    let quizzes = content
        .quizzes
        .values()
        .map(|quiz| QuizStatus {
            quiz_id: quiz.id.clone(),
            title: quiz.title.clone(),
            version: quiz.version.clone(),
            best_score: best_quiz_score(&quiz.id, attempts),
            max_score: quiz.max_score(),
            attempts: attempts
                .iter()
                .filter_map(Submission::as_quiz)
                .filter(|a| a.quiz_id == quiz.id)
                .count(),
        })
        .collect();

    let exams = content
        .exams
        .values()
        .map(|exam| exam_status(exam, attempts))
        .collect();

    DashboardSummary {
        user_id: user_id.to_string(),
        version: content.label.clone(),
        labs,
        quizzes,
        exams,
    }
}

/// Stage-by-stage status of one exam for one user.
pub fn exam_status(exam: &ExamDefinition, attempts: &[Submission]) -> ExamStatus {
    ExamStatus {
        exam_id: exam.id.clone(),
        title: exam.title.clone(),
        version: exam.version.clone(),
        stages: stage_states(exam, attempts),
        total: best_exam_total(exam, attempts),
        max_score: exam.max_score(),
    }
}

fn best_exam_total(exam: &ExamDefinition, attempts: &[Submission]) -> Option<u32> {
    exam.stages
        .iter()
        .filter_map(|s| best_stage_score(&exam.id, &s.id, attempts))
        .fold(None, |acc, score| Some(acc.unwrap_or(0) + score))
}

// ---------------------------------------------------------------------------
// Pivot
// ---------------------------------------------------------------------------

/// Identity columns of a pivot row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// One graded column of the pivot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotColumn {
    pub id: String,
    pub kind: ContentKind,
    pub max_score: u32,
    pub header: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotRow {
    pub identity: UserIdentity,
    /// One cell per column; `None` means no qualifying attempt.
    pub cells: Vec<Option<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotTable {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub columns: Vec<PivotColumn>,
    pub rows: Vec<PivotRow>,
}

/// Identity columns that precede the graded columns.
pub const IDENTITY_HEADERS: [&str; 3] = ["user_id", "email", "student_id"];

impl PivotTable {
    /// Full header row: identity columns then one per content item.
    pub fn headers(&self) -> Vec<String> {
        IDENTITY_HEADERS
            .iter()
            .map(|h| h.to_string())
            .chain(self.columns.iter().map(|c| c.header.clone()))
            .collect()
    }

    pub fn row(&self, user_id: &str) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.identity.user_id == user_id)
    }
}

/// Columns in export order: labs, quizzes, exams, each sorted by id.
pub fn pivot_columns(content: &ContentVersion) -> Vec<PivotColumn> {
    let labs = content.labs.values().map(|lab| PivotColumn {
        id: lab.id.clone(),
        kind: ContentKind::Lab,
        max_score: lab.flags.len() as u32,
        header: format!("lab:{}", lab.id),
    });
    let quizzes = content.quizzes.values().map(|quiz| PivotColumn {
        id: quiz.id.clone(),
        kind: ContentKind::Quiz,
        max_score: quiz.max_score(),
        header: format!("quiz:{} ({})", quiz.id, quiz.max_score()),
    });
    let exams = content.exams.values().map(|exam| PivotColumn {
        id: exam.id.clone(),
        kind: ContentKind::Exam,
        max_score: exam.max_score(),
        header: format!("exam:{} ({})", exam.id, exam.max_score()),
    });
    labs.chain(quizzes).chain(exams).collect()
}

/// Build the export pivot.
///
/// Rows cover the roster plus every user found in `all`, sorted by user id,
/// each exactly once. Roster entries supply the identity columns.
pub fn build_pivot(content: &ContentVersion, roster: &[UserIdentity], all: &[Submission]) -> PivotTable {
    let mut by_user: BTreeMap<&str, Vec<Submission>> = BTreeMap::new();
    for submission in all {
        by_user
            .entry(submission.user_id())
            .or_default()
            .push(submission.clone());
    }

    let mut identities: BTreeMap<String, UserIdentity> = BTreeMap::new();
    for identity in roster {
        identities
            .entry(identity.user_id.clone())
            .or_insert_with(|| identity.clone());
    }
    let ledger_users: BTreeSet<&str> = by_user.keys().copied().collect();
    for user_id in ledger_users {
        identities
            .entry(user_id.to_string())
            .or_insert_with(|| UserIdentity::new(user_id));
    }

    let columns = pivot_columns(content);
    let empty = Vec::new();
    let rows = identities
        .into_values()
        .map(|identity| {
            let attempts = by_user.get(identity.user_id.as_str()).unwrap_or(&empty);
            let cells = columns
                .iter()
                .map(|column| cell(content, column, attempts))
                .collect();
            PivotRow { identity, cells }
        })
        .collect();

    PivotTable {
        version: content.label.clone(),
        generated_at: Utc::now(),
        columns,
        rows,
    }
}

fn cell(content: &ContentVersion, column: &PivotColumn, attempts: &[Submission]) -> Option<u32> {
    match column.kind {
        ContentKind::Lab => {
            let lab = content.labs.get(&column.id)?;
            let tried = attempts
                .iter()
                .filter_map(Submission::as_flag)
                .any(|a| a.lab_id == lab.id);
            tried.then(|| best_lab_score(lab, attempts).score)
        }
        ContentKind::Quiz => best_quiz_score(&column.id, attempts),
        ContentKind::Exam => {
            let exam = content.exams.get(&column.id)?;
            best_exam_total(exam, attempts)
        }
    }
}

//! CSV export: the score pivot plus one raw sheet per submission kind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use cybergrade_core::model::ContentKind;
use cybergrade_core::report::PivotTable;
use cybergrade_core::results::Submission;

/// Quote a field if it needs it.
fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn push_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let line: Vec<String> = fields.iter().map(|f| csv_quote(f.as_ref())).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

/// Render the pivot. Cells without a qualifying attempt are empty.
pub fn pivot_to_csv(pivot: &PivotTable) -> String {
    let mut out = String::new();
    push_record(&mut out, pivot.headers().as_slice());
    for row in &pivot.rows {
        let mut fields = vec![
            row.identity.user_id.clone(),
            row.identity.email.clone().unwrap_or_default(),
            row.identity.student_id.clone().unwrap_or_default(),
        ];
        fields.extend(
            row.cells
                .iter()
                .map(|c| c.map(|v| v.to_string()).unwrap_or_default()),
        );
        push_record(&mut out, fields.as_slice());
    }
    out
}

/// Raw attempt sheet for one kind of content.
pub fn attempts_to_csv(kind: ContentKind, attempts: &[Submission]) -> String {
    let mut out = String::new();
    push_record(&mut out, raw_header(kind));
    for submission in attempts.iter().filter(|s| s.content_kind() == kind) {
        let fields: Vec<String> = match submission {
            Submission::Flag(s) => vec![
                s.user_id.clone(),
                s.lab_id.clone(),
                s.flag_name.clone(),
                s.correct.to_string(),
                s.submitted_at.to_rfc3339(),
            ],
            Submission::Quiz(s) => vec![
                s.user_id.clone(),
                s.quiz_id.clone(),
                s.score.to_string(),
                s.max_score.to_string(),
                s.submitted_at.to_rfc3339(),
            ],
            Submission::ExamStage(s) => vec![
                s.user_id.clone(),
                s.exam_id.clone(),
                s.stage_id.clone(),
                s.score.map(|v| v.to_string()).unwrap_or_default(),
                s.max_score.to_string(),
                s.submitted_at.to_rfc3339(),
            ],
        };
        push_record(&mut out, fields.as_slice());
    }
    out
}

pub fn raw_header(kind: ContentKind) -> &'static [&'static str] {
    match kind {
        ContentKind::Lab => &["user_id", "lab_id", "flag_name", "correct", "submitted_at"],
        ContentKind::Quiz => &["user_id", "quiz_id", "score", "max_score", "submitted_at"],
        ContentKind::Exam => &[
            "user_id",
            "exam_id",
            "stage_id",
            "score",
            "max_score",
            "submitted_at",
        ],
    }
}

fn raw_file_name(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Lab => "lab_submissions.csv",
        ContentKind::Quiz => "quiz_submissions.csv",
        ContentKind::Exam => "exam_submissions.csv",
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the pivot to a CSV file.
pub fn write_pivot_csv(pivot: &PivotTable, path: &Path) -> Result<()> {
    write_file(path, &pivot_to_csv(pivot))
}

/// Write `scores.csv` plus the three raw sheets into `dir`. Returns the paths
/// written.
pub fn write_csv_exports(pivot: &PivotTable, attempts: &[Submission], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let scores = dir.join("scores.csv");
    write_pivot_csv(pivot, &scores)?;
    written.push(scores);

    for kind in [ContentKind::Lab, ContentKind::Quiz, ContentKind::Exam] {
        let path = dir.join(raw_file_name(kind));
        write_file(&path, &attempts_to_csv(kind, attempts))?;
        written.push(path);
    }
    Ok(written)
}

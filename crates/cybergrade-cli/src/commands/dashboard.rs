//! The `cybergrade dashboard` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use cybergrade_core::report::DashboardSummary;

use super::context::{self, print_json};

pub async fn execute(config_path: Option<PathBuf>, user: String, format: String) -> Result<()> {
    let workspace = context::open(config_path).await?;
    let summary = workspace.engine.summarize(&user).await?;

    match format.as_str() {
        "json" => print_json(&summary),
        "table" => {
            print_summary(&summary);
            Ok(())
        }
        other => anyhow::bail!("unknown format: {other} (expected table or json)"),
    }
}

fn score_cell(score: Option<u32>, max: u32) -> Cell {
    match score {
        Some(score) => Cell::new(format!("{score}/{max}")),
        None => Cell::new(format!("-/{max}")),
    }
}

fn print_summary(summary: &DashboardSummary) {
    println!("{} (content {})", summary.user_id, summary.version);

    let mut table = Table::new();
    table.set_header(vec!["Item", "Kind", "Title", "Score", "Detail"]);

    for lab in &summary.labs {
        let solved: Vec<&str> = lab
            .flags
            .iter()
            .filter(|f| f.solved)
            .map(|f| f.name.as_str())
            .collect();
        table.add_row(vec![
            Cell::new(&lab.lab_id),
            Cell::new("lab"),
            Cell::new(&lab.title),
            score_cell(Some(lab.score), lab.total),
            Cell::new(format!("solved: {}", solved.join(", "))),
        ]);
    }

    for quiz in &summary.quizzes {
        table.add_row(vec![
            Cell::new(&quiz.quiz_id),
            Cell::new("quiz"),
            Cell::new(&quiz.title),
            score_cell(quiz.best_score, quiz.max_score),
            Cell::new(format!("{} attempt(s)", quiz.attempts)),
        ]);
    }

    for exam in &summary.exams {
        let stages: Vec<String> = exam
            .stages
            .iter()
            .map(|s| format!("{}: {}", s.stage_id, s.state))
            .collect();
        table.add_row(vec![
            Cell::new(&exam.exam_id),
            Cell::new("exam"),
            Cell::new(&exam.title),
            score_cell(exam.total, exam.max_score),
            Cell::new(stages.join(", ")),
        ]);
    }

    println!("{table}");
}

//! The `cybergrade status` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::context;

pub async fn execute(config_path: Option<PathBuf>, user: String, exam: String) -> Result<()> {
    let workspace = context::open(config_path).await?;
    let status = workspace.engine.exam_status(&exam, &user).await?;

    println!("{}: {} ({user})", status.exam_id, status.title);

    let mut table = Table::new();
    table.set_header(vec!["Stage", "Title", "Grading", "State", "Attempts", "Best"]);
    for stage in &status.stages {
        let best = match (stage.best_score, stage.pending_review) {
            (Some(score), _) => format!("{score}/{}", stage.max_score),
            (None, true) => "pending review".to_string(),
            (None, false) => format!("-/{}", stage.max_score),
        };
        table.add_row(vec![
            Cell::new(&stage.stage_id),
            Cell::new(&stage.title),
            Cell::new(stage.grading),
            Cell::new(stage.state),
            Cell::new(stage.attempts),
            Cell::new(best),
        ]);
    }
    println!("{table}");

    match status.total {
        Some(total) => println!("Total: {total}/{}", status.max_score),
        None => println!("Total: not graded yet (max {})", status.max_score),
    }
    Ok(())
}

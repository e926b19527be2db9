//! The `cybergrade export` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use cybergrade_core::report::PivotTable;
use cybergrade_core::results::Submission;
use cybergrade_report::{write_csv_exports, write_html_report};

use super::context;

pub async fn execute(config_path: Option<PathBuf>, format: String, output: PathBuf) -> Result<()> {
    let formats: Vec<&str> = if format == "all" {
        vec!["csv", "html", "json"]
    } else {
        format.split(',').map(str::trim).collect()
    };
    if let Some(unknown) = formats
        .iter()
        .find(|f| !matches!(**f, "csv" | "html" | "json"))
    {
        anyhow::bail!("unknown format: {unknown} (expected csv, html, json or all)");
    }

    let workspace = context::open(config_path).await?;
    let roster = workspace.roster()?;
    let pivot = workspace.engine.build_pivot(&roster).await?;
    let attempts = workspace.engine.export().await?;

    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory: {}", output.display()))?;

    for fmt in formats {
        match fmt {
            "csv" => {
                for path in write_csv_exports(&pivot, &attempts, &output)? {
                    eprintln!("CSV: {}", path.display());
                }
            }
            "html" => {
                let path = output.join("scores.html");
                write_html_report(&pivot, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            _ => {
                for path in write_json(&pivot, &attempts, &output)? {
                    eprintln!("JSON: {}", path.display());
                }
            }
        }
    }

    eprintln!(
        "Exported {} user(s) x {} column(s), {} submission(s)",
        pivot.rows.len(),
        pivot.columns.len(),
        attempts.len()
    );
    Ok(())
}

fn write_json(pivot: &PivotTable, attempts: &[Submission], dir: &Path) -> Result<Vec<PathBuf>> {
    let scores = dir.join("scores.json");
    std::fs::write(&scores, serde_json::to_string_pretty(pivot)?)
        .with_context(|| format!("failed to write {}", scores.display()))?;

    let submissions = dir.join("submissions.json");
    std::fs::write(&submissions, serde_json::to_string_pretty(attempts)?)
        .with_context(|| format!("failed to write {}", submissions.display()))?;

    Ok(vec![scores, submissions])
}

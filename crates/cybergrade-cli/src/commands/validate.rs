//! The `cybergrade validate` command.

use std::path::PathBuf;

use anyhow::Result;

use cybergrade_content::{content_warnings, load_config_from, load_content_dir};

pub fn execute(config_path: Option<PathBuf>, content: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let root = content.unwrap_or_else(|| config.content_root.clone());

    let version = load_content_dir(&root, &config.load_options())?;
    println!(
        "Content version {}: {} labs, {} quizzes, {} exams",
        version.label,
        version.labs.len(),
        version.quizzes.len(),
        version.exams.len()
    );
    for lab in version.labs.values() {
        println!("  lab  {} ({} flags)", lab.id, lab.flags.len());
    }
    for quiz in version.quizzes.values() {
        println!(
            "  quiz {} ({} questions, {} points)",
            quiz.id,
            quiz.questions.len(),
            quiz.max_score()
        );
    }
    for exam in version.exams.values() {
        println!(
            "  exam {} ({} stages, {} points)",
            exam.id,
            exam.stages.len(),
            exam.max_score()
        );
    }

    let warnings = content_warnings(&version);
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.item_id, w.message);
    }

    if warnings.is_empty() {
        println!("All content valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}

//! End-to-end grading pipeline: content directory, journal, artifacts,
//! engine and exports wired the way the binary wires them.

use std::path::Path;
use std::sync::Arc;

use cybergrade_content::{DirectoryContentSource, LoadOptions};
use cybergrade_core::report::UserIdentity;
use cybergrade_core::results::QuizAnswer;
use cybergrade_core::traits::{ExamSubmitRequest, FlagSubmitRequest, QuizSubmitRequest};
use cybergrade_core::{ContentCatalog, GradeError, GradingEngine};
use cybergrade_report::{pivot_to_csv, write_csv_exports};
use cybergrade_store::{JournalStore, LocalArtifacts};

const LAB: &str = r#"
id = "web"
title = "Web"
instructions = "labs/web.md"

[[flags]]
name = "flag1"
prompt = "first"
validator = "exact"
value = "CTF{hi}"

[[flags]]
name = "flag2"
prompt = "second"
validator = "regex"
pattern = 'CTF\{.+\}'
"#;

fn quiz_toml(points: u32) -> String {
    format!(
        r#"
id = "net"
title = "Net"

[[questions]]
id = "q1"
prompt = "HTTPS port?"
type = "multiple_choice"
answer = "b"
points = {points}
choices = [{{ key = "a", label = "80" }}, {{ key = "b", label = "443" }}]
"#
    )
}

const EXAM: &str = r#"
id = "final"
title = "Final"

[[stages]]
id = "one"
title = "One"
description = "auto"
grading = "auto"
max_score = 1

[[stages.questions]]
id = "tool"
prompt = "tool?"
type = "short_answer"
answer = "nmap"

[[stages]]
id = "two"
title = "Two"
description = "manual"
max_score = 10
"#;

fn write_content(root: &Path, quiz_points: u32) {
    for sub in ["labs", "quizzes", "exams"] {
        std::fs::create_dir_all(root.join(sub)).unwrap();
    }
    std::fs::write(root.join("labs/web.toml"), LAB).unwrap();
    std::fs::write(root.join("quizzes/net.toml"), quiz_toml(quiz_points)).unwrap();
    std::fs::write(root.join("exams/final.toml"), EXAM).unwrap();
}

async fn engine(dir: &Path) -> (GradingEngine, DirectoryContentSource) {
    let store = JournalStore::open(dir.join("journal.jsonl")).await.unwrap();
    let engine = GradingEngine::new(
        Arc::new(ContentCatalog::empty()),
        Arc::new(store),
        Arc::new(LocalArtifacts::new(dir.join("artifacts"))),
    );
    let source = DirectoryContentSource::new(
        dir.join("content"),
        LoadOptions {
            version_label: Some("v1".into()),
            ..LoadOptions::default()
        },
    );
    engine.sync(&source).await.unwrap();
    (engine, source)
}

fn flag(user: &str, value: &str) -> FlagSubmitRequest {
    FlagSubmitRequest {
        user_id: user.into(),
        submission: value.into(),
    }
}

#[tokio::test]
async fn e2e_lab_score_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    write_content(&dir.path().join("content"), 2);
    let (engine, _) = engine(dir.path()).await;

    assert!(engine.submit_flag("web", "flag1", flag("alice", "CTF{hi}")).await.unwrap().correct);
    assert!(!engine.submit_flag("web", "flag2", flag("alice", "nope")).await.unwrap().correct);

    let summary = engine.summarize("alice").await.unwrap();
    assert_eq!((summary.labs[0].score, summary.labs[0].total), (1, 2));

    assert!(engine.submit_flag("web", "flag2", flag("alice", "CTF{ok}")).await.unwrap().correct);
    let summary = engine.summarize("alice").await.unwrap();
    assert_eq!((summary.labs[0].score, summary.labs[0].total), (2, 2));
}

#[tokio::test]
async fn e2e_journal_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    write_content(&dir.path().join("content"), 2);

    {
        let (engine, _) = engine(dir.path()).await;
        engine.submit_flag("web", "flag1", flag("alice", "CTF{hi}")).await.unwrap();
        engine
            .submit_exam_stage(
                "final",
                ExamSubmitRequest {
                    user_id: "alice".into(),
                    stage_id: "one".into(),
                    answers: [("tool".to_string(), "NMAP".to_string())].into(),
                },
            )
            .await
            .unwrap();
        engine
            .submit_exam_stage(
                "final",
                ExamSubmitRequest {
                    user_id: "alice".into(),
                    stage_id: "two".into(),
                    answers: [("essay".to_string(), "...".to_string())].into(),
                },
            )
            .await
            .unwrap();
        engine.set_final_score("final", "two", "alice", 7).await.unwrap();
    }

    let (engine, _) = engine(dir.path()).await;
    let status = engine.exam_status("final", "alice").await.unwrap();
    assert_eq!(status.total, Some(8));

    let err = engine.set_final_score("final", "two", "alice", 9).await.unwrap_err();
    assert!(matches!(err, GradeError::AlreadyGraded { .. }));

    let pivot = engine.build_pivot(&[UserIdentity::new("zed")]).await.unwrap();
    let csv = pivot_to_csv(&pivot);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "user_id,email,student_id,lab:web,quiz:net (2),exam:final (11)");
    assert_eq!(lines[1], "alice,,,1,,8");
    assert_eq!(lines[2], "zed,,,,,");
}

#[tokio::test]
async fn e2e_resync_changes_future_grading_only() {
    let dir = tempfile::tempdir().unwrap();
    let content = dir.path().join("content");
    write_content(&content, 2);
    let (engine, source) = engine(dir.path()).await;

    let answers = vec![QuizAnswer {
        question_id: "q1".into(),
        answer: "b".into(),
    }];
    let before = engine
        .submit_quiz(
            "net",
            QuizSubmitRequest {
                user_id: "alice".into(),
                answers: answers.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!((before.score, before.max_score), (2, 2));

    std::fs::write(content.join("quizzes/net.toml"), quiz_toml(5)).unwrap();
    engine.sync(&source).await.unwrap();

    let after = engine
        .submit_quiz(
            "net",
            QuizSubmitRequest {
                user_id: "alice".into(),
                answers,
            },
        )
        .await
        .unwrap();
    assert_eq!((after.score, after.max_score), (5, 5));

    let history = engine.export().await.unwrap();
    assert_eq!(history[0].as_quiz().unwrap().max_score, 2);
}

#[tokio::test]
async fn e2e_broken_resync_keeps_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let content = dir.path().join("content");
    write_content(&content, 2);
    let (engine, source) = engine(dir.path()).await;

    std::fs::write(
        content.join("labs/broken.toml"),
        "id = \"broken\"\ntitle = \"B\"\n[[flags]]\nname = \"f\"\nvalidator = \"nope\"\n",
    )
    .unwrap();
    let err = engine.sync(&source).await.unwrap_err();
    assert!(matches!(err, GradeError::Configuration(_)));

    assert_eq!(engine.catalog().current().label, "v1");
    assert!(engine.submit_flag("web", "flag1", flag("bob", "CTF{hi}")).await.unwrap().correct);
}

#[tokio::test]
async fn e2e_csv_export_files() {
    let dir = tempfile::tempdir().unwrap();
    write_content(&dir.path().join("content"), 2);
    let (engine, _) = engine(dir.path()).await;
    engine.submit_flag("web", "flag2", flag("bob", "CTF{x}")).await.unwrap();

    let pivot = engine.build_pivot(&[]).await.unwrap();
    let attempts = engine.export().await.unwrap();
    let written = write_csv_exports(&pivot, &attempts, &dir.path().join("export")).unwrap();
    assert_eq!(written.len(), 4);

    let labs = std::fs::read_to_string(dir.path().join("export/lab_submissions.csv")).unwrap();
    assert!(labs.starts_with("user_id,lab_id,flag_name,correct,submitted_at\n"));
    assert!(labs.contains("bob,web,flag2,true,"));
}

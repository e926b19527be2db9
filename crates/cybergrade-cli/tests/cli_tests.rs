//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cybergrade(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("cybergrade").unwrap();
    cmd.current_dir(dir)
        .env_remove("CYBERGRADE_CONTENT_ROOT")
        .env_remove("CYBERGRADE_JOURNAL")
        .env("HOME", dir);
    cmd
}

/// A temp dir with `cybergrade init` already run in it.
fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    cybergrade(dir.path()).arg("init").assert().success();
    dir
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    cybergrade(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created cybergrade.toml"))
        .stdout(predicate::str::contains("Created content/labs/web-101.toml"))
        .stdout(predicate::str::contains("Created content/exams/final.toml"));

    assert!(dir.path().join("cybergrade.toml").exists());
    assert!(dir.path().join("roster.toml").exists());
    assert!(dir.path().join("content/quizzes/net-basics.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("cybergrade.toml"), "# mine\n").unwrap();

    cybergrade(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("cybergrade.toml already exists, skipping."));

    let content = std::fs::read_to_string(dir.path().join("cybergrade.toml")).unwrap();
    assert_eq!(content, "# mine\n");
}

#[test]
fn validate_sample_content() {
    let dir = initialized();

    cybergrade(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 labs, 1 quizzes, 1 exams"))
        .stdout(predicate::str::contains("exam final (2 stages, 14 points)"))
        .stdout(predicate::str::contains("All content valid."));
}

#[test]
fn validate_reports_warnings() {
    let dir = initialized();
    std::fs::write(
        dir.path().join("content/labs/empty.toml"),
        "id = \"empty\"\ntitle = \"Nothing here\"\n",
    )
    .unwrap();

    cybergrade(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("[empty] WARNING: lab has no flags"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn validate_unknown_validator_fails() {
    let dir = initialized();
    std::fs::write(
        dir.path().join("content/labs/bad.toml"),
        r#"
id = "bad"
title = "Bad"

[[flags]]
name = "f"
validator = "telepathy"
"#,
    )
    .unwrap();

    cybergrade(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("telepathy"));
}

#[test]
fn validate_missing_content_root() {
    let dir = TempDir::new().unwrap();

    cybergrade(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("content root is not a directory"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();

    cybergrade(dir.path())
        .args(["--config", "nope.toml", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn submit_flag_prints_response() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "web-101", "--flag", "cookie"])
        .args(["--user", "alice", "--value", "CTF{cookie_monster}"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"correct\": true"))
        .stdout(predicate::str::contains("\"flag_name\": \"cookie\""));

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "web-101", "--flag", "sqli"])
        .args(["--user", "alice", "--value", "nope"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"correct\": false"));
}

#[test]
fn submit_flag_from_json_request() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "web-101", "--flag", "sqli"])
        .args(["--request", r#"{"user_id": "bob", "submission": "CTF{union_select}"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"user_id\": \"bob\""))
        .stdout(predicate::str::contains("\"correct\": true"));
}

#[test]
fn malformed_request_is_rejected() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "web-101", "--flag", "sqli"])
        .args(["--request", r#"{"user_id": "bob"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid request"));
}

#[test]
fn file_exists_flag_checks_artifacts() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "web-101", "--flag", "shell"])
        .args(["--user", "alice", "--value", "shell.php"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"correct\": false"));

    std::fs::write(
        dir.path().join("cybergrade-data/artifacts/web-101/shell.php"),
        "<?php system($_GET['c']); ?>",
    )
    .unwrap();

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "web-101", "--flag", "shell"])
        .args(["--user", "alice", "--value", "shell.php"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"correct\": true"));
}

#[test]
fn submit_unknown_lab_fails() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "nope", "--flag", "cookie"])
        .args(["--user", "alice", "--value", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lab not found: nope"));
}

#[test]
fn submit_quiz_scores_answers() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "quiz", "--quiz", "net-basics", "--user", "alice"])
        .args(["--answer", "https-port=b", "--answer", "sniffer= wireshark "])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\": 3"))
        .stdout(predicate::str::contains("\"max_score\": 3"));
}

#[test]
fn submit_quiz_rejects_bad_answer_syntax() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "quiz", "--quiz", "net-basics", "--user", "alice"])
        .args(["--answer", "https-port"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("QUESTION_ID=ANSWER"));
}

#[test]
fn exam_stage_out_of_order_is_rejected() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "exam", "--exam", "final", "--stage", "report"])
        .args(["--user", "alice", "--answer", "writeup=ssh keys"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked until 'recon'"));
}

#[test]
fn exam_flow_with_manual_grading() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "exam", "--exam", "final", "--stage", "recon"])
        .args(["--user", "alice", "--answer", "scanner=nmap", "--answer", "ssh-port=22"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\": 2"));

    cybergrade(dir.path())
        .args(["submit", "exam", "--exam", "final", "--stage", "report"])
        .args(["--user", "alice", "--answer", "writeup=found creds in backup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\": null"));

    cybergrade(dir.path())
        .args(["status", "--user", "alice", "--exam", "final"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending review"))
        .stdout(predicate::str::contains("submitted"));

    cybergrade(dir.path())
        .args(["grade", "--exam", "final", "--stage", "report", "--user", "alice"])
        .args(["--score", "11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid submission"));

    cybergrade(dir.path())
        .args(["grade", "--exam", "final", "--stage", "report", "--user", "alice"])
        .args(["--score", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\": 8"));

    cybergrade(dir.path())
        .args(["grade", "--exam", "final", "--stage", "report", "--user", "alice"])
        .args(["--score", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already graded"));

    cybergrade(dir.path())
        .args(["status", "--user", "alice", "--exam", "final"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total: 10/14"));
}

#[test]
fn grade_requires_a_target() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["grade", "--score", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--submission"));
}

#[test]
fn grade_rejects_malformed_submission_id() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["grade", "--submission", "not-a-uuid", "--score", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid submission id"));
}

#[test]
fn dashboard_shows_every_item() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "flag", "--lab", "web-101", "--flag", "cookie"])
        .args(["--user", "alice", "--value", "CTF{cookie_monster}"])
        .assert()
        .success();

    cybergrade(dir.path())
        .args(["dashboard", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web-101"))
        .stdout(predicate::str::contains("1/3"))
        .stdout(predicate::str::contains("net-basics"))
        .stdout(predicate::str::contains("recon: unlocked"));

    cybergrade(dir.path())
        .args(["dashboard", "--user", "alice", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"lab_id\": \"web-101\""))
        .stdout(predicate::str::contains("CTF{cookie_monster}").not());
}

#[test]
fn export_csv_includes_roster_users() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["submit", "quiz", "--quiz", "net-basics", "--user", "carol"])
        .args(["--answer", "https-port=a"])
        .assert()
        .success();

    cybergrade(dir.path())
        .args(["export", "--format", "csv", "--output", "out"])
        .assert()
        .success()
        .stderr(predicate::str::contains("scores.csv"));

    let scores = std::fs::read_to_string(dir.path().join("out/scores.csv")).unwrap();
    let lines: Vec<&str> = scores.lines().collect();
    assert_eq!(
        lines[0],
        "user_id,email,student_id,lab:web-101,quiz:net-basics (3),exam:final (14)"
    );
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "alice,alice@example.edu,S-1001,,,");
    assert_eq!(lines[3], "carol,,,,0,");

    assert!(dir.path().join("out/quiz_submissions.csv").exists());
    assert!(dir.path().join("out/lab_submissions.csv").exists());
    assert!(dir.path().join("out/exam_submissions.csv").exists());
}

#[test]
fn export_all_formats() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["export", "--format", "all", "--output", "out"])
        .assert()
        .success();

    for file in ["scores.csv", "scores.html", "scores.json", "submissions.json"] {
        assert!(dir.path().join("out").join(file).exists(), "missing {file}");
    }
}

#[test]
fn export_unknown_format_fails() {
    let dir = initialized();

    cybergrade(dir.path())
        .args(["export", "--format", "xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format: xlsx"));
}

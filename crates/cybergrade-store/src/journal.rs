//! JSON-lines submission journal.
//!
//! Every submission and every manual grading event is appended as one JSON
//! line. Opening a journal replays it into an in-memory
//! [`SubmissionLedger`], which then serves all reads.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_jsonlines::{AsyncJsonLinesWriter, JsonLinesReader};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use cybergrade_core::ledger::SubmissionLedger;
use cybergrade_core::results::Submission;
use cybergrade_core::traits::{FinalizeOutcome, SubmissionStore};

/// One line of the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    Submitted {
        submission: Submission,
    },
    Graded {
        submission_id: Uuid,
        score: u32,
        graded_at: DateTime<Utc>,
    },
}

/// Journal-backed [`SubmissionStore`].
pub struct JournalStore {
    path: PathBuf,
    ledger: SubmissionLedger,
    writer: Mutex<JournalWriter>,
}

impl JournalStore {
    /// Open (or create) the journal at `path` and replay it.
    ///
    /// A torn final line is cut off before the journal is reopened for
    /// appending, so later entries always start on a fresh line.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create journal directory: {}", parent.display()))?;
        }

        let ledger = SubmissionLedger::new();
        let replayed = match tokio::fs::read(&path).await {
            Ok(content) => replay(&ledger, &content, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Replay::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read journal: {}", path.display()))
            }
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open journal: {}", path.display()))?;
        let on_disk = file_len(&file).await?;
        if replayed.valid_len < on_disk {
            file.set_len(replayed.valid_len)
                .await
                .context("failed to truncate torn journal tail")?;
            tracing::warn!(
                journal = %path.display(),
                dropped_bytes = on_disk - replayed.valid_len,
                "truncated torn journal tail"
            );
        }
        if replayed.missing_newline {
            file.write_all(b"\n")
                .await
                .context("failed to terminate last journal line")?;
        }
        file.sync_data().await.context("failed to sync journal")?;
        let len = file_len(&file).await?;

        tracing::info!(
            journal = %path.display(),
            entries = replayed.applied,
            submissions = ledger.len(),
            "journal opened"
        );
        Ok(Self {
            path,
            ledger,
            writer: Mutex::new(JournalWriter {
                lines: AsyncJsonLinesWriter::new(file),
                len,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory view of the journal.
    pub fn ledger(&self) -> &SubmissionLedger {
        &self.ledger
    }
}

/// Append side of the journal.
struct JournalWriter {
    lines: AsyncJsonLinesWriter<File>,
    /// File length up to the end of the last complete entry.
    len: u64,
}

impl JournalWriter {
    /// Append and sync one entry. A failed write is cut back off the file.
    async fn write(&mut self, entry: &JournalEntry) -> Result<()> {
        match self.append_synced(entry).await {
            Ok(len) => {
                self.len = len;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.lines.get_mut().set_len(self.len).await {
                    tracing::error!("failed to roll back partial journal write: {rollback}");
                }
                Err(e)
            }
        }
    }

    async fn append_synced(&mut self, entry: &JournalEntry) -> Result<u64> {
        self.lines
            .write(entry)
            .await
            .context("failed to append to journal")?;
        self.lines.flush().await.context("failed to flush journal")?;
        let file = self.lines.get_mut();
        file.sync_data().await.context("failed to sync journal")?;
        file_len(file).await
    }
}

async fn file_len(file: &File) -> Result<u64> {
    Ok(file
        .metadata()
        .await
        .context("failed to stat journal")?
        .len())
}

/// Outcome of replaying a journal file.
#[derive(Debug, Default)]
struct Replay {
    applied: usize,
    /// Byte length of the journal without its torn tail.
    valid_len: u64,
    /// The last complete entry lost its line terminator.
    missing_newline: bool,
}

/// Apply journal lines to `ledger`.
///
/// A malformed final line is a torn write: it is skipped and left out of
/// [`Replay::valid_len`]. A malformed line anywhere else is an error.
fn replay(ledger: &SubmissionLedger, content: &[u8], path: &Path) -> Result<Replay> {
    let mut reader = JsonLinesReader::new(content);
    let mut valid = 0usize;
    let mut applied = 0;
    let mut number = 0;

    loop {
        number += 1;
        let result = reader.read::<JournalEntry>();
        let consumed = content.len() - reader.get_ref().len();
        let entry = match result {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(_) if content[valid..consumed].iter().all(u8::is_ascii_whitespace) => {
                valid = consumed;
                continue;
            }
            Err(e) if content[consumed..].iter().all(u8::is_ascii_whitespace) => {
                tracing::warn!("ignoring torn final line {number} of {}: {e}", path.display());
                break;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("corrupt journal line {number} in {}", path.display()))
            }
        };
        valid = consumed;

        match entry {
            JournalEntry::Submitted { submission } => ledger.record(submission),
            JournalEntry::Graded {
                submission_id,
                score,
                graded_at,
            } => {
                if !matches!(
                    ledger.finalize(submission_id, score, graded_at),
                    FinalizeOutcome::Finalized(_)
                ) {
                    tracing::warn!(
                        "journal line {number} grades unknown or graded submission {submission_id}"
                    );
                }
            }
        }
        applied += 1;
    }

    Ok(Replay {
        applied,
        valid_len: valid as u64,
        missing_newline: valid > 0 && content[valid - 1] != b'\n',
    })
}

#[async_trait]
impl SubmissionStore for JournalStore {
    async fn append(&self, submission: Submission) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let entry = JournalEntry::Submitted {
            submission: submission.clone(),
        };
        writer.write(&entry).await?;
        self.ledger.record(submission);
        Ok(())
    }

    async fn query(&self, user_id: &str, content_id: &str) -> Result<Vec<Submission>> {
        Ok(self.ledger.query(user_id, content_id))
    }

    async fn query_user(&self, user_id: &str) -> Result<Vec<Submission>> {
        Ok(self.ledger.query_user(user_id))
    }

    async fn all(&self) -> Result<Vec<Submission>> {
        Ok(self.ledger.all())
    }

    async fn users(&self) -> Result<Vec<String>> {
        Ok(self.ledger.users())
    }

    async fn get(&self, submission_id: Uuid) -> Result<Option<Submission>> {
        Ok(self.ledger.get(submission_id))
    }

    /// Writes go through the journal lock, so the graded check, the journal
    /// line and the ledger update happen as one step.
    async fn finalize_stage(
        &self,
        submission_id: Uuid,
        score: u32,
        graded_at: DateTime<Utc>,
    ) -> Result<FinalizeOutcome> {
        let mut writer = self.writer.lock().await;
        match self.ledger.get(submission_id) {
            Some(Submission::ExamStage(stage)) if stage.graded => {
                return Ok(FinalizeOutcome::AlreadyGraded(stage))
            }
            Some(Submission::ExamStage(_)) => {}
            _ => return Ok(FinalizeOutcome::NotFound),
        }

        let entry = JournalEntry::Graded {
            submission_id,
            score,
            graded_at,
        };
        writer.write(&entry).await?;
        Ok(self.ledger.finalize(submission_id, score, graded_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use cybergrade_core::results::{ExamStageSubmission, QuizSubmission};

    fn quiz(user: &str, score: u32) -> Submission {
        Submission::Quiz(QuizSubmission {
            id: Uuid::new_v4(),
            user_id: user.into(),
            quiz_id: "net".into(),
            answers: vec![],
            score,
            max_score: 5,
            submitted_at: Utc::now(),
        })
    }

    fn pending_stage(user: &str) -> Submission {
        Submission::ExamStage(ExamStageSubmission {
            id: Uuid::new_v4(),
            user_id: user.into(),
            exam_id: "final".into(),
            stage_id: "report".into(),
            answers: BTreeMap::new(),
            score: None,
            max_score: 10,
            submitted_at: Utc::now(),
            graded: false,
            graded_at: None,
        })
    }

    #[tokio::test]
    async fn submissions_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("journal.jsonl");

        let store = JournalStore::open(&path).await.unwrap();
        store.append(quiz("alice", 3)).await.unwrap();
        store.append(quiz("bob", 5)).await.unwrap();
        drop(store);

        let reopened = JournalStore::open(&path).await.unwrap();
        assert_eq!(reopened.all().await.unwrap().len(), 2);
        assert_eq!(reopened.users().await.unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn grading_event_is_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let pending = pending_stage("alice");
        let id = pending.id();
        let store = JournalStore::open(&path).await.unwrap();
        store.append(pending).await.unwrap();
        let outcome = store.finalize_stage(id, 7, Utc::now()).await.unwrap();
        assert!(matches!(outcome, FinalizeOutcome::Finalized(_)));
        drop(store);

        let reopened = JournalStore::open(&path).await.unwrap();
        let stage = reopened.get(id).await.unwrap().unwrap();
        assert_eq!(stage.as_exam_stage().unwrap().score, Some(7));
        assert!(matches!(
            reopened.finalize_stage(id, 1, Utc::now()).await.unwrap(),
            FinalizeOutcome::AlreadyGraded(_)
        ));
    }

    #[tokio::test]
    async fn concurrent_finalize_writes_one_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let store = Arc::new(JournalStore::open(&path).await.unwrap());
        let pending = pending_stage("alice");
        let id = pending.id();
        store.append(pending).await.unwrap();

        let tasks: Vec<_> = (0..5)
            .map(|score| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.finalize_stage(id, score, Utc::now()).await })
            })
            .collect();
        let mut wins = 0;
        for task in tasks {
            if matches!(task.await.unwrap().unwrap(), FinalizeOutcome::Finalized(_)) {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().filter(|l| l.contains(r#""event":"graded""#)).count(), 1);
    }

    #[tokio::test]
    async fn torn_final_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let store = JournalStore::open(&path).await.unwrap();
        store.append(quiz("alice", 1)).await.unwrap();
        drop(store);

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"event\":\"submitted\",\"submi");
        std::fs::write(&path, content).unwrap();

        let reopened = JournalStore::open(&path).await.unwrap();
        assert_eq!(reopened.ledger().len(), 1);
    }

    #[tokio::test]
    async fn appends_after_torn_tail_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let store = JournalStore::open(&path).await.unwrap();
        store.append(quiz("alice", 1)).await.unwrap();
        drop(store);

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"event\":\"submitted\",\"submi");
        std::fs::write(&path, content).unwrap();

        let store = JournalStore::open(&path).await.unwrap();
        store.append(quiz("bob", 2)).await.unwrap();
        assert_eq!(store.ledger().len(), 2);
        drop(store);

        let store = JournalStore::open(&path).await.unwrap();
        assert_eq!(store.users().await.unwrap(), vec!["alice", "bob"]);
        store.append(quiz("carol", 3)).await.unwrap();
        drop(store);

        let reopened = JournalStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.users().await.unwrap(),
            vec!["alice", "bob", "carol"]
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("\"submi\n"));
        assert_eq!(content.lines().count(), 3);
        assert!(content.ends_with('\n'));
    }

    #[tokio::test]
    async fn unterminated_final_entry_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let good = serde_json::to_string(&JournalEntry::Submitted {
            submission: quiz("alice", 1),
        })
        .unwrap();
        std::fs::write(&path, good).unwrap();

        let store = JournalStore::open(&path).await.unwrap();
        assert_eq!(store.ledger().len(), 1);
        store.append(quiz("bob", 2)).await.unwrap();
        drop(store);

        let reopened = JournalStore::open(&path).await.unwrap();
        assert_eq!(reopened.users().await.unwrap(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let first = serde_json::to_string(&JournalEntry::Submitted {
            submission: quiz("alice", 1),
        })
        .unwrap();
        let second = serde_json::to_string(&JournalEntry::Submitted {
            submission: quiz("bob", 1),
        })
        .unwrap();
        std::fs::write(&path, format!("{first}\n\n{second}\n\n")).unwrap();

        let store = JournalStore::open(&path).await.unwrap();
        assert_eq!(store.ledger().len(), 2);
    }

    #[tokio::test]
    async fn corrupt_middle_line_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let good = serde_json::to_string(&JournalEntry::Submitted {
            submission: quiz("alice", 1),
        })
        .unwrap();
        std::fs::write(&path, format!("not json\n{good}\n")).unwrap();

        let err = JournalStore::open(&path).await.err().unwrap();
        assert!(format!("{err:#}").contains("corrupt journal line 1"));
    }

    #[tokio::test]
    async fn finalize_unknown_or_wrong_kind_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JournalStore::open(dir.path().join("j.jsonl")).await.unwrap();
        let q = quiz("alice", 1);
        let id = q.id();
        store.append(q).await.unwrap();
        assert!(matches!(
            store.finalize_stage(id, 1, Utc::now()).await.unwrap(),
            FinalizeOutcome::NotFound
        ));
        assert!(matches!(
            store.finalize_stage(Uuid::new_v4(), 1, Utc::now()).await.unwrap(),
            FinalizeOutcome::NotFound
        ));
    }
}

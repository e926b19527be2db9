//! Append-only submission ledger and best-score derivation.
//!
//! [`SubmissionLedger`] is the in-memory reference implementation of
//! [`SubmissionStore`]. Writes are serialized per (user, content item) key;
//! unrelated keys never contend with each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::LabDefinition;
use crate::results::{LedgerKey, Submission};
use crate::traits::{FinalizeOutcome, SubmissionStore};

type Shard = Arc<Mutex<Vec<(u64, Submission)>>>;

/// In-memory append-only ledger.
#[derive(Default)]
pub struct SubmissionLedger {
    shards: RwLock<HashMap<LedgerKey, Shard>>,
    index: RwLock<HashMap<Uuid, LedgerKey>>,
    sequence: AtomicU64,
}

impl SubmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, key: &LedgerKey) -> Option<Shard> {
        self.shards.read().get(key).cloned()
    }

    fn shard_or_create(&self, key: &LedgerKey) -> Shard {
        if let Some(shard) = self.shard(key) {
            return shard;
        }
        Arc::clone(self.shards.write().entry(key.clone()).or_default())
    }

    /// Append a submission.
    pub fn record(&self, submission: Submission) {
        let key = submission.key();
        let id = submission.id();
        let shard = self.shard_or_create(&key);
        let mut entries = shard.lock();
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        entries.push((seq, submission));
        self.index.write().insert(id, key);
    }

    /// All attempts for one (user, content item), oldest first.
    pub fn query(&self, user_id: &str, content_id: &str) -> Vec<Submission> {
        self.shard(&LedgerKey::new(user_id, content_id))
            .map(|shard| shard.lock().iter().map(|(_, s)| s.clone()).collect())
            .unwrap_or_default()
    }

    /// All attempts by one user, in record order.
    pub fn query_user(&self, user_id: &str) -> Vec<Submission> {
        let shards: Vec<Shard> = self
            .shards
            .read()
            .iter()
            .filter(|(k, _)| k.user_id == user_id)
            .map(|(_, s)| Arc::clone(s))
            .collect();
        collect_ordered(&shards)
    }

    /// Every recorded attempt, in record order.
    pub fn all(&self) -> Vec<Submission> {
        let shards: Vec<Shard> = self.shards.read().values().cloned().collect();
        collect_ordered(&shards)
    }

    /// Every user with at least one attempt, sorted.
    pub fn users(&self) -> Vec<String> {
        self.shards
            .read()
            .keys()
            .map(|k| k.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn get(&self, submission_id: Uuid) -> Option<Submission> {
        let key = self.index.read().get(&submission_id).cloned()?;
        let shard = self.shard(&key)?;
        let entries = shard.lock();
        entries
            .iter()
            .find(|(_, s)| s.id() == submission_id)
            .map(|(_, s)| s.clone())
    }

    /// Move a pending exam-stage submission to graded.
    ///
    /// The check and the write happen under the key's lock, so of several
    /// concurrent callers exactly one sees [`FinalizeOutcome::Finalized`].
    pub fn finalize(
        &self,
        submission_id: Uuid,
        score: u32,
        graded_at: DateTime<Utc>,
    ) -> FinalizeOutcome {
        let Some(key) = self.index.read().get(&submission_id).cloned() else {
            return FinalizeOutcome::NotFound;
        };
        let Some(shard) = self.shard(&key) else {
            return FinalizeOutcome::NotFound;
        };
        let mut entries = shard.lock();
        let Some(Submission::ExamStage(stage)) = entries
            .iter_mut()
            .map(|(_, s)| s)
            .find(|s| s.id() == submission_id)
        else {
            return FinalizeOutcome::NotFound;
        };
        if stage.graded {
            return FinalizeOutcome::AlreadyGraded(stage.clone());
        }
        stage.score = Some(score);
        stage.graded = true;
        stage.graded_at = Some(graded_at);
        FinalizeOutcome::Finalized(stage.clone())
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn collect_ordered(shards: &[Shard]) -> Vec<Submission> {
    let mut entries: Vec<(u64, Submission)> = shards
        .iter()
        .flat_map(|shard| shard.lock().clone())
        .collect();
    entries.sort_by_key(|(seq, _)| *seq);
    entries.into_iter().map(|(_, s)| s).collect()
}

#[async_trait]
impl SubmissionStore for SubmissionLedger {
    async fn append(&self, submission: Submission) -> anyhow::Result<()> {
        self.record(submission);
        Ok(())
    }

    async fn query(&self, user_id: &str, content_id: &str) -> anyhow::Result<Vec<Submission>> {
        Ok(SubmissionLedger::query(self, user_id, content_id))
    }

    async fn query_user(&self, user_id: &str) -> anyhow::Result<Vec<Submission>> {
        Ok(SubmissionLedger::query_user(self, user_id))
    }

    async fn all(&self) -> anyhow::Result<Vec<Submission>> {
        Ok(SubmissionLedger::all(self))
    }

    async fn users(&self) -> anyhow::Result<Vec<String>> {
        Ok(SubmissionLedger::users(self))
    }

    async fn get(&self, submission_id: Uuid) -> anyhow::Result<Option<Submission>> {
        Ok(SubmissionLedger::get(self, submission_id))
    }

    async fn finalize_stage(
        &self,
        submission_id: Uuid,
        score: u32,
        graded_at: DateTime<Utc>,
    ) -> anyhow::Result<FinalizeOutcome> {
        Ok(self.finalize(submission_id, score, graded_at))
    }
}

// ---------------------------------------------------------------------------
// Best-score rules
// ---------------------------------------------------------------------------

/// Flag-level lab progress for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabScore {
    /// Names of flags with at least one correct attempt.
    pub solved: BTreeSet<String>,
    pub score: u32,
    pub total: u32,
}

/// A flag counts once it has any correct attempt; later wrong attempts never
/// take it away. Only flags in the current definition count.
pub fn best_lab_score(lab: &LabDefinition, attempts: &[Submission]) -> LabScore {
    let solved: BTreeSet<String> = attempts
        .iter()
        .filter_map(Submission::as_flag)
        .filter(|a| a.lab_id == lab.id && a.correct)
        .filter(|a| lab.flags.iter().any(|f| f.name == a.flag_name))
        .map(|a| a.flag_name.clone())
        .collect();
    LabScore {
        score: solved.len() as u32,
        total: lab.flags.len() as u32,
        solved,
    }
}

/// Highest score over all attempts at a quiz, or `None` without attempts.
pub fn best_quiz_score(quiz_id: &str, attempts: &[Submission]) -> Option<u32> {
    attempts
        .iter()
        .filter_map(Submission::as_quiz)
        .filter(|a| a.quiz_id == quiz_id)
        .map(|a| a.score)
        .max()
}

/// Highest graded score for one exam stage. Pending manual attempts are
/// ignored.
pub fn best_stage_score(exam_id: &str, stage_id: &str, attempts: &[Submission]) -> Option<u32> {
    attempts
        .iter()
        .filter_map(Submission::as_exam_stage)
        .filter(|a| a.exam_id == exam_id && a.stage_id == stage_id && a.graded)
        .filter_map(|a| a.score)
        .max()
}

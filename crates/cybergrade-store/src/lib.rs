//! cybergrade-store: persistence and artifact collaborators.
//!
//! [`JournalStore`] keeps every submission in an append-only JSON-lines file
//! and serves reads from an in-memory ledger. [`LocalArtifacts`] answers
//! `file_exists` flag lookups from a directory tree.

pub mod artifacts;
pub mod journal;

pub use artifacts::LocalArtifacts;
pub use journal::{JournalEntry, JournalStore};

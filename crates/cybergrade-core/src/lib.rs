//! cybergrade-core: submission validation, scoring and progression.
//!
//! This crate holds the content model, the grading rules for flags, quizzes
//! and exam stages, the append-only submission ledger and the dashboard and
//! export rollups. Content loading, persistence and artifact lookup are
//! collaborators behind the traits in [`traits`].

pub mod catalog;
pub mod engine;
pub mod error;
pub mod exam;
pub mod flag;
pub mod ledger;
pub mod model;
pub mod quiz;
pub mod report;
pub mod results;
pub mod traits;

pub use catalog::{ContentCatalog, SyncReport};
pub use engine::GradingEngine;
pub use error::{EntityKind, GradeError};
pub use ledger::SubmissionLedger;
pub use model::ContentVersion;

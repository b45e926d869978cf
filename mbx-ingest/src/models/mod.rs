//! Data models for ingestion runs

pub mod run_id;
pub mod run_report;

pub use run_id::RunId;
pub use run_report::{IssueSeverity, ItemIssue, KindStats, Rejection, RunPhase, RunSummary};

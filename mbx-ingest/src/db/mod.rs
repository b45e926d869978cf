//! Persistence collaborators
//!
//! The pipeline hands accepted records to a [`RecordSink`] and reports run
//! outcomes to a [`StatusStore`]. Both are traits so the job runner and
//! tests can supply their own; the SQLite implementations here are the
//! reference stores used by the binary.

pub mod records;
pub mod runs;

use crate::models::{RunId, RunSummary};
use async_trait::async_trait;
use mbx_common::records::{RecordBatch, RecordKind};
use mbx_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use records::SqliteRecordStore;
pub use runs::SqliteStatusStore;

/// Accepts validated records for bulk insert
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert every record of `batch` under `run_id` atomically.
    /// Returns the number of rows written per kind.
    async fn insert_batch(
        &self,
        run_id: &RunId,
        batch: &RecordBatch,
    ) -> Result<BTreeMap<RecordKind, usize>>;

    /// Stored records of `kind` for `run_id`
    async fn count(&self, run_id: &RunId, kind: RecordKind) -> Result<usize>;
}

/// Status contract for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: String,
    pub processed: bool,
    pub error_message: Option<String>,
    /// Summary of the last successful run
    pub summary: Option<RunSummary>,
    pub updated_at: Option<String>,
}

/// Run status keyed by run identifier
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Reset the run to `processed = false` with no error
    async fn mark_started(&self, run_id: &RunId) -> Result<()>;

    async fn mark_succeeded(&self, run_id: &RunId, summary: &RunSummary) -> Result<()>;

    /// Record a fatal error; `processed` stays false
    async fn mark_failed(&self, run_id: &RunId, error_message: &str) -> Result<()>;

    async fn get(&self, run_id: &RunId) -> Result<Option<RunStatus>>;
}

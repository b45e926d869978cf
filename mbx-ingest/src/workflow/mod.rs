//! Ingestion run orchestrator
//!
//! Drives one backup container through every stage of a run.
//!
//! # Phase Progression
//! STAGING → UNWRAPPING → CATEGORIZING → DECODING → PROSPECTING → STORING → FINALIZING
//!
//! Each phase lives in its own `phase_*` module as an `impl IngestPipeline`
//! block:
//!
//! - **STAGING** / **UNWRAPPING** (`phase_unwrap`): stream the upload into
//!   the run directory, convert it to tar and extract it safely
//! - **CATEGORIZING** (`phase_categorize`): bucket every extracted file
//! - **DECODING** (`phase_decode`): vCard, SMS blob, package and JSON dump
//!   decoders, run in parallel per file
//! - **PROSPECTING** (`phase_prospect`): heuristic scan of embedded databases
//! - **STORING** (`phase_store`): copy files to the object store and attach
//!   references to records
//! - **FINALIZING** (`phase_finalize`): normalize, deduplicate, validate and
//!   hand the accepted batch to the record sink
//!
//! Phases hand plain values to each other. The working directory is removed
//! when the run ends, whether it succeeded or not. Cancellation is checked
//! between phases and while waiting on long I/O.

use crate::config::IngestConfig;
use crate::db::RecordSink;
use crate::error::{IngestError, IngestResult};
use crate::models::{RunId, RunPhase, RunSummary};
use crate::services::ContainerUnwrapper;
use crate::storage::ObjectStore;
use mbx_common::config::IngestSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod phase_categorize;
mod phase_decode;
mod phase_finalize;
mod phase_prospect;
mod phase_store;
mod phase_unwrap;
pub mod statistics;

pub use phase_decode::{route_file, DecodedFiles, Decoder};
pub use statistics::RunStatistics;

/// Staged upload inside the run directory
const CONTAINER_FILE: &str = "container.ab";
/// Converted archive inside the run directory
const ARCHIVE_FILE: &str = "archive.tar";
/// Extraction root inside the run directory
const EXTRACT_DIR: &str = "extracted";

/// Ingestion pipeline with its injected collaborators
pub struct IngestPipeline {
    settings: IngestSettings,
    work_root: PathBuf,
    unwrapper: Arc<dyn ContainerUnwrapper>,
    object_store: Arc<dyn ObjectStore>,
    sink: Arc<dyn RecordSink>,
}

impl IngestPipeline {
    pub fn new(
        config: &IngestConfig,
        unwrapper: Arc<dyn ContainerUnwrapper>,
        object_store: Arc<dyn ObjectStore>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            settings: config.settings.clone(),
            work_root: config.work_root.clone(),
            unwrapper,
            object_store,
            sink,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Run the pipeline over a container already on disk
    pub async fn run(
        &self,
        run_id: &RunId,
        container: &Path,
        cancel_token: &CancellationToken,
    ) -> IngestResult<RunSummary> {
        let file = match tokio::fs::File::open(container).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::EmptyInput(format!(
                    "container not found: {}",
                    container.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        self.run_from_reader(run_id, file, cancel_token).await
    }

    /// Run the pipeline over an uploaded byte stream
    pub async fn run_from_reader<R>(
        &self,
        run_id: &RunId,
        reader: R,
        cancel_token: &CancellationToken,
    ) -> IngestResult<RunSummary>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();
        let mut summary = RunSummary::new(run_id.as_str());

        tokio::fs::create_dir_all(&self.work_root).await?;
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{}-", run_id))
            .tempdir_in(&self.work_root)?;

        info!(run_id = %run_id, workdir = %workdir.path().display(), "Starting ingestion run");

        let result = self
            .execute(run_id, workdir.path(), reader, &mut summary, cancel_token)
            .await;

        let workdir_path = workdir.path().to_path_buf();
        if let Err(e) = workdir.close() {
            warn!(
                run_id = %run_id,
                workdir = %workdir_path.display(),
                error = %e,
                "Failed to remove run working directory"
            );
        }

        result?;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            persisted = summary.total_persisted(),
            issues = summary.issues.len(),
            rejections = summary.rejections.len(),
            elapsed_ms = summary.elapsed_ms,
            "Ingestion run completed"
        );
        Ok(summary)
    }

    async fn execute<R>(
        &self,
        run_id: &RunId,
        workdir: &Path,
        reader: R,
        summary: &mut RunSummary,
        cancel_token: &CancellationToken,
    ) -> IngestResult<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.phase_staging(run_id, workdir, reader, summary, cancel_token)
            .await?;
        ensure_active(cancel_token, RunPhase::Unwrapping)?;

        let extract_dir = self
            .phase_unwrapping(run_id, workdir, summary, cancel_token)
            .await?;
        ensure_active(cancel_token, RunPhase::Categorizing)?;

        let files = self
            .phase_categorizing(run_id, &extract_dir, summary)
            .await?;
        ensure_active(cancel_token, RunPhase::Decoding)?;

        let decoded = self
            .phase_decoding(run_id, &files, summary)
            .await?;
        ensure_active(cancel_token, RunPhase::Prospecting)?;

        let prospect = self
            .phase_prospecting(run_id, &extract_dir, summary, cancel_token)
            .await?;
        ensure_active(cancel_token, RunPhase::Storing)?;

        let stored = self
            .phase_storing(
                run_id,
                &files,
                &prospect.databases,
                decoded.packages,
                summary,
                cancel_token,
            )
            .await?;
        ensure_active(cancel_token, RunPhase::Finalizing)?;

        let mut batch = decoded.batch;
        batch.merge(prospect.batch);
        batch.merge(stored);

        self.phase_finalizing(run_id, batch, decoded.vcard_contacts, summary, cancel_token)
            .await
    }
}

/// Fail with `Cancelled` once the token fires
fn ensure_active(cancel_token: &CancellationToken, next: RunPhase) -> IngestResult<()> {
    if cancel_token.is_cancelled() {
        info!(phase = %next, "Run cancelled before phase");
        return Err(IngestError::Cancelled);
    }
    Ok(())
}

/// Map a failed blocking task to an internal error
fn join_error(task: &str, e: tokio::task::JoinError) -> IngestError {
    IngestError::Internal(format!("{} task failed: {}", task, e))
}

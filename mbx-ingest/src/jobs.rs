//! Background job runner
//!
//! Runs ingestion off the caller's path. Every run gets a cancellation
//! token registered under its run id and a wall-clock limit; the outcome is
//! written to the status store as `processed` / `error_message` plus the
//! serialized run summary.

use crate::db::StatusStore;
use crate::error::{IngestError, IngestResult};
use crate::models::{RunId, RunSummary};
use crate::workflow::IngestPipeline;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Dispatches ingestion runs and records their status
#[derive(Clone)]
pub struct JobRunner {
    pipeline: Arc<IngestPipeline>,
    status: Arc<dyn StatusStore>,
    /// Cancellation tokens for active runs
    cancellation_tokens: Arc<RwLock<HashMap<RunId, CancellationToken>>>,
    timeout: Duration,
}

impl JobRunner {
    pub fn new(pipeline: Arc<IngestPipeline>, status: Arc<dyn StatusStore>, timeout: Duration) -> Self {
        Self {
            pipeline,
            status,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    /// Start a run on a background task
    pub fn dispatch(&self, run_id: RunId, container: PathBuf) -> JoinHandle<IngestResult<RunSummary>> {
        let runner = self.clone();
        tokio::spawn(async move {
            info!(run_id = %run_id, "Background ingestion task started");
            runner.run_to_completion(&run_id, &container).await
        })
    }

    /// Run inline and record the outcome
    pub async fn run_to_completion(&self, run_id: &RunId, container: &Path) -> IngestResult<RunSummary> {
        self.status.mark_started(run_id).await?;

        let token = CancellationToken::new();
        self.cancellation_tokens
            .write()
            .await
            .insert(run_id.clone(), token.clone());

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.pipeline.run(run_id, container, &token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                Err(IngestError::Timeout(self.timeout.as_secs()))
            }
        };

        self.cancellation_tokens.write().await.remove(run_id);

        match &outcome {
            Ok(summary) => {
                self.status.mark_succeeded(run_id, summary).await?;
                info!(run_id = %run_id, persisted = summary.total_persisted(), "Ingestion run succeeded");
            }
            Err(e) => {
                error!(run_id = %run_id, code = e.code(), error = %e, "Ingestion run failed");
                if let Err(status_error) = self.status.mark_failed(run_id, &e.to_string()).await {
                    error!(run_id = %run_id, error = %status_error, "Failed to record run failure");
                }
            }
        }
        outcome
    }

    /// Signal cancellation; false when no such run is active
    pub async fn cancel(&self, run_id: &RunId) -> bool {
        match self.cancellation_tokens.read().await.get(run_id) {
            Some(token) => {
                info!(run_id = %run_id, "Cancelling ingestion run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn active_runs(&self) -> Vec<RunId> {
        let mut runs: Vec<RunId> = self.cancellation_tokens.read().await.keys().cloned().collect();
        runs.sort();
        runs
    }
}

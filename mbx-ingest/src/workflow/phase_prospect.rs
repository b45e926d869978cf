//! PROSPECTING phase

use super::IngestPipeline;
use crate::error::{IngestError, IngestResult};
use crate::models::{RunId, RunSummary};
use crate::prospector::{DatabaseProspector, ProspectResult};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

impl IngestPipeline {
    /// **Phase 4: PROSPECTING** - classify tables of every embedded database
    pub(super) async fn phase_prospecting(
        &self,
        run_id: &RunId,
        extract_dir: &Path,
        summary: &mut RunSummary,
        cancel_token: &CancellationToken,
    ) -> IngestResult<ProspectResult> {
        info!(run_id = %run_id, "Phase 4: PROSPECTING - scanning embedded databases");

        let prospector = DatabaseProspector::from_settings(&self.settings);
        let mut result = tokio::select! {
            result = prospector.prospect(extract_dir) => result?,
            _ = cancel_token.cancelled() => return Err(IngestError::Cancelled),
        };

        let stats = &mut summary.statistics.prospecting;
        stats.databases_found = result.databases.len();
        stats.tables_scanned = result.tables_scanned;
        stats.tables_classified = result.tables_classified.clone();
        stats.rows_dropped = result.rows_dropped;

        summary.issues.append(&mut result.issues);

        info!(
            run_id = %run_id,
            "PROSPECTING complete: {}",
            summary.statistics.prospecting.display_string()
        );
        Ok(result)
    }
}

//! CATEGORIZING phase

use super::{join_error, IngestPipeline};
use crate::error::{IngestError, IngestResult};
use crate::models::{RunId, RunSummary};
use crate::services::FileCategorizer;
use mbx_common::records::ExtractedFile;
use std::path::Path;
use tracing::info;

impl IngestPipeline {
    /// **Phase 2: CATEGORIZING** - bucket every extracted file
    ///
    /// Returns the non-empty files sorted by relative path.
    pub(super) async fn phase_categorizing(
        &self,
        run_id: &RunId,
        extract_dir: &Path,
        summary: &mut RunSummary,
    ) -> IngestResult<Vec<ExtractedFile>> {
        info!(run_id = %run_id, "Phase 2: CATEGORIZING - classifying extracted files");

        let root = extract_dir.to_path_buf();
        let result = tokio::task::spawn_blocking(move || FileCategorizer::new().categorize(&root))
            .await
            .map_err(|e| join_error("categorizer", e))?
            .map_err(|e| IngestError::Internal(format!("categorizing extracted tree: {}", e)))?;

        let stats = &mut summary.statistics.categorizing;
        stats.files_categorized = result.files.len();
        stats.zero_byte_files = result.zero_byte_files;
        stats.unreadable_files = result.issues.len();

        summary.category_counts = result.counts;
        summary.zero_byte_files = result.zero_byte_files;
        summary.issues.extend(result.issues);

        for (category, count) in &summary.category_counts {
            info!(run_id = %run_id, category = %category, count, "Category count");
        }
        info!(
            run_id = %run_id,
            "CATEGORIZING complete: {}",
            summary.statistics.categorizing.display_string()
        );
        Ok(result.files)
    }
}

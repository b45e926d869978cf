//! STAGING and UNWRAPPING phases

use super::{join_error, IngestPipeline, ARCHIVE_FILE, CONTAINER_FILE, EXTRACT_DIR};
use crate::error::{IngestError, IngestResult};
use crate::models::{RunId, RunSummary};
use crate::services::extract_tar;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl IngestPipeline {
    /// **Phase 0: STAGING** - stream the upload into the run directory
    pub(super) async fn phase_staging<R>(
        &self,
        run_id: &RunId,
        workdir: &Path,
        mut reader: R,
        summary: &mut RunSummary,
        cancel_token: &CancellationToken,
    ) -> IngestResult<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        info!(run_id = %run_id, "Phase 0: STAGING - receiving container");

        let container = workdir.join(CONTAINER_FILE);
        let mut file = tokio::fs::File::create(&container).await?;

        let bytes = tokio::select! {
            copied = tokio::io::copy(&mut reader, &mut file) => copied?,
            _ = cancel_token.cancelled() => return Err(IngestError::Cancelled),
        };
        file.flush().await?;

        if bytes == 0 {
            return Err(IngestError::EmptyInput("uploaded container is empty".into()));
        }

        summary.statistics.staging.bytes_received = bytes;
        info!(
            run_id = %run_id,
            "STAGING complete: {}",
            summary.statistics.staging.display_string()
        );
        Ok(())
    }

    /// **Phase 1: UNWRAPPING** - convert the container and extract the tree
    ///
    /// Returns the extraction root. The staged container and the intermediate
    /// archive are deleted once they are no longer needed.
    pub(super) async fn phase_unwrapping(
        &self,
        run_id: &RunId,
        workdir: &Path,
        summary: &mut RunSummary,
        cancel_token: &CancellationToken,
    ) -> IngestResult<PathBuf> {
        let container = workdir.join(CONTAINER_FILE);
        let tar_path = workdir.join(ARCHIVE_FILE);
        let extract_dir = workdir.join(EXTRACT_DIR);

        info!(
            run_id = %run_id,
            unwrapper = self.unwrapper.name(),
            "Phase 1: UNWRAPPING - converting container"
        );

        tokio::select! {
            converted = self.unwrapper.unwrap_to_tar(&container, &tar_path) => converted?,
            _ = cancel_token.cancelled() => return Err(IngestError::Cancelled),
        }
        tokio::fs::remove_file(&container).await?;

        let (archive, output) = (tar_path.clone(), extract_dir.clone());
        let stats = tokio::task::spawn_blocking(move || extract_tar(&archive, &output))
            .await
            .map_err(|e| join_error("extraction", e))??;

        if let Err(e) = tokio::fs::remove_file(&tar_path).await {
            debug!(run_id = %run_id, error = %e, "Could not remove intermediate archive");
        }

        if stats.files == 0 {
            return Err(IngestError::EmptyArchive);
        }

        let unwrapping = &mut summary.statistics.unwrapping;
        unwrapping.unwrapper = self.unwrapper.name().to_string();
        unwrapping.files_extracted = stats.files;
        unwrapping.directories = stats.directories;
        unwrapping.skipped_entries = stats.skipped_entries;
        unwrapping.bytes_extracted = stats.bytes;

        info!(run_id = %run_id, "UNWRAPPING complete: {}", unwrapping.display_string());
        Ok(extract_dir)
    }
}

//! STORING phase

use super::IngestPipeline;
use crate::error::{IngestError, IngestResult};
use crate::extractors::MediaStorer;
use crate::models::{RunId, RunSummary};
use crate::prospector::SniffedDatabase;
use mbx_common::records::{AppRecord, ExtractedFile, RawDatabaseFile, RecordBatch};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl IngestPipeline {
    /// **Phase 5: STORING** - copy files to the object store
    ///
    /// Returns the passthrough records (media, documents, raw databases) and
    /// the package records with their installer references attached.
    /// Sniffed databases outside the database category get a raw database
    /// record as well.
    pub(super) async fn phase_storing(
        &self,
        run_id: &RunId,
        files: &[ExtractedFile],
        databases: &[SniffedDatabase],
        packages: Vec<(PathBuf, AppRecord)>,
        summary: &mut RunSummary,
        cancel_token: &CancellationToken,
    ) -> IngestResult<RecordBatch> {
        info!(
            run_id = %run_id,
            files = files.len(),
            "Phase 5: STORING - copying files to object store"
        );

        let mut storer = MediaStorer::new(run_id.as_str(), Arc::clone(&self.object_store));
        let mut stored = tokio::select! {
            stored = storer.store_all(files) => stored,
            _ = cancel_token.cancelled() => return Err(IngestError::Cancelled),
        };

        let mut batch = std::mem::take(&mut stored.batch);

        let recorded: HashSet<PathBuf> = batch
            .raw_databases
            .iter()
            .map(|db| db.relative_path.clone())
            .collect();
        let added_at = mbx_common::time::now();
        for db in databases {
            if recorded.contains(&db.relative_path) {
                continue;
            }
            let Some(object_ref) = stored.reference(&db.relative_path) else {
                continue;
            };
            debug!(file = %db.relative_path.display(), kind = db.db_kind.as_str(), "Recording sniffed database");
            batch.raw_databases.push(RawDatabaseFile {
                relative_path: db.relative_path.clone(),
                size_bytes: db.size_bytes,
                db_kind: db.db_kind,
                object_ref: object_ref.to_string(),
                added_at,
            });
        }

        let mut linked = 0;
        for (path, mut app) in packages {
            app.apk_ref = stored.reference(&path).map(str::to_string);
            if app.apk_ref.is_some() {
                linked += 1;
            }
            batch.apps.push(app);
        }

        let stats = &mut summary.statistics.storing;
        stats.objects_stored = stored.refs.len();
        stats.upload_failures = stored.issues.len();
        stats.packages_linked = linked;
        summary.issues.extend(stored.issues);

        info!(
            run_id = %run_id,
            "STORING complete: {}",
            summary.statistics.storing.display_string()
        );
        Ok(batch)
    }
}

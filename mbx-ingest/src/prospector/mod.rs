//! Embedded database prospector
//!
//! Finds every SQLite database in an extracted tree by its file signature
//! (extension is ignored), samples each table and classifies it by column
//! names. Classified tables yield records through the shared heuristics.
//!
//! A corrupt database or an unreadable table becomes an item issue; the
//! prospector itself never fails on bad input. Databases are scanned
//! concurrently, each on its own read-only connection, and per-file results
//! are merged in path order once all scans finish.

pub mod classify;
pub mod table_reader;

pub use classify::{classify_columns, extract_rows, TableKind};
pub use table_reader::{read_database, DatabaseScan, TableSample};

use crate::error::{IngestError, IngestResult};
use crate::extractors::media::{read_file_header, HEADER_BYTES};
use crate::models::ItemIssue;
use futures::stream::{self, StreamExt};
use mbx_common::config::IngestSettings;
use mbx_common::records::{DbKind, RecordBatch};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file whose header matched a database signature
#[derive(Debug, Clone, PartialEq)]
pub struct SniffedDatabase {
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    pub db_kind: DbKind,
}

/// Outcome of prospecting one tree
#[derive(Debug, Clone, Default)]
pub struct ProspectResult {
    pub batch: RecordBatch,
    /// Every sniffed database, SQLite or not, sorted by path
    pub databases: Vec<SniffedDatabase>,
    pub tables_scanned: usize,
    pub tables_classified: BTreeMap<TableKind, usize>,
    pub rows_dropped: usize,
    pub issues: Vec<ItemIssue>,
}

/// Result for one database file, merged by the caller
#[derive(Debug, Default)]
struct FileProspect {
    batch: RecordBatch,
    tables_scanned: usize,
    tables_classified: BTreeMap<TableKind, usize>,
    rows_dropped: usize,
    issues: Vec<ItemIssue>,
}

pub struct DatabaseProspector {
    max_rows: usize,
    max_concurrent: usize,
}

impl DatabaseProspector {
    pub fn new(max_rows: usize, max_concurrent: usize) -> Self {
        Self {
            max_rows: max_rows.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn from_settings(settings: &IngestSettings) -> Self {
        Self::new(settings.max_table_rows, settings.max_concurrent_databases)
    }

    /// Find files carrying a database signature under `root`
    pub fn sniff(root: &Path) -> Vec<SniffedDatabase> {
        let candidates: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        let mut found: Vec<SniffedDatabase> = candidates
            .par_iter()
            .filter_map(|path| {
                let header = read_file_header(path, HEADER_BYTES).ok()?;
                let db_kind = DbKind::detect(&header);
                if db_kind == DbKind::Unknown {
                    return None;
                }
                Some(SniffedDatabase {
                    relative_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
                    absolute_path: path.clone(),
                    size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
                    db_kind,
                })
            })
            .collect();

        found.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        found
    }

    /// Prospect every database under `root`
    pub async fn prospect(&self, root: &Path) -> IngestResult<ProspectResult> {
        let owned_root = root.to_path_buf();
        let databases = tokio::task::spawn_blocking(move || Self::sniff(&owned_root))
            .await
            .map_err(|e| IngestError::Internal(format!("database sniff task failed: {}", e)))?;

        let sqlite: Vec<SniffedDatabase> = databases
            .iter()
            .filter(|db| db.db_kind == DbKind::Sqlite)
            .cloned()
            .collect();
        debug!(found = databases.len(), sqlite = sqlite.len(), "Sniffed embedded databases");

        let max_rows = self.max_rows;
        let mut per_file: Vec<(usize, FileProspect)> = stream::iter(sqlite.into_iter().enumerate())
            .map(move |(i, db)| async move { (i, Self::prospect_file(db, max_rows).await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        per_file.sort_by_key(|(i, _)| *i);

        let mut result = ProspectResult::default();
        for (_, file) in per_file {
            result.batch.merge(file.batch);
            result.tables_scanned += file.tables_scanned;
            for (kind, n) in file.tables_classified {
                *result.tables_classified.entry(kind).or_insert(0) += n;
            }
            result.rows_dropped += file.rows_dropped;
            result.issues.extend(file.issues);
        }
        result.databases = databases;

        info!(
            databases = result.databases.len(),
            tables = result.tables_scanned,
            records = result.batch.len(),
            issues = result.issues.len(),
            "Prospected embedded databases"
        );
        Ok(result)
    }

    async fn prospect_file(db: SniffedDatabase, max_rows: usize) -> FileProspect {
        let mut out = FileProspect::default();
        let rel_path = db.relative_path.display().to_string();

        let scan = match read_database(&db.absolute_path, max_rows).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!(file = %rel_path, error = %e, "Skipping unreadable database");
                out.issues
                    .push(ItemIssue::skip(rel_path, "CORRUPT_DATABASE", e.to_string()));
                return out;
            }
        };

        for (table, error) in scan.failed_tables {
            warn!(file = %rel_path, table = %table, error = %error, "Skipping unreadable table");
            out.issues.push(ItemIssue::skip(
                format!("{}#{}", rel_path, table),
                "UNREADABLE_TABLE",
                error,
            ));
        }

        for table in scan.tables {
            out.tables_scanned += 1;
            let Some(kind) = classify_columns(&table.columns) else {
                continue;
            };
            let (batch, dropped) = extract_rows(kind, &table.rows);
            debug!(
                file = %rel_path,
                table = %table.name,
                kind = %kind,
                records = batch.len(),
                dropped,
                "Classified table"
            );
            *out.tables_classified.entry(kind).or_insert(0) += 1;
            out.rows_dropped += dropped;
            out.batch.merge(batch);
        }

        out
    }
}

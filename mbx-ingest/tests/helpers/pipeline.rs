//! Pipeline and database fixtures

use mbx_common::config::UnwrapMode;
use mbx_ingest::db::SqliteRecordStore;
use mbx_ingest::storage::MemoryObjectStore;
use mbx_ingest::{IngestConfig, IngestPipeline};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A pipeline over in-memory collaborators rooted in a temp directory
pub struct TestPipeline {
    pub root: TempDir,
    pub config: IngestConfig,
    pub pipeline: Arc<IngestPipeline>,
    pub objects: Arc<MemoryObjectStore>,
    pub records: Arc<SqliteRecordStore>,
    pub pool: SqlitePool,
}

impl TestPipeline {
    /// Entries left in the work root after a run
    pub fn leftover_work_entries(&self) -> usize {
        std::fs::read_dir(&self.config.work_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Write `bytes` as an uploaded container file
    pub fn write_container(&self, bytes: &[u8]) -> PathBuf {
        let path = self.root.path().join("upload.ab");
        std::fs::write(&path, bytes).unwrap();
        path
    }
}

/// Configuration using the in-process unwrapper
pub fn native_config(root: &Path) -> IngestConfig {
    let mut config = IngestConfig::with_root(root);
    config.settings.unwrap_mode = UnwrapMode::Native;
    config
}

/// Pipeline with the native unwrapper, a memory object store and an
/// in-memory record store
pub async fn test_pipeline() -> TestPipeline {
    test_pipeline_with(|_| {}).await
}

/// Same as [`test_pipeline`], with the configuration adjusted first
pub async fn test_pipeline_with(configure: impl FnOnce(&mut IngestConfig)) -> TestPipeline {
    let root = TempDir::new().unwrap();
    let mut config = native_config(root.path());
    configure(&mut config);
    config.ensure_directories().unwrap();

    let pool = mbx_common::db::init_in_memory().await.unwrap();
    let objects = Arc::new(MemoryObjectStore::new());
    let records = Arc::new(SqliteRecordStore::new(pool.clone()));
    let pipeline = Arc::new(IngestPipeline::new(
        &config,
        config.build_unwrapper(),
        objects.clone(),
        records.clone(),
    ));

    TestPipeline {
        root,
        config,
        pipeline,
        objects,
        records,
        pool,
    }
}

/// Build an SQLite database file from SQL statements and return its bytes
pub async fn create_sqlite_fixture(dir: &Path, name: &str, statements: &[&str]) -> Vec<u8> {
    let path = dir.join(name);
    let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    for sql in statements {
        sqlx::query(sql).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
    std::fs::read(&path).unwrap()
}

//! Record store initialization

use mbx_common::db::{init_database, init_in_memory, record_table};
use mbx_common::records::RecordKind;
use sqlx::Row;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("records.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("records.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_every_record_table_exists() {
    let pool = init_in_memory().await.unwrap();

    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(&pool)
        .await
        .unwrap();
    let tables: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();

    assert!(tables.contains(&"backup_runs".to_string()));
    for kind in RecordKind::ALL {
        assert!(
            tables.contains(&record_table(kind).to_string()),
            "missing table for {}",
            kind
        );
    }
}

#[tokio::test]
async fn test_schema_creation_is_idempotent() {
    let pool = init_in_memory().await.unwrap();
    mbx_common::db::create_schema(&pool).await.unwrap();
}

#[tokio::test]
async fn test_call_log_rejects_unknown_call_type() {
    let pool = init_in_memory().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO call_logs (run_id, phone_number, call_type, call_date, duration_seconds)
         VALUES ('r1', '+989121234567', 'voicemail', CURRENT_TIMESTAMP, 0)",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}

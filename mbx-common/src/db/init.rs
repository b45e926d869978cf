//! Database initialization
//!
//! Creates the record-store database on first use. Every table is keyed by
//! `run_id` so one database holds any number of backup runs. Schema creation
//! is idempotent and runs on every open.

use crate::records::RecordKind;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the record store at `db_path`
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets status readers proceed while a run is inserting
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory store with the full schema.
///
/// Limited to one connection: each SQLite in-memory connection is a separate
/// database.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Table holding records of `kind`
pub fn record_table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Contact => "contacts",
        RecordKind::CallLog => "call_logs",
        RecordKind::Message => "messages",
        RecordKind::App => "apps",
        RecordKind::Media => "media_files",
        RecordKind::Document => "documents",
        RecordKind::Note => "notes",
        RecordKind::Bookmark => "bookmarks",
        RecordKind::ChatMessage => "chat_messages",
        RecordKind::RawDatabase => "raw_database_files",
    }
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_backup_runs_table(pool).await?;
    create_contacts_table(pool).await?;
    create_call_logs_table(pool).await?;
    create_messages_table(pool).await?;
    create_apps_table(pool).await?;
    create_media_files_table(pool).await?;
    create_documents_table(pool).await?;
    create_notes_table(pool).await?;
    create_bookmarks_table(pool).await?;
    create_chat_messages_table(pool).await?;
    create_raw_database_files_table(pool).await?;

    for kind in RecordKind::ALL {
        let table = record_table(kind);
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_run_id ON {table}(run_id)"
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Run status keyed by run identifier
pub async fn create_backup_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS backup_runs (
            run_id TEXT PRIMARY KEY,
            processed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            stats_json TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (processed IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_contacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            name TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            email TEXT,
            contact_group TEXT,
            address TEXT,
            created_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_call_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS call_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            call_type TEXT NOT NULL,
            call_date TIMESTAMP NOT NULL,
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            CHECK (call_type IN ('incoming', 'outgoing', 'missed')),
            CHECK (duration_seconds >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            external_id TEXT,
            sender TEXT,
            receiver TEXT,
            content TEXT NOT NULL,
            sent_at TIMESTAMP,
            received_at TIMESTAMP,
            message_type TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            CHECK (message_type IN ('sms', 'mms'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_apps_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS apps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            package_name TEXT NOT NULL,
            app_name TEXT,
            version_code INTEGER,
            version_name TEXT,
            permissions_json TEXT NOT NULL DEFAULT '[]',
            apk_ref TEXT,
            size_bytes INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_media_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            media_type TEXT NOT NULL,
            mime_type TEXT,
            size_bytes INTEGER NOT NULL,
            object_ref TEXT NOT NULL,
            added_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            mime_type TEXT,
            size_bytes INTEGER NOT NULL,
            object_ref TEXT NOT NULL,
            added_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_notes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            title TEXT,
            content TEXT NOT NULL,
            created_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_bookmarks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookmarks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            added_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_chat_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            chat_id TEXT,
            sender TEXT,
            message TEXT NOT NULL,
            sent_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_raw_database_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_database_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            relative_path TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            db_kind TEXT NOT NULL,
            object_ref TEXT NOT NULL,
            added_at TIMESTAMP NOT NULL,
            CHECK (db_kind IN ('sqlite', 'realm', 'unknown'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

//! SQLite record store
//!
//! One table per record kind, every row tagged with its `run_id`. A batch is
//! written inside a single transaction: rows left by an earlier attempt of
//! the same run are removed first, so a retried run never doubles its
//! records.

use super::RecordSink;
use crate::models::RunId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mbx_common::db::record_table;
use mbx_common::records::{
    AppRecord, BookmarkRecord, CallLogEntry, ChatMessageRecord, Contact, DocumentRecord,
    MediaRecord, Message, NoteRecord, RawDatabaseFile, RecordBatch, RecordKind,
};
use mbx_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

/// Record sink over a SQLite pool initialized by [`mbx_common::db::init_database`]
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordSink for SqliteRecordStore {
    async fn insert_batch(
        &self,
        run_id: &RunId,
        batch: &RecordBatch,
    ) -> Result<BTreeMap<RecordKind, usize>> {
        let run_id = run_id.as_str();
        let mut tx = self.pool.begin().await?;

        for kind in RecordKind::ALL {
            sqlx::query(&format!("DELETE FROM {} WHERE run_id = ?", record_table(kind)))
                .bind(run_id)
                .execute(&mut *tx)
                .await?;
        }

        let mut written = BTreeMap::new();
        written.insert(RecordKind::Contact, insert_contacts(&mut tx, run_id, &batch.contacts).await?);
        written.insert(RecordKind::CallLog, insert_call_logs(&mut tx, run_id, &batch.call_logs).await?);
        written.insert(RecordKind::Message, insert_messages(&mut tx, run_id, &batch.messages).await?);
        written.insert(RecordKind::App, insert_apps(&mut tx, run_id, &batch.apps).await?);
        written.insert(RecordKind::Media, insert_media(&mut tx, run_id, &batch.media).await?);
        written.insert(RecordKind::Document, insert_documents(&mut tx, run_id, &batch.documents).await?);
        written.insert(RecordKind::Note, insert_notes(&mut tx, run_id, &batch.notes).await?);
        written.insert(RecordKind::Bookmark, insert_bookmarks(&mut tx, run_id, &batch.bookmarks).await?);
        written.insert(
            RecordKind::ChatMessage,
            insert_chat_messages(&mut tx, run_id, &batch.chat_messages).await?,
        );
        written.insert(
            RecordKind::RawDatabase,
            insert_raw_databases(&mut tx, run_id, &batch.raw_databases).await?,
        );

        tx.commit().await?;

        debug!(run_id, rows = written.values().sum::<usize>(), "Committed record batch");
        Ok(written)
    }

    async fn count(&self, run_id: &RunId, kind: RecordKind) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE run_id = ?",
            record_table(kind)
        ))
        .bind(run_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }
}

fn ts(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

fn size(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

async fn insert_contacts(conn: &mut SqliteConnection, run_id: &str, items: &[Contact]) -> Result<usize> {
    for c in items {
        sqlx::query(
            r#"
            INSERT INTO contacts (run_id, name, phone_number, email, contact_group, address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(&c.name)
        .bind(&c.phone_number)
        .bind(&c.email)
        .bind(&c.group)
        .bind(&c.address)
        .bind(ts(&c.created_at))
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

async fn insert_call_logs(
    conn: &mut SqliteConnection,
    run_id: &str,
    items: &[CallLogEntry],
) -> Result<usize> {
    for call in items {
        // The gate guarantees a date; a missing one here is a caller bug
        let call_date = call.call_date.map(|d| d.to_rfc3339()).ok_or_else(|| {
            Error::InvalidInput(format!("call log for {} has no date", call.phone_number))
        })?;
        sqlx::query(
            r#"
            INSERT INTO call_logs (run_id, phone_number, call_type, call_date, duration_seconds)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(&call.phone_number)
        .bind(&call.call_type)
        .bind(call_date)
        .bind(call.duration_seconds)
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

async fn insert_messages(conn: &mut SqliteConnection, run_id: &str, items: &[Message]) -> Result<usize> {
    for m in items {
        sqlx::query(
            r#"
            INSERT INTO messages (
                run_id, external_id, sender, receiver, content,
                sent_at, received_at, message_type, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(&m.external_id)
        .bind(&m.sender)
        .bind(&m.receiver)
        .bind(&m.body)
        .bind(ts(&m.sent_at))
        .bind(ts(&m.received_at))
        .bind(&m.message_type)
        .bind(m.status)
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

async fn insert_apps(conn: &mut SqliteConnection, run_id: &str, items: &[AppRecord]) -> Result<usize> {
    for app in items {
        let permissions = serde_json::to_string(&app.permissions)
            .map_err(|e| Error::Internal(format!("Failed to serialize permissions: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO apps (
                run_id, package_name, app_name, version_code, version_name,
                permissions_json, apk_ref, size_bytes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(&app.package_name)
        .bind(&app.app_name)
        .bind(app.version_code)
        .bind(&app.version_name)
        .bind(permissions)
        .bind(&app.apk_ref)
        .bind(size(app.size_bytes))
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

async fn insert_media(conn: &mut SqliteConnection, run_id: &str, items: &[MediaRecord]) -> Result<usize> {
    for m in items {
        sqlx::query(
            r#"
            INSERT INTO media_files (
                run_id, file_name, media_type, mime_type, size_bytes, object_ref, added_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(&m.file_name)
        .bind(m.media_type.as_str())
        .bind(&m.mime_type)
        .bind(size(m.size_bytes))
        .bind(&m.object_ref)
        .bind(m.added_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

async fn insert_documents(
    conn: &mut SqliteConnection,
    run_id: &str,
    items: &[DocumentRecord],
) -> Result<usize> {
    for d in items {
        sqlx::query(
            r#"
            INSERT INTO documents (run_id, file_name, mime_type, size_bytes, object_ref, added_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(&d.file_name)
        .bind(&d.mime_type)
        .bind(size(d.size_bytes))
        .bind(&d.object_ref)
        .bind(d.added_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

async fn insert_notes(conn: &mut SqliteConnection, run_id: &str, items: &[NoteRecord]) -> Result<usize> {
    for n in items {
        sqlx::query("INSERT INTO notes (run_id, title, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(run_id)
            .bind(&n.title)
            .bind(&n.content)
            .bind(ts(&n.created_at))
            .execute(&mut *conn)
            .await?;
    }
    Ok(items.len())
}

async fn insert_bookmarks(
    conn: &mut SqliteConnection,
    run_id: &str,
    items: &[BookmarkRecord],
) -> Result<usize> {
    for b in items {
        sqlx::query("INSERT INTO bookmarks (run_id, title, url, added_at) VALUES (?, ?, ?, ?)")
            .bind(run_id)
            .bind(&b.title)
            .bind(&b.url)
            .bind(ts(&b.added_at))
            .execute(&mut *conn)
            .await?;
    }
    Ok(items.len())
}

async fn insert_chat_messages(
    conn: &mut SqliteConnection,
    run_id: &str,
    items: &[ChatMessageRecord],
) -> Result<usize> {
    for c in items {
        sqlx::query(
            "INSERT INTO chat_messages (run_id, chat_id, sender, message, sent_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(&c.chat_id)
        .bind(&c.sender)
        .bind(&c.message)
        .bind(ts(&c.sent_at))
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

async fn insert_raw_databases(
    conn: &mut SqliteConnection,
    run_id: &str,
    items: &[RawDatabaseFile],
) -> Result<usize> {
    for f in items {
        sqlx::query(
            r#"
            INSERT INTO raw_database_files (
                run_id, relative_path, size_bytes, db_kind, object_ref, added_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id)
        .bind(f.relative_path.to_string_lossy().into_owned())
        .bind(size(f.size_bytes))
        .bind(f.db_kind.as_str())
        .bind(&f.object_ref)
        .bind(f.added_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
    }
    Ok(items.len())
}

//! Run status persistence
//!
//! `backup_runs` holds one row per run identifier. The processed flag and
//! error message form the status contract; the serialized run summary rides
//! along in `stats_json`.

use super::{RunStatus, StatusStore};
use crate::models::{RunId, RunSummary};
use async_trait::async_trait;
use mbx_common::{Error, Result};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct SqliteStatusStore {
    pool: SqlitePool,
}

impl SqliteStatusStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert(
        &self,
        run_id: &RunId,
        processed: bool,
        error_message: Option<&str>,
        stats_json: Option<String>,
    ) -> Result<()> {
        let updated_at = mbx_common::time::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO backup_runs (run_id, processed, error_message, stats_json, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(run_id) DO UPDATE SET
                processed = excluded.processed,
                error_message = excluded.error_message,
                stats_json = excluded.stats_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(run_id.as_str())
        .bind(processed)
        .bind(error_message)
        .bind(stats_json)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
    async fn mark_started(&self, run_id: &RunId) -> Result<()> {
        self.upsert(run_id, false, None, None).await
    }

    async fn mark_succeeded(&self, run_id: &RunId, summary: &RunSummary) -> Result<()> {
        let stats_json = serde_json::to_string(summary)
            .map_err(|e| Error::Internal(format!("Failed to serialize run summary: {}", e)))?;
        self.upsert(run_id, true, None, Some(stats_json)).await
    }

    async fn mark_failed(&self, run_id: &RunId, error_message: &str) -> Result<()> {
        self.upsert(run_id, false, Some(error_message), None).await
    }

    async fn get(&self, run_id: &RunId) -> Result<Option<RunStatus>> {
        let row = sqlx::query(
            r#"
            SELECT run_id, processed, error_message, stats_json, updated_at
            FROM backup_runs
            WHERE run_id = ?
            "#,
        )
        .bind(run_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stats_json: Option<String> = row.get("stats_json");
        let summary = stats_json
            .map(|json| {
                serde_json::from_str::<RunSummary>(&json).map_err(|e| {
                    Error::Internal(format!("Failed to deserialize run summary: {}", e))
                })
            })
            .transpose()?;

        Ok(Some(RunStatus {
            run_id: row.get("run_id"),
            processed: row.get("processed"),
            error_message: row.get("error_message"),
            summary,
            updated_at: row.get("updated_at"),
        }))
    }
}

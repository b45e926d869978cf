//! Read-only sampling of embedded SQLite databases
//!
//! Each database gets its own connection, opened read-only and closed before
//! the call returns, whether the scan succeeded or not.

use crate::heuristics::Row;
use mbx_common::RawValue;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, Connection, Row as _, SqliteConnection, TypeInfo, ValueRef};
use std::path::Path;
use tracing::debug;

/// Sampled rows of one table
#[derive(Debug, Clone, Default)]
pub struct TableSample {
    pub name: String,
    /// Lower-cased column names in declaration order
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Everything read from one database file
#[derive(Debug, Clone, Default)]
pub struct DatabaseScan {
    pub tables: Vec<TableSample>,
    /// Tables that failed to read, with the error text
    pub failed_tables: Vec<(String, String)>,
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Decode one cell by its runtime storage class
fn cell(row: &SqliteRow, index: usize) -> RawValue {
    let Ok(raw) = row.try_get_raw(index) else {
        return RawValue::Null;
    };
    if raw.is_null() {
        return RawValue::Null;
    }
    let storage = raw.type_info().name().to_ascii_uppercase();

    let decoded = match storage.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(RawValue::Integer),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(RawValue::Real),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(RawValue::Blob),
        _ => row.try_get_unchecked::<String, _>(index).map(RawValue::Text),
    };

    decoded
        .or_else(|_| row.try_get_unchecked::<String, _>(index).map(RawValue::Text))
        .or_else(|_| {
            row.try_get_unchecked::<Vec<u8>, _>(index)
                .map(|b| RawValue::Text(String::from_utf8_lossy(&b).into_owned()))
        })
        .unwrap_or(RawValue::Null)
}

async fn table_names(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(conn)
    .await
}

async fn sample_table(
    conn: &mut SqliteConnection,
    table: &str,
    max_rows: usize,
) -> Result<TableSample, sqlx::Error> {
    let columns: Vec<String> = sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();

    let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), max_rows);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    let rows = rows
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .enumerate()
                .map(|(i, column)| (column.name().to_lowercase(), cell(row, i)))
                .collect::<Row>()
        })
        .collect();

    Ok(TableSample {
        name: table.to_string(),
        columns,
        rows,
    })
}

async fn scan_tables(conn: &mut SqliteConnection, max_rows: usize) -> Result<DatabaseScan, sqlx::Error> {
    let mut scan = DatabaseScan::default();
    for table in table_names(conn).await? {
        match sample_table(conn, &table, max_rows).await {
            Ok(sample) => scan.tables.push(sample),
            Err(e) => scan.failed_tables.push((table, e.to_string())),
        }
    }
    Ok(scan)
}

/// Sample up to `max_rows` rows from every user table of the database at
/// `path`. Fails only when the file cannot be opened or its catalog read.
pub async fn read_database(path: &Path, max_rows: usize) -> Result<DatabaseScan, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false);
    let mut conn = SqliteConnection::connect_with(&options).await?;

    let result = scan_tables(&mut conn, max_rows).await;

    if let Err(e) = conn.close().await {
        debug!(file = %path.display(), error = %e, "Closing embedded database failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fixture(path: &Path) {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        for sql in [
            r#"CREATE TABLE "Call ""Log""" (_id INTEGER, Number TEXT, date INTEGER, rate REAL, photo BLOB)"#,
            r#"INSERT INTO "Call ""Log""" VALUES (1, '+989121234567', 1700000000, 1.5, x'0102')"#,
            r#"INSERT INTO "Call ""Log""" VALUES (2, NULL, '1700000001', NULL, NULL)"#,
            "CREATE TABLE empty (id INTEGER, title TEXT)",
        ] {
            sqlx::query(sql).execute(&mut conn).await.unwrap();
        }
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calls.db");
        fixture(&path).await;

        let scan = read_database(&path, 1000).await.unwrap();

        assert!(scan.failed_tables.is_empty());
        assert_eq!(scan.tables.len(), 2);

        let calls = &scan.tables[0];
        assert_eq!(calls.name, "Call \"Log\"");
        assert_eq!(calls.columns, vec!["_id", "number", "date", "rate", "photo"]);
        assert_eq!(calls.rows.len(), 2);
        assert_eq!(calls.rows[0]["number"], RawValue::Text("+989121234567".into()));
        assert_eq!(calls.rows[0]["date"], RawValue::Integer(1_700_000_000));
        assert_eq!(calls.rows[0]["rate"], RawValue::Real(1.5));
        assert_eq!(calls.rows[0]["photo"], RawValue::Blob(vec![1, 2]));
        assert_eq!(calls.rows[1]["number"], RawValue::Null);

        let empty = &scan.tables[1];
        assert_eq!(empty.columns, vec!["id", "title"]);
        assert!(empty.rows.is_empty());
    }

    #[tokio::test]
    async fn test_row_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calls.db");
        fixture(&path).await;

        let scan = read_database(&path, 1).await.unwrap();
        assert_eq!(scan.tables[0].rows.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.db");
        let mut bytes = b"SQLite format 3\0".to_vec();
        bytes.extend(std::iter::repeat(0xAB).take(4096));
        std::fs::write(&path, bytes).unwrap();

        assert!(read_database(&path, 10).await.is_err());
    }
}

//! End-to-end ingestion runs over in-memory collaborators

mod helpers;

use helpers::{
    android_backup, apk_with_manifest, create_sqlite_fixture, tar_archive, tar_with_raw_name,
    test_pipeline, zlib,
};
use mbx_common::records::{Category, RecordKind};
use mbx_ingest::db::RecordSink;
use mbx_ingest::models::IssueSeverity;
use mbx_ingest::{IngestError, RunId};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const VCARDS: &str = "BEGIN:VCARD\nVERSION:3.0\nFN:Alice\nTEL:0989123456\nEND:VCARD\n\
BEGIN:VCARD\nVERSION:3.0\nFN:Alice\nTEL:0989123456\nEND:VCARD\n\
BEGIN:VCARD\nVERSION:3.0\nNOTE:nothing useful\nEND:VCARD\n";

const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.notes" android:versionName="2.1">
    <uses-permission android:name="android.permission.INTERNET" />
    <application android:label="Notes" />
</manifest>"#;

async fn sample_backup() -> Vec<u8> {
    let scratch = TempDir::new().unwrap();
    let calllog = create_sqlite_fixture(
        scratch.path(),
        "calllog.db",
        &[
            "CREATE TABLE calls (_id INTEGER, number TEXT, type TEXT, duration INTEGER, date INTEGER)",
            "INSERT INTO calls VALUES (1, '+989121234567', '2', 45, 1700000000)",
        ],
    )
    .await;

    let messages = zlib(
        br#"[{"address": "+989121234567", "body": "hi there", "type": "1", "date": 1700000000000}, 5]"#,
    );
    let notes = br#"[{"content": "buy milk", "title": "todo"}]"#.to_vec();
    let apk = apk_with_manifest(MANIFEST);

    let tar = tar_archive(&[
        ("apps/com.android.contacts/f/contacts.vcf", VCARDS.as_bytes()),
        ("apps/com.android.providers.contacts/db/calllog.db", &calllog[..]),
        ("apps/com.backup/f/sms_export.bin", &messages[..]),
        ("apps/com.example.notes/f/notes.json", &notes[..]),
        ("apps/com.example.notes/a/base.apk", &apk[..]),
        ("shared/0/DCIM/IMG_0001.jpg", &b"\xff\xd8\xff\xe0jpeg"[..]),
        ("shared/0/empty.txt", &b""[..]),
    ]);
    android_backup(&tar)
}

#[tokio::test]
async fn test_full_run_extracts_every_source() {
    let harness = test_pipeline().await;
    let run_id = RunId::new("run-e2e").unwrap();
    let container = harness.write_container(&sample_backup().await);

    let summary = harness
        .pipeline
        .run(&run_id, &container, &CancellationToken::new())
        .await
        .unwrap();

    // Same vCard contact twice is stored once
    assert_eq!(summary.kind(RecordKind::Contact).extracted, 2);
    assert_eq!(summary.kind(RecordKind::Contact).duplicates, 1);
    assert_eq!(summary.kind(RecordKind::Contact).persisted, 1);
    assert_eq!(summary.kind(RecordKind::CallLog).persisted, 1);
    assert_eq!(summary.kind(RecordKind::Message).persisted, 1);
    assert_eq!(summary.kind(RecordKind::Note).persisted, 1);
    assert_eq!(summary.kind(RecordKind::App).persisted, 1);
    assert_eq!(summary.kind(RecordKind::Media).persisted, 1);
    assert_eq!(summary.kind(RecordKind::RawDatabase).persisted, 1);

    assert_eq!(summary.category_count(Category::Photo), 1);
    assert_eq!(summary.category_count(Category::Database), 1);
    assert_eq!(summary.zero_byte_files, 1);

    // Empty vCard block and the non-object message entry
    assert_eq!(summary.count_by_severity(IssueSeverity::Warning), 2);
    assert!(summary.issues.iter().all(|i| i.code == "ITEMS_SKIPPED"));
    assert_eq!(summary.statistics.decoding.items_skipped, 2);
    assert_eq!(summary.statistics.prospecting.databases_found, 1);

    let (phone,): (String,) =
        sqlx::query_as("SELECT phone_number FROM contacts WHERE run_id = ?")
            .bind(run_id.as_str())
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert_eq!(phone, "0989123456");

    let (call_type, duration): (String, i64) =
        sqlx::query_as("SELECT call_type, duration_seconds FROM call_logs WHERE run_id = ?")
            .bind(run_id.as_str())
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert_eq!(call_type, "outgoing");
    assert_eq!(duration, 45);

    let (sender, receiver): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT sender, receiver FROM messages WHERE run_id = ?")
            .bind(run_id.as_str())
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert_eq!(sender.as_deref(), Some("+989121234567"));
    assert!(receiver.is_none());

    let (package, apk_ref): (String, Option<String>) =
        sqlx::query_as("SELECT package_name, apk_ref FROM apps WHERE run_id = ?")
            .bind(run_id.as_str())
            .fetch_one(&harness.pool)
            .await
            .unwrap();
    assert_eq!(package, "com.example.notes");
    assert_eq!(apk_ref.as_deref(), Some("mem://run-e2e/others/base.apk"));

    // Every non-empty file reached the object store
    assert_eq!(harness.objects.len().await, 6);
    assert_eq!(harness.leftover_work_entries(), 0);
}

#[tokio::test]
async fn test_retried_run_replaces_records() {
    let harness = test_pipeline().await;
    let run_id = RunId::new("run-retry").unwrap();
    let container = harness.write_container(&sample_backup().await);

    for _ in 0..2 {
        harness
            .pipeline
            .run(&run_id, &container, &CancellationToken::new())
            .await
            .unwrap();
    }

    assert_eq!(harness.records.count(&run_id, RecordKind::Contact).await.unwrap(), 1);
    assert_eq!(harness.records.count(&run_id, RecordKind::CallLog).await.unwrap(), 1);
}

#[tokio::test]
async fn test_path_traversal_aborts_run() {
    let harness = test_pipeline().await;
    let run_id = RunId::new("run-evil").unwrap();
    let container = harness.write_container(&android_backup(&tar_with_raw_name(
        b"../../evil.txt",
        b"owned",
    )));

    let result = harness
        .pipeline
        .run(&run_id, &container, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(IngestError::PathTraversal(_))));
    assert!(!harness.config.work_root.join("evil.txt").exists());
    assert!(!harness.root.path().join("evil.txt").exists());
    assert_eq!(harness.leftover_work_entries(), 0);
    assert!(harness.objects.is_empty().await);
}

#[tokio::test]
async fn test_empty_input_is_fatal() {
    let harness = test_pipeline().await;
    let run_id = RunId::new("run-empty").unwrap();

    let result = harness
        .pipeline
        .run_from_reader(&run_id, &b""[..], &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(IngestError::EmptyInput(_))));

    let missing = harness.root.path().join("missing.ab");
    let result = harness
        .pipeline
        .run(&run_id, &missing, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(IngestError::EmptyInput(_))));
    assert_eq!(harness.leftover_work_entries(), 0);
}

#[tokio::test]
async fn test_archive_without_files_is_fatal() {
    let harness = test_pipeline().await;
    let run_id = RunId::new("run-hollow").unwrap();
    let container = android_backup(&tar_archive(&[]));

    let result = harness
        .pipeline
        .run_from_reader(&run_id, &container[..], &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(IngestError::EmptyArchive)));
}

#[tokio::test]
async fn test_encrypted_container_is_fatal() {
    let harness = test_pipeline().await;
    let run_id = RunId::new("run-locked").unwrap();
    let container = b"ANDROID BACKUP\n5\n1\nAES-256\nsalt...".to_vec();

    let result = harness
        .pipeline
        .run_from_reader(&run_id, &container[..], &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(IngestError::ContainerFormat(_))));
    assert_eq!(harness.leftover_work_entries(), 0);
}

#[tokio::test]
async fn test_cancelled_run_stops_before_unwrapping() {
    let harness = test_pipeline().await;
    let run_id = RunId::new("run-cancel").unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let container = sample_backup().await;
    let result = harness
        .pipeline
        .run_from_reader(&run_id, &container[..], &token)
        .await;

    assert!(matches!(result, Err(IngestError::Cancelled)));
    assert_eq!(harness.records.count(&run_id, RecordKind::Contact).await.unwrap(), 0);
    assert_eq!(harness.leftover_work_entries(), 0);
}

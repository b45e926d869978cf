//! Binary passthrough into the object store
//!
//! Every categorized file is copied to the object store under a run-scoped
//! key. Photos, videos and audio become media records, office-style
//! documents become document records and database-category files become
//! raw database records. Other files (packages, exports) are stored too so
//! later stages can reference them.

use crate::models::ItemIssue;
use crate::storage::{ObjectKeyAllocator, ObjectStore};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use mbx_common::records::{
    Category, DbKind, DocumentRecord, ExtractedFile, MediaRecord, RawDatabaseFile, RecordBatch,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extensions that produce a document record
pub const DOCUMENT_RECORD_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "rtf", "odt"];

/// Concurrent uploads per run
const MAX_CONCURRENT_PUTS: usize = 8;

/// Bytes sniffed to detect a database kind
pub const HEADER_BYTES: usize = 32;

pub fn document_extension_allowed(file: &ExtractedFile) -> bool {
    file.category == Category::Document
        && file
            .extension()
            .is_some_and(|ext| DOCUMENT_RECORD_EXTENSIONS.contains(&ext.as_str()))
}

/// Up to `len` leading bytes of a file
pub fn read_file_header(path: &Path, len: usize) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(len);
    File::open(path)?.take(len as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// Result of storing one run's files
#[derive(Debug, Default)]
pub struct StoredFiles {
    /// Object reference per relative path
    pub refs: HashMap<PathBuf, String>,
    /// Media, document and raw database records
    pub batch: RecordBatch,
    pub issues: Vec<ItemIssue>,
}

impl StoredFiles {
    pub fn reference(&self, relative_path: &Path) -> Option<&str> {
        self.refs.get(relative_path).map(String::as_str)
    }
}

/// Stores a run's files and builds the passthrough records
pub struct MediaStorer {
    store: Arc<dyn ObjectStore>,
    keys: ObjectKeyAllocator,
}

impl MediaStorer {
    pub fn new(run_id: &str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            keys: ObjectKeyAllocator::new(run_id),
        }
    }

    /// Store every file; a failed upload skips that file only
    pub async fn store_all(&mut self, files: &[ExtractedFile]) -> StoredFiles {
        // Keys are allocated up front so suffixes follow file order
        let jobs: Vec<(&ExtractedFile, String)> = files
            .iter()
            .map(|f| {
                let key = self.keys.allocate(f.category, &f.file_name());
                (f, key)
            })
            .collect();

        let uploads: Vec<(usize, String, PathBuf)> = jobs
            .iter()
            .enumerate()
            .map(|(i, (file, key))| (i, key.clone(), file.absolute_path.clone()))
            .collect();

        let store = Arc::clone(&self.store);
        let mut results: Vec<(usize, Result<String, String>)> = stream::iter(uploads)
            .map(move |(i, key, path)| {
                let store = Arc::clone(&store);
                async move {
                    let result = store
                        .put_file(&key, &path)
                        .await
                        .map_err(|e| e.to_string());
                    (i, result)
                }
            })
            .buffer_unordered(MAX_CONCURRENT_PUTS)
            .collect()
            .await;
        results.sort_by_key(|(i, _)| *i);

        let added_at = mbx_common::time::now();
        let mut out = StoredFiles::default();
        for (i, result) in results {
            let file = jobs[i].0;
            match result {
                Ok(object_ref) => {
                    push_record(&mut out.batch, file, &object_ref, added_at);
                    out.refs.insert(file.relative_path.clone(), object_ref);
                }
                Err(message) => {
                    warn!(file = %file.relative_path.display(), error = %message, "Object store upload failed");
                    out.issues.push(ItemIssue::skip(
                        file.relative_path.display().to_string(),
                        "OBJECT_STORE_FAILED",
                        message,
                    ));
                }
            }
        }

        debug!(stored = out.refs.len(), failed = out.issues.len(), "Stored extracted files");
        out
    }
}

fn push_record(batch: &mut RecordBatch, file: &ExtractedFile, object_ref: &str, added_at: DateTime<Utc>) {
    match file.category {
        Category::Photo | Category::Video | Category::Audio => batch.media.push(MediaRecord {
            file_name: file.file_name(),
            media_type: file.category,
            mime_type: file.mime_type.clone(),
            size_bytes: file.size_bytes,
            object_ref: object_ref.to_string(),
            added_at,
        }),
        Category::Document if document_extension_allowed(file) => {
            batch.documents.push(DocumentRecord {
                file_name: file.file_name(),
                mime_type: file.mime_type.clone(),
                size_bytes: file.size_bytes,
                object_ref: object_ref.to_string(),
                added_at,
            })
        }
        Category::Database => {
            let db_kind = read_file_header(&file.absolute_path, HEADER_BYTES)
                .map(|h| DbKind::detect(&h))
                .unwrap_or(DbKind::Unknown);
            batch.raw_databases.push(RawDatabaseFile {
                relative_path: file.relative_path.clone(),
                size_bytes: file.size_bytes,
                db_kind,
                object_ref: object_ref.to_string(),
                added_at,
            })
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use std::fs;
    use tempfile::TempDir;

    fn extracted(root: &Path, rel: &str, category: Category, bytes: &[u8], mime: &str) -> ExtractedFile {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        ExtractedFile {
            category,
            relative_path: PathBuf::from(rel),
            absolute_path: path,
            size_bytes: bytes.len() as u64,
            mime_type: mime.into(),
        }
    }

    #[tokio::test]
    async fn test_store_all_builds_records() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let files = vec![
            extracted(root, "a/IMG.jpg", Category::Photo, b"jpg", "image/jpeg"),
            extracted(root, "b/IMG.jpg", Category::Photo, b"jpg2", "image/jpeg"),
            extracted(root, "cv.pdf", Category::Document, b"%PDF", "application/pdf"),
            extracted(root, "sheet.xlsx", Category::Document, b"PK", "application/zip"),
            extracted(root, "db/c.db", Category::Database, b"SQLite format 3\0rest", "application/octet-stream"),
            extracted(root, "app.apk", Category::Other, b"PK", "application/zip"),
        ];

        let store = Arc::new(MemoryObjectStore::new());
        let mut storer = MediaStorer::new("run-1", store.clone());
        let stored = storer.store_all(&files).await;

        assert_eq!(store.len().await, 6);
        assert_eq!(stored.batch.media.len(), 2);
        assert_eq!(stored.batch.media[1].object_ref, "mem://run-1/photos/IMG_1.jpg");
        assert_eq!(stored.batch.documents.len(), 1);
        assert_eq!(stored.batch.raw_databases[0].db_kind, DbKind::Sqlite);
        assert_eq!(
            stored.reference(Path::new("app.apk")),
            Some("mem://run-1/others/app.apk")
        );
        assert!(stored.issues.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_is_item_issue() {
        let dir = TempDir::new().unwrap();
        let mut file = extracted(dir.path(), "x.mp3", Category::Audio, b"id3", "audio/mpeg");
        fs::remove_file(&file.absolute_path).unwrap();
        file.size_bytes = 3;

        let mut storer = MediaStorer::new("run-1", Arc::new(MemoryObjectStore::new()));
        let stored = storer.store_all(&[file]).await;

        assert!(stored.batch.media.is_empty());
        assert_eq!(stored.issues.len(), 1);
        assert_eq!(stored.issues[0].code, "OBJECT_STORE_FAILED");
    }
}

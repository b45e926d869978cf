//! Binary object store collaborator
//!
//! Extracted binaries (media, documents, raw databases, installer packages)
//! are written under keys of the form `<run_id>/<category-folder>/<name>`.
//! The store returns a stable reference string that records carry instead of
//! the content itself.
//!
//! Stores are constructed explicitly and passed to the pipeline; there is no
//! process-wide client.

use async_trait::async_trait;
use mbx_common::records::Category;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

/// Longest stored file name, extension included
pub const MAX_OBJECT_NAME_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Durable storage for extracted binaries
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy the file at `source` to `key`; returns the object reference
    async fn put_file(&self, key: &str, source: &Path) -> Result<String, ObjectStoreError>;

    /// Read back an object by the reference `put_file` returned
    async fn get(&self, reference: &str) -> Result<Vec<u8>, ObjectStoreError>;
}

/// Replace characters illegal in object names and cap the length at
/// [`MAX_OBJECT_NAME_CHARS`], keeping the extension intact
pub fn sanitize_object_name(file_name: &str) -> String {
    let (stem, ext) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    };
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
                c => c,
            })
            .collect()
    };
    let ext = clean(ext);
    let ext_len = ext.chars().count();
    let (stem, ext) = if ext_len >= MAX_OBJECT_NAME_CHARS {
        (clean(file_name), String::new())
    } else {
        (clean(stem), ext)
    };
    let allowed = MAX_OBJECT_NAME_CHARS - ext.chars().count();
    let stem: String = stem.chars().take(allowed).collect();
    let stem = if stem.is_empty() { "_".to_string() } else { stem };
    format!("{}{}", stem, ext)
}

/// Hands out unique keys within one run
#[derive(Debug, Default)]
pub struct ObjectKeyAllocator {
    run_id: String,
    used: HashSet<String>,
}

impl ObjectKeyAllocator {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            used: HashSet::new(),
        }
    }

    /// Key for `file_name` in `category`; repeated names get `_1`, `_2`, …
    pub fn allocate(&mut self, category: Category, file_name: &str) -> String {
        let name = sanitize_object_name(file_name);
        let prefix = format!("{}/{}/", self.run_id, category.folder());

        let mut key = format!("{}{}", prefix, name);
        let mut n = 1;
        while self.used.contains(&key) {
            key = format!("{}{}", prefix, with_suffix(&name, n));
            n += 1;
        }
        self.used.insert(key.clone());
        key
    }
}

fn with_suffix(name: &str, n: usize) -> String {
    let suffix = format!("_{}", n);
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let room = MAX_OBJECT_NAME_CHARS.saturating_sub(ext.chars().count() + suffix.len());
    let stem: String = stem.chars().take(room).collect();
    format!("{}{}{}", stem, suffix, ext)
}

fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Filesystem-backed store rooted at a directory; references are `fs://<key>`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub const SCHEME: &'static str = "fs://";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_of<'a>(&self, reference: &'a str) -> Result<&'a str, ObjectStoreError> {
        let key = reference.strip_prefix(Self::SCHEME).unwrap_or(reference);
        validate_key(key)?;
        Ok(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_file(&self, key: &str, source: &Path) -> Result<String, ObjectStoreError> {
        validate_key(key)?;
        let dest = self.root.join(key);
        let io_err = |source| ObjectStoreError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::copy(source, &dest).await.map_err(io_err)?;
        Ok(format!("{}{}", Self::SCHEME, key))
    }

    async fn get(&self, reference: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let key = self.key_of(reference)?;
        match tokio::fs::read(self.root.join(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(source) => Err(ObjectStoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// In-memory store; references are `mem://<key>`
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub const SCHEME: &'static str = "mem://";

    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in sorted order
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(&self, key: &str, source: &Path) -> Result<String, ObjectStoreError> {
        validate_key(key)?;
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|source| ObjectStoreError::Io {
                key: key.to_string(),
                source,
            })?;
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(format!("{}{}", Self::SCHEME, key))
    }

    async fn get(&self, reference: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let key = reference.strip_prefix(Self::SCHEME).unwrap_or(reference);
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }
}

//! Extracted-tree file categorizer
//!
//! Two-phase scan:
//! - Phase 1: sequential directory traversal with symlink-loop detection
//! - Phase 2: parallel per-file metadata and category assignment
//!
//! Category precedence: extension table, then MIME type guessed from the
//! file name, then `other`. Zero-byte files are counted and dropped.

use mbx_common::records::{Category, ExtractedFile};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::models::ItemIssue;

/// Directory scan errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),
}

const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "heif", "tiff",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "3gp", "webm", "wmv", "flv", "m4v",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "aac", "ogg", "m4a", "flac", "amr", "opus", "wma", "mid",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "ppt", "pptx", "csv",
];
const DATABASE_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3", "db3", "realm"];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz"];
const CONFIG_EXTENSIONS: &[&str] = &[
    "json", "xml", "ini", "conf", "cfg", "plist", "yaml", "yml", "properties", "prefs",
];

const CATEGORY_EXTENSIONS: &[(Category, &[&str])] = &[
    (Category::Photo, PHOTO_EXTENSIONS),
    (Category::Video, VIDEO_EXTENSIONS),
    (Category::Audio, AUDIO_EXTENSIONS),
    (Category::Document, DOCUMENT_EXTENSIONS),
    (Category::Database, DATABASE_EXTENSIONS),
    (Category::Archive, ARCHIVE_EXTENSIONS),
    (Category::Config, CONFIG_EXTENSIONS),
];

const FALLBACK_MIME: &str = "application/octet-stream";

/// Category for a lower-cased extension, if the table lists it
pub fn category_for_extension(ext: &str) -> Option<Category> {
    CATEGORY_EXTENSIONS
        .iter()
        .find(|(_, exts)| exts.contains(&ext))
        .map(|(category, _)| *category)
}

/// Category for a MIME type guessed from a file name
pub fn category_for_mime(mime: &str) -> Option<Category> {
    if mime.starts_with("image/") {
        Some(Category::Photo)
    } else if mime.starts_with("video/") {
        Some(Category::Video)
    } else if mime.starts_with("audio/") {
        Some(Category::Audio)
    } else if mime == "application/pdf" || mime == "text/plain" {
        Some(Category::Document)
    } else {
        None
    }
}

/// Assign a category from the file name alone
pub fn categorize_path(path: &Path) -> Category {
    let by_extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .and_then(|ext| category_for_extension(&ext));
    if let Some(category) = by_extension {
        return category;
    }

    mime_guess::from_path(path)
        .iter()
        .find_map(|m| category_for_mime(m.essence_str()))
        .unwrap_or(Category::Other)
}

/// Categorization output for one extracted tree
#[derive(Debug, Clone, Default)]
pub struct CategorizeResult {
    /// Non-empty regular files, sorted by relative path
    pub files: Vec<ExtractedFile>,
    pub counts: BTreeMap<Category, usize>,
    pub zero_byte_files: usize,
    pub issues: Vec<ItemIssue>,
}

impl CategorizeResult {
    pub fn files_in(&self, category: Category) -> impl Iterator<Item = &ExtractedFile> {
        self.files.iter().filter(move |f| f.category == category)
    }
}

enum Probe {
    File(ExtractedFile),
    Empty,
    Failed(ItemIssue),
}

/// Extracted-tree categorizer
pub struct FileCategorizer;

impl FileCategorizer {
    pub fn new() -> Self {
        Self
    }

    /// Categorize every regular file under `root`
    pub fn categorize(&self, root: &Path) -> Result<CategorizeResult, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        // Phase 1: sequential traversal (symlink_visited is mutable)
        let mut candidates = Vec::new();
        let mut issues = Vec::new();
        let mut symlink_visited = HashSet::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => candidates.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    issues.push(ItemIssue::skip(path, "UNREADABLE_ENTRY", e.to_string()));
                }
            }
        }

        tracing::debug!(candidates = candidates.len(), "Categorizer phase 1 complete");

        // Phase 2: parallel metadata + classification
        let probes: Vec<Probe> = candidates
            .par_iter()
            .map(|path| probe_file(root, path))
            .collect();

        let mut result = CategorizeResult {
            issues,
            ..Default::default()
        };
        for probe in probes {
            match probe {
                Probe::File(file) => {
                    *result.counts.entry(file.category).or_insert(0) += 1;
                    result.files.push(file);
                }
                Probe::Empty => result.zero_byte_files += 1,
                Probe::Failed(issue) => result.issues.push(issue),
            }
        }
        result.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        tracing::info!(
            files = result.files.len(),
            zero_byte = result.zero_byte_files,
            "Categorized extracted tree"
        );
        Ok(result)
    }
}

impl Default for FileCategorizer {
    fn default() -> Self {
        Self::new()
    }
}

fn should_process_entry(entry: &DirEntry, symlink_visited: &mut HashSet<PathBuf>) -> bool {
    if entry.file_type().is_symlink() {
        if let Ok(canonical) = entry.path().canonicalize() {
            if !symlink_visited.insert(canonical) {
                tracing::warn!("Symlink loop detected: {}", entry.path().display());
                return false;
            }
        }
    }
    true
}

fn probe_file(root: &Path, path: &Path) -> Probe {
    let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    let size_bytes = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            let err = ScanError::FileAccessError(path.to_path_buf(), e.to_string());
            return Probe::Failed(ItemIssue::skip(
                relative_path.display().to_string(),
                "FILE_ACCESS",
                err.to_string(),
            ));
        }
    };
    if size_bytes == 0 {
        return Probe::Empty;
    }

    Probe::File(ExtractedFile {
        category: categorize_path(path),
        mime_type: detect_mime(path),
        relative_path,
        absolute_path: path.to_path_buf(),
        size_bytes,
    })
}

/// MIME type from the file name, else from content magic, else octet-stream
pub fn detect_mime(path: &Path) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.essence_str().to_string();
    }
    sniff_mime(path).unwrap_or_else(|| FALLBACK_MIME.to_string())
}

fn sniff_mime(path: &Path) -> Option<String> {
    let mut buffer = [0u8; 64];
    let read = File::open(path).and_then(|mut f| f.read(&mut buffer)).ok()?;
    infer::get(&buffer[..read]).map(|kind| kind.mime_type().to_string())
}

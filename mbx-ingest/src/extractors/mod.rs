//! Per-format decoders
//!
//! Each decoder works on one file and never aborts the batch: item-level
//! problems are counted as skips, and a file that cannot be decoded at all
//! returns a [`DecodeError`] that the caller turns into an item issue.

pub mod apk_manifest;
pub mod axml;
pub mod json_dump;
pub mod media;
pub mod sms_blob;
pub mod vcard;

use thiserror::Error;

pub use apk_manifest::{decode_apk, read_manifest, ManifestInfo};
pub use json_dump::{decode_json_dump, JsonDump};
pub use media::{document_extension_allowed, read_file_header, MediaStorer, StoredFiles};
pub use sms_blob::decode_sms_blob;
pub use vcard::{decode_vcard_text, VCARD_EXTENSIONS};

/// Whole-file decode failures
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Decompressed payload exceeds {0} bytes")]
    TooLarge(u64),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected document shape: {0}")]
    Shape(String),

    #[error("Invalid package archive: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("Malformed manifest: {0}")]
    Manifest(String),

    #[error("Package declares no package name")]
    BlankPackage,
}

impl DecodeError {
    /// Stable code for item issues
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::Io(_) => "READ_FAILED",
            DecodeError::Decompress(_) => "DECOMPRESS_FAILED",
            DecodeError::TooLarge(_) => "PAYLOAD_TOO_LARGE",
            DecodeError::Json(_) => "MALFORMED_JSON",
            DecodeError::Shape(_) => "UNEXPECTED_SHAPE",
            DecodeError::Package(_) => "INVALID_PACKAGE",
            DecodeError::Manifest(_) => "MALFORMED_MANIFEST",
            DecodeError::BlankPackage => "BLANK_PACKAGE",
        }
    }
}

/// Items decoded from one file and the number of items skipped
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: 0,
        }
    }
}

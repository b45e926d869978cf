//! Run results and per-item issues
//!
//! A run that finishes always produces a [`RunSummary`]; item-level failures
//! and validation rejections are collected into it instead of aborting.

use crate::workflow::statistics::RunStatistics;
use chrono::{DateTime, Utc};
use mbx_common::records::{Category, RecordKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a per-item issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    /// Item processed partially, run continues
    Warning,
    /// Item could not be processed at all, run continues
    Skip,
}

/// A recoverable failure tied to one file, table or record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemIssue {
    /// File (or `file#table`) the issue came from
    pub path: String,

    /// Error code (e.g. "CORRUPT_DATABASE", "MALFORMED_JSON")
    pub code: String,

    pub message: String,

    pub severity: IssueSeverity,
}

impl ItemIssue {
    pub fn warning(path: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.to_string(),
            message: message.into(),
            severity: IssueSeverity::Warning,
        }
    }

    pub fn skip(path: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.to_string(),
            message: message.into(),
            severity: IssueSeverity::Skip,
        }
    }
}

/// A record excluded by the validation gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RecordKind,
    pub reason: String,
    /// Identifying text for the record (phone, name or title)
    pub subject: String,
}

/// Record counts for one entity kind across the finalize stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub extracted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub persisted: usize,
}

/// Stages of one run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Staging,
    Unwrapping,
    Categorizing,
    Decoding,
    Prospecting,
    Storing,
    Finalizing,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Staging => "STAGING",
            RunPhase::Unwrapping => "UNWRAPPING",
            RunPhase::Categorizing => "CATEGORIZING",
            RunPhase::Decoding => "DECODING",
            RunPhase::Prospecting => "PROSPECTING",
            RunPhase::Storing => "STORING",
            RunPhase::Finalizing => "FINALIZING",
        };
        f.write_str(name)
    }
}

/// Best-effort summary of a completed run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,

    /// Non-empty files per category
    pub category_counts: BTreeMap<Category, usize>,

    /// Zero-byte files, excluded from categorized output
    pub zero_byte_files: usize,

    pub kinds: BTreeMap<RecordKind, KindStats>,

    pub issues: Vec<ItemIssue>,

    pub rejections: Vec<Rejection>,

    pub statistics: RunStatistics,

    pub started_at: Option<DateTime<Utc>>,

    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn kind_mut(&mut self, kind: RecordKind) -> &mut KindStats {
        self.kinds.entry(kind).or_default()
    }

    pub fn kind(&self, kind: RecordKind) -> KindStats {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    pub fn category_count(&self, category: Category) -> usize {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }

    /// Count issues by severity
    pub fn count_by_severity(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn total_persisted(&self) -> usize {
        self.kinds.values().map(|k| k.persisted).sum()
    }
}

//! Per-phase run statistics
//!
//! Each phase fills its own struct; the set is serialized into the run
//! summary and logged as a one-line display string when the phase ends.

use crate::prospector::TableKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// **STAGING Phase Statistics**
///
/// Display: "N bytes staged"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingStats {
    pub bytes_received: u64,
}

impl StagingStats {
    pub fn display_string(&self) -> String {
        format!("{} bytes staged", self.bytes_received)
    }
}

/// **UNWRAPPING Phase Statistics**
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnwrapStats {
    /// Unwrapper that converted the container
    pub unwrapper: String,
    pub files_extracted: usize,
    pub directories: usize,
    /// Links and special entries not materialized
    pub skipped_entries: usize,
    pub bytes_extracted: u64,
}

impl UnwrapStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} files ({} bytes) extracted by {} unwrapper, {} entries skipped",
            self.files_extracted, self.bytes_extracted, self.unwrapper, self.skipped_entries
        )
    }
}

/// **CATEGORIZING Phase Statistics**
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorizeStats {
    pub files_categorized: usize,
    pub zero_byte_files: usize,
    pub unreadable_files: usize,
}

impl CategorizeStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} files categorized, {} empty, {} unreadable",
            self.files_categorized, self.zero_byte_files, self.unreadable_files
        )
    }
}

/// **DECODING Phase Statistics**
///
/// Counts files handed to each format decoder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeStats {
    pub vcard_files: usize,
    pub sms_blob_files: usize,
    pub package_files: usize,
    pub json_files: usize,
    /// Files a decoder rejected as a whole
    pub files_failed: usize,
    /// Blocks, objects or entries skipped inside decoded files
    pub items_skipped: usize,
}

impl DecodeStats {
    pub fn files_routed(&self) -> usize {
        self.vcard_files + self.sms_blob_files + self.package_files + self.json_files
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} files decoded ({} failed), {} items skipped",
            self.files_routed(),
            self.files_failed,
            self.items_skipped
        )
    }
}

/// **PROSPECTING Phase Statistics**
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProspectStats {
    pub databases_found: usize,
    pub tables_scanned: usize,
    pub tables_classified: BTreeMap<TableKind, usize>,
    /// Rows of classified tables that yielded no record
    pub rows_dropped: usize,
}

impl ProspectStats {
    pub fn display_string(&self) -> String {
        let classified: usize = self.tables_classified.values().sum();
        format!(
            "{} databases, {} of {} tables classified, {} rows dropped",
            self.databases_found, classified, self.tables_scanned, self.rows_dropped
        )
    }
}

/// **STORING Phase Statistics**
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub objects_stored: usize,
    pub upload_failures: usize,
    /// Packages whose installer binary received an object reference
    pub packages_linked: usize,
}

impl StoreStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} objects stored, {} failed",
            self.objects_stored, self.upload_failures
        )
    }
}

/// **FINALIZING Phase Statistics**
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeStats {
    pub duplicates_removed: usize,
    pub rejected: usize,
    pub persisted: usize,
}

impl FinalizeStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} persisted, {} duplicates removed, {} rejected",
            self.persisted, self.duplicates_removed, self.rejected
        )
    }
}

/// Statistics for every phase of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    pub staging: StagingStats,
    pub unwrapping: UnwrapStats,
    pub categorizing: CategorizeStats,
    pub decoding: DecodeStats,
    pub prospecting: ProspectStats,
    pub storing: StoreStats,
    pub finalizing: FinalizeStats,
}

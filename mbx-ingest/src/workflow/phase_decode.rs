//! DECODING phase
//!
//! Routes each categorized file to at most one format decoder:
//!
//! | file                                      | decoder      |
//! |-------------------------------------------|--------------|
//! | `.vcf`, `.vcard`                          | vCard        |
//! | `.apk`                                    | package      |
//! | `.json`                                   | JSON dump    |
//! | uncategorized, name contains `sms`        | SMS blob     |
//!
//! Files decode in parallel on the rayon pool; results are merged in file
//! order afterwards.

use super::{join_error, IngestPipeline};
use crate::error::IngestResult;
use crate::extractors::{
    decode_apk, decode_json_dump, decode_sms_blob, decode_vcard_text, DecodeError, Decoded,
    JsonDump, VCARD_EXTENSIONS,
};
use crate::models::{ItemIssue, RunId, RunSummary};
use mbx_common::records::{AppRecord, Category, Contact, DbKind, ExtractedFile, Message, RecordBatch};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Format decoder selected for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    VCard,
    SmsBlob,
    Package,
    JsonDump,
}

/// Pick the decoder for `file`, if any
pub fn route_file(file: &ExtractedFile) -> Option<Decoder> {
    match file.extension().as_deref() {
        Some(ext) if VCARD_EXTENSIONS.contains(&ext) => Some(Decoder::VCard),
        Some("apk") => Some(Decoder::Package),
        Some("json") => Some(Decoder::JsonDump),
        _ if file.category == Category::Other
            && file.file_name().to_lowercase().contains("sms") =>
        {
            Some(Decoder::SmsBlob)
        }
        _ => None,
    }
}

/// Everything the decoders produced for one run
#[derive(Debug, Default)]
pub struct DecodedFiles {
    /// Call logs, messages, contacts, notes and chat messages
    pub batch: RecordBatch,
    /// Contacts from vCards, deduplicated by their own identity rule
    pub vcard_contacts: Vec<Contact>,
    /// Package records keyed by the relative path of their installer
    pub packages: Vec<(PathBuf, AppRecord)>,
    pub issues: Vec<ItemIssue>,
}

enum Output {
    Contacts(Decoded<Contact>),
    Messages(Decoded<Message>),
    Package(AppRecord),
    Dump(JsonDump),
    /// Routed by name but turned out to be a database
    NotApplicable,
}

fn decode_file(file: &ExtractedFile, decoder: Decoder, max_inflated: u64) -> Result<Output, DecodeError> {
    match decoder {
        Decoder::VCard => {
            let bytes = std::fs::read(&file.absolute_path)?;
            Ok(Output::Contacts(decode_vcard_text(&String::from_utf8_lossy(&bytes))))
        }
        Decoder::SmsBlob => {
            let bytes = std::fs::read(&file.absolute_path)?;
            if DbKind::detect(&bytes) != DbKind::Unknown {
                return Ok(Output::NotApplicable);
            }
            decode_sms_blob(&bytes, max_inflated).map(Output::Messages)
        }
        Decoder::Package => {
            let mut app = decode_apk(&file.absolute_path)?;
            app.size_bytes = file.size_bytes;
            Ok(Output::Package(app))
        }
        Decoder::JsonDump => {
            let bytes = std::fs::read(&file.absolute_path)?;
            decode_json_dump(&String::from_utf8_lossy(&bytes)).map(Output::Dump)
        }
    }
}

fn skipped_issue(path: &str, skipped: usize, what: &str) -> ItemIssue {
    ItemIssue::warning(
        path,
        "ITEMS_SKIPPED",
        format!("{} malformed {} skipped", skipped, what),
    )
}

impl IngestPipeline {
    /// **Phase 3: DECODING** - run the per-format decoders
    pub(super) async fn phase_decoding(
        &self,
        run_id: &RunId,
        files: &[ExtractedFile],
        summary: &mut RunSummary,
    ) -> IngestResult<DecodedFiles> {
        info!(run_id = %run_id, "Phase 3: DECODING - running format decoders");

        let routed: Vec<(ExtractedFile, Decoder)> = files
            .iter()
            .filter_map(|f| route_file(f).map(|d| (f.clone(), d)))
            .collect();

        let max_inflated = self.settings.max_inflated_bytes;
        let results = tokio::task::spawn_blocking(move || {
            routed
                .into_par_iter()
                .map(|(file, decoder)| {
                    let result = decode_file(&file, decoder, max_inflated);
                    (file.relative_path, decoder, result)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| join_error("decoder", e))?;

        let stats = &mut summary.statistics.decoding;
        let mut out = DecodedFiles::default();

        for (relative_path, decoder, result) in results {
            let rel_path = relative_path.display().to_string();
            match decoder {
                Decoder::VCard => stats.vcard_files += 1,
                Decoder::SmsBlob => stats.sms_blob_files += 1,
                Decoder::Package => stats.package_files += 1,
                Decoder::JsonDump => stats.json_files += 1,
            }

            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    warn!(run_id = %run_id, file = %rel_path, error = %e, "Skipping undecodable file");
                    stats.files_failed += 1;
                    out.issues.push(ItemIssue::skip(rel_path, e.code(), e.to_string()));
                    continue;
                }
            };

            match output {
                Output::Contacts(decoded) => {
                    if decoded.skipped > 0 {
                        warn!(file = %rel_path, skipped = decoded.skipped, "Skipped empty vCard blocks");
                        out.issues.push(skipped_issue(&rel_path, decoded.skipped, "vCard blocks"));
                    }
                    stats.items_skipped += decoded.skipped;
                    out.vcard_contacts.extend(decoded.items);
                }
                Output::Messages(decoded) => {
                    if decoded.skipped > 0 {
                        warn!(file = %rel_path, skipped = decoded.skipped, "Skipped malformed messages");
                        out.issues.push(skipped_issue(&rel_path, decoded.skipped, "messages"));
                    }
                    stats.items_skipped += decoded.skipped;
                    out.batch.messages.extend(decoded.items);
                }
                Output::Package(app) => {
                    debug!(file = %rel_path, package = %app.package_name, "Decoded package manifest");
                    out.packages.push((relative_path, app));
                }
                Output::Dump(dump) => {
                    stats.items_skipped += dump.unmatched;
                    out.batch.merge(dump.batch);
                }
                Output::NotApplicable => {
                    debug!(file = %rel_path, "Name suggests messages but content is a database");
                }
            }
        }

        info!(
            run_id = %run_id,
            "DECODING complete: {}",
            summary.statistics.decoding.display_string()
        );
        summary.issues.extend(out.issues.iter().cloned());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(rel: &str, category: Category) -> ExtractedFile {
        ExtractedFile {
            category,
            relative_path: PathBuf::from(rel),
            absolute_path: PathBuf::from("/nonexistent").join(rel),
            size_bytes: 1,
            mime_type: "application/octet-stream".into(),
        }
    }

    #[test]
    fn test_route_file() {
        assert_eq!(route_file(&file("contacts/all.VCF", Category::Other)), Some(Decoder::VCard));
        assert_eq!(route_file(&file("apps/a.apk", Category::Other)), Some(Decoder::Package));
        assert_eq!(route_file(&file("export/sms.json", Category::Config)), Some(Decoder::JsonDump));
        assert_eq!(route_file(&file("export/sms_backup", Category::Other)), Some(Decoder::SmsBlob));
        assert_eq!(route_file(&file("db/mmssms.db", Category::Database)), None);
        assert_eq!(route_file(&file("DCIM/IMG_1.jpg", Category::Photo)), None);
        assert_eq!(route_file(&file("DCIM/sms_screenshot.jpg", Category::Photo)), None);
        assert_eq!(route_file(&file("Documents/sms_export.pdf", Category::Document)), None);
        assert_eq!(route_file(&file("backup/sms_settings.xml", Category::Config)), None);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = match decode_file(&file("x.vcf", Category::Other), Decoder::VCard, u64::MAX) {
            Err(e) => e,
            Ok(_) => panic!("expected a read error"),
        };
        assert_eq!(err.code(), "READ_FAILED");
    }
}

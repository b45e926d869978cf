//! Compressed SMS/MMS export decoder
//!
//! The export is a DEFLATE stream (zlib-wrapped or raw) holding a JSON array
//! of Android `sms` rows. Invalid UTF-8 is replaced rather than rejected.

use super::{DecodeError, Decoded};
use crate::heuristics::{extract_message, Row};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use mbx_common::records::Message;
use mbx_common::RawValue;
use std::io::Read;

/// Inflate at most `limit` bytes; anything past it fails the file
fn inflate(bytes: &[u8], limit: u64) -> Result<Vec<u8>, DecodeError> {
    let bounded = |out: Vec<u8>| {
        if out.len() as u64 > limit {
            Err(DecodeError::TooLarge(limit))
        } else {
            Ok(out)
        }
    };

    let mut out = Vec::new();
    if ZlibDecoder::new(bytes)
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .is_ok()
    {
        return bounded(out);
    }

    out.clear();
    DeflateDecoder::new(bytes)
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::Decompress(e.to_string()))?;
    bounded(out)
}

/// JSON object to a row keyed by lower-cased field name
pub(crate) fn object_to_row(object: &serde_json::Map<String, serde_json::Value>) -> Row {
    object
        .iter()
        .map(|(k, v)| (k.to_lowercase(), RawValue::from_json(v)))
        .collect()
}

/// Decode one compressed export.
///
/// Array elements that are not objects are skipped. A payload that does not
/// inflate within `max_inflated` bytes, or is not a JSON array, fails the
/// whole file.
pub fn decode_sms_blob(bytes: &[u8], max_inflated: u64) -> Result<Decoded<Message>, DecodeError> {
    let inflated = inflate(bytes, max_inflated)?;
    let text = String::from_utf8_lossy(&inflated);
    let document: serde_json::Value = serde_json::from_str(&text)?;

    let serde_json::Value::Array(entries) = document else {
        return Err(DecodeError::Shape("expected a JSON array of messages".into()));
    };

    let mut out = Decoded::default();
    for entry in &entries {
        match entry.as_object() {
            Some(object) => out.items.push(extract_message(&object_to_row(object))),
            None => out.skipped += 1,
        }
    }
    Ok(out)
}

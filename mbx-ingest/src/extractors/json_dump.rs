//! Generic JSON data-dump decoder
//!
//! A dump is either an array of heterogeneous objects or an object whose
//! values are such arrays. Each object is routed by its discriminating keys,
//! first match wins:
//!
//! | keys                        | record        |
//! |-----------------------------|---------------|
//! | `phone_number`, `call_type` | call log      |
//! | `phone_number`, `name`      | contact       |
//! | `message`, `sender`         | chat message  |
//! | `content`                   | note          |
//!
//! Objects matching no shape are dropped without a report.

use super::sms_blob::object_to_row;
use super::DecodeError;
use crate::heuristics::{
    extract_call_log, extract_chat_message, extract_contact, extract_note, Row,
};
use mbx_common::records::{RecordBatch, RecordKind};

const SHAPES: &[(RecordKind, &[&str])] = &[
    (RecordKind::CallLog, &["phone_number", "call_type"]),
    (RecordKind::Contact, &["phone_number", "name"]),
    (RecordKind::ChatMessage, &["message", "sender"]),
    (RecordKind::Note, &["content"]),
];

/// Decoded dump plus the number of objects no shape claimed
#[derive(Debug, Clone, Default)]
pub struct JsonDump {
    pub batch: RecordBatch,
    pub unmatched: usize,
}

fn shape_of(row: &Row) -> Option<RecordKind> {
    SHAPES
        .iter()
        .find(|(_, keys)| keys.iter().all(|k| row.contains_key(*k)))
        .map(|(kind, _)| *kind)
}

fn route(row: &Row, dump: &mut JsonDump) {
    let routed = match shape_of(row) {
        Some(RecordKind::CallLog) => extract_call_log(row).map(|r| dump.batch.call_logs.push(r)),
        Some(RecordKind::Contact) => extract_contact(row).map(|r| dump.batch.contacts.push(r)),
        Some(RecordKind::ChatMessage) => {
            extract_chat_message(row).map(|r| dump.batch.chat_messages.push(r))
        }
        Some(RecordKind::Note) => extract_note(row).map(|r| dump.batch.notes.push(r)),
        _ => None,
    };
    if routed.is_none() {
        dump.unmatched += 1;
    }
}

fn route_array(entries: &[serde_json::Value], dump: &mut JsonDump) {
    for entry in entries {
        match entry.as_object() {
            Some(object) => route(&object_to_row(object), dump),
            None => dump.unmatched += 1,
        }
    }
}

/// Decode one JSON dump; a scalar top-level document fails the file
pub fn decode_json_dump(text: &str) -> Result<JsonDump, DecodeError> {
    let document: serde_json::Value = serde_json::from_str(text)?;
    let mut dump = JsonDump::default();

    match &document {
        serde_json::Value::Array(entries) => route_array(entries, &mut dump),
        serde_json::Value::Object(sections) => {
            for value in sections.values() {
                if let serde_json::Value::Array(entries) = value {
                    route_array(entries, &mut dump);
                }
            }
        }
        _ => {
            return Err(DecodeError::Shape(
                "expected a JSON array or an object of arrays".into(),
            ))
        }
    }

    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_precedence() {
        let text = r#"[
            {"phone_number": "+989121234567", "call_type": "outgoing", "name": "Alice", "call_date": "2023-11-14T22:13:20Z", "duration": 12},
            {"phone_number": "+989121234567", "name": "Alice"},
            {"message": "hey", "sender": "bob", "content": "ignored"},
            {"content": "buy milk", "title": "todo"},
            {"unrelated": true},
            "not an object"
        ]"#;
        let dump = decode_json_dump(text).unwrap();

        assert_eq!(dump.batch.call_logs.len(), 1);
        assert_eq!(dump.batch.call_logs[0].call_type, "outgoing");
        assert_eq!(dump.batch.call_logs[0].duration_seconds, 12);
        assert_eq!(dump.batch.contacts.len(), 1);
        assert_eq!(dump.batch.chat_messages[0].message, "hey");
        assert_eq!(dump.batch.notes[0].content, "buy milk");
        assert_eq!(dump.batch.notes[0].title.as_deref(), Some("todo"));
        assert_eq!(dump.unmatched, 2);
    }

    #[test]
    fn test_object_of_arrays_and_key_case() {
        let text = r#"{
            "contacts": [{"Phone_Number": "12345", "NAME": "Carol"}],
            "notes": [{"content": "n1"}],
            "meta": {"version": 2}
        }"#;
        let dump = decode_json_dump(text).unwrap();
        assert_eq!(dump.batch.contacts[0].name, "Carol");
        assert_eq!(dump.batch.notes.len(), 1);
    }

    #[test]
    fn test_unknown_call_type_and_date_carried() {
        let text = r#"[{"phone_number": "12345", "call_type": "voicemail", "call_date": "never"}]"#;
        let dump = decode_json_dump(text).unwrap();
        let call = &dump.batch.call_logs[0];
        assert_eq!(call.call_type, "voicemail");
        assert!(call.call_date.is_none());
    }

    #[test]
    fn test_scalar_document_rejected() {
        assert!(matches!(decode_json_dump("42"), Err(DecodeError::Shape(_))));
        assert!(matches!(decode_json_dump("{oops"), Err(DecodeError::Json(_))));
    }
}

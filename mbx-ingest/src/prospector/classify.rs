//! Table classification by column names
//!
//! A rule lists groups of synonym sets; a table matches when its column set
//! intersects every group (a group is the union of its sets). Rules are
//! tried in order and the first match wins, so contact detection runs
//! before call-log detection for tables that satisfy both.

use crate::heuristics::{
    extract_bookmark, extract_call_log, extract_chat_message, extract_contact, extract_message,
    extract_note, has_any, Row, CALL_TYPE_KEYS, CHAT_BODY_KEYS, DATE_KEYS, DURATION_KEYS,
    MESSAGE_ADDRESS_KEYS, MESSAGE_BODY_KEYS, NAME_KEYS, NOTE_BODY_KEYS, PHONE_KEYS, SENDER_KEYS,
    SURNAME_KEYS, TITLE_KEYS, URL_KEYS,
};
use mbx_common::records::{RecordBatch, RecordKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity a table holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Contact,
    CallLog,
    Message,
    ChatMessage,
    Note,
    Bookmark,
}

impl TableKind {
    pub fn record_kind(self) -> RecordKind {
        match self {
            TableKind::Contact => RecordKind::Contact,
            TableKind::CallLog => RecordKind::CallLog,
            TableKind::Message => RecordKind::Message,
            TableKind::ChatMessage => RecordKind::ChatMessage,
            TableKind::Note => RecordKind::Note,
            TableKind::Bookmark => RecordKind::Bookmark,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_kind().as_str())
    }
}

type KeyGroup = &'static [&'static [&'static str]];

struct Rule {
    kind: TableKind,
    required: &'static [KeyGroup],
}

const RULES: &[Rule] = &[
    Rule {
        kind: TableKind::Contact,
        required: &[&[PHONE_KEYS], &[NAME_KEYS, SURNAME_KEYS]],
    },
    Rule {
        kind: TableKind::CallLog,
        required: &[&[PHONE_KEYS], &[DATE_KEYS, CALL_TYPE_KEYS, DURATION_KEYS]],
    },
    Rule {
        kind: TableKind::Message,
        required: &[&[MESSAGE_ADDRESS_KEYS], &[MESSAGE_BODY_KEYS], &[DATE_KEYS]],
    },
    Rule {
        kind: TableKind::ChatMessage,
        required: &[&[SENDER_KEYS], &[CHAT_BODY_KEYS]],
    },
    Rule {
        kind: TableKind::Note,
        required: &[&[NOTE_BODY_KEYS], &[DATE_KEYS]],
    },
    Rule {
        kind: TableKind::Bookmark,
        required: &[&[URL_KEYS], &[TITLE_KEYS]],
    },
];

fn group_matches(columns: &[String], group: KeyGroup) -> bool {
    group.iter().any(|keys| has_any(columns, keys))
}

/// Classify a table from its lower-cased column names
pub fn classify_columns(columns: &[String]) -> Option<TableKind> {
    RULES
        .iter()
        .find(|rule| rule.required.iter().all(|g| group_matches(columns, g)))
        .map(|rule| rule.kind)
}

/// Extract records of `kind` from sampled rows.
///
/// Returns the records and the number of rows dropped: rows without a phone
/// identity for contacts and call logs, call logs whose date does not
/// resolve, and rows without text for the other kinds.
pub fn extract_rows(kind: TableKind, rows: &[Row]) -> (RecordBatch, usize) {
    let mut batch = RecordBatch::new();
    let mut dropped = 0;

    for row in rows {
        let kept = match kind {
            TableKind::Contact => extract_contact(row).map(|c| batch.contacts.push(c)),
            TableKind::CallLog => extract_call_log(row)
                .filter(|call| call.call_date.is_some())
                .map(|call| batch.call_logs.push(call)),
            TableKind::Message => {
                batch.messages.push(extract_message(row));
                Some(())
            }
            TableKind::ChatMessage => extract_chat_message(row).map(|m| batch.chat_messages.push(m)),
            TableKind::Note => extract_note(row).map(|n| batch.notes.push(n)),
            TableKind::Bookmark => extract_bookmark(row).map(|b| batch.bookmarks.push(b)),
        };
        if kept.is_none() {
            dropped += 1;
        }
    }

    (batch, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbx_common::RawValue;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(pairs: &[(&str, RawValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_reference_shapes() {
        assert_eq!(
            classify_columns(&cols(&["id", "phone_number", "name"])),
            Some(TableKind::Contact)
        );
        assert_eq!(
            classify_columns(&cols(&["id", "number", "call_type", "call_date"])),
            Some(TableKind::CallLog)
        );
        assert_eq!(classify_columns(&cols(&["id", "title", "content"])), None);
    }

    #[test]
    fn test_contact_wins_over_call_log() {
        // Android `calls` caches the contact name next to the number
        let columns = cols(&["_id", "number", "date", "duration", "type", "name"]);
        assert_eq!(classify_columns(&columns), Some(TableKind::Contact));

        let columns = cols(&["_id", "number", "date", "duration", "type"]);
        assert_eq!(classify_columns(&columns), Some(TableKind::CallLog));
    }

    #[test]
    fn test_additional_shapes() {
        assert_eq!(
            classify_columns(&cols(&["_id", "address", "body", "date", "type"])),
            Some(TableKind::Message)
        );
        assert_eq!(
            classify_columns(&cols(&["id", "sender", "text", "ts"])),
            Some(TableKind::ChatMessage)
        );
        assert_eq!(
            classify_columns(&cols(&["id", "title", "content", "created_at"])),
            Some(TableKind::Note)
        );
        assert_eq!(
            classify_columns(&cols(&["id", "url", "title"])),
            Some(TableKind::Bookmark)
        );
    }

    #[test]
    fn test_call_log_row_extraction() {
        let rows = vec![
            row(&[
                ("number", "+989121234567".into()),
                ("type", "2".into()),
                ("duration", RawValue::Integer(45)),
                ("date", RawValue::Integer(1_700_000_000)),
            ]),
            // unresolvable date
            row(&[("number", "+989121234567".into()), ("date", "yesterday".into())]),
            // no phone
            row(&[("type", "1".into()), ("date", RawValue::Integer(1_700_000_000))]),
        ];

        let (batch, dropped) = extract_rows(TableKind::CallLog, &rows);

        assert_eq!(batch.call_logs.len(), 1);
        assert_eq!(batch.call_logs[0].call_type, "outgoing");
        assert_eq!(batch.call_logs[0].duration_seconds, 45);
        assert_eq!(dropped, 2);
    }
}

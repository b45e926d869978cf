//! Column-name vocabulary and row extraction
//!
//! Device databases and JSON dumps name the same logical field many ways.
//! This module holds the one shared vocabulary of synonyms and the row
//! pickers built on it; the database prospector and the generic JSON
//! decoder both extract through here.
//!
//! Synonym lists are ordered: when a row carries several spellings of a
//! field, the first present one in list order wins.

use mbx_common::records::{
    BookmarkRecord, CallLogEntry, CallType, ChatMessageRecord, Contact, Message, MessageKind,
    NoteRecord,
};
use mbx_common::time::parse_timestamp;
use mbx_common::RawValue;
use std::collections::HashMap;

/// One row keyed by lower-cased column name
pub type Row = HashMap<String, RawValue>;

pub const PHONE_KEYS: &[&str] = &["phone_number", "number", "mobile", "tel", "msisdn"];
pub const NAME_KEYS: &[&str] = &["name", "display_name", "full_name", "given_name", "first_name"];
pub const SURNAME_KEYS: &[&str] = &["family_name", "last_name", "surname"];
pub const EMAIL_KEYS: &[&str] = &["email", "e_mail", "mail"];
pub const GROUP_KEYS: &[&str] = &["group", "group_name", "label", "category"];
pub const ADDRESS_KEYS: &[&str] = &["address", "addr", "street", "city", "location"];
pub const CREATED_KEYS: &[&str] = &["created_at", "date_added"];

pub const CALL_TYPE_KEYS: &[&str] = &["call_type", "type", "direction"];
pub const DATE_KEYS: &[&str] = &["call_date", "date", "timestamp", "time", "created_at"];
pub const DURATION_KEYS: &[&str] = &["duration_seconds", "duration", "call_duration"];

pub const MESSAGE_ADDRESS_KEYS: &[&str] = &["address"];
pub const MESSAGE_BODY_KEYS: &[&str] = &["body", "text", "snippet"];
pub const MESSAGE_ID_KEYS: &[&str] = &["_id", "id", "message_id"];
pub const SENT_DATE_KEYS: &[&str] = &["date_sent"];
pub const RECEIVED_DATE_KEYS: &[&str] = &["date"];
pub const STATUS_KEYS: &[&str] = &["status"];
/// Presence of any of these marks a multimedia message
pub const MMS_MARKER_KEYS: &[&str] = &["m_type", "ct_t", "ct_l", "parts"];

pub const SENDER_KEYS: &[&str] = &["sender", "from", "author", "sender_name"];
pub const CHAT_BODY_KEYS: &[&str] = &["message", "text", "body", "content"];
pub const CHAT_ID_KEYS: &[&str] = &["chat_id", "thread_id", "conversation_id"];

pub const NOTE_BODY_KEYS: &[&str] = &["note", "note_body", "snippet", "content"];
pub const TITLE_KEYS: &[&str] = &["title"];

pub const URL_KEYS: &[&str] = &["url", "uri", "link"];

/// True when any of `keys` is a column of `columns`
pub fn has_any<'a, I>(columns: I, keys: &[&str]) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    columns.into_iter().any(|c| keys.contains(&c.as_str()))
}

/// First present value over `keys`, in key order
pub fn pick_first<'r>(row: &'r Row, keys: &[&str]) -> Option<&'r RawValue> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| v.is_present())
}

/// First present value rendered as trimmed, non-empty text
pub fn pick_text(row: &Row, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .filter_map(RawValue::as_text)
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn contact_name(row: &Row) -> String {
    if let Some(name) = pick_text(row, &["name", "display_name", "full_name"]) {
        return name;
    }
    let given = pick_text(row, &["given_name", "first_name"]);
    let family = pick_text(row, SURNAME_KEYS);
    match (given, family) {
        (Some(g), Some(f)) => format!("{} {}", g, f),
        (Some(g), None) => g,
        (None, Some(f)) => f,
        (None, None) => String::new(),
    }
}

/// Contact from a row; `None` when the row has no phone identity
pub fn extract_contact(row: &Row) -> Option<Contact> {
    let phone_number = pick_text(row, PHONE_KEYS)?;
    Some(Contact {
        name: contact_name(row),
        phone_number,
        email: pick_text(row, EMAIL_KEYS),
        group: pick_text(row, GROUP_KEYS),
        address: pick_text(row, ADDRESS_KEYS),
        created_at: pick_first(row, CREATED_KEYS).and_then(parse_timestamp),
    })
}

/// Call-log entry from a row; `None` when the row has no phone identity.
///
/// An unresolvable date leaves `call_date` empty and an unrecognized call
/// type is carried verbatim; callers decide whether to drop such entries.
pub fn extract_call_log(row: &Row) -> Option<CallLogEntry> {
    let phone_number = pick_text(row, PHONE_KEYS)?;

    let raw_type = pick_text(row, CALL_TYPE_KEYS).unwrap_or_default();
    let call_type = CallType::from_device_value(&raw_type)
        .map(|t| t.as_str().to_string())
        .unwrap_or(raw_type);

    let duration_seconds = pick_first(row, DURATION_KEYS)
        .and_then(RawValue::as_integer)
        .unwrap_or(0);

    Some(CallLogEntry {
        phone_number,
        call_type,
        call_date: pick_first(row, DATE_KEYS).and_then(parse_timestamp),
        duration_seconds,
    })
}

/// Android `type` code `1` is an inbound message
pub fn is_inbound(row: &Row) -> bool {
    pick_text(row, &["type"]).as_deref() == Some("1")
}

/// Message from an Android-style row (`address`, `body`, `date`, `type`).
///
/// A missing body is carried as empty text for the validation gate to reject.
pub fn extract_message(row: &Row) -> Message {
    let body = pick_first(row, MESSAGE_BODY_KEYS)
        .and_then(RawValue::as_text)
        .unwrap_or_default();
    let address = pick_text(row, MESSAGE_ADDRESS_KEYS);
    let (sender, receiver) = if is_inbound(row) {
        (address, None)
    } else {
        (None, address)
    };
    let kind = if has_any(row.keys(), MMS_MARKER_KEYS) {
        MessageKind::Mms
    } else {
        MessageKind::Sms
    };

    Message {
        external_id: pick_text(row, MESSAGE_ID_KEYS),
        sender,
        receiver,
        body,
        sent_at: pick_first(row, SENT_DATE_KEYS).and_then(parse_timestamp),
        received_at: pick_first(row, RECEIVED_DATE_KEYS).and_then(parse_timestamp),
        message_type: kind.as_str().to_string(),
        status: pick_first(row, STATUS_KEYS)
            .and_then(RawValue::as_integer)
            .unwrap_or(0),
    }
}

pub fn extract_chat_message(row: &Row) -> Option<ChatMessageRecord> {
    let message = pick_text(row, CHAT_BODY_KEYS)?;
    Some(ChatMessageRecord {
        chat_id: pick_text(row, CHAT_ID_KEYS),
        sender: pick_text(row, SENDER_KEYS),
        message,
        sent_at: pick_first(row, DATE_KEYS).and_then(parse_timestamp),
    })
}

pub fn extract_note(row: &Row) -> Option<NoteRecord> {
    let content = pick_text(row, NOTE_BODY_KEYS)?;
    Some(NoteRecord {
        title: pick_text(row, TITLE_KEYS),
        content,
        created_at: pick_first(row, DATE_KEYS).and_then(parse_timestamp),
    })
}

pub fn extract_bookmark(row: &Row) -> Option<BookmarkRecord> {
    let url = pick_text(row, URL_KEYS)?;
    Some(BookmarkRecord {
        title: pick_text(row, TITLE_KEYS).unwrap_or_default(),
        url,
        added_at: pick_first(row, &["added_at", "date", "created"]).and_then(parse_timestamp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, RawValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_pick_first_follows_key_order() {
        let r = row(&[
            ("mobile", "0912".into()),
            ("number", "".into()),
            ("phone_number", RawValue::Null),
        ]);
        assert_eq!(pick_text(&r, PHONE_KEYS).as_deref(), Some("0912"));

        let r = row(&[("tel", "1".into()), ("number", "2".into())]);
        assert_eq!(pick_text(&r, PHONE_KEYS).as_deref(), Some("2"));
    }

    #[test]
    fn test_contact_requires_phone() {
        let r = row(&[("name", "Alice".into())]);
        assert!(extract_contact(&r).is_none());
    }

    #[test]
    fn test_contact_name_from_parts() {
        let r = row(&[
            ("first_name", "Ada".into()),
            ("last_name", "Lovelace".into()),
            ("mobile", RawValue::Integer(9121234567)),
        ]);
        let contact = extract_contact(&r).unwrap();
        assert_eq!(contact.name, "Ada Lovelace");
        assert_eq!(contact.phone_number, "9121234567");
    }

    #[test]
    fn test_call_log_row() {
        let r = row(&[
            ("number", "+989121234567".into()),
            ("type", "2".into()),
            ("duration", RawValue::Integer(45)),
            ("date", RawValue::Integer(1_700_000_000)),
        ]);
        let entry = extract_call_log(&r).unwrap();
        assert_eq!(entry.call_type, "outgoing");
        assert_eq!(entry.duration_seconds, 45);
        assert_eq!(entry.call_date.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_call_log_keeps_unknown_type_and_missing_date() {
        let r = row(&[
            ("phone_number", "12345".into()),
            ("call_type", "voicemail".into()),
            ("call_date", "soon".into()),
            ("duration", "abc".into()),
        ]);
        let entry = extract_call_log(&r).unwrap();
        assert_eq!(entry.call_type, "voicemail");
        assert!(entry.call_date.is_none());
        assert_eq!(entry.duration_seconds, 0);
    }

    #[test]
    fn test_message_direction() {
        let inbound = row(&[
            ("address", "+989121234567".into()),
            ("body", "hi".into()),
            ("type", RawValue::Integer(1)),
            ("date", RawValue::Integer(1_700_000_000_000)),
        ]);
        let msg = extract_message(&inbound);
        assert_eq!(msg.sender.as_deref(), Some("+989121234567"));
        assert!(msg.receiver.is_none());
        assert_eq!(msg.message_type, "sms");
        assert_eq!(msg.received_at.unwrap().timestamp(), 1_700_000_000);

        let outbound = row(&[
            ("address", "+989121234567".into()),
            ("body", "yo".into()),
            ("type", "2".into()),
            ("ct_t", "application/vnd.wap.multipart.related".into()),
        ]);
        let msg = extract_message(&outbound);
        assert!(msg.sender.is_none());
        assert_eq!(msg.receiver.as_deref(), Some("+989121234567"));
        assert_eq!(msg.message_type, "mms");
    }
}

//! Validation gate
//!
//! # Checks
//! - **Contact**: non-empty name within the name limit, phone passing the
//!   phone-format check
//! - **Call log**: valid phone, call type in {incoming, outgoing, missed},
//!   non-negative duration, resolved call date
//! - **Message**: non-empty body within the body limit, kind sms or mms,
//!   sender and receiver (when present) matching the mobile pattern
//! - **Note / chat message**: non-empty text
//! - **Bookmark**: non-empty title and URL
//! - **App**: non-empty package name

use crate::models::Rejection;
use mbx_common::config::IngestSettings;
use mbx_common::records::{
    AppRecord, BookmarkRecord, CallLogEntry, ChatMessageRecord, Contact, Message, NoteRecord,
    RecordBatch, RecordKind,
};
use mbx_common::PhoneRules;
use tracing::debug;

/// Phone fields longer than this cannot be stored
const MAX_PHONE_CHARS: usize = 50;

/// Records split into accepted and rejected
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    pub accepted: RecordBatch,
    pub rejections: Vec<Rejection>,
}

impl GateOutcome {
    pub fn rejected(&self, kind: RecordKind) -> usize {
        self.rejections.iter().filter(|r| r.kind == kind).count()
    }
}

/// Validation gate
#[derive(Debug, Clone)]
pub struct ValidationGate {
    phone_rules: PhoneRules,
    max_name_chars: usize,
    max_message_chars: usize,
}

impl ValidationGate {
    pub fn new(phone_rules: PhoneRules, max_name_chars: usize, max_message_chars: usize) -> Self {
        Self {
            phone_rules,
            max_name_chars,
            max_message_chars,
        }
    }

    pub fn from_settings(settings: &IngestSettings) -> Self {
        Self::new(
            PhoneRules::new(&settings.country_code),
            settings.max_name_chars,
            settings.max_message_chars,
        )
    }

    /// Validate every record of `batch`
    pub fn validate(&self, batch: RecordBatch) -> GateOutcome {
        let mut rejections = Vec::new();
        let mut accepted = RecordBatch::new();

        accepted.contacts = filter(batch.contacts, RecordKind::Contact, &mut rejections, |c| {
            (self.check_contact(c), c.phone_number.clone())
        });
        accepted.call_logs = filter(batch.call_logs, RecordKind::CallLog, &mut rejections, |c| {
            (self.check_call_log(c), c.phone_number.clone())
        });
        accepted.messages = filter(batch.messages, RecordKind::Message, &mut rejections, |m| {
            let subject = m.sender.clone().or_else(|| m.receiver.clone()).unwrap_or_default();
            (self.check_message(m), subject)
        });
        accepted.apps = filter(batch.apps, RecordKind::App, &mut rejections, |a| {
            (check_app(a), a.package_name.clone())
        });
        accepted.notes = filter(batch.notes, RecordKind::Note, &mut rejections, |n| {
            (check_note(n), n.title.clone().unwrap_or_default())
        });
        accepted.bookmarks = filter(batch.bookmarks, RecordKind::Bookmark, &mut rejections, |b| {
            (check_bookmark(b), b.url.clone())
        });
        accepted.chat_messages =
            filter(batch.chat_messages, RecordKind::ChatMessage, &mut rejections, |c| {
                (check_chat(c), c.sender.clone().unwrap_or_default())
            });
        accepted.media = batch.media;
        accepted.documents = batch.documents;
        accepted.raw_databases = batch.raw_databases;

        if !rejections.is_empty() {
            debug!(rejected = rejections.len(), "Validation gate rejected records");
        }
        GateOutcome {
            accepted,
            rejections,
        }
    }

    fn check_phone(&self, phone: &str) -> Result<(), String> {
        if phone.is_empty() {
            return Err("missing phone number".to_string());
        }
        if phone.chars().count() > MAX_PHONE_CHARS {
            return Err(format!("phone number longer than {} characters", MAX_PHONE_CHARS));
        }
        if !self.phone_rules.is_valid(phone) {
            return Err(format!("invalid phone number format: {}", phone));
        }
        Ok(())
    }

    pub fn check_contact(&self, contact: &Contact) -> Result<(), String> {
        if contact.name.trim().is_empty() {
            return Err("missing name".to_string());
        }
        if contact.name.chars().count() > self.max_name_chars {
            return Err(format!("name longer than {} characters", self.max_name_chars));
        }
        self.check_phone(&contact.phone_number)
    }

    pub fn check_call_log(&self, call: &CallLogEntry) -> Result<(), String> {
        self.check_phone(&call.phone_number)?;
        if call.call_type().is_none() {
            return Err(format!("invalid call type: {:?}", call.call_type));
        }
        if call.duration_seconds < 0 {
            return Err(format!("negative duration: {}", call.duration_seconds));
        }
        if call.call_date.is_none() {
            return Err("unresolvable call date".to_string());
        }
        Ok(())
    }

    pub fn check_message(&self, message: &Message) -> Result<(), String> {
        if message.body.trim().is_empty() {
            return Err("empty body".to_string());
        }
        if message.body.chars().count() > self.max_message_chars {
            return Err(format!("body longer than {} characters", self.max_message_chars));
        }
        if message.kind().is_none() {
            return Err(format!("invalid message type: {:?}", message.message_type));
        }
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if present(&message.sender) == present(&message.receiver) {
            return Err("needs exactly one of sender and receiver".to_string());
        }
        for (field, value) in [("sender", &message.sender), ("receiver", &message.receiver)] {
            if let Some(value) = value {
                if !self.phone_rules.is_mobile(value) {
                    return Err(format!("{} is not a mobile number: {}", field, value));
                }
            }
        }
        Ok(())
    }
}

fn check_app(app: &AppRecord) -> Result<(), String> {
    if app.package_name.trim().is_empty() {
        return Err("missing package name".to_string());
    }
    Ok(())
}

fn check_note(note: &NoteRecord) -> Result<(), String> {
    if note.content.trim().is_empty() {
        return Err("empty note".to_string());
    }
    Ok(())
}

fn check_bookmark(bookmark: &BookmarkRecord) -> Result<(), String> {
    if bookmark.url.trim().is_empty() {
        return Err("missing url".to_string());
    }
    if bookmark.title.trim().is_empty() {
        return Err("missing title".to_string());
    }
    Ok(())
}

fn check_chat(chat: &ChatMessageRecord) -> Result<(), String> {
    if chat.message.trim().is_empty() {
        return Err("empty message".to_string());
    }
    Ok(())
}

fn filter<T, F>(records: Vec<T>, kind: RecordKind, rejections: &mut Vec<Rejection>, check: F) -> Vec<T>
where
    F: Fn(&T) -> (Result<(), String>, String),
{
    let mut accepted = Vec::with_capacity(records.len());
    for record in records {
        match check(&record) {
            (Ok(()), _) => accepted.push(record),
            (Err(reason), subject) => rejections.push(Rejection {
                kind,
                reason,
                subject,
            }),
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn gate() -> ValidationGate {
        ValidationGate::from_settings(&IngestSettings::default())
    }

    fn message(body: &str, sender: Option<&str>) -> Message {
        Message {
            external_id: None,
            sender: sender.map(String::from),
            receiver: None,
            body: body.into(),
            sent_at: None,
            received_at: None,
            message_type: "sms".into(),
            status: 0,
        }
    }

    fn call(phone: &str, call_type: &str, duration: i64, dated: bool) -> CallLogEntry {
        CallLogEntry {
            phone_number: phone.into(),
            call_type: call_type.into(),
            call_date: dated.then(Utc::now),
            duration_seconds: duration,
        }
    }

    #[test]
    fn test_contact_rules() {
        let gate = gate();
        let ok = Contact {
            name: "Alice".into(),
            phone_number: "0989123456".into(),
            ..Default::default()
        };
        assert!(gate.check_contact(&ok).is_ok());

        let nameless = Contact {
            name: " ".into(),
            ..ok.clone()
        };
        assert!(gate.check_contact(&nameless).is_err());

        let long_name = Contact {
            name: "x".repeat(256),
            ..ok.clone()
        };
        assert!(gate.check_contact(&long_name).is_err());

        let bad_phone = Contact {
            phone_number: "12ab".into(),
            ..ok
        };
        assert!(gate.check_contact(&bad_phone).is_err());
    }

    #[test]
    fn test_call_log_rules() {
        let gate = gate();
        assert!(gate.check_call_log(&call("+989121234567", "outgoing", 45, true)).is_ok());
        assert!(gate.check_call_log(&call("+989121234567", "voicemail", 45, true)).is_err());
        assert!(gate.check_call_log(&call("+989121234567", "missed", -1, true)).is_err());
        assert!(gate.check_call_log(&call("+989121234567", "missed", 0, false)).is_err());
        assert!(gate.check_call_log(&call("", "missed", 0, true)).is_err());
    }

    #[test]
    fn test_message_rules() {
        let gate = gate();
        let mobile = Some("+989121234567");
        assert!(gate.check_message(&message("hi", mobile)).is_ok());
        assert!(gate.check_message(&message("", mobile)).is_err());
        assert!(gate.check_message(&message("hi", Some("12345"))).is_err());
        assert!(gate.check_message(&message(&"x".repeat(10_001), mobile)).is_err());
        assert!(gate.check_message(&message(&"x".repeat(10_000), mobile)).is_ok());

        let mut outbound = message("hi", None);
        outbound.receiver = Some("+989121234567".into());
        assert!(gate.check_message(&outbound).is_ok());

        let mut wrong_kind = message("hi", mobile);
        wrong_kind.message_type = "fax".into();
        assert!(gate.check_message(&wrong_kind).is_err());
    }

    #[test]
    fn test_message_needs_one_party() {
        let gate = gate();
        let err = gate.check_message(&message("hi", None)).unwrap_err();
        assert!(err.contains("exactly one"));
        assert!(gate.check_message(&message("hi", Some("  "))).is_err());

        let mut both = message("hi", Some("+989121234567"));
        both.receiver = Some("+989351234567".into());
        assert!(gate.check_message(&both).is_err());
    }

    #[test]
    fn test_validate_partitions_batch() {
        let mut batch = RecordBatch::new();
        batch.call_logs.push(call("+989121234567", "outgoing", 45, true));
        batch.call_logs.push(call("+989121234567", "outgoing", 45, false));
        batch.notes.push(NoteRecord::default());

        let outcome = gate().validate(batch);

        assert_eq!(outcome.accepted.call_logs.len(), 1);
        assert_eq!(outcome.accepted.notes.len(), 0);
        assert_eq!(outcome.rejected(RecordKind::CallLog), 1);
        assert_eq!(outcome.rejected(RecordKind::Note), 1);
        assert_eq!(outcome.rejections[0].subject, "+989121234567");
        assert_eq!(outcome.rejections[0].reason, "unresolvable call date");
    }
}

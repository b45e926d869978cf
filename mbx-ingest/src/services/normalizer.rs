//! Record normalization
//!
//! Canonicalizes every phone-like field in a batch so that deduplication
//! and validation see one spelling per number. Timestamps are already
//! resolved when records are decoded.

use mbx_common::records::RecordBatch;
use mbx_common::PhoneRules;

/// Applies phone canonicalization across a record batch
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    phone_rules: PhoneRules,
}

impl Normalizer {
    pub fn new(phone_rules: PhoneRules) -> Self {
        Self { phone_rules }
    }

    pub fn phone_rules(&self) -> &PhoneRules {
        &self.phone_rules
    }

    /// Normalize in place
    pub fn normalize_batch(&self, batch: &mut RecordBatch) {
        for contact in &mut batch.contacts {
            contact.phone_number = self.phone_rules.normalize(&contact.phone_number);
            contact.name = contact.name.trim().to_string();
            if let Some(email) = contact.email.take() {
                let email = email.trim().to_string();
                contact.email = (!email.is_empty()).then_some(email);
            }
        }

        for call in &mut batch.call_logs {
            call.phone_number = self.phone_rules.normalize(&call.phone_number);
        }

        for message in &mut batch.messages {
            message.sender = message.sender.take().map(|s| self.phone_rules.normalize(&s));
            message.receiver = message.receiver.take().map(|r| self.phone_rules.normalize(&r));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbx_common::records::{CallLogEntry, Contact, Message};

    #[test]
    fn test_normalizes_phone_fields() {
        let mut batch = RecordBatch::new();
        batch.contacts.push(Contact {
            name: "  Alice ".into(),
            phone_number: "0098 912 123 4567".into(),
            email: Some("  ".into()),
            ..Default::default()
        });
        batch.call_logs.push(CallLogEntry {
            phone_number: "98-912-123-4567".into(),
            call_type: "incoming".into(),
            call_date: None,
            duration_seconds: 0,
        });
        batch.messages.push(Message {
            external_id: None,
            sender: Some("(0912) 123 4567".into()),
            receiver: None,
            body: "hi".into(),
            sent_at: None,
            received_at: None,
            message_type: "sms".into(),
            status: 0,
        });

        Normalizer::default().normalize_batch(&mut batch);

        assert_eq!(batch.contacts[0].phone_number, "+989121234567");
        assert_eq!(batch.contacts[0].name, "Alice");
        assert!(batch.contacts[0].email.is_none());
        assert_eq!(batch.call_logs[0].phone_number, "+989121234567");
        assert_eq!(batch.messages[0].sender.as_deref(), Some("09121234567"));
    }

    #[test]
    fn test_configured_country_code() {
        let mut batch = RecordBatch::new();
        batch.contacts.push(Contact {
            name: "Bob".into(),
            phone_number: "00447700900123".into(),
            ..Default::default()
        });

        Normalizer::new(PhoneRules::new("44")).normalize_batch(&mut batch);
        assert_eq!(batch.contacts[0].phone_number, "+447700900123");
    }
}

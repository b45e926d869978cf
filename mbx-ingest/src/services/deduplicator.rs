//! Record deduplication
//!
//! Collapses records that describe the same logical entity but were found in
//! several source files or tables. First seen wins; later copies are counted
//! and dropped. Runs once per run over the merged, normalized batch, so the
//! seen-key sets have a single writer.
//!
//! # Identity keys
//! - Contact (tables, JSON): normalized name + canonical phone
//! - Contact (vCard): canonical phone, else email (case-insensitive), else
//!   name (case-insensitive), checked against every contact already kept
//! - Call log: canonical phone + epoch seconds (0 if unresolved) + call type
//! - Message: direction + address + body + epoch seconds of either timestamp
//! - App: package name + version code

use mbx_common::records::{Contact, RecordBatch, RecordKind};
use std::collections::{BTreeMap, HashSet};

/// Collapse whitespace and lower-case
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub removed: BTreeMap<RecordKind, usize>,
}

impl DedupStats {
    pub fn removed(&self, kind: RecordKind) -> usize {
        self.removed.get(&kind).copied().unwrap_or(0)
    }

    fn count(&mut self, kind: RecordKind, removed: usize) {
        if removed > 0 {
            *self.removed.entry(kind).or_insert(0) += removed;
        }
    }
}

/// Seen-key sets for one run
#[derive(Debug, Default)]
pub struct Deduplicator {
    contact_keys: HashSet<(String, String)>,
    contact_phones: HashSet<String>,
    contact_emails: HashSet<String>,
    contact_names: HashSet<String>,
    call_keys: HashSet<(String, i64, String)>,
    message_keys: HashSet<(bool, String, String, i64)>,
    app_keys: HashSet<(String, Option<i64>)>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deduplicate a merged batch plus the contacts decoded from vCards
    pub fn dedup(&mut self, batch: RecordBatch, vcard_contacts: Vec<Contact>) -> (RecordBatch, DedupStats) {
        let mut stats = DedupStats::default();
        let mut out = batch;

        let before = out.contacts.len() + vcard_contacts.len();
        let mut contacts = Vec::with_capacity(before);
        for contact in std::mem::take(&mut out.contacts) {
            if self.admit_contact(&contact) {
                contacts.push(contact);
            }
        }
        for contact in vcard_contacts {
            if self.admit_vcard_contact(&contact) {
                contacts.push(contact);
            }
        }
        stats.count(RecordKind::Contact, before - contacts.len());
        out.contacts = contacts;

        let before = out.call_logs.len();
        out.call_logs.retain(|call| {
            let secs = call.call_date.map(|d| d.timestamp()).unwrap_or(0);
            self.call_keys
                .insert((call.phone_number.clone(), secs, call.call_type.clone()))
        });
        stats.count(RecordKind::CallLog, before - out.call_logs.len());

        let before = out.messages.len();
        out.messages.retain(|msg| {
            let inbound = msg.sender.is_some();
            let address = msg.sender.clone().or_else(|| msg.receiver.clone()).unwrap_or_default();
            let secs = msg
                .received_at
                .or(msg.sent_at)
                .map(|d| d.timestamp())
                .unwrap_or(0);
            self.message_keys.insert((inbound, address, msg.body.clone(), secs))
        });
        stats.count(RecordKind::Message, before - out.messages.len());

        let before = out.apps.len();
        out.apps
            .retain(|app| self.app_keys.insert((app.package_name.clone(), app.version_code)));
        stats.count(RecordKind::App, before - out.apps.len());

        (out, stats)
    }

    fn remember_contact(&mut self, contact: &Contact) {
        if !contact.phone_number.is_empty() {
            self.contact_phones.insert(contact.phone_number.clone());
        }
        if let Some(email) = contact.email.as_deref().filter(|e| !e.is_empty()) {
            self.contact_emails.insert(email.to_lowercase());
        }
        self.contact_names.insert(normalize_name(&contact.name));
    }

    fn admit_contact(&mut self, contact: &Contact) -> bool {
        let key = (normalize_name(&contact.name), contact.phone_number.clone());
        if !self.contact_keys.insert(key) {
            return false;
        }
        self.remember_contact(contact);
        true
    }

    fn admit_vcard_contact(&mut self, contact: &Contact) -> bool {
        let duplicate = if !contact.phone_number.is_empty() {
            self.contact_phones.contains(&contact.phone_number)
        } else if let Some(email) = contact.email.as_deref().filter(|e| !e.is_empty()) {
            self.contact_emails.contains(&email.to_lowercase())
        } else {
            self.contact_names.contains(&normalize_name(&contact.name))
        };
        if duplicate {
            return false;
        }
        self.contact_keys
            .insert((normalize_name(&contact.name), contact.phone_number.clone()));
        self.remember_contact(contact);
        true
    }
}

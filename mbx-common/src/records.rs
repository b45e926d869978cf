//! Extracted record data model
//!
//! Every record is a plain value scoped to one backup run. Records have no
//! identity until the persistence collaborator stores them; duplicates are
//! recognized by the identity keys in the deduplicator, not by these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// File category assigned by the categorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Photo,
    Video,
    Audio,
    Document,
    Database,
    Archive,
    Config,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Photo,
        Category::Video,
        Category::Audio,
        Category::Document,
        Category::Database,
        Category::Archive,
        Category::Config,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Photo => "photo",
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Document => "document",
            Category::Database => "database",
            Category::Archive => "archive",
            Category::Config => "config",
            Category::Other => "other",
        }
    }

    /// Folder name used in object-store keys
    pub fn folder(self) -> &'static str {
        match self {
            Category::Photo => "photos",
            Category::Video => "videos",
            Category::Audio => "audios",
            Category::Document => "documents",
            Category::Database => "databases",
            Category::Archive => "archives",
            Category::Config => "configs",
            Category::Other => "others",
        }
    }

    pub fn is_media(self) -> bool {
        matches!(self, Category::Photo | Category::Video | Category::Audio)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A regular file found in the extracted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFile {
    pub category: Category,
    /// Path relative to the extraction root
    pub relative_path: PathBuf,
    /// Where the content currently lives on disk
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl ExtractedFile {
    pub fn file_name(&self) -> String {
        self.relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lower-cased extension without the dot
    pub fn extension(&self) -> Option<String> {
        self.relative_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    /// Canonical form once normalized
    pub phone_number: String,
    pub email: Option<String>,
    pub group: Option<String>,
    pub address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Accepted call directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Incoming,
    Outgoing,
    Missed,
}

impl CallType {
    pub fn as_str(self) -> &'static str {
        match self {
            CallType::Incoming => "incoming",
            CallType::Outgoing => "outgoing",
            CallType::Missed => "missed",
        }
    }

    /// Exact canonical name, as stored
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "incoming" => Some(CallType::Incoming),
            "outgoing" => Some(CallType::Outgoing),
            "missed" => Some(CallType::Missed),
            _ => None,
        }
    }

    /// Map a device-specific call-type code or label.
    ///
    /// Android codes `1`, `2` and `3` are incoming, outgoing and missed;
    /// other numeric codes (voicemail, rejected, blocked) count as incoming.
    /// Labels are matched by substring. Returns `None` for text that names
    /// no direction.
    pub fn from_device_value(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        if value.is_empty() {
            return Some(CallType::Incoming);
        }
        if value.bytes().all(|b| b.is_ascii_digit()) {
            return Some(match value.as_str() {
                "2" => CallType::Outgoing,
                "3" => CallType::Missed,
                _ => CallType::Incoming,
            });
        }
        if value.contains("out") {
            Some(CallType::Outgoing)
        } else if value.contains("miss") {
            Some(CallType::Missed)
        } else if value.contains("in") {
            Some(CallType::Incoming)
        } else {
            None
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call-log row.
///
/// `call_type` holds the canonical name when the source value was
/// recognized, and the source text verbatim otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub phone_number: String,
    pub call_type: String,
    pub call_date: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
}

impl CallLogEntry {
    pub fn call_type(&self) -> Option<CallType> {
        CallType::from_name(&self.call_type)
    }
}

/// Message transport kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sms,
    Mms,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Sms => "sms",
            MessageKind::Mms => "mms",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sms" => Some(MessageKind::Sms),
            "mms" => Some(MessageKind::Mms),
            _ => None,
        }
    }
}

/// A text message. Accepted messages carry exactly one of `sender` and
/// `receiver`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier the device used for this message, when available
    pub external_id: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub body: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub message_type: String,
    pub status: i64,
}

impl Message {
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_name(&self.message_type)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppRecord {
    pub package_name: String,
    pub app_name: Option<String>,
    pub version_code: Option<i64>,
    pub version_name: Option<String>,
    pub permissions: Vec<String>,
    /// Object-store reference to the installer binary
    pub apk_ref: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub file_name: String,
    pub media_type: Category,
    pub mime_type: String,
    pub size_bytes: u64,
    pub object_ref: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub object_ref: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteRecord {
    pub title: Option<String>,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub title: String,
    pub url: String,
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub chat_id: Option<String>,
    pub sender: Option<String>,
    pub message: String,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Embedded database engine detected by signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    Sqlite,
    Realm,
    Unknown,
}

impl DbKind {
    pub const SQLITE_MAGIC: &'static [u8; 16] = b"SQLite format 3\0";
    pub const REALM_MAGIC: &'static [u8; 4] = b"T-DB";

    /// Detect the engine from the first bytes of a file
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(Self::SQLITE_MAGIC) {
            DbKind::Sqlite
        } else if header.get(16..20) == Some(Self::REALM_MAGIC.as_slice()) {
            DbKind::Realm
        } else {
            DbKind::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DbKind::Sqlite => "sqlite",
            DbKind::Realm => "realm",
            DbKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDatabaseFile {
    pub relative_path: PathBuf,
    pub size_bytes: u64,
    pub db_kind: DbKind,
    pub object_ref: String,
    pub added_at: DateTime<Utc>,
}

/// Entity kinds produced by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Contact,
    CallLog,
    Message,
    App,
    Media,
    Document,
    Note,
    Bookmark,
    ChatMessage,
    RawDatabase,
}

impl RecordKind {
    pub const ALL: [RecordKind; 10] = [
        RecordKind::Contact,
        RecordKind::CallLog,
        RecordKind::Message,
        RecordKind::App,
        RecordKind::Media,
        RecordKind::Document,
        RecordKind::Note,
        RecordKind::Bookmark,
        RecordKind::ChatMessage,
        RecordKind::RawDatabase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Contact => "contact",
            RecordKind::CallLog => "call_log",
            RecordKind::Message => "message",
            RecordKind::App => "app",
            RecordKind::Media => "media",
            RecordKind::Document => "document",
            RecordKind::Note => "note",
            RecordKind::Bookmark => "bookmark",
            RecordKind::ChatMessage => "chat_message",
            RecordKind::RawDatabase => "raw_database",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records of every kind gathered from one or more sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub contacts: Vec<Contact>,
    pub call_logs: Vec<CallLogEntry>,
    pub messages: Vec<Message>,
    pub apps: Vec<AppRecord>,
    pub media: Vec<MediaRecord>,
    pub documents: Vec<DocumentRecord>,
    pub notes: Vec<NoteRecord>,
    pub bookmarks: Vec<BookmarkRecord>,
    pub chat_messages: Vec<ChatMessageRecord>,
    pub raw_databases: Vec<RawDatabaseFile>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every record of `other`, preserving order
    pub fn merge(&mut self, other: RecordBatch) {
        self.contacts.extend(other.contacts);
        self.call_logs.extend(other.call_logs);
        self.messages.extend(other.messages);
        self.apps.extend(other.apps);
        self.media.extend(other.media);
        self.documents.extend(other.documents);
        self.notes.extend(other.notes);
        self.bookmarks.extend(other.bookmarks);
        self.chat_messages.extend(other.chat_messages);
        self.raw_databases.extend(other.raw_databases);
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Contact => self.contacts.len(),
            RecordKind::CallLog => self.call_logs.len(),
            RecordKind::Message => self.messages.len(),
            RecordKind::App => self.apps.len(),
            RecordKind::Media => self.media.len(),
            RecordKind::Document => self.documents.len(),
            RecordKind::Note => self.notes.len(),
            RecordKind::Bookmark => self.bookmarks.len(),
            RecordKind::ChatMessage => self.chat_messages.len(),
            RecordKind::RawDatabase => self.raw_databases.len(),
        }
    }

    pub fn len(&self) -> usize {
        RecordKind::ALL.iter().map(|k| self.count(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_type_codes() {
        assert_eq!(CallType::from_device_value("1"), Some(CallType::Incoming));
        assert_eq!(CallType::from_device_value("2"), Some(CallType::Outgoing));
        assert_eq!(CallType::from_device_value("3"), Some(CallType::Missed));
        assert_eq!(CallType::from_device_value("5"), Some(CallType::Incoming));
        assert_eq!(CallType::from_device_value(""), Some(CallType::Incoming));
    }

    #[test]
    fn test_call_type_labels() {
        assert_eq!(CallType::from_device_value("OUTGOING"), Some(CallType::Outgoing));
        assert_eq!(CallType::from_device_value("missed_call"), Some(CallType::Missed));
        assert_eq!(CallType::from_device_value("Incoming"), Some(CallType::Incoming));
        assert_eq!(CallType::from_device_value("voicemail"), None);
    }

    #[test]
    fn test_db_kind_detection() {
        let mut sqlite = b"SQLite format 3\0".to_vec();
        sqlite.extend_from_slice(&[0u8; 84]);
        assert_eq!(DbKind::detect(&sqlite), DbKind::Sqlite);

        let mut realm = vec![0u8; 16];
        realm.extend_from_slice(b"T-DB");
        assert_eq!(DbKind::detect(&realm), DbKind::Realm);

        assert_eq!(DbKind::detect(b"SQLite"), DbKind::Unknown);
    }

    #[test]
    fn test_batch_merge_and_count() {
        let mut batch = RecordBatch::new();
        batch.notes.push(NoteRecord {
            content: "a".into(),
            ..Default::default()
        });
        let mut other = RecordBatch::new();
        other.notes.push(NoteRecord {
            content: "b".into(),
            ..Default::default()
        });
        other.bookmarks.push(BookmarkRecord::default());
        batch.merge(other);

        assert_eq!(batch.count(RecordKind::Note), 2);
        assert_eq!(batch.notes[1].content, "b");
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_category_folders_unique() {
        let mut folders: Vec<_> = Category::ALL.iter().map(|c| c.folder()).collect();
        folders.sort();
        folders.dedup();
        assert_eq!(folders.len(), Category::ALL.len());
    }
}

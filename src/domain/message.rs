use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type MessageRowId = i64;

/// What kind of mail a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Task,
    #[default]
    Notification,
}

impl Category {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Notification => "notification",
        }
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "notification" => Ok(Self::Notification),
            other => Err(anyhow::anyhow!("unknown category '{other}'")),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Urgency {
    Urgent,
    #[default]
    Normal,
}

impl Urgency {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Normal => "normal",
        }
    }
}

impl FromStr for Urgency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "normal" => Ok(Self::Normal),
            other => Err(anyhow::anyhow!("unknown urgency '{other}'")),
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The label pair assigned by the classifier.
///
/// `Default` is `(notification, normal)`, the value used whenever the model's
/// output can't be mapped onto the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub category: Category,
    pub urgency: Urgency,
}

impl Classification {
    pub fn new(category: Category, urgency: Urgency) -> Self {
        Self { category, urgency }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewAttachment {
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// A normalized message as produced by the transport adapter, before the
/// store assigns ids and timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub message_id: String,
    pub uid: String,
    pub folder: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub date_sent: String,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
    pub has_attachments: bool,
    pub attachments: Vec<NewAttachment>,
}

#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: MessageRowId,
    pub message_id: String,
    pub uid: String,
    pub folder: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub date_sent: String,
    pub date_received: String,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
    pub has_attachments: bool,
    pub processed: bool,
    /// `None` while unprocessed. Also `None` for a processed row whose stored
    /// label is outside the vocabulary.
    pub category: Option<Category>,
    pub urgency: Option<Urgency>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub id: i64,
    pub message_row_id: MessageRowId,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// Result of `MessageStore::add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted(MessageRowId),
    Duplicate,
}

/// Conjunctive filter for listing; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFilter {
    pub category: Option<Category>,
    pub urgency: Option<Urgency>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub processed: u64,
    pub unprocessed: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_urgency: BTreeMap<String, u64>,
    pub latest_date_sent: Option<String>,
}

/// Epoch seconds for a source `Date` value, used as the ordering key.
///
/// Accepts RFC 2822 (what mail headers carry) and RFC 3339.
pub fn sent_epoch(date_sent: &str) -> Option<i64> {
    let s = date_sent.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    // mailparse tolerates the sloppier forms real servers emit
    mailparse::dateparse(s).ok()
}

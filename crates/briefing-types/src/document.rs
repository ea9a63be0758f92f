use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Category;

/// External per-document state flag kept by the message store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentState {
    Unread,
    Read,
    Parsed,
    Published,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Unread => "UNREAD",
            DocumentState::Read => "READ",
            DocumentState::Parsed => "PARSED",
            DocumentState::Published => "PUBLISHED",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label applied to a batch of documents once their artifact progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeLabel {
    /// The artifact built from these documents was rendered.
    Parsed,
    /// The artifact built from these documents was merged.
    Published,
}

impl OutcomeLabel {
    /// The document state a label corresponds to.
    pub fn state(&self) -> DocumentState {
        match self {
            OutcomeLabel::Parsed => DocumentState::Parsed,
            OutcomeLabel::Published => DocumentState::Published,
        }
    }
}

/// An immutable newsletter email as fetched from the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub external_id: String,
    pub sender_name: String,
    pub sender_address: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    /// Cleaned body text.
    pub body: String,
    /// State flag observed when the document was fetched.
    pub state: DocumentState,
}

/// A [`SourceDocument`] as recorded by the identity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: i64,
    pub document: SourceDocument,
    pub category: Category,
    pub processed: bool,
    /// `true` only for the call that inserted the row.
    pub newly_recorded: bool,
}

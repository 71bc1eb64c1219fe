use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StructuralMediaError;

/// A chat thread as enumerated from the account's dialog list.
/// `peer` is whatever the client needs to iterate its history.
#[derive(Debug, Clone)]
pub struct Conversation<P> {
    pub id: i64,
    /// Set for groups and channels.
    pub title: Option<String>,
    /// `"<first> <last>"`, set for one-to-one chats.
    pub full_name: Option<String>,
    pub peer: P,
}

impl<P> Conversation<P> {
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.full_name.as_deref())
            .unwrap_or("")
    }
}

/// Read-only view of a message, enough to decide whether and where to download.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub text: String,
    pub media: Option<MediaRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub kind: String,
    pub document: Option<DocumentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub mime_type: String,
    pub size: i64,
    pub attributes: Option<Vec<DocumentAttribute>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentAttribute {
    Filename { file_name: String },
    Other { kind: String },
}

impl MessageRecord {
    /// Compact JSON rendering, used for search and debug dumps.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Case-insensitive substring match over the whole record, media metadata included.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.to_json().to_lowercase().contains(&needle.to_lowercase())
    }
}

impl MediaRecord {
    /// The document's attribute list, or why there isn't one.
    pub fn attributes(&self) -> Result<&[DocumentAttribute], StructuralMediaError> {
        let document = self.document.as_ref().ok_or(StructuralMediaError::MissingDocument)?;
        document
            .attributes
            .as_deref()
            .ok_or(StructuralMediaError::MissingAttributes)
    }

    /// Expected byte count, when the platform reports one.
    pub fn size(&self) -> Option<u64> {
        self.document
            .as_ref()
            .and_then(|d| u64::try_from(d.size).ok())
            .filter(|&s| s > 0)
    }
}

/// First filename attribute, if any.
pub fn attachment_filename(attributes: &[DocumentAttribute]) -> Option<&str> {
    attributes.iter().find_map(|attr| match attr {
        DocumentAttribute::Filename { file_name } => Some(file_name.as_str()),
        DocumentAttribute::Other { .. } => None,
    })
}

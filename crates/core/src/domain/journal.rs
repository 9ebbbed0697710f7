use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::text::truncate_chars;

pub const EXCERPT_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalEntryId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn excerpt(&self) -> String {
        let excerpt = truncate_chars(&self.content, EXCERPT_CHARS);
        if excerpt.len() < self.content.len() {
            format!("{excerpt}...")
        } else {
            excerpt
        }
    }
}

/// Placeholder title used when the caller does not provide one.
pub fn default_title(now: DateTime<Utc>) -> String {
    format!("Journal Entry - {}", now.format("%b %-d, %Y"))
}

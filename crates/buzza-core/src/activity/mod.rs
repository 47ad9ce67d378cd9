//! User activity log.
//!
//! Entries are append-only and paged newest first with an id cursor.

mod store;

pub use store::{ActivityStore, SqliteActivityStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BuzzaError, BuzzaResult, ErrorCode};

/// Hard cap on entries returned by a single page.
pub const MAX_ACTIVITY_PAGE: usize = 100;

/// Structured payload attached to an activity.
pub type ActivityData = serde_json::Map<String, serde_json::Value>;

/// A single logged user event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    /// Event type, e.g. `session_started`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ActivityData>,
}

/// Upper bound of an activity page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityCursor {
    /// No upper bound; start from the newest entry.
    #[default]
    Latest,
    /// Only entries with an id strictly below this one.
    Before(i64),
}

impl ActivityCursor {
    /// Map the wire sentinel: any negative id means no upper bound.
    pub fn from_raw(before_id: i64) -> Self {
        if before_id < 0 {
            Self::Latest
        } else {
            Self::Before(before_id)
        }
    }

    /// Parse the `before` query value. Empty means [`ActivityCursor::Latest`].
    pub fn parse(raw: &str) -> BuzzaResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::Latest);
        }
        raw.parse::<i64>()
            .map(Self::from_raw)
            .map_err(|_| BuzzaError::Validation {
                message: "invalid before id".to_string(),
                code: ErrorCode::ValInvalidCursor,
            })
    }

    /// The id after which the next page starts, given the page just served.
    pub fn next_after(page: &[ActivityEntry]) -> Option<Self> {
        page.iter().map(|entry| entry.id).min().map(Self::Before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_parse() {
        assert_eq!(ActivityCursor::parse("").unwrap(), ActivityCursor::Latest);
        assert_eq!(ActivityCursor::parse("-1").unwrap(), ActivityCursor::Latest);
        assert_eq!(ActivityCursor::parse("15").unwrap(), ActivityCursor::Before(15));

        let err = ActivityCursor::parse("abc").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValInvalidCursor);
        assert!(ActivityCursor::parse("1.5").is_err());
    }

    #[test]
    fn test_entry_omits_missing_data() {
        let entry = ActivityEntry {
            id: 1,
            user_id: 42,
            created_at: Utc::now(),
            name: "login".to_string(),
            data: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("data").is_none());
    }
}

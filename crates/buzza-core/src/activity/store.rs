//! Activity storage layer.

use chrono::{DateTime, Utc};
use rusqlite::params;
use std::path::Path;
use tracing::debug;

use crate::activity::{ActivityCursor, ActivityData, ActivityEntry, MAX_ACTIVITY_PAGE};
use crate::db::Database;
use crate::error::{BuzzaError, BuzzaResult};

/// Trait for activity log queries
pub trait ActivityStore: Send + Sync {
    /// Newest-first page of a user's activity below `cursor`.
    ///
    /// `limit` is clamped to [`MAX_ACTIVITY_PAGE`].
    fn by_user_id(
        &self,
        user_id: i64,
        cursor: ActivityCursor,
        limit: usize,
    ) -> BuzzaResult<Vec<ActivityEntry>>;
}

/// SQLite-backed activity store
pub struct SqliteActivityStore {
    db: Database,
}

impl SqliteActivityStore {
    /// Create a new store at the given path
    pub fn new(path: impl AsRef<Path>) -> BuzzaResult<Self> {
        let store = Self {
            db: Database::open(path)?,
        };
        store.prepare_db()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> BuzzaResult<Self> {
        let store = Self {
            db: Database::in_memory()?,
        };
        store.prepare_db()?;
        Ok(store)
    }

    pub fn prepare_db(&self) -> BuzzaResult<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS activity (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    name TEXT NOT NULL,
                    data TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_activity_user
                    ON activity(user_id, id DESC);
            "#,
            )?;
            Ok(())
        })
    }

    /// Record an event for a user.
    pub fn append(
        &self,
        user_id: i64,
        name: &str,
        data: Option<&ActivityData>,
    ) -> BuzzaResult<ActivityEntry> {
        let created_at = Utc::now();
        let encoded = data.map(serde_json::to_string).transpose()?;

        let id = self
            .db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO activity (user_id, created_at, name, data) VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, created_at.to_rfc3339(), name, encoded],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .map_err(|e| e.context("append activity"))?;

        Ok(ActivityEntry {
            id,
            user_id,
            created_at,
            name: name.to_string(),
            data: data.cloned(),
        })
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> BuzzaResult<ActivityEntry> {
        let created_at: String = row.get(2)?;
        let data: Option<String> = row.get(4)?;

        Ok(ActivityEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    BuzzaError::database(format!("invalid created_at '{}': {}", created_at, e))
                })?,
            name: row.get(3)?,
            data: data.as_deref().map(serde_json::from_str::<ActivityData>).transpose()?,
        })
    }
}

impl ActivityStore for SqliteActivityStore {
    fn by_user_id(
        &self,
        user_id: i64,
        cursor: ActivityCursor,
        limit: usize,
    ) -> BuzzaResult<Vec<ActivityEntry>> {
        let limit = limit.min(MAX_ACTIVITY_PAGE);
        if limit == 0 {
            return Ok(Vec::new());
        }

        // i64::MAX stands in for "no upper bound".
        let before = match cursor {
            ActivityCursor::Latest => i64::MAX,
            ActivityCursor::Before(id) => id,
        };

        let entries = self
            .db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, user_id, created_at, name, data
                       FROM activity
                       WHERE user_id = ?1 AND id < ?2
                       ORDER BY id DESC
                       LIMIT ?3"#,
                )?;
                let results = stmt.query_map(params![user_id, before, limit as i64], |row| {
                    Ok(Self::row_to_entry(row))
                })?;

                results
                    .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
                    .collect::<BuzzaResult<Vec<_>>>()
            })
            .map_err(|e| e.context("get logs by user id"))?;

        debug!(user_id, ?cursor, returned = entries.len(), "Activity page");
        Ok(entries)
    }
}

impl std::fmt::Debug for SqliteActivityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteActivityStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(user_id: i64, count: usize) -> SqliteActivityStore {
        let store = SqliteActivityStore::in_memory().unwrap();
        for i in 0..count {
            store.append(user_id, &format!("event-{}", i), None).unwrap();
        }
        store
    }

    fn ids(entries: &[ActivityEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_pages_newest_first() {
        let store = seeded(42, 10);

        let first = store.by_user_id(42, ActivityCursor::Latest, 5).unwrap();
        assert_eq!(ids(&first), vec![10, 9, 8, 7, 6]);

        let second = store.by_user_id(42, ActivityCursor::Before(6), 5).unwrap();
        assert_eq!(ids(&second), vec![5, 4, 3, 2, 1]);

        let third = store.by_user_id(42, ActivityCursor::Before(1), 5).unwrap();
        assert!(third.is_empty());
    }

    #[test]
    fn test_limit_is_capped() {
        let store = seeded(1, MAX_ACTIVITY_PAGE + 20);

        let page = store.by_user_id(1, ActivityCursor::Latest, usize::MAX).unwrap();
        assert_eq!(page.len(), MAX_ACTIVITY_PAGE);
        assert!(page.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn test_zero_limit_is_empty() {
        let store = seeded(1, 3);
        assert!(store.by_user_id(1, ActivityCursor::Latest, 0).unwrap().is_empty());
    }

    #[test]
    fn test_users_are_isolated() {
        let store = SqliteActivityStore::in_memory().unwrap();
        store.append(1, "login", None).unwrap();
        store.append(2, "login", None).unwrap();
        store.append(1, "logout", None).unwrap();

        let page = store.by_user_id(1, ActivityCursor::Latest, 10).unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|e| e.user_id == 1));
        assert_eq!(page[0].name, "logout");

        assert!(store.by_user_id(3, ActivityCursor::Latest, 10).unwrap().is_empty());
    }

    #[test]
    fn test_data_round_trips_through_storage() {
        let store = SqliteActivityStore::in_memory().unwrap();
        let mut data = ActivityData::new();
        data.insert("ip".to_string(), serde_json::json!("10.0.0.1"));
        data.insert("attempts".to_string(), serde_json::json!(3));
        store.append(7, "login_failed", Some(&data)).unwrap();
        store.append(7, "login", None).unwrap();

        let page = store.by_user_id(7, ActivityCursor::Latest, 10).unwrap();
        assert_eq!(page[0].data, None);
        assert_eq!(page[1].data.as_ref(), Some(&data));
    }
}

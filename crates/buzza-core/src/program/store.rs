//! Program storage layer.
//!
//! Provides SQLite-backed persistence for published program releases. Rows
//! are append-only per key and retired with a tombstone timestamp, so the
//! current release of a key is computed at read time.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, error};

use crate::db::Database;
use crate::error::{BuzzaError, BuzzaResult};
use crate::program::{NewProgram, Program, ProgramFile, ProgramKey};

/// Read side of the release catalogue.
pub trait ProgramStore: Send + Sync {
    /// Get the current (highest id, not retired) release for a key.
    fn latest_program(&self, key: &ProgramKey) -> BuzzaResult<Program>;

    /// Get the file list of the current release for a key, in stored order.
    fn latest_files(&self, key: &ProgramKey) -> BuzzaResult<Vec<ProgramFile>> {
        self.latest_program(key).map(|program| program.files)
    }

    /// Check that the backing database answers.
    fn health_check(&self) -> BuzzaResult<()> {
        Ok(())
    }
}

/// SQLite-backed program store
pub struct SqliteProgramStore {
    db: Database,
}

const PROGRAM_COLUMNS: &str = "id, created_at, destroyed_at, type, os, arch, branch, files";

impl SqliteProgramStore {
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

    /// Create the program table if it does not exist yet.
    pub fn prepare_db(&self) -> BuzzaResult<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS program (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    created_at TEXT NOT NULL,
                    destroyed_at TEXT,
                    type VARCHAR(30) NOT NULL,
                    os VARCHAR(30) NOT NULL,
                    arch VARCHAR(10) NOT NULL,
                    branch VARCHAR(255) NOT NULL,
                    files TEXT NOT NULL
                );

                -- History is retained, so the identity is indexed, not unique.
                CREATE INDEX IF NOT EXISTS idx_program_identity
                    ON program(type, os, arch, branch, id DESC);
            "#,
            )?;
            Ok(())
        })
    }

    /// Append a release. The store assigns the id.
    pub fn publish(&self, program: &NewProgram) -> BuzzaResult<Program> {
        let files = serde_json::to_string(&program.files)?;
        let created_at = Utc::now();

        let id = self
            .db
            .with_conn(|conn| {
                conn.execute(
                    r#"INSERT INTO program (created_at, type, os, arch, branch, files)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![
                        created_at.to_rfc3339(),
                        program.key.file_type,
                        program.key.os,
                        program.key.arch,
                        program.key.branch,
                        files,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .map_err(|e| e.context("publish program"))?;

        debug!(id, key = %program.key, "Published program");

        Ok(Program {
            id,
            created_at,
            destroyed_at: None,
            key: program.key.clone(),
            files: program.files.clone(),
        })
    }

    /// Soft-delete a release. Returns false when the id is unknown or already retired.
    pub fn retire(&self, id: i64) -> BuzzaResult<bool> {
        let changed = self
            .db
            .with_conn(|conn| {
                Ok(conn.execute(
                    "UPDATE program SET destroyed_at = ?1 WHERE id = ?2 AND destroyed_at IS NULL",
                    params![Utc::now().to_rfc3339(), id],
                )?)
            })
            .map_err(|e| e.context("retire program"))?;

        debug!(id, retired = changed > 0, "Retire program");
        Ok(changed > 0)
    }

    /// Get a single row by id, retired or not.
    pub fn get(&self, id: i64) -> BuzzaResult<Option<Program>> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {} FROM program WHERE id = ?1", PROGRAM_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row(params![id], |row| Ok(Self::row_to_program(row)))
                .optional()?
                .transpose()
        })
    }

    /// All rows of a key, retired ones included, oldest first.
    pub fn history(&self, key: &ProgramKey) -> BuzzaResult<Vec<Program>> {
        self.db
            .with_conn(|conn| {
                let sql = format!(
                    r#"SELECT {} FROM program
                       WHERE type = ?1 AND os = ?2 AND arch = ?3 AND branch = ?4
                       ORDER BY id ASC"#,
                    PROGRAM_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let results = stmt.query_map(
                    params![key.file_type, key.os, key.arch, key.branch],
                    |row| Ok(Self::row_to_program(row)),
                )?;

                results
                    .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
                    .collect()
            })
            .map_err(|e| e.context("program history"))
    }

    /// Rank-1 rows per partition for `key` among rows that are not retired.
    fn query_current(conn: &Connection, key: &ProgramKey) -> BuzzaResult<Vec<Program>> {
        let sql = format!(
            r#"SELECT {columns} FROM (
                   SELECT *,
                          row_number() OVER (
                              PARTITION BY type, os, arch, branch ORDER BY id DESC
                          ) AS rank_in_key
                   FROM program
                   WHERE type = ?1 AND os = ?2 AND arch = ?3 AND branch = ?4
                     AND destroyed_at IS NULL
               ) AS t
               WHERE t.rank_in_key = 1"#,
            columns = PROGRAM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let results = stmt.query_map(
            params![key.file_type, key.os, key.arch, key.branch],
            |row| Ok(Self::row_to_program(row)),
        )?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }

    fn parse_time(column: &str, raw: &str) -> BuzzaResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| BuzzaError::database(format!("invalid {} '{}': {}", column, raw, e)))
    }

    fn row_to_program(row: &rusqlite::Row<'_>) -> BuzzaResult<Program> {
        let id: i64 = row.get(0)?;
        let created_at: String = row.get(1)?;
        let destroyed_at: Option<String> = row.get(2)?;
        let files: String = row.get(7)?;

        Ok(Program {
            id,
            created_at: Self::parse_time("created_at", &created_at)?,
            destroyed_at: destroyed_at
                .as_deref()
                .map(|raw| Self::parse_time("destroyed_at", raw))
                .transpose()?,
            key: ProgramKey {
                file_type: row.get(3)?,
                os: row.get(4)?,
                arch: row.get(5)?,
                branch: row.get(6)?,
            },
            files: serde_json::from_str(&files)?,
        })
    }
}

impl ProgramStore for SqliteProgramStore {
    fn latest_program(&self, key: &ProgramKey) -> BuzzaResult<Program> {
        let rows = self
            .db
            .with_conn(|conn| Self::query_current(conn, key))
            .map_err(|e| e.context("query"))?;

        select_current(rows, key)
    }

    fn health_check(&self) -> BuzzaResult<()> {
        self.db.ping()
    }
}

/// Exactly one current row per key; anything else is NotFound or Integrity.
fn select_current(mut rows: Vec<Program>, key: &ProgramKey) -> BuzzaResult<Program> {
    match rows.len() {
        0 => Err(BuzzaError::not_found(format!("program {}", key))),
        1 => Ok(rows.remove(0)),
        n => {
            error!(key = %key, rows = n, "Current program query returned more than one row");
            Err(BuzzaError::integrity(format!(
                "too many results ({}) for program {}",
                n, key
            )))
        }
    }
}

impl std::fmt::Debug for SqliteProgramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProgramStore").finish_non_exhaustive()
    }
}

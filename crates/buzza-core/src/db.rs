//! SQLite connection handle shared by the stores.
//!
//! Cancellation is per call: [`with_deadline`] scopes a deadline to the
//! current thread, and [`Database::with_conn`] honours it for the statements
//! it runs. A caller's expiry never touches a statement owned by another call.

use rusqlite::Connection;
use std::cell::Cell;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use crate::error::{BuzzaError, BuzzaResult, ErrorCode};

/// SQLite virtual machine steps between deadline checks.
const PROGRESS_STEPS: i32 = 1_000;

thread_local! {
    static CALL_DEADLINE: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// Run `f` with `deadline` applied to every [`Database::with_conn`] call it
/// makes on this thread. Nested scopes restore the outer deadline on exit.
pub fn with_deadline<T>(deadline: Instant, f: impl FnOnce() -> T) -> T {
    struct Restore(Option<Instant>);

    impl Drop for Restore {
        fn drop(&mut self) {
            CALL_DEADLINE.with(|d| d.set(self.0));
        }
    }

    let _restore = Restore(CALL_DEADLINE.with(|d| d.replace(Some(deadline))));
    f()
}

fn current_deadline() -> Option<Instant> {
    CALL_DEADLINE.with(Cell::get)
}

fn check_deadline(deadline: Option<Instant>) -> BuzzaResult<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(BuzzaError::Database {
            message: "deadline exceeded before the statement ran".to_string(),
            code: ErrorCode::DbInterrupted,
            source: None,
        }),
        _ => Ok(()),
    }
}

/// A single SQLite connection guarded for use from multiple threads.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> BuzzaResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> BuzzaResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// Under [`with_deadline`], an expired call fails with
    /// [`ErrorCode::DbInterrupted`] without running `f`, and statements run by
    /// `f` are aborted once the deadline passes.
    pub fn with_conn<T, F>(&self, f: F) -> BuzzaResult<T>
    where
        F: FnOnce(&Connection) -> BuzzaResult<T>,
    {
        let deadline = current_deadline();
        check_deadline(deadline)?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| BuzzaError::Internal("database connection mutex poisoned".to_string()))?;

        // Time spent queued behind other calls counts against the deadline.
        check_deadline(deadline)?;

        let Some(deadline) = deadline else {
            return f(&conn);
        };

        conn.progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));
        let result = f(&conn);
        conn.progress_handler(PROGRESS_STEPS, None::<fn() -> bool>);
        result
    }

    /// Round trip a trivial statement.
    pub fn ping(&self) -> BuzzaResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

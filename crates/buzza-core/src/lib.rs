//! buzza-core - Core library for buzza.
//!
//! This crate provides the domain types and SQLite-backed stores behind the
//! buzza backend: the program release catalogue, which resolves the current
//! file set of a release line, and the per-user activity log.
//!
//! # Example
//!
//! ```ignore
//! use buzza_core::{ProgramKey, ProgramStore, SqliteProgramStore};
//!
//! let store = SqliteProgramStore::new("buzza.db")?;
//! let key = ProgramKey::with_defaults(None, "windows", "x64", None)?;
//! let files = store.latest_files(&key)?;
//! ```

pub mod activity;
pub mod config;
pub mod db;
pub mod error;
pub mod program;

// Re-export commonly used types
pub use activity::{
    ActivityCursor, ActivityData, ActivityEntry, ActivityStore, SqliteActivityStore,
    MAX_ACTIVITY_PAGE,
};
pub use config::BuzzaConfig;
pub use error::{BuzzaError, BuzzaResult, ErrorCode};
pub use program::{
    NewProgram, Program, ProgramFile, ProgramKey, ProgramStore, SqliteProgramStore,
};

//! Published program releases.
//!
//! A release line is identified by a [`ProgramKey`]. Publishing appends a new
//! [`Program`] row for the key; the row with the highest id that has not been
//! retired is the one clients download.

mod store;

pub use store::{ProgramStore, SqliteProgramStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BuzzaError, BuzzaResult};

/// File type served when the caller does not name one.
pub const DEFAULT_FILE_TYPE: &str = "installer";

/// Branch served when the caller does not name one.
pub const DEFAULT_BRANCH: &str = "stable";

/// Single program file e.g. installer, config.yml, buzkaaclickeragent.dll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramFile {
    /// Relative file path inside the install directory.
    pub path: String,
    /// Where the file can be fetched from.
    pub download_url: String,
    /// SHA-256 of the file contents, hex encoded.
    pub hash: String,
}

impl ProgramFile {
    pub fn new(
        path: impl Into<String>,
        download_url: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            download_url: download_url.into(),
            hash: hash.into(),
        }
    }
}

/// Identity of a release line: (type, os, arch, branch).
///
/// Not unique across history; many rows share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramKey {
    #[serde(rename = "type")]
    pub file_type: String,
    pub os: String,
    pub arch: String,
    pub branch: String,
}

impl ProgramKey {
    /// Build a key, rejecting empty components.
    pub fn new(
        file_type: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
        branch: impl Into<String>,
    ) -> BuzzaResult<Self> {
        let key = Self {
            file_type: file_type.into(),
            os: os.into(),
            arch: arch.into(),
            branch: branch.into(),
        };
        for (field, value) in [
            ("type", &key.file_type),
            ("os", &key.os),
            ("arch", &key.arch),
            ("branch", &key.branch),
        ] {
            if value.trim().is_empty() {
                return Err(BuzzaError::missing_field(field));
            }
        }
        Ok(key)
    }

    /// Build a key applying the `installer` / `stable` defaults.
    pub fn with_defaults(
        file_type: Option<&str>,
        os: &str,
        arch: &str,
        branch: Option<&str>,
    ) -> BuzzaResult<Self> {
        Self::new(
            file_type.unwrap_or(DEFAULT_FILE_TYPE),
            os,
            arch,
            branch.unwrap_or(DEFAULT_BRANCH),
        )
    }
}

impl std::fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.file_type, self.os, self.arch, self.branch
        )
    }
}

/// A stored release row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    /// Set when the release was retired.
    #[serde(skip)]
    pub destroyed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub key: ProgramKey,
    pub files: Vec<ProgramFile>,
}

impl Program {
    pub fn is_retired(&self) -> bool {
        self.destroyed_at.is_some()
    }
}

/// Input for publishing a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProgram {
    #[serde(flatten)]
    pub key: ProgramKey,
    pub files: Vec<ProgramFile>,
}

impl NewProgram {
    pub fn new(key: ProgramKey, files: Vec<ProgramFile>) -> Self {
        Self { key, files }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_defaults() {
        let key = ProgramKey::with_defaults(None, "windows", "x64", None).unwrap();
        assert_eq!(key.file_type, "installer");
        assert_eq!(key.branch, "stable");
        assert_eq!(key.to_string(), "installer/windows/x64/stable");
    }

    #[test]
    fn test_key_rejects_empty_component() {
        let err = ProgramKey::with_defaults(None, "", "x64", None).unwrap_err();
        assert!(matches!(err, BuzzaError::Validation { .. }));
        assert!(err.to_string().contains("missing os"));

        let err = ProgramKey::new("agent", "linux", "arm64", " ").unwrap_err();
        assert!(err.to_string().contains("missing branch"));
    }

    #[test]
    fn test_program_json_shape() {
        let program = Program {
            id: 3,
            created_at: Utc::now(),
            destroyed_at: None,
            key: ProgramKey::new("installer", "windows", "x64", "stable").unwrap(),
            files: vec![ProgramFile::new("setup.exe", "https://cdn/setup.exe", "ab12")],
        };

        let value = serde_json::to_value(&program).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 3,
                "type": "installer",
                "os": "windows",
                "arch": "x64",
                "branch": "stable",
                "files": [
                    {"path": "setup.exe", "download_url": "https://cdn/setup.exe", "hash": "ab12"}
                ]
            })
        );
    }
}

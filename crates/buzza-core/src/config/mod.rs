//! Configuration system for buzza.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{BuzzaError, BuzzaResult};

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuzzaConfig {
    /// Address to bind the HTTP listener to.
    pub host: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// Path to the SQLite database holding programs and activities.
    pub database_path: PathBuf,
    /// Deadline applied to every store query, in milliseconds.
    pub request_timeout_ms: u64,
    /// Bearer tokens accepted by the static authenticator, mapped to user ids.
    pub api_tokens: HashMap<String, i64>,
}

impl Default for BuzzaConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: PathBuf::from("buzza.db"),
            request_timeout_ms: 5_000,
            api_tokens: HashMap::new(),
        }
    }
}

impl BuzzaConfig {
    /// Load configuration from a file (TOML or JSON).
    pub fn from_file(path: impl AsRef<Path>) -> BuzzaResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| BuzzaError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| BuzzaError::Configuration(e.to_string())),
            _ => Err(BuzzaError::Configuration(
                "Unsupported config file format. Use .toml or .json".to_string(),
            )),
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `BUZZA_HOST` (default: 0.0.0.0)
    /// - `BUZZA_PORT` (default: 8080)
    /// - `BUZZA_DATABASE_PATH` (default: buzza.db)
    /// - `BUZZA_REQUEST_TIMEOUT_MS` (default: 5000)
    /// - `BUZZA_API_TOKENS` as `token:user_id[,token:user_id...]` (default: none)
    pub fn from_env() -> BuzzaResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> BuzzaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("BUZZA_HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("BUZZA_PORT") {
            config.port = port.trim().parse().map_err(|_| {
                BuzzaError::Configuration(format!("BUZZA_PORT must be a valid port number, got '{}'", port))
            })?;
        }

        if let Some(path) = lookup("BUZZA_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(timeout) = lookup("BUZZA_REQUEST_TIMEOUT_MS") {
            let ms: u64 = timeout.trim().parse().map_err(|_| {
                BuzzaError::Configuration(format!(
                    "BUZZA_REQUEST_TIMEOUT_MS must be a number of milliseconds, got '{}'",
                    timeout
                ))
            })?;
            config.request_timeout_ms = ms.max(1);
        }

        if let Some(tokens) = lookup("BUZZA_API_TOKENS") {
            config.api_tokens = parse_token_table(&tokens)?;
        }

        Ok(config)
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Query deadline as a [`std::time::Duration`].
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_token_table(raw: &str) -> BuzzaResult<HashMap<String, i64>> {
    let mut table = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (token, user_id) = entry.rsplit_once(':').ok_or_else(|| {
            BuzzaError::Configuration(format!("api token entry '{}' is not token:user_id", entry))
        })?;
        let user_id = user_id.trim().parse().map_err(|_| {
            BuzzaError::Configuration(format!("api token entry '{}' has a non-numeric user id", entry))
        })?;
        if token.is_empty() {
            return Err(BuzzaError::Configuration("api token must not be empty".to_string()));
        }
        table.insert(token.to_string(), user_id);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = BuzzaConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.database_path, PathBuf::from("buzza.db"));
        assert_eq!(config.request_timeout_ms, 5_000);
        assert!(config.api_tokens.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let config = BuzzaConfig::from_lookup(lookup_from(&[
            ("BUZZA_HOST", "127.0.0.1"),
            ("BUZZA_PORT", "9000"),
            ("BUZZA_DATABASE_PATH", "/var/lib/buzza/main.db"),
            ("BUZZA_REQUEST_TIMEOUT_MS", "250"),
            ("BUZZA_API_TOKENS", "alpha:42, beta:7"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.database_path, PathBuf::from("/var/lib/buzza/main.db"));
        assert_eq!(config.request_timeout().as_millis(), 250);
        assert_eq!(config.api_tokens.get("alpha"), Some(&42));
        assert_eq!(config.api_tokens.get("beta"), Some(&7));
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let err = BuzzaConfig::from_lookup(lookup_from(&[("BUZZA_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, BuzzaError::Configuration(_)));

        let err =
            BuzzaConfig::from_lookup(lookup_from(&[("BUZZA_API_TOKENS", "alpha")])).unwrap_err();
        assert!(matches!(err, BuzzaError::Configuration(_)));

        let err = BuzzaConfig::from_lookup(lookup_from(&[("BUZZA_API_TOKENS", "alpha:x")]))
            .unwrap_err();
        assert!(matches!(err, BuzzaError::Configuration(_)));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
port = 8181
database_path = "releases.db"

[api_tokens]
secret = 5
"#
        )
        .unwrap();

        let config = BuzzaConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8181);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database_path, PathBuf::from("releases.db"));
        assert_eq!(config.api_tokens.get("secret"), Some(&5));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = BuzzaConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, BuzzaError::Configuration(_)));
    }
}

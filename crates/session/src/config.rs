//! Client configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mandir_observability::LogFormat;

use crate::storage::{FileStore, KeyValueStore, MemoryStore};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend API (no trailing slash).
    pub api_url: String,
    /// Upper bound for login/refresh/logout round-trips.
    #[serde(with = "millis")]
    pub auth_timeout: Duration,
    /// Where the session is persisted; in memory when unset.
    pub session_file: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            session_file: None,
            log_format: LogFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from `MANDIR_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_url = lookup("MANDIR_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        let auth_timeout = match lookup("MANDIR_AUTH_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    tracing::warn!(value = %raw, "MANDIR_AUTH_TIMEOUT_MS is not a positive integer; using default");
                    defaults.auth_timeout
                }
            },
            None => defaults.auth_timeout,
        };

        let session_file = lookup("MANDIR_SESSION_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let log_format = match lookup("MANDIR_LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "MANDIR_LOG_FORMAT not recognized; using default");
                defaults.log_format
            }),
            None => defaults.log_format,
        };

        Self {
            api_url,
            auth_timeout,
            session_file,
            log_format,
        }
    }

    /// Storage backend selected by this configuration.
    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        match &self.session_file {
            Some(path) => Arc::new(FileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(ClientConfig::from_lookup(lookup(&[])), ClientConfig::default());
    }

    #[test]
    fn reads_environment_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("MANDIR_API_URL", "https://temples.example.org/api/"),
            ("MANDIR_AUTH_TIMEOUT_MS", "2500"),
            ("MANDIR_SESSION_FILE", "/tmp/mandir/session.json"),
            ("MANDIR_LOG_FORMAT", "pretty"),
        ]));

        assert_eq!(config.api_url, "https://temples.example.org/api");
        assert_eq!(config.auth_timeout, Duration::from_millis(2500));
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/mandir/session.json")));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("MANDIR_AUTH_TIMEOUT_MS", "soon"),
            ("MANDIR_LOG_FORMAT", "xml"),
        ]));
        assert_eq!(config.auth_timeout, DEFAULT_AUTH_TIMEOUT);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"api_url": "http://x", "auth_timeout": 500}"#).unwrap();
        assert_eq!(config.auth_timeout, Duration::from_millis(500));
        assert_eq!(config.session_file, None);
    }
}

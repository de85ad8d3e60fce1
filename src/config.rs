//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_ASSISTANT_URL: &str = "http://127.0.0.1:8000/ask";
pub const DEFAULT_DATA_DIR: &str = ".askai";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(String),
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        "E_CONFIG_PARSE"
    }
}

/// Where chats are durably kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// Whole chat list in the device key-value store, namespaced per token.
    #[default]
    Local,
    /// Remote conversation store over HTTP.
    Remote,
}

impl std::str::FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(ConfigError::Parse(format!(
                "unknown store '{other}' (expected 'local' or 'remote')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreKind,
    pub api_base_url: String,
    pub assistant_url: String,
    pub data_dir: PathBuf,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::Local,
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            assistant_url: DEFAULT_ASSISTANT_URL.to_owned(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `ASKAI_STORE`: `local` (default) or `remote`
    /// - `ASKAI_API_BASE_URL`: remote chat store base URL
    /// - `ASKAI_ASSISTANT_URL`: assistant completion endpoint
    /// - `ASKAI_DATA_DIR`: directory for the file-backed device store
    /// - `ASKAI_REQUEST_TIMEOUT_SECS`: default 120
    /// - `ASKAI_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if `ASKAI_STORE` names an unknown store.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `ASKAI_STORE` names an unknown store.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("ASKAI_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreKind::default(),
        };
        let api_base_url = trim_url(lookup("ASKAI_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned()));
        let assistant_url =
            trim_url(lookup("ASKAI_ASSISTANT_URL").unwrap_or_else(|| DEFAULT_ASSISTANT_URL.to_owned()));
        let data_dir = lookup("ASKAI_DATA_DIR").map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);
        let timeouts = Timeouts {
            request_secs: parse_u64(&lookup, "ASKAI_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(&lookup, "ASKAI_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { store, api_base_url, assistant_url, data_dir, timeouts })
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

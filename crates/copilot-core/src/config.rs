use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config_env::{optional_trimmed_env, parse_f64_env, parse_u64_env, require_env};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_CONTEXT_PATH: &str = "/";
const DEFAULT_DATA_DIR: &str = ".copilot";
const DEFAULT_HISTORY_PATH: &str = "/api/agent/history";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStorageMode {
    File,
    Memory,
    Disabled,
}

impl SessionStorageMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        }
    }

    fn parse(key: &str, raw: &str) -> Result<Self, ConfigError> {
        match raw.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            _ => Err(ConfigError::InvalidConfiguration(format!(
                "{key} must be one of file, memory, disabled (got '{raw}')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub agent_url: Url,
    pub history_url: Url,
    pub data_dir: PathBuf,
    pub session_storage: SessionStorageMode,
    pub agent_timeout: Option<Duration>,
    pub temperature: f64,
    pub start_path: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid number in env var {0}")]
    ParseNumber(String),
    #[error("invalid url in env var {key}: {message}")]
    InvalidUrl { key: String, message: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let agent_url = parse_http_url(
            "COPILOT_AGENT_URL",
            &require_env(lookup, "COPILOT_AGENT_URL")?,
        )?;

        let history_url = match optional_trimmed_env(lookup, "COPILOT_HISTORY_URL") {
            Some(raw) => parse_http_url("COPILOT_HISTORY_URL", &raw)?,
            None => agent_url.join(DEFAULT_HISTORY_PATH).map_err(|err| {
                ConfigError::InvalidUrl {
                    key: "COPILOT_AGENT_URL".to_string(),
                    message: err.to_string(),
                }
            })?,
        };

        let session_storage = match optional_trimmed_env(lookup, "COPILOT_SESSION_STORAGE") {
            Some(raw) => SessionStorageMode::parse("COPILOT_SESSION_STORAGE", &raw)?,
            None => SessionStorageMode::File,
        };

        let start_path = optional_trimmed_env(lookup, "COPILOT_START_PATH")
            .unwrap_or_else(|| DEFAULT_CONTEXT_PATH.to_string());
        if !start_path.starts_with('/') {
            return Err(ConfigError::InvalidConfiguration(
                "COPILOT_START_PATH must start with '/'".to_string(),
            ));
        }

        Ok(Self {
            agent_url,
            history_url,
            data_dir: optional_trimmed_env(lookup, "COPILOT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            session_storage,
            agent_timeout: parse_u64_env(lookup, "COPILOT_AGENT_TIMEOUT_MS")?
                .map(Duration::from_millis),
            temperature: parse_f64_env(lookup, "COPILOT_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            start_path,
        })
    }
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidUrl {
        key: key.to_string(),
        message: err.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            key: key.to_string(),
            message: "must start with http:// or https://".to_string(),
        });
    }

    Ok(url)
}

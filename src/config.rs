use crate::types::{LogLevel, LogOutput};
use crate::{Result, ScapeError};
use std::path::Path;

pub const ENV_API_KEY: &str = "SCAPE_API_KEY";
pub const ENV_API_KEY_FILE: &str = "SCAPE_API_KEY_FILE";
pub const ENV_DEBUG: &str = "SCAPE_DEBUG";
pub const ENV_LOG_LEVEL: &str = "SCAPE_LOG_LEVEL";
/// Output bitmask, e.g. `3` for console and file.
pub const ENV_LOG_OUTPUT: &str = "SCAPE_LOG_OUTPUT";

/// Settings a client is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    /// Expose a debug session for this client.
    pub debug: bool,
    pub log_level: LogLevel,
    pub log_output: LogOutput,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            debug: false,
            log_level: LogLevel::Error,
            log_output: LogOutput::CONSOLE,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_log(mut self, level: LogLevel, output: LogOutput) -> Self {
        self.log_level = level;
        self.log_output = output;
        self
    }

    /// Build a config from `SCAPE_*` environment variables.
    ///
    /// The API key comes from `SCAPE_API_KEY`, or else from the first line
    /// of the file named by `SCAPE_API_KEY_FILE`.
    pub fn from_env() -> Result<ClientConfig> {
        let api_key = match read_env_string(ENV_API_KEY) {
            Some(key) => key,
            None => match read_env_string(ENV_API_KEY_FILE) {
                Some(path) => api_key_from_file(Path::new(&path))?,
                None => return Err(ScapeError::MissingApiKey),
            },
        };

        let log_level = read_env_string(ENV_LOG_LEVEL)
            .and_then(|v| LogLevel::parse(&v))
            .unwrap_or(LogLevel::Error);
        let log_output = read_env_string(ENV_LOG_OUTPUT)
            .and_then(|v| v.parse::<u32>().ok())
            .map(LogOutput::from_bits_truncate)
            .unwrap_or(LogOutput::CONSOLE);

        Ok(ClientConfig {
            api_key,
            debug: read_env_bool(ENV_DEBUG, false),
            log_level,
            log_output,
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ScapeError::MissingApiKey);
        }
        Ok(())
    }
}

/// Read an API key stored as the first line of a text file.
pub fn api_key_from_file(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)?;
    let key = contents.lines().next().unwrap_or("").trim().to_string();
    if key.is_empty() {
        return Err(ScapeError::MissingApiKey);
    }
    Ok(key)
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

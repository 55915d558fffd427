//! Claimer configuration.
//!
//! An enumerated struct rather than a free-form key/value bag: every knob is
//! a named field, and runtime updates go through [`ConfigOverride`] so an
//! unknown key is unrepresentable instead of silently accepted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Environment variable names recognised by [`ClaimerConfig::from_env`].
mod env_keys {
    pub const COOKIE: &str = "COOKIE";
    pub const MAX_RETRIES: &str = "MAX_RETRIES";
    pub const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
    pub const RETRY_DELAY: &str = "RETRY_DELAY";
    pub const MANUAL_RESOLUTION: &str = "MANUAL_CAPTCHA";
    pub const SOLVER_API_KEY: &str = "TWOCAPTCHA_API_KEY";
    pub const SAVE_RESPONSES: &str = "SAVE_RAW_RESPONSES";
    pub const RESPONSES_DIR: &str = "RESPONSES_DIR";
}

/// Read-only inputs to the claim loop.
#[derive(Debug, Clone)]
pub struct ClaimerConfig {
    /// Session cookie sent with every attempt.
    pub cookie: Option<String>,
    /// Extra headers merged over the baseline fingerprint.
    pub extra_headers: HashMap<String, String>,
    /// Attempt bound for the retry loop.
    pub max_retries: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sleep between retryable failures.
    pub retry_delay: Duration,
    /// Whether challenges are offered to a human operator first.
    pub manual_resolution: bool,
    /// API key for the automated solving service, when configured.
    pub solver_api_key: Option<String>,
    /// Whether raw responses are archived per attempt.
    pub save_responses: bool,
    /// Directory for archived responses.
    pub responses_dir: PathBuf,
}

impl Default for ClaimerConfig {
    fn default() -> Self {
        Self {
            cookie: None,
            extra_headers: HashMap::new(),
            max_retries: 3,
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
            manual_resolution: true,
            solver_api_key: None,
            save_responses: true,
            responses_dir: PathBuf::from("responses"),
        }
    }
}

/// Allow-listed runtime updates to the configuration.
#[derive(Debug, Clone)]
pub enum ConfigOverride {
    Cookie(Option<String>),
    MaxRetries(u32),
    Timeout(Duration),
    RetryDelay(Duration),
    ManualResolution(bool),
    SolverApiKey(Option<String>),
    SaveResponses(bool),
    ResponsesDir(PathBuf),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("max_retries must be at least 1")]
    ZeroRetries,
}

impl ClaimerConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(cookie) = read_env(env_keys::COOKIE) {
            config.cookie = Some(cookie);
        }
        if let Some(raw) = read_env(env_keys::MAX_RETRIES) {
            config.max_retries = parse_u64(env_keys::MAX_RETRIES, &raw)? as u32;
        }
        if let Some(raw) = read_env(env_keys::REQUEST_TIMEOUT) {
            config.timeout = Duration::from_secs(parse_u64(env_keys::REQUEST_TIMEOUT, &raw)?);
        }
        if let Some(raw) = read_env(env_keys::RETRY_DELAY) {
            config.retry_delay = Duration::from_secs(parse_u64(env_keys::RETRY_DELAY, &raw)?);
        }
        if let Some(raw) = read_env(env_keys::MANUAL_RESOLUTION) {
            config.manual_resolution = parse_bool(env_keys::MANUAL_RESOLUTION, &raw)?;
        }
        if let Some(key) = read_env(env_keys::SOLVER_API_KEY) {
            config.solver_api_key = Some(key);
        }
        if let Some(raw) = read_env(env_keys::SAVE_RESPONSES) {
            config.save_responses = parse_bool(env_keys::SAVE_RESPONSES, &raw)?;
        }
        if let Some(dir) = read_env(env_keys::RESPONSES_DIR) {
            config.responses_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply a single allow-listed update.
    pub fn apply_override(&mut self, update: ConfigOverride) -> Result<(), ConfigError> {
        match update {
            ConfigOverride::Cookie(cookie) => self.cookie = cookie,
            ConfigOverride::MaxRetries(0) => return Err(ConfigError::ZeroRetries),
            ConfigOverride::MaxRetries(n) => self.max_retries = n,
            ConfigOverride::Timeout(timeout) => self.timeout = timeout,
            ConfigOverride::RetryDelay(delay) => self.retry_delay = delay,
            ConfigOverride::ManualResolution(enabled) => self.manual_resolution = enabled,
            ConfigOverride::SolverApiKey(key) => self.solver_api_key = key,
            ConfigOverride::SaveResponses(enabled) => self.save_responses = enabled,
            ConfigOverride::ResponsesDir(dir) => self.responses_dir = dir,
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        Ok(())
    }
}

fn read_env(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|err: std::num::ParseIntError| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: err.to_string(),
        })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}

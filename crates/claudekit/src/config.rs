//! Client configuration.
//!
//! [`ClientConfig`] carries the API credentials, request defaults and the
//! retry policy. Start from [`ClientConfig::default()`] and adjust with the
//! `with_*` builders, or load it:
//!
//! - [`ClientConfig::from_env()`] reads `ANTHROPIC_API_KEY` and an optional
//!   `ANTHROPIC_BASE_URL`.
//! - [`ClientConfig::load()`] reads a JSON file; environment values then fill
//!   an empty key.
//!
//! ```json
//! {
//!   "model": "claude-3-haiku-20240307",
//!   "max_tokens": 512,
//!   "temperature": 0.2,
//!   "timeout_secs": 30,
//!   "max_retries": 5,
//!   "base_delay_ms": 500,
//!   "max_delay_ms": 20000,
//!   "jitter": true
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::api::retry::RetryConfig;
use crate::error::{Error, Result};
use crate::{DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable overriding the API origin.
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";

/// Configuration for [`Client`](crate::api::Client) and
/// [`MessagesClient`](crate::api::MessagesClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// API key sent as `x-api-key`. Empty means "not configured".
    pub api_key: String,
    /// API origin; requests go to `{base_url}/v1/messages`.
    pub base_url: String,
    /// Model used when a request leaves `model` empty.
    pub model: String,
    /// `max_tokens` used when a request leaves it at zero.
    pub max_tokens: u32,
    /// Temperature used when a request leaves it unset.
    pub temperature: f32,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Retry policy for every completion request.
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

// The key is never printed.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// On-disk shape of a config file. Every field is optional.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    jitter: Option<bool>,
}

/// Reject sampling temperatures outside 0.0 to 1.0.
pub fn check_temperature(temperature: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&temperature) {
        Ok(temperature)
    } else {
        Err(Error::Config(format!(
            "temperature must be between 0.0 and 1.0, got {temperature}"
        )))
    }
}

impl ClientConfig {
    /// Defaults plus whatever the environment provides.
    pub fn from_env() -> Self {
        Self::default().apply_env_with(|key| std::env::var(key).ok())
    }

    /// Read a JSON config file. Unset fields keep their defaults, and the
    /// environment fills the key and base URL when the file leaves them out.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        debug!("Loaded client config from {}", path.display());
        let config = Self::default().apply_file(file)?;
        Ok(config.apply_env_with(|key| std::env::var(key).ok()))
    }

    fn apply_file(mut self, file: ConfigFile) -> Result<Self> {
        if let Some(key) = file.api_key {
            self.api_key = key;
        }
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(max_tokens) = file.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = file.temperature {
            self.temperature = check_temperature(temperature)?;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = file.max_retries {
            self.retry.max_retries = retries;
        }
        if let Some(ms) = file.base_delay_ms {
            self.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.max_delay_ms {
            self.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(jitter) = file.jitter {
            self.retry.jitter = jitter;
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(Error::Config(format!(
                "base delay ({:?}) exceeds max delay ({:?})",
                self.retry.base_delay, self.retry.max_delay
            )));
        }
        Ok(self)
    }

    /// Fill an empty key and an unchanged base URL from `lookup`.
    fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.api_key.is_empty()
            && let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.is_empty())
        {
            self.api_key = key;
        }
        if self.base_url == DEFAULT_BASE_URL
            && let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.is_empty())
        {
            self.base_url = url;
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The API key, or [`Error::Config`] when none is configured.
    pub fn require_api_key(&self) -> Result<&str> {
        if self.api_key.is_empty() {
            return Err(Error::Config(format!(
                "no API key configured; set {API_KEY_ENV} or pass one explicitly"
            )));
        }
        Ok(&self.api_key)
    }

    /// Full URL of the Messages endpoint.
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.model, "claude-3-sonnet-20240229");
        assert_eq!(config.max_tokens, 1024);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn env_fills_missing_values() {
        let config = ClientConfig::default().apply_env_with(|key| match key {
            API_KEY_ENV => Some("sk-test".into()),
            BASE_URL_ENV => Some("http://localhost:8080".into()),
            _ => None,
        });
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn env_does_not_override_explicit_key() {
        let config = ClientConfig::default()
            .with_api_key("explicit")
            .apply_env_with(|_| Some("from-env".into()));
        assert_eq!(config.api_key, "explicit");
    }

    #[test]
    fn missing_key_is_config_error() {
        let err = ClientConfig::default().require_api_key().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_key": "sk-file", "model": "claude-3-haiku-20240307", "max_tokens": 256,
               "max_retries": 5, "base_delay_ms": 10, "max_delay_ms": 100, "jitter": false}}"#
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.api_key, "sk-file");
        assert_eq!(config.model, "claude-3-haiku-20240307");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_delay, Duration::from_millis(100));
        assert!(!config.retry.jitter);
        // Untouched fields keep defaults.
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"modle": "typo"}}"#).unwrap();
        let err = ClientConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_rejects_inverted_delays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_delay_ms": 5000, "max_delay_ms": 100}}"#).unwrap();
        assert!(matches!(
            ClientConfig::load(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn temperature_range_is_checked() {
        assert_eq!(check_temperature(0.0).unwrap(), 0.0);
        assert_eq!(check_temperature(1.0).unwrap(), 1.0);
        assert!(matches!(check_temperature(1.5), Err(Error::Config(_))));
        assert!(matches!(check_temperature(-0.1), Err(Error::Config(_))));
        assert!(check_temperature(f32::NAN).is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn debug_hides_key() {
        let config = ClientConfig::default().with_api_key("sk-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
    }
}

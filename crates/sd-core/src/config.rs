//! Client configuration and API endpoint resolution.

use crate::credentials;
use crate::error::SdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "SCALEDOWN_API_URL";

/// Hosted API used when `SCALEDOWN_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "https://api.scaledown.xyz";

/// Resolve the base URL from an optional override value.
pub fn api_url_from(value: Option<String>) -> String {
    match value {
        Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
        _ => DEFAULT_API_URL.to_string(),
    }
}

/// Resolve the base URL from the process environment.
pub fn api_url() -> String {
    api_url_from(std::env::var(API_URL_ENV).ok())
}

/// Target compression rate: let the service decide, or a fixed ratio.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Rate {
    #[default]
    Auto,
    Fixed(f64),
}

impl Rate {
    /// `Fixed` rates must be finite numbers.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Fixed(r) if !r.is_finite() => Err(SdError::invalid_argument(format!(
                "rate must be a finite number or \"auto\", got {r}"
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(r) => write!(f, "{r}"),
        }
    }
}

impl From<f64> for Rate {
    fn from(rate: f64) -> Self {
        Self::Fixed(rate)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::Fixed(r) => serializer.serialize_f64(*r),
        }
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawRate {
            Num(f64),
            Str(String),
        }

        match RawRate::deserialize(deserializer)? {
            RawRate::Num(r) if r.is_finite() => Ok(Self::Fixed(r)),
            RawRate::Num(r) => Err(serde::de::Error::custom(format!(
                "rate must be finite, got {r}"
            ))),
            RawRate::Str(s) if s.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            RawRate::Str(s) => Err(serde::de::Error::custom(format!(
                "rate must be a number or \"auto\", got {s:?}"
            ))),
        }
    }
}

/// Configuration for a hosted compressor. Fixed once the client is built.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub target_model: String,
    pub rate: Rate,
    pub temperature: Option<f64>,
    pub preserve_keywords: bool,
    pub preserve_words: Vec<String>,
    pub timeout_ms: u64,
    pub max_concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.into(),
            api_key: None,
            target_model: "gpt-4o".into(),
            rate: Rate::Auto,
            temperature: None,
            preserve_keywords: false,
            preserve_words: Vec::new(),
            timeout_ms: 30_000,
            max_concurrency: 5,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("target_model", &self.target_model)
            .field("rate", &self.rate)
            .field("temperature", &self.temperature)
            .field("preserve_keywords", &self.preserve_keywords)
            .field("preserve_words", &self.preserve_words)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl ClientConfig {
    /// Defaults with the base URL from `SCALEDOWN_API_URL` and the API key
    /// from the process-wide credential slot (or `SCALEDOWN_API_KEY`).
    pub fn from_env() -> Self {
        Self {
            base_url: api_url(),
            api_key: credentials::resolve_api_key(None),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = api_url_from(Some(url.into()));
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_target_model(mut self, model: impl Into<String>) -> Self {
        self.target_model = model.into();
        self
    }

    pub fn with_rate(mut self, rate: impl Into<Rate>) -> Self {
        self.rate = rate.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_preserve_keywords(mut self, preserve: bool) -> Self {
        self.preserve_keywords = preserve;
        self
    }

    pub fn with_preserve_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserve_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Checks made when a client is built from this configuration.
    pub fn validate(&self) -> crate::Result<()> {
        self.rate.validate()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Batch worker ceiling, never below one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// Full endpoint for raw compression.
    pub fn compress_url(&self) -> String {
        format!("{}/compress/raw", self.base_url.trim_end_matches('/'))
    }
}

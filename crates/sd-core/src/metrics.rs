//! Validated token and latency metrics reported by the compression API.

use crate::error::{Result, SdError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token counts and latency for one compression call.
///
/// All counters are non-negative. Values are fixed at construction; there
/// are no setters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMetrics")]
pub struct CompressionMetrics {
    original_prompt_tokens: u64,
    compressed_prompt_tokens: u64,
    latency_ms: u64,
    timestamp: Option<DateTime<Utc>>,
}

/// Unvalidated shape, used only as the serde entry point.
#[derive(Deserialize)]
struct RawMetrics {
    #[serde(default)]
    original_prompt_tokens: i64,
    #[serde(default)]
    compressed_prompt_tokens: i64,
    #[serde(default)]
    latency_ms: i64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<RawMetrics> for CompressionMetrics {
    type Error = SdError;

    fn try_from(raw: RawMetrics) -> Result<Self> {
        Self::new(
            raw.original_prompt_tokens,
            raw.compressed_prompt_tokens,
            raw.latency_ms,
            raw.timestamp,
        )
    }
}

fn non_negative(field: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| SdError::Validation(format!("{field} must be non-negative, got {value}")))
}

impl CompressionMetrics {
    /// Build metrics, rejecting any negative counter.
    pub fn new(
        original_prompt_tokens: i64,
        compressed_prompt_tokens: i64,
        latency_ms: i64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        Ok(Self {
            original_prompt_tokens: non_negative("original_prompt_tokens", original_prompt_tokens)?,
            compressed_prompt_tokens: non_negative("compressed_prompt_tokens", compressed_prompt_tokens)?,
            latency_ms: non_negative("latency_ms", latency_ms)?,
            timestamp,
        })
    }

    pub fn original_prompt_tokens(&self) -> u64 {
        self.original_prompt_tokens
    }

    pub fn compressed_prompt_tokens(&self) -> u64 {
        self.compressed_prompt_tokens
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

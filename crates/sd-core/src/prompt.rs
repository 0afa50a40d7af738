//! Compressed prompt: the text returned by the service plus its metrics.

use crate::metrics::CompressionMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of compressing one context/prompt pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedPrompt {
    content: String,
    metrics: CompressionMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_used: Option<String>,
}

impl CompressedPrompt {
    pub fn new(content: impl Into<String>, metrics: CompressionMetrics) -> Self {
        Self {
            content: content.into(),
            metrics,
            model_used: None,
        }
    }

    pub fn with_model_used(mut self, model: Option<String>) -> Self {
        self.model_used = model;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metrics(&self) -> &CompressionMetrics {
        &self.metrics
    }

    /// Model the service reports having compressed for, if any.
    pub fn model_used(&self) -> Option<&str> {
        self.model_used.as_deref()
    }

    /// (original, compressed) token counts.
    pub fn tokens(&self) -> (u64, u64) {
        (
            self.metrics.original_prompt_tokens(),
            self.metrics.compressed_prompt_tokens(),
        )
    }

    /// Percentage of tokens removed (e.g. 60.0). Zero when the original
    /// count is zero.
    pub fn savings_percent(&self) -> f64 {
        let (orig, comp) = self.tokens();
        if orig == 0 {
            return 0.0;
        }
        (orig as f64 - comp as f64) / orig as f64 * 100.0
    }

    /// Original over compressed size (e.g. 2.5). Zero when the compressed
    /// count is zero.
    pub fn compression_ratio(&self) -> f64 {
        let (orig, comp) = self.tokens();
        if comp == 0 {
            return 0.0;
        }
        orig as f64 / comp as f64
    }

    pub fn latency(&self) -> u64 {
        self.metrics.latency_ms()
    }

    pub fn into_content(self) -> String {
        self.content
    }

    pub fn summary(&self) -> String {
        format!(
            "CompressedPrompt({} chars, {:.1}% saved)",
            self.content.chars().count(),
            self.savings_percent()
        )
    }

    pub fn stats_report(&self) -> String {
        let (orig, comp) = self.tokens();
        format!(
            "ScaleDown Stats:\n\
            \x20 - Tokens: {} -> {}\n\
            \x20 - Savings: {:.1}%\n\
            \x20 - Ratio: {:.1}x\n\
            \x20 - Latency: {}ms\n",
            orig,
            comp,
            self.savings_percent(),
            self.compression_ratio(),
            self.latency()
        )
    }
}

impl fmt::Display for CompressedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl AsRef<str> for CompressedPrompt {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

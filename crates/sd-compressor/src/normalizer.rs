//! Response normalizer.
//!
//! The service has shipped several response layouts: totals at the top level
//! or per-result counts under `results`, snake_case or camelCase keys. This
//! module resolves them into one (content, metrics) pair.
//!
//! Lookup order:
//! - content: `results.compressed_prompt`, else `""`
//! - original tokens: `total_original_tokens`, else `results.original_prompt_tokens`, else 0
//! - compressed tokens: `total_compressed_tokens`, else `results.compressed_prompt_tokens`, else 0
//! - latency: `latency_ms`, else 0
//! - timestamp: `request_metadata.timestamp`, else none
//!
//! `null` counts as absent. Metrics that fail validation are reported as
//! [`SdError::Api`], never clamped.

use chrono::{DateTime, NaiveDateTime, Utc};
use sd_core::{CompressedPrompt, CompressionMetrics, Result, SdError};
use serde_json::{Map, Value};

const RESULTS: &[&str] = &["results"];
const COMPRESSED_PROMPT: &[&str] = &["compressed_prompt", "compressedPrompt"];
const TOTAL_ORIGINAL: &[&str] = &["total_original_tokens", "totalOriginalTokens"];
const TOTAL_COMPRESSED: &[&str] = &["total_compressed_tokens", "totalCompressedTokens"];
const RESULT_ORIGINAL: &[&str] = &["original_prompt_tokens", "originalPromptTokens"];
const RESULT_COMPRESSED: &[&str] = &["compressed_prompt_tokens", "compressedPromptTokens"];
const LATENCY: &[&str] = &["latency_ms", "latencyMs"];
const MODEL_USED: &[&str] = &["model_used", "modelUsed"];
const REQUEST_METADATA: &[&str] = &["request_metadata", "requestMetadata"];
const TIMESTAMP: &[&str] = &["timestamp"];

/// Offset-less layouts, read as UTC. `%.f` also matches no fraction.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// First non-null value under any of `keys`.
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn lookup_object<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    lookup(obj, keys).and_then(Value::as_object)
}

/// Integer-valued count. Accepts integers, integral floats and numeric strings.
fn count(field: &str, value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).and_then(integral_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.fract() == 0.0).and_then(integral_f64))
        }
        _ => None,
    };
    parsed.ok_or_else(|| SdError::api(format!("invalid {field} in response: {value}")))
}

fn integral_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn timestamp(value: &Value) -> Result<DateTime<Utc>> {
    let parsed = match value {
        Value::String(s) => timestamp_str(s.trim()),
        Value::Number(n) => match n.as_i64() {
            Some(secs) => DateTime::from_timestamp(secs, 0),
            None => n.as_f64().and_then(epoch_seconds),
        },
        _ => None,
    };
    parsed.ok_or_else(|| SdError::api(format!("invalid timestamp in response: {value}")))
}

fn timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Fractional Unix seconds, e.g. `1700000000.5`.
fn epoch_seconds(f: f64) -> Option<DateTime<Utc>> {
    let secs = f.floor();
    let whole = integral_f64(secs)?;
    let nanos = (((f - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole, nanos)
}

/// Resolve a count from the top level first, then from `results`.
fn token_count(
    top: &Map<String, Value>,
    results: Option<&Map<String, Value>>,
    total_keys: &[&str],
    result_keys: &[&str],
    field: &str,
) -> Result<i64> {
    if let Some(v) = lookup(top, total_keys) {
        return count(field, v);
    }
    match results.and_then(|r| lookup(r, result_keys)) {
        Some(v) => count(field, v),
        None => Ok(0),
    }
}

/// Normalize a decoded response body.
pub fn normalize(body: &Value) -> Result<CompressedPrompt> {
    let top = body
        .as_object()
        .ok_or_else(|| SdError::api("response body is not a JSON object"))?;
    let results = lookup_object(top, RESULTS);

    let content = match results.and_then(|r| lookup(r, COMPRESSED_PROMPT)) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(SdError::api(format!(
                "invalid compressed_prompt in response: expected string, got {other}"
            )))
        }
        None => String::new(),
    };

    let original = token_count(top, results, TOTAL_ORIGINAL, RESULT_ORIGINAL, "original_prompt_tokens")?;
    let compressed = token_count(
        top,
        results,
        TOTAL_COMPRESSED,
        RESULT_COMPRESSED,
        "compressed_prompt_tokens",
    )?;
    let latency = match lookup(top, LATENCY) {
        Some(v) => count("latency_ms", v)?,
        None => 0,
    };
    let ts = match lookup_object(top, REQUEST_METADATA).and_then(|m| lookup(m, TIMESTAMP)) {
        Some(v) => Some(timestamp(v)?),
        None => None,
    };
    let model_used = lookup(top, MODEL_USED).and_then(Value::as_str).map(String::from);

    let metrics = CompressionMetrics::new(original, compressed, latency, ts)
        .map_err(|e| SdError::api(format!("invalid metrics in response: {e}")))?;

    Ok(CompressedPrompt::new(content, metrics).with_model_used(model_used))
}

/// Decode and normalize a raw response body.
pub fn parse_response(bytes: &[u8]) -> Result<CompressedPrompt> {
    let body: Value = serde_json::from_slice(bytes)
        .map_err(|e| SdError::api(format!("invalid JSON in response: {e}")))?;
    normalize(&body)
}

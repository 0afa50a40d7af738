//! Process-wide API key slot.
//!
//! Only the outermost layer of an application should touch this: it is read
//! once by [`ClientConfig::from_env`](crate::ClientConfig::from_env) and the
//! resulting key is then carried by the config. Compressors never consult it
//! on their own.

use std::sync::RwLock;
use tracing::debug;

/// Environment variable consulted when no key was set explicitly.
pub const API_KEY_ENV: &str = "SCALEDOWN_API_KEY";

static API_KEY: RwLock<Option<String>> = RwLock::new(None);

/// Store the process-wide API key. Blank keys clear the slot.
pub fn set_api_key(key: impl Into<String>) {
    let key = key.into();
    let value = if key.trim().is_empty() { None } else { Some(key) };
    debug!(present = value.is_some(), "Process-wide API key updated");
    match API_KEY.write() {
        Ok(mut slot) => *slot = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

/// Currently stored process-wide API key.
pub fn api_key() -> Option<String> {
    match API_KEY.read() {
        Ok(slot) => slot.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn clear_api_key() {
    debug!("Process-wide API key cleared");
    match API_KEY.write() {
        Ok(mut slot) => *slot = None,
        Err(poisoned) => *poisoned.into_inner() = None,
    }
}

/// Explicit key, else the process-wide slot, else `SCALEDOWN_API_KEY`.
pub fn resolve_api_key(explicit: Option<String>) -> Option<String> {
    explicit
        .filter(|k| !k.trim().is_empty())
        .or_else(api_key)
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
}

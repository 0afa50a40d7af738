//! ScaleDown core: validated compression metrics, results, errors and
//! client configuration shared by every compressor backend.

pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod prompt;

pub use config::{api_url, api_url_from, ClientConfig, Rate, API_URL_ENV, DEFAULT_API_URL};
pub use error::{Result, SdError};
pub use metrics::CompressionMetrics;
pub use prompt::CompressedPrompt;

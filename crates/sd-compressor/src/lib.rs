//! ScaleDown compressor client.
//!
//! Forwards context/prompt pairs to the hosted compression API and turns
//! its loosely-shaped responses into validated [`CompressedPrompt`]s.
//!
//! - [`Compressor`]: capability trait; single-call backends get shape
//!   dispatch and bounded batch execution for free.
//! - [`ScaleDownCompressor`]: the hosted HTTP backend.
//! - [`normalizer`]: response payload to (content, metrics).

pub mod client;
pub mod input;
pub mod normalizer;
pub mod payload;
pub mod traits;

pub use client::ScaleDownCompressor;
pub use input::{CallShape, Compressed, TextInput};
pub use payload::{CallOptions, CompressRequest};
pub use traits::{Compressor, DEFAULT_MAX_CONCURRENCY};

pub use sd_core::{
    credentials, ClientConfig, CompressedPrompt, CompressionMetrics, Rate, Result, SdError,
};

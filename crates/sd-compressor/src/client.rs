//! Hosted ScaleDown backend over HTTP.

use crate::normalizer;
use crate::payload::{CallOptions, CompressRequest};
use crate::traits::Compressor;
use async_trait::async_trait;
use reqwest::Client;
use sd_core::{ClientConfig, CompressedPrompt, Result, SdError};
use tracing::{debug, info, instrument, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// Compressor backed by the hosted ScaleDown API.
///
/// The configuration (including the API key) is fixed at construction and
/// shared read-only by every call, so one instance can serve concurrent
/// batches.
#[derive(Debug, Clone)]
pub struct ScaleDownCompressor {
    config: ClientConfig,
    http: Client,
    url: String,
}

impl ScaleDownCompressor {
    /// Build a compressor from an explicit configuration. A missing API key
    /// is not an error here; calls fail with [`SdError::Authentication`].
    /// A non-finite fixed rate is rejected with [`SdError::InvalidArgument`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SdError::api(format!("failed to build HTTP client: {e}")))?;
        let url = config.compress_url();
        info!(url = %url, model = %config.target_model, "Creating ScaleDown compressor");
        Ok(Self { config, http, url })
    }

    /// Build from the environment and the process-wide credential slot.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SdError::authentication(
                    "API key not found. Use credentials::set_api_key() or set api_key in ClientConfig.",
                )
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> SdError {
        if e.is_timeout() {
            SdError::api(format!(
                "request timed out after {}ms: {e}",
                self.config.timeout_ms
            ))
        } else {
            SdError::api(format!("Connection failed: {e}"))
        }
    }
}

#[async_trait]
impl Compressor for ScaleDownCompressor {
    #[instrument(skip_all, fields(model = %self.config.target_model, context_len = context.len()))]
    async fn compress_single(
        &self,
        context: &str,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<CompressedPrompt> {
        let api_key = self.api_key()?;
        let body = CompressRequest::build(&self.config, context, prompt, options);

        debug!(url = %self.url, "Sending compression request");
        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Compression request failed");
                self.transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "ScaleDown returned error");
            return Err(SdError::api(format!("HTTP {status}: {text}")));
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let result = normalizer::parse_response(&bytes)?;
        debug!(
            original = result.tokens().0,
            compressed = result.tokens().1,
            latency_ms = result.latency(),
            "Compression complete"
        );
        Ok(result)
    }

    fn max_concurrency(&self) -> usize {
        self.config.concurrency()
    }
}

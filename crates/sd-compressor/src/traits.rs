use crate::input::{CallShape, Compressed, TextInput};
use crate::payload::CallOptions;
use async_trait::async_trait;
use futures::future::join_all;
use sd_core::{CompressedPrompt, Result, SdError};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Batch worker ceiling when a backend does not choose its own.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// A prompt compression backend.
///
/// Implementors provide [`compress_single`](Compressor::compress_single);
/// shape dispatch and bounded batch execution come from the provided methods.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress one context against one prompt.
    async fn compress_single(
        &self,
        context: &str,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<CompressedPrompt>;

    /// Maximum number of in-flight single calls during a batch.
    fn max_concurrency(&self) -> usize {
        DEFAULT_MAX_CONCURRENCY
    }

    /// Compress a single pair or a batch, depending on the input shapes.
    ///
    /// Shape errors are reported before any call is made.
    async fn compress(
        &self,
        context: TextInput,
        prompt: TextInput,
        options: &CallOptions,
    ) -> Result<Compressed> {
        match CallShape::resolve(context, prompt)? {
            CallShape::Single { context, prompt } => self
                .compress_single(&context, &prompt, options)
                .await
                .map(Compressed::Single),
            CallShape::Batch(pairs) => self
                .compress_batch(&pairs, options)
                .await
                .map(Compressed::Batch),
        }
    }

    /// Run every pair and report each outcome at its input position.
    async fn compress_each(
        &self,
        pairs: &[(String, String)],
        options: &CallOptions,
    ) -> Vec<Result<CompressedPrompt>> {
        let limit = self.max_concurrency().max(1);
        debug!(items = pairs.len(), limit, "dispatching batch");
        let permits = Semaphore::new(limit);
        let permits = &permits;

        let calls = pairs.iter().enumerate().map(|(index, (context, prompt))| async move {
            let _permit = permits
                .acquire()
                .await
                .map_err(|e| SdError::api(format!("batch worker pool closed: {e}")))?;
            let result = self.compress_single(context, prompt, options).await;
            if let Err(e) = &result {
                warn!(index, error = %e, "batch item failed");
            }
            result
        });

        join_all(calls).await
    }

    /// Run every pair; all results in input order, or the error of the
    /// lowest-index failing pair once every call has finished.
    async fn compress_batch(
        &self,
        pairs: &[(String, String)],
        options: &CallOptions,
    ) -> Result<Vec<CompressedPrompt>> {
        self.compress_each(pairs, options).await.into_iter().collect()
    }
}

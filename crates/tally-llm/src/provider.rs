//! Provider trait definition

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;

/// A chat completion backend.
///
/// One invocation attempt per call: implementations do not retry, and any
/// failure is surfaced to the caller as-is.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Complete a conversation
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

//! Completion-capability seam: the black-box text generator.
//!
//! The pipeline does not know which model or provider sits behind this
//! trait — it sends a system prompt, a user prompt and sampling
//! parameters, and gets back a content list plus token accounting. The
//! generate stage owns all interpretation of the response; implementations
//! only translate their provider's API into these types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fixed behavioural instruction for the model.
    pub system: String,
    /// The document-bearing prompt.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A block in the model's response content list.
///
/// Providers return a list of typed blocks; today only text reaches this
/// pipeline, but the list shape is preserved so the generate stage can
/// validate "non-empty list, first block is non-empty text" exactly as
/// providers deliver it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ContentBlock {
    Text(String),
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Natural end of the response.
    EndTurn,
    /// The `max_tokens` ceiling cut the response off.
    MaxTokens,
    /// Provider-specific reason, carried verbatim.
    Other(String),
}

/// The model's full response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: Vec<ContentBlock>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub stop_reason: StopReason,
}

impl CompletionResponse {
    /// The leading text block, if the response has one and it is non-empty.
    ///
    /// This is the shape check the generate stage performs before looking
    /// at content quality at all.
    pub fn leading_text(&self) -> Option<&str> {
        match self.content.first() {
            Some(ContentBlock::Text(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

/// Provider failure signals, already bucketed the way the generate stage
/// classifies them.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// The provider is rate-limiting the caller — retry after backoff.
    #[error("completion rate limited")]
    RateLimited {
        /// Provider-suggested wait, if any.
        retry_after_secs: Option<u64>,
    },

    /// The request itself is malformed — retrying the same request cannot
    /// help.
    #[error("completion request invalid: {0}")]
    InvalidRequest(String),

    /// The service is temporarily unavailable.
    #[error("completion service unavailable: {0}")]
    Unavailable(String),

    /// Anything else; treated as transient.
    #[error("completion error: {0}")]
    Other(String),
}

/// Black-box text completion capability.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;
}

//! The transport contract. The actual HTTP call to Gemini/Claude is an external
//! collaborator; this crate only defines what it must look like from the pipeline's side.

use anyhow::Result;
use async_trait::async_trait;
use loom_config::CancelToken;
use uuid::Uuid;

use crate::wire::{ClaudeRequest, GeminiRequest};

/// A fully-built provider request, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRequest {
    Gemini(GeminiRequest),
    Claude(ClaudeRequest),
}

/// The transport's result for a single generation call. `success` is false when the
/// provider responded but the call should be treated as a pipeline failure (e.g. the
/// response was empty or was blocked by a safety filter); transport-level errors (timeouts,
/// non-2xx statuses) are returned as `Err` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOutcome {
    pub success: bool,
    pub text: String,
}

/// Everything the pipeline needs from an LLM provider: content generation, embeddings for
/// semantic retrieval, and token counting for budget enforcement. A production impl logs
/// every call through a [`crate::RequestLogSink`]; [`crate::FakeLlmClient`] is the
/// in-process stand-in used by tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// `technical` marks calls that are not a user-facing turn (perception, query
    /// transformation) — these are still logged but billed and reported separately.
    /// `turn_id` is `None` for technical calls with no associated turn.
    async fn generate_content(
        &self,
        request: ProviderRequest,
        technical: bool,
        turn_id: Option<Uuid>,
        cancel: &CancelToken,
    ) -> Result<GenerateOutcome>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn count_tokens(&self, text: &str) -> Result<usize>;
}

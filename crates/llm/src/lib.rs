//! Provider abstraction and wire serialization for the conversation pipeline.
//!
//! The actual LLM transport — the HTTP client that talks to Gemini/Claude — is an external
//! collaborator (out of scope per the pipeline spec); this crate owns the parts that are
//! in scope: the [`Provider`] strategy/factory, the Gemini/Claude wire shapes ([`wire`]),
//! the [`LlmClient`] contract the transport must satisfy, and the [`LlmRequestLog`] audit
//! row every call appends regardless of outcome.

pub mod client;
pub mod fake;
pub mod request_log;
pub mod wire;

use loom_config::PipelineError;

pub use client::{GenerateOutcome, LlmClient, ProviderRequest};
pub use fake::FakeLlmClient;
pub use request_log::{InMemoryRequestLogSink, LlmRequestLog, RequestLogSink};
pub use wire::{ClaudeRequest, GeminiRequest};

/// The two providers the request builder can target. Selected at runtime by the
/// `LLMProvider` setting (`"Gemini"` | `"Claude"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Gemini,
    Claude,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Claude => "Claude",
        }
    }
}

/// Resolves the active [`Provider`] from the raw `LLMProvider` setting value.
///
/// Unknown or missing values are rejected rather than silently defaulted, since picking the
/// wrong provider would silently use the wrong wire shape for every subsequent turn.
pub fn resolve_provider(setting_value: &str) -> Result<Provider, PipelineError> {
    match setting_value {
        "Gemini" => Ok(Provider::Gemini),
        "Claude" => Ok(Provider::Claude),
        other => Err(PipelineError::InvalidCombination(format!(
            "unknown LLMProvider setting value: '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_providers() {
        assert_eq!(resolve_provider("Gemini").unwrap(), Provider::Gemini);
        assert_eq!(resolve_provider("Claude").unwrap(), Provider::Claude);
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!(resolve_provider("Ollama").is_err());
    }
}

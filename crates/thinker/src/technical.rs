//! The minimal-context technical call, shared by [`crate::query_transform`] and the
//! perception enricher (`loom-agent`). A technical call never carries recent turns, flags,
//! or retrieved context — only whatever system text and user text the caller passes in.

use anyhow::Result;
use loom_config::CancelToken;
use loom_llm::client::ProviderRequest;
use loom_llm::wire::{
    GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiSystemInstruction,
    GeminiThinkingConfig,
};
use loom_llm::{LlmClient, Provider};

fn build_request(provider: Provider, system_text: &str, user_text: &str, model: &str) -> ProviderRequest {
    match provider {
        Provider::Gemini => ProviderRequest::Gemini(GeminiRequest {
            system_instruction: GeminiSystemInstruction {
                parts: vec![GeminiPart { text: system_text.to_string() }],
            },
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: user_text.to_string() }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: 512,
                temperature: 0.2,
                thinking_config: GeminiThinkingConfig { thinking_level: None, include_thoughts: false },
            },
        }),
        Provider::Claude => ProviderRequest::Claude(loom_llm::wire::ClaudeRequest {
            model: model.to_string(),
            max_tokens: 512,
            temperature: Some(0.2),
            system: loom_llm::wire::ClaudeContent::Text(system_text.to_string()),
            messages: vec![loom_llm::wire::ClaudeMessage {
                role: "user".to_string(),
                content: loom_llm::wire::ClaudeContent::Text(user_text.to_string()),
            }],
            thinking: None,
            stop_sequences: None,
            top_p: None,
            top_k: None,
            metadata: None,
        }),
    }
}

/// Fires a technical call and returns the generated text. An unsuccessful outcome (empty or
/// filtered response) yields an empty string rather than an error — callers treat "nothing
/// came back" as "use the fallback", never as a pipeline failure.
pub async fn run_technical_call(
    client: &dyn LlmClient,
    provider: Provider,
    model: &str,
    system_text: &str,
    user_text: &str,
    cancel: &CancelToken,
) -> Result<String> {
    let request = build_request(provider, system_text, user_text, model);
    let outcome = client.generate_content(request, true, None, cancel).await?;
    if outcome.success {
        Ok(outcome.text)
    } else {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_config::CancelSource;
    use loom_llm::FakeLlmClient;

    #[tokio::test]
    async fn returns_scripted_text_on_success() {
        let client = FakeLlmClient::with_responses(vec!["rewritten query".to_string()]);
        let (_source, token) = CancelSource::new();
        let text = run_technical_call(&client, Provider::Gemini, "gemini-2.5-flash", "sys", "input", &token)
            .await
            .unwrap();
        assert_eq!(text, "rewritten query");
    }

    #[tokio::test]
    async fn empty_response_yields_empty_string_not_error() {
        let client = FakeLlmClient::with_responses(vec![String::new()]);
        let (_source, token) = CancelSource::new();
        let text = run_technical_call(&client, Provider::Claude, "claude-haiku", "sys", "input", &token)
            .await
            .unwrap();
        assert!(text.is_empty());
    }
}

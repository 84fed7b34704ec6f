//! Optional rewrite of the raw user input into a richer semantic query (§4.4 step 1),
//! gated by the `SemanticUseLLMQueryTransformation` setting. The semantic retriever decides
//! whether to call this; this module only knows how.

use anyhow::Result;
use loom_config::CancelToken;
use loom_llm::{LlmClient, Provider};

use crate::technical::run_technical_call;

const SYSTEM_PROMPT: &str = "Rewrite the following user message into a short, keyword-dense \
search query suitable for semantic retrieval. Respond with the query only, no commentary.";

/// Returns the raw input unchanged if the technical call produces nothing usable, so a
/// transformation failure degrades to the pre-transformation behavior instead of blocking
/// retrieval entirely.
pub async fn transform_query(
    client: &dyn LlmClient,
    provider: Provider,
    technical_model: &str,
    input: &str,
    context_window: &str,
    cancel: &CancelToken,
) -> Result<String> {
    let user_text = if context_window.is_empty() {
        input.to_string()
    } else {
        format!("Recent context:\n{context_window}\n\nMessage:\n{input}")
    };

    let rewritten = run_technical_call(client, provider, technical_model, SYSTEM_PROMPT, &user_text, cancel).await?;
    if rewritten.trim().is_empty() {
        Ok(input.to_string())
    } else {
        Ok(rewritten.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_config::CancelSource;
    use loom_llm::FakeLlmClient;

    #[tokio::test]
    async fn falls_back_to_raw_input_when_model_returns_nothing() {
        let client = FakeLlmClient::with_responses(vec![String::new()]);
        let (_source, token) = CancelSource::new();
        let query = transform_query(&client, Provider::Gemini, "gemini-2.5-flash", "what did she say", "", &token)
            .await
            .unwrap();
        assert_eq!(query, "what did she say");
    }

    #[tokio::test]
    async fn uses_rewritten_query_when_present() {
        let client = FakeLlmClient::with_responses(vec!["she / dialogue / quote".to_string()]);
        let (_source, token) = CancelSource::new();
        let query = transform_query(&client, Provider::Gemini, "gemini-2.5-flash", "what did she say", "", &token)
            .await
            .unwrap();
        assert_eq!(query, "she / dialogue / quote");
    }
}

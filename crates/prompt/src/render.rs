//! Turns a [`RenderedPrompt`] into the Gemini or Claude wire shape (§4.8). Both serializers
//! omit null properties via `loom_llm::wire`'s `skip_serializing_if`; this module only picks
//! which fields to populate.

use loom_llm::wire::{
    ClaudeContent, ClaudeMessage, ClaudeRequest, GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest,
    GeminiSystemInstruction, GeminiThinkingConfig,
};

use crate::assembly::{RenderedPrompt, Role};

/// Generation parameters for the conversational call. Distinct from `loom_thinker`'s
/// technical-call defaults, which favor a smaller, cheaper budget.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub thinking_level: Option<String>,
    pub include_thoughts: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 4096,
            temperature: 0.9,
            thinking_level: None,
            include_thoughts: false,
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

pub fn to_gemini_request(prompt: &RenderedPrompt, params: &GenerationParams) -> GeminiRequest {
    GeminiRequest {
        system_instruction: GeminiSystemInstruction {
            parts: vec![GeminiPart { text: prompt.system_text.clone() }],
        },
        contents: prompt
            .messages
            .iter()
            .map(|(role, text)| GeminiContent {
                role: role_str(*role).to_string(),
                parts: vec![GeminiPart { text: text.clone() }],
            })
            .collect(),
        generation_config: GeminiGenerationConfig {
            max_output_tokens: params.max_output_tokens,
            temperature: params.temperature,
            thinking_config: GeminiThinkingConfig {
                thinking_level: params.thinking_level.clone(),
                include_thoughts: params.include_thoughts,
            },
        },
    }
}

fn claude_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        // Claude has no distinct "model" role; prior assistant turns are "assistant".
        Role::Model => "assistant",
    }
}

pub fn to_claude_request(prompt: &RenderedPrompt, model: &str, max_tokens: u32, temperature: Option<f32>) -> ClaudeRequest {
    ClaudeRequest {
        model: model.to_string(),
        max_tokens,
        temperature,
        system: ClaudeContent::Text(prompt.system_text.clone()),
        messages: prompt
            .messages
            .iter()
            .map(|(role, text)| ClaudeMessage {
                role: claude_role(*role).to_string(),
                content: ClaudeContent::Text(text.clone()),
            })
            .collect(),
        thinking: None,
        stop_sequences: None,
        top_p: None,
        top_k: None,
        metadata: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_prompt() -> RenderedPrompt {
        RenderedPrompt {
            system_text: "you are aria".to_string(),
            messages: vec![(Role::User, "hello".to_string()), (Role::Model, "hi there".to_string()), (Role::User, "how are you".to_string())],
        }
    }

    #[test]
    fn gemini_request_maps_roles_and_text() {
        let prompt = sample_prompt();
        let request = to_gemini_request(&prompt, &GenerationParams::default());
        assert_eq!(request.contents.len(), 3);
        assert_eq!(request.contents[1].role, "model");
        assert_eq!(request.system_instruction.parts[0].text, "you are aria");
    }

    #[test]
    fn claude_request_uses_assistant_role_for_model_turns() {
        let prompt = sample_prompt();
        let request = to_claude_request(&prompt, "claude-sonnet-4-5", 2048, None);
        assert_eq!(request.messages[1].role, "assistant");
        assert_eq!(request.max_tokens, 2048);
    }
}

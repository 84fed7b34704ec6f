//! Common, provider-agnostic prompt assembly (§4.8). Builds a single system-instruction text
//! and the ordered message sequence; the per-provider renderers turn this into Gemini or
//! Claude wire shapes. Grounded on the teacher's `prompt_builder::build_chat_prompt` — a set
//! of labeled block builders concatenated into one system text — generalized from the
//! teacher's memory-tier blocks to this pipeline's per-availability context groupings.

use loom_agent::ConversationState;
use loom_memory::{Availability, ContextData, ContextDataType};

/// A fully assembled prompt, still provider-agnostic. `messages` is ordered oldest-first,
/// ending with the current turn's input.
pub struct RenderedPrompt {
    pub system_text: String,
    pub messages: Vec<(Role, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

fn header(title: &str) -> String {
    format!("\n\n{title}:")
}

fn render_items(items: &[ContextData]) -> String {
    items.iter().map(|item| format!("- {}", item.content)).collect::<Vec<_>>().join("\n")
}

fn always_on<'a>(items: impl Iterator<Item = &'a ContextData>) -> Vec<&'a ContextData> {
    items.filter(|c| c.availability == Availability::AlwaysOn).collect()
}

fn triggered<'a>(items: impl Iterator<Item = &'a ContextData>) -> Vec<&'a ContextData> {
    items.filter(|c| c.availability == Availability::Trigger).collect()
}

fn semantic<'a>(items: impl Iterator<Item = &'a ContextData>) -> Vec<&'a ContextData> {
    items.filter(|c| c.availability == Availability::Semantic).collect()
}

fn semantic_section(label: &str, items: &[&ContextData]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let rendered = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let marker = if item.is_dynamic() { "Dynamic" } else { "Canon" };
            format!("### {marker} {label} {}:\n{}", index + 1, item.content)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\n{rendered}")
}

/// Assembles the system-instruction text and the message sequence from a fully enriched
/// state. `response_separator` is appended as an instruction so the model's expected output
/// schema includes it; the pipeline later splits on it to compute `displayResponse`.
pub fn assemble(state: &ConversationState, response_separator: &str) -> RenderedPrompt {
    let all_context = state.get_all_context_data();
    let by_type = |data_type: ContextDataType| -> Vec<ContextData> {
        all_context.iter().filter(|c| c.data_type == data_type).cloned().collect()
    };

    let mut system_text = String::new();

    if let Some(persona) = state.persona() {
        system_text.push_str(&persona);
    }

    let perceptions = state.perceptions();
    if !perceptions.is_empty() {
        system_text.push_str(&header("PERCEPTIONS"));
        system_text.push('\n');
        system_text.push_str(&perceptions.join("\n"));
    }

    let character_profiles = by_type(ContextDataType::CharacterProfile);
    let mut always_on_profiles: Vec<ContextData> = Vec::new();
    if let Some(user_profile) = state.user_profile() {
        always_on_profiles.push(user_profile);
    }
    always_on_profiles.extend(always_on(character_profiles.iter()).into_iter().cloned());
    if !always_on_profiles.is_empty() {
        system_text.push_str(&header("CHARACTER PROFILES"));
        system_text.push('\n');
        system_text.push_str(&render_items(&always_on_profiles));
    }

    let memories = by_type(ContextDataType::Memory);
    let insights = by_type(ContextDataType::Insight);
    let mut always_on_memory_insight: Vec<&ContextData> =
        always_on(memories.iter()).into_iter().chain(always_on(insights.iter())).collect();
    always_on_memory_insight.sort_by_key(|c| c.sort_order);
    if !always_on_memory_insight.is_empty() {
        system_text.push_str(&header("MEMORIES & INSIGHTS"));
        system_text.push('\n');
        system_text.push_str(&render_items(&always_on_memory_insight.into_iter().cloned().collect::<Vec<_>>()));
    }

    let generic = by_type(ContextDataType::Generic);
    let triggered_items: Vec<&ContextData> = triggered(memories.iter())
        .into_iter()
        .chain(triggered(insights.iter()))
        .chain(triggered(character_profiles.iter()))
        .chain(triggered(generic.iter()))
        .collect();
    if !triggered_items.is_empty() {
        system_text.push_str(&header("TRIGGERED CONTEXT"));
        system_text.push('\n');
        system_text.push_str(&render_items(&triggered_items.into_iter().cloned().collect::<Vec<_>>()));
    }

    let quotes = by_type(ContextDataType::Quote);
    let voice_samples = by_type(ContextDataType::PersonaVoiceSample);
    system_text.push_str(&semantic_section("Quote", &semantic(quotes.iter())));
    system_text.push_str(&semantic_section("Memory", &semantic(memories.iter())));
    system_text.push_str(&semantic_section("Insight", &semantic(insights.iter())));
    system_text.push_str(&semantic_section("Voice Sample", &semantic(voice_samples.iter())));

    let always_on_voice_samples = always_on(voice_samples.iter());
    if !always_on_voice_samples.is_empty() {
        system_text.push_str(&header("VOICE SAMPLES"));
        system_text.push('\n');
        system_text.push_str(&render_items(&always_on_voice_samples.into_iter().cloned().collect::<Vec<_>>()));
    }

    let flags = state.flags();
    if !flags.is_empty() {
        system_text.push_str(&header("ACTIVE FLAGS"));
        system_text.push('\n');
        system_text.push_str(&flags.iter().map(|f| format!("- {}", f.value)).collect::<Vec<_>>().join("\n"));
    }

    system_text.push_str(&format!(
        "\n\nAfter your reply, append the literal marker \"{response_separator}\" followed by any \
         internal notes; only the text before the marker is shown to the user."
    ));

    let mut messages = Vec::new();
    for turn in state.recent_turns() {
        messages.push((Role::User, turn.input));
        messages.push((Role::Model, turn.display_response));
    }
    if let Some(input) = state.current_input() {
        messages.push((Role::User, input));
    }

    RenderedPrompt { system_text, messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_memory::{ContextData as CD, Turn};
    use uuid::Uuid;

    #[test]
    fn always_on_memories_and_insights_are_sorted_by_sort_order() {
        let state = ConversationState::new();
        let mut first = CD::new(Uuid::new_v4(), "a", "first", ContextDataType::Memory, Availability::AlwaysOn);
        first.sort_order = 2;
        let mut second = CD::new(Uuid::new_v4(), "b", "second", ContextDataType::Insight, Availability::AlwaysOn);
        second.sort_order = 1;
        state.add_context_data(first);
        state.add_context_data(second);

        let rendered = assemble(&state, "\n---\n");
        let first_pos = rendered.system_text.find("second").unwrap();
        let second_pos = rendered.system_text.find("first").unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn semantic_items_are_marked_dynamic_or_canon() {
        let state = ConversationState::new();
        let mut dynamic = CD::new(Uuid::new_v4(), "q", "dynamic quote", ContextDataType::Quote, Availability::Semantic);
        dynamic.source_session_id = Some(Uuid::new_v4());
        let canon = CD::new(Uuid::new_v4(), "q", "canon quote", ContextDataType::Quote, Availability::Semantic);
        state.add_context_data(dynamic);
        state.add_context_data(canon);

        let rendered = assemble(&state, "\n---\n");
        assert!(rendered.system_text.contains("### Dynamic Quote"));
        assert!(rendered.system_text.contains("### Canon Quote"));
    }

    #[test]
    fn messages_end_with_current_input_after_recent_turns() {
        let state = ConversationState::new();
        let session_id = Uuid::new_v4();
        let mut turn = Turn::new(session_id, "earlier");
        turn.display_response = "earlier reply".to_string();
        state.set_recent_turns(vec![turn]);
        state.set_current_turn(Turn::new(session_id, "latest input"));

        let rendered = assemble(&state, "\n---\n");
        assert_eq!(rendered.messages.len(), 3);
        assert_eq!(rendered.messages[2], (Role::User, "latest input".to_string()));
    }
}

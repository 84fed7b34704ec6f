//! The Conversation State Builder (§4.6): seeds a fresh [`ConversationState`] with everything
//! the enrichers themselves don't derive — the session, the current turn, the pipeline-level
//! settings, the active persona, the resolved `userName`, and the `[ooc]` flag — before the
//! orchestrator runs.

use loom_agent::ConversationState;
use loom_config::{PipelineError, Settings};
use loom_memory::{queries, RelationalStore, Session, SystemMessage, Turn};
use uuid::Uuid;

const OOC_PREFIX: &str = "[ooc]";

fn is_ooc_request(input: &str) -> bool {
    input.trim_start().to_ascii_lowercase().starts_with(OOC_PREFIX)
}

/// Populates `state` from `session`/`turn` plus whatever the relational store and settings
/// contribute before enrichment starts. `turn` is expected to already carry the raw user
/// input; its id and `session_id` are not otherwise touched here.
pub async fn build_state(
    state: &ConversationState,
    relational: &dyn RelationalStore,
    settings: &Settings<'_>,
    profile_id: Uuid,
    session: Session,
    turn: Turn,
) -> Result<(), PipelineError> {
    state.set_is_ooc_request(is_ooc_request(&turn.input));
    state.set_session(session);
    state.set_current_turn(turn);

    state.set_recent_turns_count(settings.previous_turns_count());
    state.set_max_dialogue_log_turns(settings.max_dialogue_log_turns());

    if let Some(persona) = relational.active_persona(profile_id).await.map_err(PipelineError::StoreFailure)? {
        apply_persona(state, &persona);
    }

    if let Some(user_profile) = queries::get_user_profile(relational, profile_id).await? {
        state.set_user_name(user_profile.name.clone());
    }

    Ok(())
}

fn apply_persona(state: &ConversationState, persona: &SystemMessage) {
    state.set_persona(persona.content.clone());
    state.set_persona_name(persona.name.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_config::InMemorySettingsStore;
    use loom_memory::{
        Availability, ContextData, ContextDataType, InMemoryRelationalStore, SystemMessageType,
    };
    use chrono::Utc;

    fn session(profile_id: Uuid) -> Session {
        Session {
            id: Uuid::new_v4(),
            number: 1,
            name: "s1".to_string(),
            is_active: true,
            profile_id,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn seeds_persona_and_user_name_from_the_store() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();

        let persona = SystemMessage::new(profile_id, "Aria", "You are Aria.", SystemMessageType::Persona);
        store.insert_system_message(persona).await.unwrap();

        let mut user = ContextData::new(profile_id, "Dana", "c", ContextDataType::CharacterProfile, Availability::AlwaysOn);
        user.is_user = true;
        store.insert_context_data(user).await.unwrap();

        let settings_store = InMemorySettingsStore::new();
        let settings = Settings::new(&settings_store);
        let state = ConversationState::new();
        let turn = Turn::new(Uuid::new_v4(), "hello there");

        build_state(&state, &store, &settings, profile_id, session(profile_id), turn).await.unwrap();

        assert_eq!(state.persona().as_deref(), Some("You are Aria."));
        assert_eq!(state.persona_name().as_deref(), Some("Aria"));
        assert_eq!(state.user_name().as_deref(), Some("Dana"));
        assert!(!state.is_ooc_request());
    }

    #[tokio::test]
    async fn ooc_prefix_is_case_insensitive_and_ignores_leading_whitespace() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();
        let settings_store = InMemorySettingsStore::new();
        let settings = Settings::new(&settings_store);
        let state = ConversationState::new();
        let turn = Turn::new(Uuid::new_v4(), "  [OOC] what's your policy on this?");

        build_state(&state, &store, &settings, profile_id, session(profile_id), turn).await.unwrap();

        assert!(state.is_ooc_request());
    }
}

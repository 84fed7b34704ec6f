//! The conversation state (§3.2): the working set enrichers cooperatively populate. Each
//! field is owned by exactly one enricher (or the State Builder); the per-type context
//! collections are the exception — they are multi-writer safe, with uniqueness enforced at
//! read via [`ConversationState::get_all_context_data`] rather than at insert time.

use std::collections::HashSet;
use std::sync::RwLock;

use loom_llm::{ClaudeRequest, GeminiRequest};
use loom_memory::{ContextData, ContextDataType, Flag, Session, Turn};
use uuid::Uuid;

#[derive(Default)]
pub struct ConversationState {
    session: RwLock<Option<Session>>,
    current_turn: RwLock<Option<Turn>>,
    recent_turns: RwLock<Vec<Turn>>,
    previous_turn: RwLock<Option<Turn>>,
    previous_response: RwLock<Option<String>>,

    persona: RwLock<Option<String>>,
    persona_name: RwLock<Option<String>>,
    user_name: RwLock<Option<String>>,
    is_ooc_request: RwLock<bool>,

    recent_turns_count: RwLock<i64>,
    max_dialogue_log_turns: RwLock<i64>,

    quotes: RwLock<Vec<ContextData>>,
    persona_voice_samples: RwLock<Vec<ContextData>>,
    memories: RwLock<Vec<ContextData>>,
    insights: RwLock<Vec<ContextData>>,
    character_profiles: RwLock<Vec<ContextData>>,
    data: RwLock<Vec<ContextData>>,
    user_profile: RwLock<Option<ContextData>>,

    perceptions: RwLock<Vec<String>>,
    flags: RwLock<Vec<Flag>>,
    dialogue_log: RwLock<String>,
    recent_context: RwLock<String>,

    gemini_request: RwLock<Option<GeminiRequest>>,
    claude_request: RwLock<Option<ClaudeRequest>>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- State Builder writes ---

    pub fn set_session(&self, session: Session) {
        *self.session.write().expect("state lock poisoned") = Some(session);
    }

    pub fn set_current_turn(&self, turn: Turn) {
        *self.current_turn.write().expect("state lock poisoned") = Some(turn);
    }

    pub fn set_recent_turns_count(&self, count: i64) {
        *self.recent_turns_count.write().expect("state lock poisoned") = count;
    }

    pub fn set_max_dialogue_log_turns(&self, count: i64) {
        *self.max_dialogue_log_turns.write().expect("state lock poisoned") = count;
    }

    pub fn set_persona(&self, content: String) {
        *self.persona.write().expect("state lock poisoned") = Some(content);
    }

    pub fn set_persona_name(&self, name: String) {
        *self.persona_name.write().expect("state lock poisoned") = Some(name);
    }

    pub fn set_user_name(&self, name: String) {
        *self.user_name.write().expect("state lock poisoned") = Some(name);
    }

    pub fn set_is_ooc_request(&self, value: bool) {
        *self.is_ooc_request.write().expect("state lock poisoned") = value;
    }

    // --- Enricher writes (one field per enricher) ---

    pub fn set_user_profile(&self, item: ContextData) {
        *self.user_profile.write().expect("state lock poisoned") = Some(item);
    }

    pub fn add_perceptions(&self, texts: impl IntoIterator<Item = String>) {
        self.perceptions.write().expect("state lock poisoned").extend(texts);
    }

    pub fn set_flags(&self, flags: Vec<Flag>) {
        *self.flags.write().expect("state lock poisoned") = flags;
    }

    pub fn set_dialogue_log(&self, rendered: String) {
        *self.dialogue_log.write().expect("state lock poisoned") = rendered;
    }

    pub fn set_recent_context(&self, rendered: String) {
        *self.recent_context.write().expect("state lock poisoned") = rendered;
    }

    pub fn set_recent_turns(&self, turns: Vec<Turn>) {
        *self.recent_turns.write().expect("state lock poisoned") = turns;
    }

    pub fn set_previous_turn(&self, turn: Turn) {
        *self.previous_turn.write().expect("state lock poisoned") = Some(turn);
    }

    pub fn set_previous_response(&self, response: String) {
        *self.previous_response.write().expect("state lock poisoned") = Some(response);
    }

    // --- Request Builder writes ---

    pub fn set_gemini_request(&self, request: GeminiRequest) {
        *self.gemini_request.write().expect("state lock poisoned") = Some(request);
    }

    pub fn set_claude_request(&self, request: ClaudeRequest) {
        *self.claude_request.write().expect("state lock poisoned") = Some(request);
    }

    // --- Reads ---

    pub fn session(&self) -> Option<Session> {
        self.session.read().expect("state lock poisoned").clone()
    }

    pub fn current_turn(&self) -> Option<Turn> {
        self.current_turn.read().expect("state lock poisoned").clone()
    }

    pub fn current_input(&self) -> Option<String> {
        self.current_turn.read().expect("state lock poisoned").as_ref().map(|t| t.input.clone())
    }

    pub fn recent_turns(&self) -> Vec<Turn> {
        self.recent_turns.read().expect("state lock poisoned").clone()
    }

    pub fn previous_turn(&self) -> Option<Turn> {
        self.previous_turn.read().expect("state lock poisoned").clone()
    }

    pub fn previous_response(&self) -> Option<String> {
        self.previous_response.read().expect("state lock poisoned").clone()
    }

    pub fn persona(&self) -> Option<String> {
        self.persona.read().expect("state lock poisoned").clone()
    }

    pub fn persona_name(&self) -> Option<String> {
        self.persona_name.read().expect("state lock poisoned").clone()
    }

    pub fn user_name(&self) -> Option<String> {
        self.user_name.read().expect("state lock poisoned").clone()
    }

    pub fn is_ooc_request(&self) -> bool {
        *self.is_ooc_request.read().expect("state lock poisoned")
    }

    pub fn recent_turns_count(&self) -> i64 {
        *self.recent_turns_count.read().expect("state lock poisoned")
    }

    pub fn max_dialogue_log_turns(&self) -> i64 {
        *self.max_dialogue_log_turns.read().expect("state lock poisoned")
    }

    pub fn user_profile(&self) -> Option<ContextData> {
        self.user_profile.read().expect("state lock poisoned").clone()
    }

    pub fn perceptions(&self) -> Vec<String> {
        self.perceptions.read().expect("state lock poisoned").clone()
    }

    pub fn flags(&self) -> Vec<Flag> {
        self.flags.read().expect("state lock poisoned").clone()
    }

    pub fn dialogue_log(&self) -> String {
        self.dialogue_log.read().expect("state lock poisoned").clone()
    }

    pub fn recent_context(&self) -> String {
        self.recent_context.read().expect("state lock poisoned").clone()
    }

    pub fn gemini_request(&self) -> Option<GeminiRequest> {
        self.gemini_request.read().expect("state lock poisoned").clone()
    }

    pub fn claude_request(&self) -> Option<ClaudeRequest> {
        self.claude_request.read().expect("state lock poisoned").clone()
    }

    fn collection_for(&self, data_type: ContextDataType) -> &RwLock<Vec<ContextData>> {
        match data_type {
            ContextDataType::Quote => &self.quotes,
            ContextDataType::PersonaVoiceSample => &self.persona_voice_samples,
            ContextDataType::Memory => &self.memories,
            ContextDataType::Insight => &self.insights,
            ContextDataType::CharacterProfile => &self.character_profiles,
            ContextDataType::Generic => &self.data,
        }
    }

    /// Best-effort dedup check across every per-type collection plus the `userProfile` slot.
    /// Concurrent inserts can still race past this check; [`Self::get_all_context_data`] is
    /// the only place uniqueness is actually guaranteed.
    fn contains_id(&self, id: Uuid) -> bool {
        if self.user_profile.read().expect("state lock poisoned").as_ref().is_some_and(|c| c.id == id) {
            return true;
        }
        for collection in [&self.quotes, &self.persona_voice_samples, &self.memories, &self.insights, &self.character_profiles, &self.data] {
            if collection.read().expect("state lock poisoned").iter().any(|c| c.id == id) {
                return true;
            }
        }
        false
    }

    /// Routes `item` to its type's collection. No-op if an item with the same id already
    /// exists anywhere in state.
    pub fn add_context_data(&self, item: ContextData) {
        if self.contains_id(item.id) {
            return;
        }
        self.collection_for(item.data_type).write().expect("state lock poisoned").push(item);
    }

    pub fn add_context_data_range(&self, items: impl IntoIterator<Item = ContextData>) {
        for item in items {
            self.add_context_data(item);
        }
    }

    /// A dedup-by-id view over every context-data slot, user profile first.
    pub fn get_all_context_data(&self) -> Vec<ContextData> {
        let mut seen = HashSet::new();
        let mut all = Vec::new();

        if let Some(user) = self.user_profile.read().expect("state lock poisoned").clone() {
            seen.insert(user.id);
            all.push(user);
        }

        for collection in [&self.quotes, &self.persona_voice_samples, &self.memories, &self.insights, &self.character_profiles, &self.data] {
            for item in collection.read().expect("state lock poisoned").iter() {
                if seen.insert(item.id) {
                    all.push(item.clone());
                }
            }
        }

        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_memory::Availability;

    fn item(data_type: ContextDataType) -> ContextData {
        ContextData::new(Uuid::new_v4(), "name", "content", data_type, Availability::AlwaysOn)
    }

    #[test]
    fn add_context_data_routes_by_type() {
        let state = ConversationState::new();
        state.add_context_data(item(ContextDataType::Quote));
        state.add_context_data(item(ContextDataType::Memory));
        let all = state.get_all_context_data();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn duplicate_id_is_a_no_op() {
        let state = ConversationState::new();
        let entry = item(ContextDataType::Memory);
        state.add_context_data(entry.clone());
        state.add_context_data(entry);
        assert_eq!(state.get_all_context_data().len(), 1);
    }

    #[test]
    fn user_profile_appears_first_and_is_not_duplicated() {
        let state = ConversationState::new();
        let mut user = item(ContextDataType::CharacterProfile);
        user.is_user = true;
        state.set_user_profile(user.clone());
        state.add_context_data(item(ContextDataType::CharacterProfile));

        let all = state.get_all_context_data();
        assert_eq!(all[0].id, user.id);
        assert_eq!(all.iter().filter(|c| c.id == user.id).count(), 1);
    }
}

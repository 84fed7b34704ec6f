//! The enricher roster (§4.5). Six of the named enrichers — `QuoteEnricher`,
//! `PersonaVoiceSampleEnricher`, `MemoryEnricher`, `InsightEnricher`, `CharacterProfileEnricher`,
//! `GenericEnricher` — share one behavior ("load this type's AlwaysOn items plus its active
//! Manual items, if the type supports Manual") and are implemented as one parameterized
//! [`TypedContextEnricher`] rather than six near-identical structs.

use async_trait::async_trait;
use loom_config::{PipelineError, Settings};
use loom_memory::{queries, ContextDataType};
use loom_thinker::run_technical_call;
use loom_tools::VectorStore;
use tracing::warn;

use crate::orchestrator::{Enricher, EnrichmentContext};
use crate::state::ConversationState;

/// Embodies `QuoteEnricher`, `PersonaVoiceSampleEnricher`, `MemoryEnricher`, `InsightEnricher`,
/// `CharacterProfileEnricher`, and `GenericEnricher`, selected by `data_type`.
pub struct TypedContextEnricher {
    data_type: ContextDataType,
}

impl TypedContextEnricher {
    pub fn new(data_type: ContextDataType) -> Self {
        Self { data_type }
    }

    pub fn quote() -> Self {
        Self::new(ContextDataType::Quote)
    }

    pub fn persona_voice_sample() -> Self {
        Self::new(ContextDataType::PersonaVoiceSample)
    }

    pub fn memory() -> Self {
        Self::new(ContextDataType::Memory)
    }

    pub fn insight() -> Self {
        Self::new(ContextDataType::Insight)
    }

    pub fn character_profile() -> Self {
        Self::new(ContextDataType::CharacterProfile)
    }

    pub fn generic() -> Self {
        Self::new(ContextDataType::Generic)
    }
}

#[async_trait]
impl<S: VectorStore> Enricher<S> for TypedContextEnricher {
    fn name(&self) -> &'static str {
        self.data_type.as_str()
    }

    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError> {
        let mut items = queries::get_always_on(ctx.relational.as_ref(), ctx.profile_id, Some(self.data_type)).await?;

        if self.data_type.supports_manual() {
            let mut manual: Vec<_> = queries::get_active_manual(ctx.relational.as_ref(), ctx.profile_id)
                .await?
                .into_iter()
                .filter(|c| c.data_type == self.data_type)
                .collect();
            items.append(&mut manual);
        }

        if self.data_type == ContextDataType::CharacterProfile {
            if let Some(pos) = items.iter().position(|c| c.is_user) {
                let user = items.remove(pos);
                state.set_user_profile(user);
            }
        }

        state.add_context_data_range(items);
        Ok(())
    }
}

/// `SemanticDataEnricher`: the only roster member that touches the vector store.
pub struct SemanticDataEnricher {
    k_base: usize,
    quote_search_k_factor: usize,
}

impl SemanticDataEnricher {
    pub fn new(k_base: usize, quote_search_k_factor: usize) -> Self {
        Self { k_base, quote_search_k_factor }
    }
}

#[async_trait]
impl<S: VectorStore> Enricher<S> for SemanticDataEnricher {
    fn name(&self) -> &'static str {
        "SemanticData"
    }

    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError> {
        let Some(input) = state.current_input() else { return Ok(()) };

        let context_window = match state.session() {
            Some(session) => {
                let turns = ctx
                    .relational
                    .recent_accepted_turns(session.id, 3)
                    .await
                    .map_err(PipelineError::StoreFailure)?;
                turns.iter().map(|t| t.input.as_str()).collect::<Vec<_>>().join("\n")
            }
            None => String::new(),
        };

        let settings = Settings::new(ctx.settings_store.as_ref());
        let results = loom_memory::semantic::retrieve(
            ctx.relational.as_ref(),
            ctx.vectors.as_ref(),
            ctx.llm.as_ref(),
            ctx.provider,
            &settings,
            ctx.profile_id,
            &input,
            &context_window,
            self.k_base,
            self.quote_search_k_factor,
            &ctx.cancel,
        )
        .await;

        for items in results.into_values() {
            state.add_context_data_range(items);
        }
        Ok(())
    }
}

pub struct TriggerEnricher;

#[async_trait]
impl<S: VectorStore> Enricher<S> for TriggerEnricher {
    fn name(&self) -> &'static str {
        "Trigger"
    }

    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError> {
        let Some(session) = state.session() else { return Ok(()) };
        let Some(current_input) = state.current_input() else { return Ok(()) };

        let triggers = queries::get_triggers(ctx.relational.as_ref(), ctx.profile_id).await?;
        if triggers.is_empty() {
            return Ok(());
        }

        let lookback = triggers.iter().filter_map(|t| t.trigger_lookback_turns).max().unwrap_or(3) as usize;
        let recent_turns = ctx
            .relational
            .recent_accepted_turns(session.id, lookback)
            .await
            .map_err(PipelineError::StoreFailure)?;

        let settings = Settings::new(ctx.settings_store.as_ref());
        let additional_words = settings.trigger_scan_text_additional_words();

        let qualified = loom_memory::trigger::match_triggers(&triggers, &recent_turns, &current_input, &additional_words);
        for item in &qualified {
            ctx.relational.update_context_data(item.clone()).await.map_err(PipelineError::StoreFailure)?;
        }
        state.add_context_data_range(qualified);
        Ok(())
    }
}

pub struct PerceptionEnricher;

#[async_trait]
impl<S: VectorStore> Enricher<S> for PerceptionEnricher {
    fn name(&self) -> &'static str {
        "Perception"
    }

    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError> {
        let settings = Settings::new(ctx.settings_store.as_ref());
        if !settings.perception_enabled() {
            return Ok(());
        }

        let perception_messages = ctx
            .relational
            .active_perceptions(ctx.profile_id)
            .await
            .map_err(PipelineError::StoreFailure)?;
        if perception_messages.is_empty() {
            return Ok(());
        }

        let persona = state.persona().unwrap_or_default();
        let input = state.current_input().unwrap_or_default();
        let model = settings.technical_model();

        let calls = perception_messages.into_iter().map(|message| {
            let persona = persona.clone();
            let input = input.clone();
            let model = model.clone();
            async move {
                let system_text = format!("{}\n\n{}", message.content, persona);
                run_technical_call(ctx.llm.as_ref(), ctx.provider, &model, &system_text, &input, &ctx.cancel).await
            }
        });

        let results = futures::future::join_all(calls).await;
        let mut texts = Vec::new();
        for result in results {
            match result {
                Ok(text) if !text.is_empty() => texts.push(text),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "perception call failed"),
            }
        }
        state.add_perceptions(texts);
        Ok(())
    }
}

pub struct DialogueLogEnricher;

#[async_trait]
impl<S: VectorStore> Enricher<S> for DialogueLogEnricher {
    fn name(&self) -> &'static str {
        "DialogueLog"
    }

    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError> {
        let Some(session) = state.session() else { return Ok(()) };
        let max_turns = state.max_dialogue_log_turns().max(0) as usize;

        let turns = ctx
            .relational
            .recent_accepted_turns(session.id, max_turns)
            .await
            .map_err(PipelineError::StoreFailure)?;

        let rendered = turns
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.input, t.display_response))
            .collect::<Vec<_>>()
            .join("\n\n");

        state.set_dialogue_log(rendered);
        Ok(())
    }
}

pub struct TurnHistoryEnricher;

#[async_trait]
impl<S: VectorStore> Enricher<S> for TurnHistoryEnricher {
    fn name(&self) -> &'static str {
        "TurnHistory"
    }

    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError> {
        let Some(session) = state.session() else { return Ok(()) };
        let count = state.recent_turns_count().max(0) as usize;

        let turns = ctx
            .relational
            .recent_accepted_turns(session.id, count)
            .await
            .map_err(PipelineError::StoreFailure)?;

        if let Some(last) = turns.last() {
            state.set_previous_turn(last.clone());
            state.set_previous_response(last.display_response.clone());
        }
        state.set_recent_turns(turns);
        Ok(())
    }
}

pub struct FlagEnricher;

#[async_trait]
impl<S: VectorStore> Enricher<S> for FlagEnricher {
    fn name(&self) -> &'static str {
        "Flag"
    }

    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError> {
        let flags = ctx.relational.active_flags(ctx.profile_id).await.map_err(PipelineError::StoreFailure)?;
        state.set_flags(flags);
        Ok(())
    }
}

/// The full roster (§4.5). All peers; the orchestrator imposes no ordering between them.
pub fn default_roster<S: VectorStore + 'static>(k_base: usize, quote_search_k_factor: usize) -> Vec<Box<dyn Enricher<S>>> {
    vec![
        Box::new(TypedContextEnricher::quote()),
        Box::new(TypedContextEnricher::persona_voice_sample()),
        Box::new(TypedContextEnricher::memory()),
        Box::new(TypedContextEnricher::insight()),
        Box::new(TypedContextEnricher::character_profile()),
        Box::new(TypedContextEnricher::generic()),
        Box::new(SemanticDataEnricher::new(k_base, quote_search_k_factor)),
        Box::new(TriggerEnricher),
        Box::new(PerceptionEnricher),
        Box::new(DialogueLogEnricher),
        Box::new(TurnHistoryEnricher),
        Box::new(FlagEnricher),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_config::{CancelSource, InMemorySettingsStore};
    use loom_llm::FakeLlmClient;
    use loom_memory::{Availability, ContextData, InMemoryRelationalStore, RelationalStore, Turn};
    use loom_tools::{InMemoryVectorStore, VectorCollectionManager};
    use std::sync::Arc;
    use uuid::Uuid;

    fn ctx(relational: Arc<dyn RelationalStore>, profile_id: Uuid) -> EnrichmentContext<InMemoryVectorStore> {
        let (_source, cancel) = CancelSource::new();
        EnrichmentContext {
            profile_id,
            relational,
            vectors: Arc::new(VectorCollectionManager::new(InMemoryVectorStore::new())),
            llm: Arc::new(FakeLlmClient::with_responses(vec!["perceived".to_string()])),
            settings_store: Arc::new(InMemorySettingsStore::new()),
            provider: loom_llm::Provider::Gemini,
            cancel,
        }
    }

    #[tokio::test]
    async fn typed_context_enricher_loads_always_on_and_manual() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();

        let always_on = ContextData::new(profile_id, "a", "c", ContextDataType::Memory, Availability::AlwaysOn);
        let mut manual = ContextData::new(profile_id, "b", "c", ContextDataType::Memory, Availability::Manual);
        manual.use_every_turn = true;
        let idle_manual = ContextData::new(profile_id, "c", "c", ContextDataType::Memory, Availability::Manual);

        store.insert_context_data(always_on.clone()).await.unwrap();
        store.insert_context_data(manual.clone()).await.unwrap();
        store.insert_context_data(idle_manual).await.unwrap();

        let relational: Arc<dyn RelationalStore> = Arc::new(store);
        let state = ConversationState::new();
        let enricher = TypedContextEnricher::memory();
        Enricher::<InMemoryVectorStore>::enrich(&enricher, &state, &ctx(relational, profile_id)).await.unwrap();

        let loaded = state.get_all_context_data();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn character_profile_enricher_splits_user_profile_out() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();

        let mut user = ContextData::new(profile_id, "user", "c", ContextDataType::CharacterProfile, Availability::AlwaysOn);
        user.is_user = true;
        let other = ContextData::new(profile_id, "other", "c", ContextDataType::CharacterProfile, Availability::AlwaysOn);

        store.insert_context_data(user.clone()).await.unwrap();
        store.insert_context_data(other).await.unwrap();

        let relational: Arc<dyn RelationalStore> = Arc::new(store);
        let state = ConversationState::new();
        let enricher = TypedContextEnricher::character_profile();
        Enricher::<InMemoryVectorStore>::enrich(&enricher, &state, &ctx(relational, profile_id)).await.unwrap();

        assert_eq!(state.user_profile().unwrap().id, user.id);
        let all = state.get_all_context_data();
        assert_eq!(all.iter().filter(|c| c.id == user.id).count(), 1);
        assert_eq!(all[0].id, user.id);
    }

    #[tokio::test]
    async fn turn_history_enricher_sets_previous_turn() {
        let store = InMemoryRelationalStore::new();
        let session_id = Uuid::new_v4();
        let turn = Turn::new(session_id, "hello");
        store.insert_turn(turn.clone()).await.unwrap();

        let relational: Arc<dyn RelationalStore> = Arc::new(store);
        let state = ConversationState::new();
        state.set_session(loom_memory::Session {
            id: session_id,
            number: 1,
            name: "s".to_string(),
            is_active: true,
            profile_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
        });
        state.set_recent_turns_count(6);

        let enricher = TurnHistoryEnricher;
        Enricher::<InMemoryVectorStore>::enrich(&enricher, &state, &ctx(relational, Uuid::new_v4())).await.unwrap();

        assert_eq!(state.previous_turn().unwrap().id, turn.id);
        assert_eq!(state.recent_turns().len(), 1);
    }

    #[tokio::test]
    async fn flag_enricher_loads_active_flags_only() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();
        let active = loom_memory::Flag::new(profile_id, "spicy", false);
        let mut inactive = loom_memory::Flag::new(profile_id, "old", false);
        inactive.active = false;

        store.insert_flag(active.clone()).await.unwrap();
        store.insert_flag(inactive).await.unwrap();

        let relational: Arc<dyn RelationalStore> = Arc::new(store);
        let state = ConversationState::new();
        let enricher = FlagEnricher;
        Enricher::<InMemoryVectorStore>::enrich(&enricher, &state, &ctx(relational, profile_id)).await.unwrap();

        assert_eq!(state.flags().len(), 1);
        assert_eq!(state.flags()[0].id, active.id);
    }
}

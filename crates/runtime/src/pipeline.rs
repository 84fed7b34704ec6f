//! The Pipeline Driver (§4.7): drives a single user input through state building,
//! enrichment, request assembly, dispatch, persistence, stripping, and housekeeping.
//!
//! Grounded on the teacher's `runtime::chat::respond_and_remember` — locate the active
//! session, assemble a prompt, call the model, persist the exchange — generalized from its
//! single memory-tier prompt assembly to this pipeline's concurrent enrichment step, and from
//! its one-shot completion call to the dispatch helper that always appends an
//! [`loom_llm::LlmRequestLog`] row regardless of outcome.
//!
//! The provider is resolved once, up front, rather than at the point §4.7 lists it (after
//! enrichment): [`loom_agent::EnrichmentContext`] already needs a resolved provider for the
//! enrichers that issue their own technical calls (perception, semantic query
//! transformation), so resolving it any later would mean threading it through twice.

use std::sync::Arc;

use chrono::Utc;
use loom_agent::{default_roster, run_enrichers, ConversationState, EnrichmentContext};
use loom_config::{CancelToken, PipelineError, RuntimeConfig, Settings, SettingsStore};
use loom_llm::client::ProviderRequest;
use loom_llm::request_log::compute_cost;
use loom_llm::{resolve_provider, GenerateOutcome, LlmClient, LlmRequestLog, Provider};
use loom_memory::{Profile, RelationalStore, Session, Turn};
use loom_prompt::render::GenerationParams;
use loom_tools::{VectorCollectionManager, VectorStore};
use tracing::warn;
use uuid::Uuid;

use crate::active_profile::{ActiveProfileCache, SharedActiveProfileCache};
use crate::housekeeping::run_post_turn_housekeeping;
use crate::state_builder::build_state;
use crate::stripper::TurnStripper;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const CLAUDE_MAX_TOKENS: u32 = 4096;
const CLAUDE_TEMPERATURE: f32 = 0.9;

/// The output of [`PipelineDriver::build_request`]: a fully enriched state and the rendered
/// wire request, without having dispatched it.
pub struct BuiltRequest {
    pub state: ConversationState,
    pub turn: Turn,
    pub provider: Provider,
    pub provider_request: ProviderRequest,
}

pub struct PipelineDriver<S: VectorStore> {
    relational: Arc<dyn RelationalStore>,
    vectors: Arc<VectorCollectionManager<S>>,
    llm: Arc<dyn LlmClient>,
    settings_store: Arc<dyn SettingsStore>,
    stripper: TurnStripper,
    active_profile_cache: SharedActiveProfileCache,
    response_separator: String,
    semantic_search_k_base: usize,
    quote_search_k_factor: usize,
}

impl<S: VectorStore + 'static> PipelineDriver<S> {
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        vectors: Arc<VectorCollectionManager<S>>,
        llm: Arc<dyn LlmClient>,
        settings_store: Arc<dyn SettingsStore>,
        config: &RuntimeConfig,
        background_cancel: CancelToken,
    ) -> Self {
        let stripper = TurnStripper::spawn(relational.clone(), llm.clone(), settings_store.clone(), background_cancel);
        Self {
            relational,
            vectors,
            llm,
            settings_store,
            stripper,
            active_profile_cache: Arc::new(ActiveProfileCache::new()),
            response_separator: config.pipeline.response_separator.clone(),
            semantic_search_k_base: config.pipeline.semantic_search_k_base,
            quote_search_k_factor: config.pipeline.quote_search_k_factor,
        }
    }

    /// The process-wide active-profile lookup (§5): served from the cache, populated on a
    /// cold cache or a miss. Callers that change which profile is active must go through
    /// [`Self::activate_profile`] so the cache is invalidated along with the store write.
    pub async fn active_profile(&self) -> Result<Option<Profile>, PipelineError> {
        self.active_profile_cache.get(self.relational.as_ref()).await
    }

    /// Activates `profile_id` in the store and invalidates the cached active profile, so the
    /// next [`Self::active_profile`] call observes the change.
    pub async fn activate_profile(&self, profile_id: Uuid) -> Result<(), PipelineError> {
        self.relational.activate_profile(profile_id).await.map_err(PipelineError::StoreFailure)?;
        self.active_profile_cache.invalidate().await;
        Ok(())
    }

    async fn locate_active_session(&self, profile_id: Uuid) -> Result<Session, PipelineError> {
        self.relational
            .active_session(profile_id)
            .await
            .map_err(PipelineError::StoreFailure)?
            .ok_or(PipelineError::NoActiveSession)
    }

    fn enrichment_context(&self, profile_id: Uuid, provider: Provider, cancel: CancelToken) -> EnrichmentContext<S> {
        EnrichmentContext {
            profile_id,
            relational: self.relational.clone(),
            vectors: self.vectors.clone(),
            llm: self.llm.clone(),
            settings_store: self.settings_store.clone(),
            provider,
            cancel,
        }
    }

    fn model_for(&self, provider: Provider, settings: &Settings<'_>) -> String {
        match provider {
            Provider::Gemini => DEFAULT_GEMINI_MODEL.to_string(),
            Provider::Claude => settings.claude_model(),
        }
    }

    fn render_provider_request(&self, state: &ConversationState, provider: Provider, settings: &Settings<'_>) -> (ProviderRequest, String) {
        let rendered = loom_prompt::assemble(state, &self.response_separator);
        let prompt_text = format!(
            "{}\n{}",
            rendered.system_text,
            rendered.messages.iter().map(|(_, text)| text.clone()).collect::<Vec<_>>().join("\n")
        );

        match provider {
            Provider::Gemini => {
                let request = loom_prompt::to_gemini_request(&rendered, &GenerationParams::default());
                state.set_gemini_request(request.clone());
                (ProviderRequest::Gemini(request), prompt_text)
            }
            Provider::Claude => {
                let request = loom_prompt::to_claude_request(&rendered, &settings.claude_model(), CLAUDE_MAX_TOKENS, Some(CLAUDE_TEMPERATURE));
                state.set_claude_request(request.clone());
                (ProviderRequest::Claude(request), prompt_text)
            }
        }
    }

    fn provider_request_json(request: &ProviderRequest) -> serde_json::Value {
        let rendered = match request {
            ProviderRequest::Gemini(r) => r.to_json(),
            ProviderRequest::Claude(r) => r.to_json(),
        };
        rendered.unwrap_or(serde_json::Value::Null)
    }

    /// Fires `provider_request` and appends exactly one [`LlmRequestLog`] row regardless of
    /// outcome. `success=false` outcomes and transport errors are both handed back to the
    /// caller to fold into the turn's response text, never propagated past `process_input`.
    async fn dispatch(
        &self,
        provider: Provider,
        model: &str,
        provider_request: ProviderRequest,
        prompt_text: &str,
        turn_id: Uuid,
        cancel: &CancelToken,
    ) -> anyhow::Result<GenerateOutcome> {
        let start = Utc::now();
        let result = self.llm.generate_content(provider_request.clone(), false, Some(turn_id), cancel).await;
        let end = Utc::now();

        let (generated_text, input_tokens, output_tokens, success) = match &result {
            Ok(outcome) => {
                let input_tokens = self.llm.count_tokens(prompt_text).await.unwrap_or(0) as u32;
                let output_tokens = self.llm.count_tokens(&outcome.text).await.unwrap_or(0) as u32;
                (Some(outcome.text.clone()), input_tokens, output_tokens, outcome.success)
            }
            Err(_) => (None, 0, 0, false),
        };
        let total_cost = if success { compute_cost(provider, model, input_tokens, output_tokens) } else { 0.0 };

        let log = LlmRequestLog {
            request_id: Uuid::new_v4(),
            operation: "turn".to_string(),
            provider: provider.name().to_string(),
            model: model.to_string(),
            start_time: start,
            end_time: end,
            duration_ms: LlmRequestLog::duration(start, end),
            status_code: None,
            prompt: Some(prompt_text.to_string()),
            system_instruction: None,
            raw_request_json: Self::provider_request_json(&provider_request),
            raw_response_json: None,
            generated_text,
            input_tokens,
            output_tokens,
            cached_content_token_count: 0,
            thinking_tokens: 0,
            total_tokens: input_tokens + output_tokens,
            total_cost,
            turn_id: Some(turn_id),
        };
        if let Err(err) = self.relational.append_request_log(log).await {
            warn!(error = %err, "failed to append LLM request log");
        }

        result
    }

    async fn enrich(&self, state: &ConversationState, profile_id: Uuid, provider: Provider, cancel: CancelToken) -> Result<(), PipelineError> {
        let ctx = self.enrichment_context(profile_id, provider, cancel);
        let roster = default_roster::<S>(self.semantic_search_k_base, self.quote_search_k_factor);
        run_enrichers(&roster, state, &ctx).await
    }

    /// Steps 1-5 of §4.7: locates the session, constructs the turn, builds state, runs the
    /// enrichment roster, and renders the wire request — without dispatching it.
    pub async fn build_request(&self, profile_id: Uuid, input: &str, cancel: &CancelToken) -> Result<BuiltRequest, PipelineError> {
        let session = self.locate_active_session(profile_id).await?;
        let turn = Turn::new(session.id, input);

        let settings = Settings::new(self.settings_store.as_ref());
        let provider = resolve_provider(&settings.llm_provider())?;

        let state = ConversationState::new();
        build_state(&state, self.relational.as_ref(), &settings, profile_id, session, turn.clone()).await?;
        self.enrich(&state, profile_id, provider, cancel.clone()).await?;

        let (provider_request, _prompt_text) = self.render_provider_request(&state, provider, &settings);
        Ok(BuiltRequest { state, turn, provider, provider_request })
    }

    /// Drives a full turn (§4.7). Always returns `Ok(Turn)`: dispatch and enrichment failures
    /// are folded into the turn's `response` text rather than propagated, matching the spec's
    /// "a turn is always persisted" contract. Only [`PipelineError::NoActiveSession`] and an
    /// invalid `LLMProvider` setting escape as `Err`, since neither has a turn to attach to.
    pub async fn process_input(&self, profile_id: Uuid, input: &str, cancel: &CancelToken) -> Result<Turn, PipelineError> {
        let session = self.locate_active_session(profile_id).await?;
        let mut turn = Turn::new(session.id, input);

        let settings = Settings::new(self.settings_store.as_ref());
        let provider = resolve_provider(&settings.llm_provider())?;

        let state = ConversationState::new();
        build_state(&state, self.relational.as_ref(), &settings, profile_id, session, turn.clone()).await?;

        if let Err(err) = self.enrich(&state, profile_id, provider, cancel.clone()).await {
            turn.response = format!("Error: {err}");
            self.persist_turn(&turn).await?;
            return Ok(turn);
        }

        let (provider_request, prompt_text) = self.render_provider_request(&state, provider, &settings);
        let model = self.model_for(provider, &settings);

        match self.dispatch(provider, &model, provider_request, &prompt_text, turn.id, cancel).await {
            Ok(outcome) if outcome.success => {
                turn.response = outcome.text;
                turn.compute_display_response(&self.response_separator);
                self.persist_turn(&turn).await?;
                self.stripper.enqueue(turn.id);
                run_post_turn_housekeeping(self.relational.as_ref(), profile_id).await?;
            }
            Ok(outcome) => {
                turn.response = format!("Error: provider call returned an unsuccessful result: {}", outcome.text);
                self.persist_turn(&turn).await?;
            }
            Err(err) => {
                turn.response = format!("Error: {err}");
                self.persist_turn(&turn).await?;
            }
        }

        Ok(turn)
    }

    async fn persist_turn(&self, turn: &Turn) -> Result<(), PipelineError> {
        self.relational.insert_turn(turn.clone()).await.map_err(PipelineError::StoreFailure)
    }
}

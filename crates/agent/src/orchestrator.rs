//! The Enrichment Orchestrator (§4.5): runs every registered enricher concurrently, racing
//! each against cancellation, and propagates the first failure (by registration order, not
//! completion order) once all have terminated. Grounded on the teacher's
//! `tool_loop::execute_tool_calls` — build a future per unit of work, `join_all`, collect.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use loom_config::{CancelToken, PipelineError};
use loom_llm::{LlmClient, Provider};
use loom_memory::RelationalStore;
use loom_tools::{VectorCollectionManager, VectorStore};
use uuid::Uuid;

use crate::state::ConversationState;

/// Everything an enricher needs besides the shared state. `vectors` is only exercised by
/// `SemanticDataEnricher`; every other enricher ignores it.
pub struct EnrichmentContext<S: VectorStore> {
    pub profile_id: Uuid,
    pub relational: Arc<dyn RelationalStore>,
    pub vectors: Arc<VectorCollectionManager<S>>,
    pub llm: Arc<dyn LlmClient>,
    pub settings_store: Arc<dyn loom_config::SettingsStore>,
    pub provider: Provider,
    pub cancel: CancelToken,
}

#[async_trait]
pub trait Enricher<S: VectorStore>: Send + Sync {
    fn name(&self) -> &'static str;
    async fn enrich(&self, state: &ConversationState, ctx: &EnrichmentContext<S>) -> Result<(), PipelineError>;
}

/// Runs every enricher concurrently, each raced against `ctx.cancel`. Waits for all to
/// terminate, then returns the first failure by registration order.
pub async fn run_enrichers<S: VectorStore>(
    enrichers: &[Box<dyn Enricher<S>>],
    state: &ConversationState,
    ctx: &EnrichmentContext<S>,
) -> Result<(), PipelineError> {
    let futures: Vec<_> = enrichers
        .iter()
        .map(|enricher| {
            let mut cancel = ctx.cancel.clone();
            async move {
                tokio::select! {
                    result = enricher.enrich(state, ctx) => result,
                    _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                }
            }
        })
        .collect();

    let results = join_all(futures).await;
    for result in results {
        result?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_config::{CancelSource, InMemorySettingsStore};
    use loom_llm::FakeLlmClient;
    use loom_memory::InMemoryRelationalStore;
    use loom_tools::InMemoryVectorStore;

    struct OkEnricher;
    #[async_trait]
    impl Enricher<InMemoryVectorStore> for OkEnricher {
        fn name(&self) -> &'static str {
            "Ok"
        }
        async fn enrich(&self, _state: &ConversationState, _ctx: &EnrichmentContext<InMemoryVectorStore>) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    struct FailingEnricher;
    #[async_trait]
    impl Enricher<InMemoryVectorStore> for FailingEnricher {
        fn name(&self) -> &'static str {
            "Failing"
        }
        async fn enrich(&self, _state: &ConversationState, _ctx: &EnrichmentContext<InMemoryVectorStore>) -> Result<(), PipelineError> {
            Err(PipelineError::EnrichmentFailure { cause: "boom".to_string() })
        }
    }

    fn ctx() -> EnrichmentContext<InMemoryVectorStore> {
        let (_source, cancel) = CancelSource::new();
        EnrichmentContext {
            profile_id: Uuid::new_v4(),
            relational: Arc::new(InMemoryRelationalStore::new()),
            vectors: Arc::new(VectorCollectionManager::new(InMemoryVectorStore::new())),
            llm: Arc::new(FakeLlmClient::with_responses(vec!["ok".to_string()])),
            settings_store: Arc::new(InMemorySettingsStore::new()),
            provider: Provider::Gemini,
            cancel,
        }
    }

    #[tokio::test]
    async fn all_succeed_returns_ok() {
        let state = ConversationState::new();
        let enrichers: Vec<Box<dyn Enricher<InMemoryVectorStore>>> = vec![Box::new(OkEnricher), Box::new(OkEnricher)];
        let result = run_enrichers(&enrichers, &state, &ctx()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn one_failure_propagates_after_all_terminate() {
        let state = ConversationState::new();
        let enrichers: Vec<Box<dyn Enricher<InMemoryVectorStore>>> = vec![Box::new(OkEnricher), Box::new(FailingEnricher), Box::new(OkEnricher)];
        let result = run_enrichers(&enrichers, &state, &ctx()).await;
        assert!(matches!(result, Err(PipelineError::EnrichmentFailure { .. })));
    }

    struct SlowEnricher;
    #[async_trait]
    impl Enricher<InMemoryVectorStore> for SlowEnricher {
        fn name(&self) -> &'static str {
            "Slow"
        }
        async fn enrich(&self, _state: &ConversationState, _ctx: &EnrichmentContext<InMemoryVectorStore>) -> Result<(), PipelineError> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_enrichers() {
        let state = ConversationState::new();
        let (source, cancel) = CancelSource::new();
        source.cancel();
        let mut context = ctx();
        context.cancel = cancel;
        let enrichers: Vec<Box<dyn Enricher<InMemoryVectorStore>>> = vec![Box::new(SlowEnricher)];
        let result = run_enrichers(&enrichers, &state, &context).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}

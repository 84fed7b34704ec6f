//! The Turn Stripper (§4.10): a background worker that rewrites each accepted turn into a
//! terse log entry via a technical call, without competing with a live turn for the
//! foreground LLM connection. Grounded on the teacher's background compaction task
//! (`crates/runtime/src/server.rs`) — a `tokio::spawn(async move { loop { select! {...} } })`
//! racing pending work against a shutdown signal.

use std::sync::Arc;

use loom_config::{CancelToken, PipelineError, Settings, SettingsStore};
use loom_llm::{resolve_provider, LlmClient, Provider};
use loom_memory::{RelationalStore, Turn};
use loom_thinker::run_technical_call;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

const STRIP_SYSTEM_PROMPT: &str =
    "Rewrite the following exchange as a terse, single-paragraph log entry. No commentary, no \
     formatting beyond plain prose.";

/// Enqueues turn ids for a background consumer task. Dropping the last handle lets the
/// consumer drain its queue and exit once `cancel` fires.
pub struct TurnStripper {
    queue: mpsc::UnboundedSender<Uuid>,
}

impl TurnStripper {
    pub fn spawn(
        relational: Arc<dyn RelationalStore>,
        llm: Arc<dyn LlmClient>,
        settings_store: Arc<dyn SettingsStore>,
        mut cancel: CancelToken,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Uuid>();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    job = rx.recv() => {
                        let Some(turn_id) = job else { break };
                        let call_cancel = cancel.clone();
                        if let Err(err) = strip_turn(relational.as_ref(), llm.as_ref(), settings_store.as_ref(), turn_id, &call_cancel).await {
                            warn!(error = %err, %turn_id, "turn stripping failed");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
        Self { queue: tx }
    }

    /// Enqueues `turn_id` for background stripping (§4.7 step 9). Never blocks the foreground
    /// pipeline; silently dropped if the consumer has already shut down.
    pub fn enqueue(&self, turn_id: Uuid) {
        let _ = self.queue.send(turn_id);
    }
}

fn resolve_strip_provider(settings: &Settings<'_>) -> Provider {
    resolve_provider(&settings.llm_provider()).unwrap_or_else(|err| {
        warn!(error = %err, "invalid LLMProvider setting during strip, defaulting to Gemini");
        Provider::Gemini
    })
}

async fn strip_with_model(
    llm: &dyn LlmClient,
    provider: Provider,
    model: &str,
    turn: &Turn,
    cancel: &CancelToken,
) -> Result<String, PipelineError> {
    let exchange = format!("User: {}\nAssistant: {}", turn.input, turn.display_response);
    run_technical_call(llm, provider, model, STRIP_SYSTEM_PROMPT, &exchange, cancel)
        .await
        .map_err(PipelineError::StoreFailure)
}

async fn strip_turn(
    relational: &dyn RelationalStore,
    llm: &dyn LlmClient,
    settings_store: &dyn SettingsStore,
    turn_id: Uuid,
    cancel: &CancelToken,
) -> Result<(), PipelineError> {
    let Some(mut turn) = relational.get_turn(turn_id).await.map_err(PipelineError::StoreFailure)? else {
        return Err(PipelineError::not_found("turn", turn_id));
    };
    if !turn.accepted {
        return Ok(());
    }

    let settings = Settings::new(settings_store);
    let provider = resolve_strip_provider(&settings);
    turn.stripped_turn = strip_with_model(llm, provider, &settings.technical_model(), &turn, cancel).await?;

    relational.update_turn(turn).await.map_err(PipelineError::StoreFailure)?;
    Ok(())
}

/// `Restrip(turnId, model?)` (§4.10): clears `strippedTurn` and re-runs the technical call
/// synchronously, bypassing the queue. Returns the updated turn.
pub async fn restrip(
    relational: &dyn RelationalStore,
    llm: &dyn LlmClient,
    settings_store: &dyn SettingsStore,
    turn_id: Uuid,
    model_override: Option<&str>,
    cancel: &CancelToken,
) -> Result<Turn, PipelineError> {
    let Some(mut turn) = relational.get_turn(turn_id).await.map_err(PipelineError::StoreFailure)? else {
        return Err(PipelineError::not_found("turn", turn_id));
    };

    let settings = Settings::new(settings_store);
    let provider = resolve_strip_provider(&settings);
    let model = model_override.map(str::to_string).unwrap_or_else(|| settings.technical_model());

    turn.stripped_turn = strip_with_model(llm, provider, &model, &turn, cancel).await?;
    relational.update_turn(turn.clone()).await.map_err(PipelineError::StoreFailure)?;
    Ok(turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_config::{CancelSource, InMemorySettingsStore};
    use loom_llm::FakeLlmClient;
    use loom_memory::InMemoryRelationalStore;
    use std::time::Duration;

    #[tokio::test]
    async fn enqueued_turn_is_stripped_in_the_background() {
        let store = Arc::new(InMemoryRelationalStore::new());
        let mut turn = Turn::new(Uuid::new_v4(), "hi");
        turn.display_response = "hello there".to_string();
        let turn_id = turn.id;
        store.insert_turn(turn).await.unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::with_responses(vec!["User said hi, assistant replied.".to_string()]));
        let settings_store: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());
        let (_source, cancel) = CancelSource::new();

        let stripper = TurnStripper::spawn(store.clone() as Arc<dyn RelationalStore>, llm, settings_store, cancel);
        stripper.enqueue(turn_id);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let stripped = store.get_turn(turn_id).await.unwrap().unwrap();
        assert_eq!(stripped.stripped_turn, "User said hi, assistant replied.");
    }

    #[tokio::test]
    async fn rejected_turns_are_never_stripped() {
        let store = InMemoryRelationalStore::new();
        let mut turn = Turn::new(Uuid::new_v4(), "hi");
        turn.accepted = false;
        let turn_id = turn.id;
        store.insert_turn(turn).await.unwrap();

        let llm = FakeLlmClient::with_responses(vec!["should never be called".to_string()]);
        let settings_store = InMemorySettingsStore::new();
        let (_source, cancel) = CancelSource::new();

        strip_turn(&store, &llm, &settings_store, turn_id, &cancel).await.unwrap();

        assert!(store.get_turn(turn_id).await.unwrap().unwrap().stripped_turn.is_empty());
    }

    #[tokio::test]
    async fn restrip_honors_a_model_override() {
        let store = InMemoryRelationalStore::new();
        let mut turn = Turn::new(Uuid::new_v4(), "hi");
        turn.display_response = "hello".to_string();
        let turn_id = turn.id;
        store.insert_turn(turn).await.unwrap();

        let llm = FakeLlmClient::with_responses(vec!["rewritten".to_string()]);
        let settings_store = InMemorySettingsStore::new();
        let (_source, cancel) = CancelSource::new();

        let updated = restrip(&store, &llm, &settings_store, turn_id, Some("claude-haiku"), &cancel).await.unwrap();
        assert_eq!(updated.stripped_turn, "rewritten");
    }
}

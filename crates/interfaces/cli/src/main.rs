//! The command-line front end to the pipeline driver. Grounded on the teacher's
//! `#[tokio::main]` dispatch in `crates/interfaces/cli/src/main.rs`: a `clap`-derived
//! `Cli`/`Commands`, `tracing_subscriber` initialized from `RUST_LOG`, and a match over the
//! subcommand that drives a long-lived collaborator. The HTTP controllers, daemon process,
//! Telegram ingress, and interactive TUI the teacher wires up alongside this are all external
//! collaborators out of scope here — this binary drives the pipeline in-process against the
//! in-memory stores, standing in for whatever persistence layer a real deployment plugs in.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loom_config::{CancelSource, InMemorySettingsStore, RuntimeConfig, Settings, SettingsStore};
use loom_llm::{FakeLlmClient, LlmClient};
use loom_memory::{InMemoryRelationalStore, Profile, RelationalStore, Session};
use loom_runtime::PipelineDriver;
use loom_tools::{InMemoryVectorStore, VectorCollectionManager};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "loom", about = "Drive the conversation pipeline from a terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a single input through the full pipeline (§4.7) and prints the persisted turn.
    ProcessInput {
        /// Name of the profile to converse as; created and activated if it doesn't exist yet.
        #[arg(long, default_value = "default")]
        profile: String,
        /// The user's message.
        input: String,
    },
    /// Runs steps 1-5 of §4.7 (state build, enrichment, request rendering) without dispatching
    /// to a provider, and prints the rendered wire request as JSON.
    BuildRequest {
        #[arg(long, default_value = "default")]
        profile: String,
        input: String,
    },
    /// Re-runs the stripping technical call for an already-persisted turn (§4.10).
    Restrip {
        turn_id: Uuid,
        /// Overrides the configured technical model for this call only.
        #[arg(long)]
        model: Option<String>,
    },
    /// Prints the active profile and session, if any.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = RuntimeConfig::default();

    let relational: Arc<dyn RelationalStore> = Arc::new(InMemoryRelationalStore::new());
    let vectors = Arc::new(VectorCollectionManager::new(InMemoryVectorStore::new()));
    let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::with_responses(vec![
        "Acknowledged.".to_string(),
    ]));
    let settings_store: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::new());
    let (_cancel_source, cancel) = CancelSource::new();

    let driver = PipelineDriver::new(
        relational.clone(),
        vectors,
        llm,
        settings_store.clone(),
        &config,
        cancel.clone(),
    );

    match cli.command {
        Commands::ProcessInput { profile, input } => {
            let profile_id = ensure_active_profile(&driver, relational.as_ref(), &profile).await?;
            let turn = driver.process_input(profile_id, &input, &cancel).await?;
            println!("{}", turn.display_response);
        }
        Commands::BuildRequest { profile, input } => {
            let profile_id = ensure_active_profile(&driver, relational.as_ref(), &profile).await?;
            let built = driver.build_request(profile_id, &input, &cancel).await?;
            let rendered = match &built.provider_request {
                loom_llm::client::ProviderRequest::Gemini(request) => request.to_json()?,
                loom_llm::client::ProviderRequest::Claude(request) => request.to_json()?,
            };
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        Commands::Restrip { turn_id, model } => {
            let settings = Settings::new(settings_store.as_ref());
            let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::with_responses(vec![
                "Restripped.".to_string(),
            ]));
            let turn = loom_runtime::restrip(
                relational.as_ref(),
                llm.as_ref(),
                settings_store.as_ref(),
                turn_id,
                model.as_deref(),
                &cancel,
            )
            .await?;
            let _ = settings.technical_model();
            println!("{}", turn.stripped_turn);
        }
        Commands::Status => {
            match driver.active_profile().await? {
                Some(profile) => {
                    println!("active profile: {} ({})", profile.name, profile.id);
                    match relational.active_session(profile.id).await? {
                        Some(session) => println!("active session: {} (#{})", session.name, session.number),
                        None => println!("no active session"),
                    }
                }
                None => println!("no active profile"),
            }
        }
    }

    Ok(())
}

/// Finds the profile by name, activating it, or creates and activates a fresh one with a
/// freshly-started session. The HTTP profile/session CRUD controllers this stands in for are
/// out of scope; this just gives the CLI somewhere to aim `process-input`/`build-request` at.
/// Activation is routed through the driver so the active-profile cache (§5) is invalidated
/// along with the store write, rather than bypassing it with a direct store call.
async fn ensure_active_profile(
    driver: &PipelineDriver<InMemoryVectorStore>,
    relational: &dyn RelationalStore,
    name: &str,
) -> Result<Uuid> {
    let existing = relational
        .all_profiles()
        .await
        .context("loading profiles")?
        .into_iter()
        .find(|profile| profile.name == name);

    let profile = match existing {
        Some(profile) => profile,
        None => {
            let profile = Profile::new(name);
            relational.insert_profile(profile.clone()).await.context("creating profile")?;
            profile
        }
    };
    driver.activate_profile(profile.id).await.context("activating profile")?;

    if relational.active_session(profile.id).await?.is_none() {
        let session = Session {
            id: Uuid::new_v4(),
            number: 1,
            name: "session-1".to_string(),
            is_active: true,
            profile_id: profile.id,
            created_at: chrono::Utc::now(),
        };
        relational.insert_session(session).await.context("creating session")?;
    }

    Ok(profile.id)
}

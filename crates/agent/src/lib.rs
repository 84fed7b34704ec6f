//! Conversation state, the enricher roster, and the orchestrator that runs them (§3.2, §4.5).

pub mod enrichers;
pub mod orchestrator;
pub mod state;

pub use enrichers::default_roster;
pub use orchestrator::{Enricher, EnrichmentContext, run_enrichers};
pub use state::ConversationState;

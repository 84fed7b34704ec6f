//! The Request Builder (§4.8): common provider-agnostic prompt assembly plus Gemini/Claude
//! wire-shape rendering over a fully enriched [`loom_agent::ConversationState`].

pub mod assembly;
pub mod render;

pub use assembly::{assemble, RenderedPrompt, Role};
pub use render::{to_claude_request, to_gemini_request, GenerationParams};

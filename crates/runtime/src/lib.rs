//! The conversation-orchestration runtime (§4.6, §4.7, §4.9, §4.10, §5): wires the context
//! data, enrichment, and request-building layers into one driver, plus the background turn
//! stripper and the active-profile cache the driver and the CLI share.

pub mod active_profile;
pub mod housekeeping;
pub mod pipeline;
pub mod state_builder;
pub mod stripper;

pub use active_profile::{ActiveProfileCache, SharedActiveProfileCache};
pub use pipeline::{BuiltRequest, PipelineDriver};
pub use stripper::{restrip, TurnStripper};

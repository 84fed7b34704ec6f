//! Small, focused technical-LLM-call helpers shared by the query transformer and the
//! perception enricher. Both fire a cheap, minimal-context call against the configured
//! technical model rather than the full conversation request; this crate is where that
//! "minimal context" shape is built once instead of twice.

pub mod query_transform;
pub mod technical;

pub use query_transform::transform_query;
pub use technical::run_technical_call;

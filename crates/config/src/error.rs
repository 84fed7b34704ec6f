//! The pipeline's typed error kinds (§7).
//!
//! Lives in this low-level crate because every layer of the pipeline — the context data
//! store, the enrichers, the request builder, the driver — needs to raise or match on one of
//! these kinds, and this crate already sits below all of them.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid (type, availability) combination: {0}")]
    InvalidCombination(String),

    #[error("invalid availability transition: {0}")]
    InvalidTransition(String),

    #[error("no active session for the current profile")]
    NoActiveSession,

    #[error("enrichment failed: {cause}")]
    EnrichmentFailure { cause: String },

    #[error("provider call failed: {message}")]
    ProviderFailure { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("store failure: {0}")]
    StoreFailure(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }

    pub fn not_found_by_uuid(kind: &str, id: Uuid) -> Self {
        Self::not_found(kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_kind_and_id() {
        let id = Uuid::nil();
        let err = PipelineError::not_found_by_uuid("turn", id);
        assert!(err.to_string().contains("turn"));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn store_failure_wraps_anyhow() {
        let source = anyhow::anyhow!("disk full");
        let err: PipelineError = source.into();
        assert!(matches!(err, PipelineError::StoreFailure(_)));
    }
}

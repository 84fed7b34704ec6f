//! The Context Data Store's named queries (§4.1), factored out as free functions over
//! `&dyn RelationalStore` so callers that never touch the vector store (most enrichers) don't
//! need to carry a `VectorStore` type parameter just to read always-on/manual/trigger rows.

use loom_config::PipelineError;
use tracing::warn;
use uuid::Uuid;

use crate::entities::{Availability, ContextData, ContextDataType};
use crate::relational::RelationalStore;

pub async fn get_always_on(
    store: &dyn RelationalStore,
    profile_id: Uuid,
    type_filter: Option<ContextDataType>,
) -> Result<Vec<ContextData>, PipelineError> {
    let all = store.all_context_data(profile_id).await.map_err(PipelineError::StoreFailure)?;
    Ok(all
        .into_iter()
        .filter(|c| c.is_enabled && !c.is_archived && c.availability == Availability::AlwaysOn)
        .filter(|c| type_filter.is_none_or(|t| c.data_type == t))
        .collect())
}

pub async fn get_active_manual(store: &dyn RelationalStore, profile_id: Uuid) -> Result<Vec<ContextData>, PipelineError> {
    let all = store.all_context_data(profile_id).await.map_err(PipelineError::StoreFailure)?;
    Ok(all
        .into_iter()
        .filter(|c| c.is_enabled && c.availability == Availability::Manual && (c.use_every_turn || c.use_next_turn_only))
        .collect())
}

pub async fn get_triggers(store: &dyn RelationalStore, profile_id: Uuid) -> Result<Vec<ContextData>, PipelineError> {
    let all = store.all_context_data(profile_id).await.map_err(PipelineError::StoreFailure)?;
    Ok(all.into_iter().filter(|c| c.is_enabled && c.availability == Availability::Trigger).collect())
}

/// The singleton user `CharacterProfile` row. If more than one row qualifies, the lowest id
/// wins and the losers are logged (open question #1 in DESIGN.md).
pub async fn get_user_profile(store: &dyn RelationalStore, profile_id: Uuid) -> Result<Option<ContextData>, PipelineError> {
    let all = store.all_context_data(profile_id).await.map_err(PipelineError::StoreFailure)?;
    let mut candidates: Vec<ContextData> = all
        .into_iter()
        .filter(|c| c.is_enabled && c.data_type == ContextDataType::CharacterProfile && c.is_user)
        .collect();
    candidates.sort_by_key(|c| c.id);

    if candidates.len() > 1 {
        let winner = &candidates[0];
        let losers: Vec<Uuid> = candidates[1..].iter().map(|c| c.id).collect();
        warn!(profile_id = %profile_id, winner = %winner.id, ?losers, "multiple user CharacterProfile rows; lowest id wins");
    }

    Ok(candidates.into_iter().next())
}

pub async fn get_semantic_candidates(
    store: &dyn RelationalStore,
    profile_id: Uuid,
    data_type: ContextDataType,
) -> Result<Vec<ContextData>, PipelineError> {
    let all = store.all_context_data(profile_id).await.map_err(PipelineError::StoreFailure)?;
    Ok(all
        .into_iter()
        .filter(|c| c.is_enabled && c.data_type == data_type && c.availability == Availability::Semantic && c.in_vector_db)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::InMemoryRelationalStore;

    #[tokio::test]
    async fn always_on_excludes_archived_and_disabled() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();

        let mut enabled = ContextData::new(profile_id, "a", "c", ContextDataType::Memory, Availability::AlwaysOn);
        enabled.is_enabled = true;
        let mut archived = ContextData::new(profile_id, "b", "c", ContextDataType::Memory, Availability::AlwaysOn);
        archived.is_archived = true;
        let mut disabled = ContextData::new(profile_id, "c", "c", ContextDataType::Memory, Availability::AlwaysOn);
        disabled.is_enabled = false;

        store.insert_context_data(enabled.clone()).await.unwrap();
        store.insert_context_data(archived).await.unwrap();
        store.insert_context_data(disabled).await.unwrap();

        let result = get_always_on(&store, profile_id, None).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, enabled.id);
    }

    #[tokio::test]
    async fn active_manual_requires_a_use_flag() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();
        let mut idle = ContextData::new(profile_id, "a", "c", ContextDataType::Memory, Availability::Manual);
        idle.is_enabled = true;
        let mut active = ContextData::new(profile_id, "b", "c", ContextDataType::Memory, Availability::Manual);
        active.use_every_turn = true;

        store.insert_context_data(idle).await.unwrap();
        store.insert_context_data(active.clone()).await.unwrap();

        let result = get_active_manual(&store, profile_id).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, active.id);
    }
}

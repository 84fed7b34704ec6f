//! The Context Data Store (§4.1): enforces the (type, availability) matrix, the
//! unembed-on-change protocol, and exposes the store's named queries over a
//! [`RelationalStore`] + [`VectorCollectionManager`] pair.

use std::sync::Arc;

use loom_config::PipelineError;
use loom_tools::{VectorCollectionManager, VectorPayload, VectorStore};
use uuid::Uuid;

use crate::entities::{Availability, ContextData, ContextDataType};
use crate::relational::RelationalStore;

fn validate_combination(data_type: ContextDataType, availability: Availability) -> Result<(), PipelineError> {
    let permitted = match availability {
        Availability::Archive | Availability::AlwaysOn => true,
        Availability::Manual => data_type.supports_manual(),
        Availability::Semantic => data_type.supports_semantic(),
        Availability::Trigger => data_type.supports_trigger(),
    };

    if permitted {
        Ok(())
    } else {
        Err(PipelineError::InvalidCombination(format!(
            "{:?} does not support {:?} availability",
            data_type, availability
        )))
    }
}

/// Outcome of a [`ContextDataStore::change_availability`] call, surfaced up to the HTTP
/// collaborator per §6's `{success, oldAvailability, newAvailability, requiresUnembed,
/// wasEmbedded, wasUnembedded}` response shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityChangeOutcome {
    pub success: bool,
    pub old_availability: Availability,
    pub new_availability: Availability,
    pub requires_unembed: bool,
    pub was_embedded: bool,
    pub was_unembedded: bool,
}

pub struct ContextDataStore<S: VectorStore> {
    store: Arc<dyn RelationalStore>,
    vectors: Arc<VectorCollectionManager<S>>,
}

impl<S: VectorStore> ContextDataStore<S> {
    pub fn new(store: Arc<dyn RelationalStore>, vectors: Arc<VectorCollectionManager<S>>) -> Self {
        Self { store, vectors }
    }

    pub async fn create(&self, item: ContextData) -> Result<(), PipelineError> {
        validate_combination(item.data_type, item.availability)?;
        self.store.insert_context_data(item).await.map_err(PipelineError::StoreFailure)
    }

    /// Updates an existing row, re-validating the matrix against its (possibly new)
    /// `(data_type, availability)` pair.
    pub async fn update(&self, item: ContextData) -> Result<(), PipelineError> {
        validate_combination(item.data_type, item.availability)?;
        self.store.update_context_data(item).await.map_err(PipelineError::StoreFailure)
    }

    /// Changes availability, applying the unembed-on-change protocol. `allow_unembed=false`
    /// refuses the change (§4.1 option (a)) when the row is currently `Semantic` and
    /// embedded; `allow_unembed=true` deletes the vector-store record first (option (b)).
    pub async fn change_availability(
        &self,
        id: Uuid,
        target: Availability,
        allow_unembed: bool,
    ) -> Result<AvailabilityChangeOutcome, PipelineError> {
        let mut item = self
            .store
            .get_context_data(id)
            .await
            .map_err(PipelineError::StoreFailure)?
            .ok_or_else(|| PipelineError::not_found_by_uuid("ContextData", id))?;

        validate_combination(item.data_type, target)?;

        let old_availability = item.availability;
        let requires_unembed = old_availability == Availability::Semantic && item.in_vector_db && target != Availability::Semantic;

        if requires_unembed && !allow_unembed {
            return Ok(AvailabilityChangeOutcome {
                success: false,
                old_availability,
                new_availability: old_availability,
                requires_unembed: true,
                was_embedded: true,
                was_unembedded: false,
            });
        }

        let mut was_unembedded = false;
        if requires_unembed && allow_unembed {
            self.vectors
                .delete(item.data_type.as_str(), id)
                .await
                .map_err(PipelineError::StoreFailure)?;
            item.in_vector_db = false;
            was_unembedded = true;
        }

        crate::manual_override::change_availability(&mut item, target);
        self.store.update_context_data(item).await.map_err(PipelineError::StoreFailure)?;

        Ok(AvailabilityChangeOutcome {
            success: true,
            old_availability,
            new_availability: target,
            requires_unembed,
            was_embedded: requires_unembed,
            was_unembedded,
        })
    }

    /// Embeds and upserts a row into its vector collection, marking `in_vector_db=true`.
    pub async fn embed(&self, id: Uuid, vector: Vec<f32>) -> Result<(), PipelineError> {
        let mut item = self
            .store
            .get_context_data(id)
            .await
            .map_err(PipelineError::StoreFailure)?
            .ok_or_else(|| PipelineError::not_found_by_uuid("ContextData", id))?;

        self.vectors
            .upsert(
                item.data_type.as_str(),
                id,
                vector,
                VectorPayload { profile_id: item.profile_id, entry_type: item.data_type.as_str().to_string() },
            )
            .await
            .map_err(PipelineError::StoreFailure)?;

        item.in_vector_db = true;
        self.store.update_context_data(item).await.map_err(PipelineError::StoreFailure)
    }

    /// Delegates to the free function of the same name so callers that only need read access
    /// to always-on rows (most enrichers) can call it directly over a bare `&dyn
    /// RelationalStore`, without carrying this store's `S: VectorStore` parameter.
    pub async fn get_always_on(&self, profile_id: Uuid, type_filter: Option<ContextDataType>) -> Result<Vec<ContextData>, PipelineError> {
        crate::queries::get_always_on(self.store.as_ref(), profile_id, type_filter).await
    }

    pub async fn get_active_manual(&self, profile_id: Uuid) -> Result<Vec<ContextData>, PipelineError> {
        crate::queries::get_active_manual(self.store.as_ref(), profile_id).await
    }

    pub async fn get_triggers(&self, profile_id: Uuid) -> Result<Vec<ContextData>, PipelineError> {
        crate::queries::get_triggers(self.store.as_ref(), profile_id).await
    }

    pub async fn get_user_profile(&self, profile_id: Uuid) -> Result<Option<ContextData>, PipelineError> {
        crate::queries::get_user_profile(self.store.as_ref(), profile_id).await
    }

    pub async fn get_semantic_candidates(&self, profile_id: Uuid, data_type: ContextDataType) -> Result<Vec<ContextData>, PipelineError> {
        crate::queries::get_semantic_candidates(self.store.as_ref(), profile_id, data_type).await
    }
}

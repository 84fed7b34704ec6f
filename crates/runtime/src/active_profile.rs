//! The process-wide active-profile cache (§5). Profile CRUD and activation are driven by the
//! out-of-scope HTTP controllers; this cache only avoids repeating `active_profile()` lookups
//! on every turn, and exposes `invalidate` for whichever in-scope collaborator changes which
//! profile is active.

use std::sync::Arc;

use loom_config::PipelineError;
use loom_memory::{Profile, RelationalStore};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ActiveProfileCache {
    cached: RwLock<Option<Profile>>,
}

impl ActiveProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached profile, loading it from the store on a cold cache or a miss.
    pub async fn get(&self, relational: &dyn RelationalStore) -> Result<Option<Profile>, PipelineError> {
        if let Some(profile) = self.cached.read().await.clone() {
            return Ok(Some(profile));
        }

        let loaded = relational.active_profile().await.map_err(PipelineError::StoreFailure)?;
        *self.cached.write().await = loaded.clone();
        Ok(loaded)
    }

    /// Drops the cached value. Call this after activating, duplicating, or deleting a profile.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

pub type SharedActiveProfileCache = Arc<ActiveProfileCache>;

//! The vector-store collaborator boundary and the Vector Collection Manager.
//!
//! The vector database itself is an external collaborator (§6 of the spec): this crate only
//! states the contract ([`VectorStore`]) and a name-keyed registry ([`VectorCollectionManager`])
//! that ensures a per-type collection exists and routes a record to it, so the Semantic
//! Retriever and the context-data store's unembed-on-change path never hardcode collection
//! names. [`InMemoryVectorStore`] is a scripted fake used by tests and by the CLI's in-process
//! runtime.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

/// One of the `ContextData` types that supports `Semantic` availability.
///
/// Kept as a plain string key (rather than importing the richer type enum from the context
/// data crate) so this crate stays a leaf dependency with no knowledge of `ContextData` shape.
pub type CollectionKey = &'static str;

pub const COLLECTION_QUOTE: CollectionKey = "context_quotes";
pub const COLLECTION_MEMORY: CollectionKey = "context_memories";
pub const COLLECTION_INSIGHT: CollectionKey = "context_insights";
pub const COLLECTION_VOICE_SAMPLE: CollectionKey = "context_voice_samples";

/// Maps a `ContextData.type` name (`"Quote"`, `"Memory"`, `"Insight"`, `"PersonaVoiceSample"`)
/// to its backing collection. Returns `None` for types that never support `Semantic`
/// availability (`CharacterProfile`, `Generic`).
pub fn collection_for_type(type_name: &str) -> Option<CollectionKey> {
    match type_name {
        "Quote" => Some(COLLECTION_QUOTE),
        "Memory" => Some(COLLECTION_MEMORY),
        "Insight" => Some(COLLECTION_INSIGHT),
        "PersonaVoiceSample" => Some(COLLECTION_VOICE_SAMPLE),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorPayload {
    pub profile_id: Uuid,
    pub entry_type: String,
}

/// The vector database contract (§6): `ensureCollection`, `upsert`, `search`, `delete`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, collection: CollectionKey) -> Result<()>;
    async fn upsert(
        &self,
        collection: CollectionKey,
        id: Uuid,
        vector: Vec<f32>,
        payload: VectorPayload,
    ) -> Result<()>;
    async fn search(&self, collection: CollectionKey, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;
    async fn delete(&self, collection: CollectionKey, id: Uuid) -> Result<()>;
}

/// Routes `ContextData` records to their collection and lazily ensures each collection exists
/// exactly once. Analogous to a name-keyed tool registry: first touch wins, subsequent lookups
/// are a cheap membership check.
pub struct VectorCollectionManager<S: VectorStore> {
    store: S,
    ensured: RwLock<HashMap<CollectionKey, bool>>,
}

impl<S: VectorStore> VectorCollectionManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ensured: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ensure the collection backing `type_name` exists, creating it on first use. Returns
    /// `None` if `type_name` does not support semantic availability.
    pub async fn ensure(&self, type_name: &str) -> Result<Option<CollectionKey>> {
        let Some(collection) = collection_for_type(type_name) else {
            return Ok(None);
        };

        let already_ensured = *self.ensured.read().expect("lock poisoned").get(collection).unwrap_or(&false);
        if !already_ensured {
            self.store.ensure_collection(collection).await?;
            self.ensured.write().expect("lock poisoned").insert(collection, true);
            debug!(collection, "ensured vector collection");
        }
        Ok(Some(collection))
    }

    pub async fn upsert(
        &self,
        type_name: &str,
        id: Uuid,
        vector: Vec<f32>,
        payload: VectorPayload,
    ) -> Result<()> {
        let Some(collection) = self.ensure(type_name).await? else {
            anyhow::bail!("type '{type_name}' does not support semantic availability");
        };
        self.store.upsert(collection, id, vector, payload).await
    }

    pub async fn search(&self, type_name: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(collection) = self.ensure(type_name).await? else {
            return Ok(Vec::new());
        };
        self.store.search(collection, vector, k).await
    }

    pub async fn delete(&self, type_name: &str, id: Uuid) -> Result<()> {
        let Some(collection) = collection_for_type(type_name) else {
            return Ok(());
        };
        self.store.delete(collection, id).await
    }
}

/// Scripted in-memory fake for tests and the CLI's in-process runtime.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<CollectionKey, Vec<(Uuid, Vec<f32>)>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: CollectionKey) -> Result<()> {
        self.collections.write().expect("lock poisoned").entry(collection).or_default();
        Ok(())
    }

    async fn upsert(
        &self,
        collection: CollectionKey,
        id: Uuid,
        vector: Vec<f32>,
        _payload: VectorPayload,
    ) -> Result<()> {
        let mut collections = self.collections.write().expect("lock poisoned");
        let entries = collections.entry(collection).or_default();
        entries.retain(|(existing_id, _)| *existing_id != id);
        entries.push((id, vector));
        Ok(())
    }

    async fn search(&self, collection: CollectionKey, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().expect("lock poisoned");
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<SearchHit> = entries
            .iter()
            .map(|(id, v)| SearchHit {
                id: *id,
                score: cosine_similarity(vector, v),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, collection: CollectionKey, id: Uuid) -> Result<()> {
        if let Some(entries) = self.collections.write().expect("lock poisoned").get_mut(collection) {
            entries.retain(|(existing_id, _)| *existing_id != id);
        }
        Ok(())
    }
}

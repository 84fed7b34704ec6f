//! A thread-safe dedup-by-id collection, generalizing the teacher's `MemoryStore` (`Vec` +
//! `HashSet<String>` of seen ids + `HashMap<Uuid, usize>` index) from one entity type to any
//! entity with a `Uuid` key, since the relational store needs the same shape for every
//! family in §3.1.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

#[derive(Debug, Default)]
pub struct IdIndexedStore<T: Clone> {
    entries: RwLock<HashMap<Uuid, T>>,
}

impl<T: Clone> IdIndexedStore<T> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Inserts a new row. Returns `false` without modifying the store if `id` already exists.
    pub fn insert_new(&self, id: Uuid, value: T) -> bool {
        let mut entries = self.entries.write().expect("lock poisoned");
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, value);
        true
    }

    /// Inserts or replaces a row unconditionally.
    pub fn upsert(&self, id: Uuid, value: T) {
        self.entries.write().expect("lock poisoned").insert(id, value);
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.entries.read().expect("lock poisoned").get(&id).cloned()
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.entries.write().expect("lock poisoned").remove(&id).is_some()
    }

    pub fn all(&self) -> Vec<T> {
        self.entries.read().expect("lock poisoned").values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_new_rejects_duplicate_id() {
        let store: IdIndexedStore<String> = IdIndexedStore::new();
        let id = Uuid::new_v4();
        assert!(store.insert_new(id, "first".to_string()));
        assert!(!store.insert_new(id, "second".to_string()));
        assert_eq!(store.get(id), Some("first".to_string()));
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let store: IdIndexedStore<String> = IdIndexedStore::new();
        let id = Uuid::new_v4();
        store.upsert(id, "first".to_string());
        store.upsert(id, "second".to_string());
        assert_eq!(store.get(id), Some("second".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_drops_the_row() {
        let store: IdIndexedStore<String> = IdIndexedStore::new();
        let id = Uuid::new_v4();
        store.upsert(id, "value".to_string());
        assert!(store.remove(id));
        assert!(store.get(id).is_none());
        assert!(!store.remove(id));
    }
}

//! System Message Versioning (§4.9). Updating a `SystemMessage` never mutates the row in
//! place: it inserts a new version and activates it, leaving every prior version (including
//! the root) present but inactive for audit/rollback.

use anyhow::{anyhow, Result};
use uuid::Uuid;

use crate::entities::SystemMessage;
use crate::relational::RelationalStore;

/// Inserts a new version in `existing`'s family with `content`, sets `version = max + 1` and
/// `parent_id = family root`, and activates it (deactivating every sibling). Returns the new
/// row.
pub async fn update_system_message(store: &dyn RelationalStore, existing_id: Uuid, content: String) -> Result<SystemMessage> {
    let existing = store
        .get_system_message(existing_id)
        .await?
        .ok_or_else(|| anyhow!("system message {existing_id} not found"))?;
    let family_root = existing.family_root();

    let versions = store.system_message_versions(family_root).await?;
    let max_version = versions.iter().map(|m| m.version).max().unwrap_or(0);

    let mut next = existing.clone();
    next.id = Uuid::new_v4();
    next.content = content;
    next.version = max_version + 1;
    next.parent_id = Some(family_root);
    next.is_active = true;

    store.insert_system_message(next.clone()).await?;
    store.set_active_version(family_root, next.id).await?;

    Ok(next)
}

/// Deletes the root of a version family: cascades to every version (§4.9).
pub async fn delete_system_message_family(store: &dyn RelationalStore, family_root_id: Uuid) -> Result<()> {
    store.archive_system_message_family(family_root_id).await
}

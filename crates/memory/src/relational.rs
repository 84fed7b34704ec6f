//! The relational store collaborator (§6 "Relational store contract", ADDED since this repo
//! has no out-of-process database). One `IdIndexedStore` per entity family, mirroring the
//! teacher's `MemoryStore`/`MemoryEventLog` pair generalized to the whole entity set, minus
//! the event-log replay machinery — this in-memory implementation is the test/CLI backing,
//! not a durability layer.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use loom_llm::LlmRequestLog;
use uuid::Uuid;

use crate::entities::{ContextData, Flag, Profile, Session, SystemMessage, SystemMessageType, Turn};
use crate::id_store::IdIndexedStore;

#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn insert_profile(&self, profile: Profile) -> Result<()>;
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;
    async fn all_profiles(&self) -> Result<Vec<Profile>>;
    /// Atomically clears `is_active` on every profile then sets it on `id`.
    async fn activate_profile(&self, id: Uuid) -> Result<()>;
    async fn active_profile(&self) -> Result<Option<Profile>>;

    async fn insert_session(&self, session: Session) -> Result<()>;
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>>;
    async fn active_session(&self, profile_id: Uuid) -> Result<Option<Session>>;

    async fn insert_turn(&self, turn: Turn) -> Result<()>;
    async fn update_turn(&self, turn: Turn) -> Result<()>;
    async fn get_turn(&self, id: Uuid) -> Result<Option<Turn>>;
    /// The last `limit` accepted turns for `session_id`, oldest first.
    async fn recent_accepted_turns(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>>;

    async fn insert_system_message(&self, message: SystemMessage) -> Result<()>;
    async fn get_system_message(&self, id: Uuid) -> Result<Option<SystemMessage>>;
    async fn active_persona(&self, profile_id: Uuid) -> Result<Option<SystemMessage>>;
    async fn active_perceptions(&self, profile_id: Uuid) -> Result<Vec<SystemMessage>>;
    /// Every version row (root included) belonging to the family rooted at `family_root_id`.
    async fn system_message_versions(&self, family_root_id: Uuid) -> Result<Vec<SystemMessage>>;
    /// Clears `is_active` on every row in the family rooted at `family_root_id`, then
    /// activates `version_id` (§4.9).
    async fn set_active_version(&self, family_root_id: Uuid, version_id: Uuid) -> Result<()>;
    /// Marks the root and every version row in its family archived (§4.9 delete cascade).
    async fn archive_system_message_family(&self, family_root_id: Uuid) -> Result<()>;

    async fn insert_context_data(&self, item: ContextData) -> Result<()>;
    async fn update_context_data(&self, item: ContextData) -> Result<()>;
    async fn get_context_data(&self, id: Uuid) -> Result<Option<ContextData>>;
    async fn all_context_data(&self, profile_id: Uuid) -> Result<Vec<ContextData>>;

    async fn insert_flag(&self, flag: Flag) -> Result<()>;
    async fn update_flag(&self, flag: Flag) -> Result<()>;
    async fn active_flags(&self, profile_id: Uuid) -> Result<Vec<Flag>>;

    async fn append_request_log(&self, log: LlmRequestLog) -> Result<()>;
    async fn request_logs_for_turn(&self, turn_id: Uuid) -> Result<Vec<LlmRequestLog>>;
}

#[derive(Default)]
pub struct InMemoryRelationalStore {
    profiles: IdIndexedStore<Profile>,
    sessions: IdIndexedStore<Session>,
    turns: IdIndexedStore<Turn>,
    system_messages: IdIndexedStore<SystemMessage>,
    context_data: IdIndexedStore<ContextData>,
    flags: IdIndexedStore<Flag>,
    request_logs: IdIndexedStore<LlmRequestLog>,
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    async fn insert_profile(&self, profile: Profile) -> Result<()> {
        self.profiles.upsert(profile.id, profile);
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.profiles.get(id))
    }

    async fn all_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.profiles.all())
    }

    async fn activate_profile(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        for mut profile in self.profiles.all() {
            let should_be_active = profile.id == id;
            if profile.is_active != should_be_active {
                profile.is_active = should_be_active;
                if should_be_active {
                    profile.last_activated_at = Some(now);
                }
                self.profiles.upsert(profile.id, profile);
            }
        }
        Ok(())
    }

    async fn active_profile(&self) -> Result<Option<Profile>> {
        Ok(self.profiles.all().into_iter().find(|p| p.is_active))
    }

    async fn insert_session(&self, session: Session) -> Result<()> {
        self.sessions.upsert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.get(id))
    }

    async fn active_session(&self, profile_id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.all().into_iter().find(|s| s.profile_id == profile_id && s.is_active))
    }

    async fn insert_turn(&self, turn: Turn) -> Result<()> {
        self.turns.upsert(turn.id, turn);
        Ok(())
    }

    async fn update_turn(&self, turn: Turn) -> Result<()> {
        self.turns.upsert(turn.id, turn);
        Ok(())
    }

    async fn get_turn(&self, id: Uuid) -> Result<Option<Turn>> {
        Ok(self.turns.get(id))
    }

    async fn recent_accepted_turns(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>> {
        let mut turns: Vec<Turn> = self
            .turns
            .all()
            .into_iter()
            .filter(|t| t.session_id == session_id && t.accepted)
            .collect();
        turns.sort_by_key(|t| t.created_at);
        let start = turns.len().saturating_sub(limit);
        Ok(turns.split_off(start))
    }

    async fn insert_system_message(&self, message: SystemMessage) -> Result<()> {
        self.system_messages.upsert(message.id, message);
        Ok(())
    }

    async fn get_system_message(&self, id: Uuid) -> Result<Option<SystemMessage>> {
        Ok(self.system_messages.get(id))
    }

    async fn active_persona(&self, profile_id: Uuid) -> Result<Option<SystemMessage>> {
        Ok(self
            .system_messages
            .all()
            .into_iter()
            .find(|m| m.profile_id == profile_id && m.is_active && !m.is_archived && m.message_type == SystemMessageType::Persona))
    }

    async fn active_perceptions(&self, profile_id: Uuid) -> Result<Vec<SystemMessage>> {
        Ok(self
            .system_messages
            .all()
            .into_iter()
            .filter(|m| m.profile_id == profile_id && m.is_active && !m.is_archived && m.message_type == SystemMessageType::Perception)
            .collect())
    }

    async fn system_message_versions(&self, family_root_id: Uuid) -> Result<Vec<SystemMessage>> {
        Ok(self.system_messages.all().into_iter().filter(|m| m.family_root() == family_root_id).collect())
    }

    async fn set_active_version(&self, family_root_id: Uuid, version_id: Uuid) -> Result<()> {
        for mut message in self.system_messages.all() {
            if message.family_root() == family_root_id {
                message.is_active = message.id == version_id;
                self.system_messages.upsert(message.id, message);
            }
        }
        Ok(())
    }

    async fn archive_system_message_family(&self, family_root_id: Uuid) -> Result<()> {
        for mut message in self.system_messages.all() {
            if message.family_root() == family_root_id {
                message.is_archived = true;
                self.system_messages.upsert(message.id, message);
            }
        }
        Ok(())
    }

    async fn insert_context_data(&self, item: ContextData) -> Result<()> {
        self.context_data.upsert(item.id, item);
        Ok(())
    }

    async fn update_context_data(&self, item: ContextData) -> Result<()> {
        self.context_data.upsert(item.id, item);
        Ok(())
    }

    async fn get_context_data(&self, id: Uuid) -> Result<Option<ContextData>> {
        Ok(self.context_data.get(id))
    }

    async fn all_context_data(&self, profile_id: Uuid) -> Result<Vec<ContextData>> {
        Ok(self.context_data.all().into_iter().filter(|c| c.profile_id == profile_id).collect())
    }

    async fn insert_flag(&self, flag: Flag) -> Result<()> {
        self.flags.upsert(flag.id, flag);
        Ok(())
    }

    async fn update_flag(&self, flag: Flag) -> Result<()> {
        self.flags.upsert(flag.id, flag);
        Ok(())
    }

    async fn active_flags(&self, profile_id: Uuid) -> Result<Vec<Flag>> {
        Ok(self.flags.all().into_iter().filter(|f| f.profile_id == profile_id && f.active).collect())
    }

    async fn append_request_log(&self, log: LlmRequestLog) -> Result<()> {
        self.request_logs.upsert(log.request_id, log);
        Ok(())
    }

    async fn request_logs_for_turn(&self, turn_id: Uuid) -> Result<Vec<LlmRequestLog>> {
        Ok(self.request_logs.all().into_iter().filter(|l| l.turn_id == Some(turn_id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activating_a_profile_deactivates_the_others() {
        let store = InMemoryRelationalStore::new();
        let a = Profile::new("a");
        let mut b = Profile::new("b");
        b.is_active = true;
        store.insert_profile(a.clone()).await.unwrap();
        store.insert_profile(b.clone()).await.unwrap();

        store.activate_profile(a.id).await.unwrap();

        let active = store.active_profile().await.unwrap().unwrap();
        assert_eq!(active.id, a.id);
        assert!(!store.get_profile(b.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn recent_accepted_turns_excludes_rejected_and_caps_count() {
        let store = InMemoryRelationalStore::new();
        let session_id = Uuid::new_v4();
        for i in 0..5 {
            let mut turn = Turn::new(session_id, format!("input {i}"));
            turn.accepted = i != 2;
            store.insert_turn(turn).await.unwrap();
        }
        let recent = store.recent_accepted_turns(session_id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn set_active_version_activates_only_the_target() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();
        let root = SystemMessage::new(profile_id, "persona", "v1", SystemMessageType::Persona);
        let root_id = root.id;
        let mut v2 = SystemMessage::new(profile_id, "persona", "v2", SystemMessageType::Persona);
        v2.parent_id = Some(root_id);
        v2.version = 2;
        let v2_id = v2.id;
        store.insert_system_message(root).await.unwrap();
        store.insert_system_message(v2).await.unwrap();

        store.set_active_version(root_id, v2_id).await.unwrap();

        assert!(!store.get_system_message(root_id).await.unwrap().unwrap().is_active);
        assert!(store.get_system_message(v2_id).await.unwrap().unwrap().is_active);
    }
}

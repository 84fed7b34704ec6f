//! Post-turn housekeeping (§4.7 step 10): runs only after a turn's dispatch has succeeded and
//! been persisted. Clears one-shot manual-override flags and deactivates non-constant flags
//! that were surfaced this turn.

use chrono::Utc;
use loom_config::PipelineError;
use loom_memory::{manual_override, RelationalStore};
use uuid::Uuid;

pub async fn run_post_turn_housekeeping(relational: &dyn RelationalStore, profile_id: Uuid) -> Result<(), PipelineError> {
    for mut item in relational.all_context_data(profile_id).await.map_err(PipelineError::StoreFailure)? {
        if !item.use_next_turn_only {
            continue;
        }
        let before = (item.use_next_turn_only, item.use_every_turn, item.availability, item.previous_availability);
        manual_override::process_post_turn(&mut item);
        let after = (item.use_next_turn_only, item.use_every_turn, item.availability, item.previous_availability);
        if before != after {
            relational.update_context_data(item).await.map_err(PipelineError::StoreFailure)?;
        }
    }

    let now = Utc::now();
    for mut flag in relational.active_flags(profile_id).await.map_err(PipelineError::StoreFailure)? {
        if flag.constant {
            continue;
        }
        flag.active = false;
        flag.last_used_at = Some(now);
        relational.update_flag(flag).await.map_err(PipelineError::StoreFailure)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_memory::{Availability, ContextData, ContextDataType, Flag, InMemoryRelationalStore};

    #[tokio::test]
    async fn clears_use_next_turn_only_and_restores_snapshot() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();

        let mut item = ContextData::new(profile_id, "a", "c", ContextDataType::Memory, Availability::AlwaysOn);
        manual_override::set_use_next_turn(&mut item);
        let id = item.id;
        store.insert_context_data(item).await.unwrap();

        run_post_turn_housekeeping(&store, profile_id).await.unwrap();

        let after = store.get_context_data(id).await.unwrap().unwrap();
        assert!(!after.use_next_turn_only);
        assert_eq!(after.availability, Availability::AlwaysOn);
    }

    #[tokio::test]
    async fn constant_flags_are_left_untouched() {
        let store = InMemoryRelationalStore::new();
        let profile_id = Uuid::new_v4();

        let constant = Flag::new(profile_id, "canon-trait", true);
        let transient = Flag::new(profile_id, "spicy", false);
        store.insert_flag(constant.clone()).await.unwrap();
        store.insert_flag(transient.clone()).await.unwrap();

        run_post_turn_housekeeping(&store, profile_id).await.unwrap();

        let flags = store.active_flags(profile_id).await.unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].id, constant.id);
    }
}

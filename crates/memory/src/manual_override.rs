//! The manual-override state machine (§4.2), expressed as pure mutations on a single
//! `ContextData` row. The store layer (`context_store`) is responsible for persisting the
//! result; keeping these as plain functions makes the transition rules themselves directly
//! testable without a store in the loop.

use crate::entities::{Availability, ContextData};

/// Snapshots `availability` into `previous_availability` unless already in `Manual` (in which
/// case a prior snapshot, if any, must be preserved rather than overwritten).
fn snapshot_if_entering_manual(item: &mut ContextData) {
    if item.availability != Availability::Manual {
        item.previous_availability = Some(item.availability);
        item.availability = Availability::Manual;
    }
}

pub fn set_use_next_turn(item: &mut ContextData) {
    snapshot_if_entering_manual(item);
    item.use_next_turn_only = true;
}

pub fn set_use_every_turn(item: &mut ContextData, enabled: bool) {
    if enabled {
        snapshot_if_entering_manual(item);
        item.use_every_turn = true;
        return;
    }

    item.use_every_turn = false;
    if !item.use_next_turn_only {
        if let Some(previous) = item.previous_availability.take() {
            item.availability = previous;
        }
    }
}

pub fn clear_manual_flags(item: &mut ContextData) {
    item.use_next_turn_only = false;
    item.use_every_turn = false;
    if let Some(previous) = item.previous_availability.take() {
        item.availability = previous;
    }
}

/// A hard reset: unconditionally sets `availability` to `target` and clears every override
/// field, discarding any pending snapshot.
pub fn change_availability(item: &mut ContextData, target: Availability) {
    item.availability = target;
    item.use_next_turn_only = false;
    item.use_every_turn = false;
    item.previous_availability = None;
}

/// Post-turn housekeeping (§4.7 step 10, §4.2): clears one-shot `use_next_turn_only` flags,
/// restoring the snapshotted availability unless `use_every_turn` is still set. Rows with
/// `use_every_turn=true` and `use_next_turn_only=false` are left untouched.
pub fn process_post_turn(item: &mut ContextData) {
    if !item.use_next_turn_only {
        return;
    }
    item.use_next_turn_only = false;
    if !item.use_every_turn {
        if let Some(previous) = item.previous_availability.take() {
            item.availability = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ContextDataType;
    use uuid::Uuid;

    fn sample() -> ContextData {
        ContextData::new(Uuid::new_v4(), "quote", "content", ContextDataType::Quote, Availability::AlwaysOn)
    }

    #[test]
    fn set_use_next_turn_then_post_turn_restores_original_state() {
        let mut item = sample();
        let original_availability = item.availability;
        set_use_next_turn(&mut item);
        assert_eq!(item.availability, Availability::Manual);
        assert!(item.use_next_turn_only);

        process_post_turn(&mut item);
        assert_eq!(item.availability, original_availability);
        assert!(!item.use_next_turn_only);
        assert!(item.previous_availability.is_none());
    }

    #[test]
    fn set_use_every_turn_survives_post_turn() {
        let mut item = sample();
        set_use_every_turn(&mut item, true);
        process_post_turn(&mut item);
        assert!(item.use_every_turn);
        assert_eq!(item.availability, Availability::Manual);
    }

    #[test]
    fn entering_manual_twice_preserves_first_snapshot() {
        let mut item = sample();
        set_use_next_turn(&mut item);
        set_use_every_turn(&mut item, true);
        assert_eq!(item.previous_availability, Some(Availability::AlwaysOn));
    }

    #[test]
    fn disabling_every_turn_restores_previous_when_next_turn_also_clear() {
        let mut item = sample();
        set_use_every_turn(&mut item, true);
        set_use_every_turn(&mut item, false);
        assert_eq!(item.availability, Availability::AlwaysOn);
        assert!(item.previous_availability.is_none());
    }

    #[test]
    fn change_availability_is_a_hard_reset() {
        let mut item = sample();
        set_use_next_turn(&mut item);
        change_availability(&mut item, Availability::Trigger);
        assert_eq!(item.availability, Availability::Trigger);
        assert!(!item.use_next_turn_only);
        assert!(item.previous_availability.is_none());
    }
}

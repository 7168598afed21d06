//! Per-entity done/failed bookkeeping
//!
//! Positions are the 1-based places of tracks in their entity's catalog order.
//! A position is in at most one of the done and failed sets. The done set only
//! grows during a run; the failed set is cleared per position on success and
//! wholesale at the end of a run.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Positions {
    done: HashMap<String, BTreeSet<usize>>,
    failed: HashMap<String, BTreeSet<usize>>,
}

/// Done and failed positions per entity, plus whole-entity failures
#[derive(Debug, Default)]
pub struct Ledger {
    positions: Mutex<Positions>,
    failed_entities: Mutex<HashSet<String>>,
}

impl Ledger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a position has completed
    pub fn is_done(&self, entity_id: &str, position: usize) -> bool {
        self.lock_positions()
            .done
            .get(entity_id)
            .is_some_and(|set| set.contains(&position))
    }

    /// Mark a position done, clearing any failure recorded for it
    pub fn mark_done(&self, entity_id: &str, position: usize) {
        let mut positions = self.lock_positions();
        if let Some(failed) = positions.failed.get_mut(entity_id) {
            failed.remove(&position);
        }
        positions
            .done
            .entry(entity_id.to_string())
            .or_default()
            .insert(position);
    }

    /// Record a failed position; ignored when the position is already done
    pub fn mark_failed(&self, entity_id: &str, position: usize) {
        let mut positions = self.lock_positions();
        let already_done = positions
            .done
            .get(entity_id)
            .is_some_and(|set| set.contains(&position));
        if already_done {
            tracing::debug!(entity_id, position, "ignoring failure of a completed position");
            return;
        }
        positions
            .failed
            .entry(entity_id.to_string())
            .or_default()
            .insert(position);
    }

    /// Forget a single failed position
    pub fn clear_failed(&self, entity_id: &str, position: usize) {
        if let Some(failed) = self.lock_positions().failed.get_mut(entity_id) {
            failed.remove(&position);
        }
    }

    /// Failed positions of an entity, ascending
    pub fn failed_positions(&self, entity_id: &str) -> Vec<usize> {
        self.lock_positions()
            .failed
            .get(entity_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Done positions of an entity, ascending
    pub fn done_positions(&self, entity_id: &str) -> Vec<usize> {
        self.lock_positions()
            .done
            .get(entity_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any entity still has a failed position or is itself failed
    pub fn has_failures(&self) -> bool {
        let track_failures = self
            .lock_positions()
            .failed
            .values()
            .any(|set| !set.is_empty());
        track_failures || !self.lock_entities().is_empty()
    }

    /// Whether one entity has failed positions or is itself failed
    pub fn has_failures_for(&self, entity_id: &str) -> bool {
        let track_failures = self
            .lock_positions()
            .failed
            .get(entity_id)
            .is_some_and(|set| !set.is_empty());
        track_failures || self.is_entity_failed(entity_id)
    }

    /// Whether any entity procedure aborted
    pub fn has_failed_entities(&self) -> bool {
        !self.lock_entities().is_empty()
    }

    /// Forget every failed position and failed entity
    pub fn clear_all_failed(&self) {
        self.lock_positions().failed.clear();
        self.lock_entities().clear();
    }

    /// Record an entity whose procedure aborted
    pub fn mark_entity_failed(&self, entity_id: &str) {
        self.lock_entities().insert(entity_id.to_string());
    }

    /// Forget an entity-level failure
    pub fn clear_entity_failed(&self, entity_id: &str) {
        self.lock_entities().remove(entity_id);
    }

    /// Whether an entity's procedure aborted
    pub fn is_entity_failed(&self, entity_id: &str) -> bool {
        self.lock_entities().contains(entity_id)
    }

    fn lock_positions(&self) -> MutexGuard<'_, Positions> {
        self.positions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_entities(&self) -> MutexGuard<'_, HashSet<String>> {
        self.failed_entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

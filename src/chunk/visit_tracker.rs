//! Tracks which visits are in flight and whether they have failed.

use crate::constants::MAX_VISITS_IN_FLIGHT;
use crate::stdx::hashed_set::{HashedSet, SetEntry};

use super::descriptor::Visit;

/// The authority on whether a visit is in flight.
///
/// A thin wrapper over a fixed [`HashedSet`] of [`Visit`] entries. All
/// methods are invoked under the manager's mutex; the tracker does no
/// locking of its own.
pub struct VisitTracker {
    visits: HashedSet<Visit, MAX_VISITS_IN_FLIGHT, { 2 * MAX_VISITS_IN_FLIGHT }>,
}

impl VisitTracker {
    pub fn new() -> Self {
        Self {
            visits: HashedSet::new(),
        }
    }

    /// Returns `true` iff the visit is tracked and has not been marked
    /// failed.
    pub fn is_valid(&self, visit_id: i64) -> bool {
        self.visits.find(visit_id).is_some_and(|v| !v.failed())
    }

    /// Returns `true` iff the visit is tracked, failed or not.
    pub fn contains(&self, visit_id: i64) -> bool {
        self.visits.find(visit_id).is_some()
    }

    /// Marks the visit failed. A no-op when the visit is untracked; marking
    /// an already-failed visit again has no further effect.
    pub fn fail(&mut self, visit_id: i64) {
        if let Some(v) = self.visits.find_mut(visit_id) {
            v.set_failed();
        }
    }

    /// Inserts a fresh visit. Returns `None` on a duplicate id or a full
    /// tracker.
    pub fn insert(&mut self, visit_id: i64) -> Option<&mut Visit> {
        self.visits.insert(visit_id)
    }

    /// Removes the visit, returning whether it was tracked.
    pub fn erase(&mut self, visit_id: i64) -> bool {
        self.visits.erase(visit_id)
    }

    /// Returns the number of free tracker slots.
    pub fn space(&self) -> usize {
        self.visits.space()
    }

    /// Returns the number of tracked visits.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Snapshots `(id, failed)` for every tracked visit, sorted by id.
    pub fn snapshot(&self) -> Vec<(i64, bool)> {
        let mut visits: Vec<(i64, bool)> =
            self.visits.iter().map(|v| (v.id(), v.failed())).collect();
        visits.sort_unstable();
        visits
    }
}

impl Default for VisitTracker {
    fn default() -> Self {
        Self::new()
    }
}

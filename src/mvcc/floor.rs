//! Visibility floor
//!
//! The oldest bound among active read views. No version a view at or above
//! the floor could still observe may be reclaimed.

use std::collections::BTreeMap;

use super::{CommitId, ReadView};

/// Multiset of active read-view bounds
#[derive(Debug, Clone, Default)]
pub struct VisibilityFloor {
    active: BTreeMap<CommitId, usize>,
}

impl VisibilityFloor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, view: ReadView) {
        *self.active.entry(view.upper_bound()).or_insert(0) += 1;
    }

    pub fn unregister(&mut self, view: ReadView) {
        let bound = view.upper_bound();
        if let Some(count) = self.active.get_mut(&bound) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(&bound);
            }
        }
    }

    pub fn active_view_count(&self) -> usize {
        self.active.values().sum()
    }

    /// Oldest active bound, if any view is open
    pub fn oldest_active(&self) -> Option<CommitId> {
        self.active.keys().next().copied()
    }

    /// Reclamation floor given the latest committed identity
    pub fn floor(&self, last_committed: CommitId) -> CommitId {
        self.oldest_active()
            .map_or(last_committed, |oldest| oldest.min(last_committed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(n: u64) -> ReadView {
        ReadView::new(CommitId::new(n))
    }

    #[test]
    fn test_floor_without_views_is_last_commit() {
        let floor = VisibilityFloor::new();
        assert_eq!(floor.floor(CommitId::new(42)), CommitId::new(42));
    }

    #[test]
    fn test_floor_tracks_oldest_view() {
        let mut floor = VisibilityFloor::new();
        floor.register(view(10));
        floor.register(view(3));
        assert_eq!(floor.floor(CommitId::new(42)), CommitId::new(3));
        floor.unregister(view(3));
        assert_eq!(floor.floor(CommitId::new(42)), CommitId::new(10));
    }

    #[test]
    fn test_duplicate_bounds_are_counted() {
        let mut floor = VisibilityFloor::new();
        floor.register(view(5));
        floor.register(view(5));
        floor.unregister(view(5));
        assert_eq!(floor.oldest_active(), Some(CommitId::new(5)));
        assert_eq!(floor.active_view_count(), 1);
        floor.unregister(view(5));
        assert_eq!(floor.oldest_active(), None);
    }
}

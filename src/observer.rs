// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Observe structural diff events emitted during reconciliation.
//!
//! A [`CacheObserver`] receives one callback per discrete structural change a
//! [`SectionedCache`](crate::SectionedCache) makes to its sections: section
//! insert/delete, row insert/delete, and row update/move. Every callback
//! carries the index path(s) of the change, valid against the cache's state at
//! the moment the callback fires — apply events in the order received and the
//! external presentation stays in lockstep without ever reloading.
//!
//! Callbacks run synchronously on the context performing the reconciliation
//! call. An observer must not call back into the cache from within a callback.
//!
//! All methods default to no-ops, so an observer implements only what it needs.
//! For a testing-oriented implementation that records every call, see
//! [`RecordingObserver`](recording::RecordingObserver).

pub mod recording;

use std::fmt;

/// A `(sectionIndex, rowIndex)` pair locating an object in the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct IndexPath {
    /// Position of the owning section in the cache's section list.
    pub section: usize,
    /// Position of the row within that section.
    pub row: usize,
}

impl IndexPath {
    /// Creates an index path.
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.section, self.row)
    }
}

/// How a row-update event changed the row's location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum RowChange {
    /// The row stayed in its section (its row index may still have changed).
    Update,
    /// The row relocated to a different section.
    ///
    /// When the move emptied its old section or created its new one, the
    /// corresponding `section_deleted`/`section_inserted` events fire *before*
    /// the `row_updated` carrying this kind. A consumer tracking state
    /// event-by-event should treat a section delete as removing the section
    /// together with any row still in it, and apply the move itself by
    /// removing the object wherever it currently is (it may already be gone
    /// with its old section) and inserting it at the new path.
    Move,
}

/// Receives ordered diff events from a [`SectionedCache`](crate::SectionedCache).
#[expect(unused_variables)]
pub trait CacheObserver<T> {
    /// A new section was created at `index`.
    fn section_inserted(&mut self, key: &str, index: usize) {}

    /// The section at `index` (position before removal) lost its last row and
    /// was removed.
    fn section_deleted(&mut self, key: &str, index: usize) {}

    /// `object` was inserted at `at`.
    fn row_inserted(&mut self, object: &T, at: IndexPath) {}

    /// `object` changed; it previously occupied `from` and now occupies `to`.
    ///
    /// `from` is relative to the cache's state when this object's
    /// reconciliation step began, `to` to its state after the step was
    /// applied. See [`RowChange::Move`] for how section events interleave
    /// with cross-section moves.
    fn row_updated(&mut self, object: &T, from: IndexPath, to: IndexPath, change: RowChange) {}

    /// `object` was removed from `at` (its path before removal).
    fn row_deleted(&mut self, object: &T, at: IndexPath) {}
}

/// An observer that ignores all events.
///
/// Useful for calls whose diff output nobody consumes (for example, priming a
/// cache that has no presentation attached yet). Using it helps the compiler
/// optimise the event plumbing away.
pub struct DummyObserver;

impl<T> CacheObserver<T> for DummyObserver {}

/// Forwarding so `&mut observer` can be re-borrowed through helper calls.
impl<T, O> CacheObserver<T> for &mut O
where
    O: CacheObserver<T> + ?Sized,
{
    fn section_inserted(&mut self, key: &str, index: usize) {
        (**self).section_inserted(key, index);
    }

    fn section_deleted(&mut self, key: &str, index: usize) {
        (**self).section_deleted(key, index);
    }

    fn row_inserted(&mut self, object: &T, at: IndexPath) {
        (**self).row_inserted(object, at);
    }

    fn row_updated(&mut self, object: &T, from: IndexPath, to: IndexPath, change: RowChange) {
        (**self).row_updated(object, from, to, change);
    }

    fn row_deleted(&mut self, object: &T, at: IndexPath) {
        (**self).row_deleted(object, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_path_displays_as_a_pair() {
        assert_eq!(IndexPath::new(2, 5).to_string(), "(2, 5)");
    }

    #[test]
    fn index_paths_order_section_first() {
        assert!(IndexPath::new(0, 9) < IndexPath::new(1, 0));
        assert!(IndexPath::new(1, 0) < IndexPath::new(1, 1));
    }
}

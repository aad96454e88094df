// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Error taxonomy for configuration and reconciliation.
//!
//! Nothing in this crate is fatal to the process: configuration problems are
//! rejected when a [`ViewConfig`](crate::ViewConfig) is built, and resolution
//! failures during reconciliation are collected per object so that the rest of
//! the batch is still applied. A failed call never leaves a
//! [`SectionedCache`](crate::SectionedCache) with unsorted sections or an
//! empty section in its list.

use crate::snapshot::ObjectId;

/// A configuration problem detected when building a [`ViewConfig`](crate::ViewConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The sort-rule list was empty.
    ///
    /// Row order inside a section is meaningless without at least one rule,
    /// and batch pre-sorting relies on it, so this is rejected up front
    /// instead of surfacing as nondeterministic row placement later.
    #[error("at least one sort rule is required")]
    NoSortRules,
}

/// A delete or update referenced an identity that is not present in any
/// section.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no entry with primary key {id} exists in any section")]
pub struct EntryNotFound {
    /// The primary key that failed to resolve.
    pub id: ObjectId,
}

/// Resolution failures accumulated across one reconciliation batch.
///
/// The offending objects are skipped but every other object in the batch is
/// still processed; the cache's invariants hold regardless of this error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} change(s) in the batch could not be resolved against the live sections", missing.len())]
pub struct BatchError {
    /// One entry per object that could not be resolved, in batch order.
    pub missing: Vec<EntryNotFound>,
}

impl BatchError {
    pub(crate) fn check(missing: Vec<EntryNotFound>) -> Result<(), Self> {
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Self { missing })
        }
    }

    /// Merges the failures of `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.missing.extend(other.missing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_is_ok_without_failures() {
        assert_eq!(BatchError::check(Vec::new()), Ok(()));
    }

    #[test]
    fn merge_concatenates_in_order() {
        let mut first = BatchError {
            missing: vec![EntryNotFound { id: "a".into() }],
        };
        first.merge(BatchError {
            missing: vec![EntryNotFound { id: "b".into() }],
        });
        let ids: Vec<&str> = first.missing.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

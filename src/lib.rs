// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Sectioned: Incremental Sectioned Projections of a Mutable Object Store
//!
//! This crate maintains a live, sectioned, sorted *projection* of a mutable
//! object store and incrementally emits the minimal set of structural edits —
//! section insert/delete, row insert/delete/update/move — needed to keep an
//! external presentation (a list, a table) synchronized with the store,
//! without ever recomputing the projection from scratch.
//!
//! It is built around two cooperating components:
//!
//! - [`TransactionLog`]: a per-transaction change aggregator. Every mutation
//!   inside one write transaction is captured as an immutable, thread-safe
//!   [`ChangeSnapshot`] ("mirror"); duplicate mutations on the same identity
//!   collapse to the last one. On commit the log flushes exactly one batch.
//! - [`SectionedCache`]: a sectioned-cache reconciler. It consumes such
//!   batches and converts them into ordered, indexable diff events, delivered
//!   synchronously to a [`CacheObserver`].
//!
//! ## Data flow
//!
//! ```text
//! store mutation ──▶ TransactionLog::record (collapse per identity)
//!                         │ commit
//!                         ▼
//!                 TransactionLog::flush ──▶ out-of-band ChangeBus broadcasts
//!                         │ batch
//!                         ▼
//!                 SectionedCache::apply ──▶ CacheObserver events
//!                                            (section/row insert, delete,
//!                                             update, move — with index paths)
//! ```
//!
//! ## Getting started
//!
//! ```rust
//! use sectioned::{
//!     observer::recording::{CacheEvent, RecordingObserver},
//!     ChangeKind, ChangeSnapshot, IndexPath, SectionedCache, SortRule, ViewConfig,
//! };
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Task {
//!     id: u64,
//!     list: String,
//!     priority: i64,
//! }
//!
//! // Typed accessors, resolved at configuration time: primary key, section
//! // key, and the ordered sort rules.
//! let config = ViewConfig::builder(|t: &Task| t.id)
//!     .section_key(|t: &Task| t.list.clone())
//!     .sort_rule(SortRule::asc(|t: &Task| t.priority))
//!     .build()
//!     .unwrap();
//! let mut cache = SectionedCache::new(config);
//! let mut observer = RecordingObserver::new();
//!
//! let chores = Task { id: 1, list: "Chores".into(), priority: 2 };
//! cache.insert(vec![chores.clone()], &mut observer);
//! assert_eq!(
//!     observer.take(),
//!     vec![
//!         CacheEvent::SectionInserted { key: "Chores".into(), index: 0 },
//!         CacheEvent::RowInserted { object: chores, at: IndexPath::new(0, 0) },
//!     ],
//! );
//!
//! // A committed transaction batch goes through `apply`, which classifies
//! // snapshots by mutation kind.
//! let done = ChangeSnapshot::new(1u64, ChangeKind::Delete, Task {
//!     id: 1,
//!     list: "Chores".into(),
//!     priority: 2,
//! });
//! cache.apply(vec![done], &mut observer).unwrap();
//! assert!(cache.is_empty());
//! ```
//!
//! ## Index-path correctness
//!
//! Every event carries index paths valid against the cache's state at the
//! moment the event fires: insert batches are pre-sorted so placement order
//! matches final order, and delete batches are processed from the highest
//! index path down so earlier-resolved paths never shift. Applying the events
//! one by one, in order, against a presentation therefore reproduces the
//! cache's structure exactly. See the [`cache`] module docs for the details.
//!
//! ## Identity, not field values
//!
//! Deletes and updates resolve their target row by primary-key identity
//! against the live sections — never by recomputing keys from the incoming
//! payload, which may be stale. This is what makes reconciliation tolerant of
//! an update that changes the very field used for sectioning: the row is found
//! where it *is*, removed there, and re-inserted where it now *belongs*
//! (policy-controlled, see [`UpdatePolicy`]).
//!
//! ## Concurrency model
//!
//! Cooperative, not parallel. There is exactly one writer context — the one
//! that owns the backing store — and all reconciliation runs serialized with
//! respect to store transactions, so the crate takes no locks. Snapshots are
//! immutable once captured and may be read from any context; the only
//! suspension point is the bounded [`OwningContext::run_sync`] hand-off used
//! to register with the store's change feed. Observer callbacks run inline on
//! the reconciliation context and must not re-enter the cache.
//!
//! ## Failure semantics
//!
//! Nothing here is fatal. Configuration problems are rejected when the
//! [`ViewConfig`] is built; a delete referencing an identity with no live row
//! is collected into a [`BatchError`] while the rest of the batch is applied;
//! duplicate mutations within a transaction are advisory log lines. No
//! failure corrupts the sorted-sections invariant.
//!
//! ## Features
//!
//! - `serde`: serialization support for the data-carrying types ([`ObjectId`],
//!   [`ChangeKind`], [`ChangeSnapshot`], [`IndexPath`], [`SortValue`]).

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState as AhashRandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod macros;
pub mod observer;
pub mod section;
pub mod snapshot;
pub mod transaction;

pub use broadcast::{ChangeBus, SubscriptionId};
pub use cache::SectionedCache;
pub use config::{SortRule, SortValue, UpdatePolicy, ViewConfig, ViewConfigBuilder};
pub use context::{CallerContext, OwningContext};
pub use error::{BatchError, ConfigError, EntryNotFound};
pub use observer::{CacheObserver, DummyObserver, IndexPath, RowChange};
pub use section::Section;
pub use snapshot::{ChangeKind, ChangeSnapshot, ObjectId};
pub use transaction::{CommitFeed, FeedEvent, TransactionLog};

// Use a constant seed for hashing to make performance measurements have less
// variance.
pub(crate) const DETERMINISTIC_HASHER: AhashRandomState =
    AhashRandomState::with_seeds(48, 1516, 23, 42);

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all data structures behave deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> AhashRandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        // Create an instance of the standard ahash random state.
        // This will be random, and will not be the same for any two runs.
        AhashRandomState::new()
    }
}

pub(crate) fn create_map<K, V>() -> std::collections::HashMap<K, V, RandomState> {
    std::collections::HashMap::with_hasher(RandomState::default())
}

/// This is a small wrapper around the standard RandomState.
/// This allows us to easily switch to a non-random RandomState for use in tests.
#[derive(Clone)]
pub struct RandomState {
    inner: AhashRandomState,
}

// Implement default, falling back on regular ahash::RandomState except
// when 'enable_determinism' has been called, in which case a static
// only-for-test RandomState is used.
impl Default for RandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

// We implement BuildHasher for RandomState, but all we do is delegate to
// the wrapped 'inner' ahash RandomState.
//
// This construct allows us to easily use a deterministic RandomState (i.e,
// not random :-) ) for tests. Since it implements Default, the user doesn't
// have to do anything more than specialize their hashmap using this
// RandomState instead of the standard one.
impl BuildHasher for RandomState {
    type Hasher = <AhashRandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}

// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Per-transaction change aggregation.
//!
//! A [`TransactionLog`] accumulates the mutations of one write transaction as
//! immutable [`ChangeSnapshot`]s and delivers them as a single atomic batch on
//! commit. One log instance belongs to one store handle; it is constructed
//! explicitly and wired to the store's change feed via [`TransactionLog::attach`]
//! rather than relying on ambient registration timing.
//!
//! Within one open transaction the log keeps **at most one snapshot per
//! identity**. A later mutation on the same identity replaces both payload and
//! kind ("last change prevails"); when the kind differs from what was
//! previously recorded, an advisory diagnostic is logged and nothing is raised
//! to the caller.
//!
//! On [`flush`](TransactionLog::flush) the batch is returned for cache
//! reconciliation and, additionally, re-broadcast on the log's [`ChangeBus`]
//! for out-of-band listeners that are not registered cache observers.

use crate::{
    broadcast::{ChangeBus, object_channel, store_channel},
    context::OwningContext,
    snapshot::{ChangeKind, ChangeSnapshot, ObjectId},
};
use std::{collections::HashMap, fmt, sync::Arc};

/// One event from a store's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent<T> {
    /// An object was mutated inside the currently open write transaction.
    Mutated {
        /// The kind of mutation.
        kind: ChangeKind,
        /// The object's field values at mutation time.
        object: T,
    },
    /// The write transaction committed; the batch boundary.
    Committed,
}

/// The store's change feed, at its interface.
///
/// The store itself (durability, isolation, notification delivery) is an
/// external collaborator; all this crate needs from it is a way to register a
/// listener that is called once per mutation and once per commit, in commit
/// order.
pub trait CommitFeed<T> {
    /// Registers `listener` with the feed.
    ///
    /// Must be called on the context that owns the store handle;
    /// [`TransactionLog::attach`] takes care of that.
    fn register(&mut self, listener: Box<dyn FnMut(FeedEvent<T>) + Send>);
}

/// Accumulates mutation snapshots for the span of one write transaction.
pub struct TransactionLog<T> {
    store_id: String,
    primary_key: Arc<dyn Fn(&T) -> ObjectId + Send + Sync>,
    pending: HashMap<ObjectId, ChangeSnapshot<T>, crate::RandomState>,
    bus: ChangeBus<T>,
}

impl<T> TransactionLog<T> {
    /// Creates an empty log for the store with the given identity, using
    /// `primary_key` to derive object identities.
    pub fn new<I, F>(store_id: impl Into<String>, primary_key: F) -> Self
    where
        F: Fn(&T) -> I + Send + Sync + 'static,
        I: Into<ObjectId>,
    {
        Self {
            store_id: store_id.into(),
            primary_key: Arc::new(move |object| primary_key(object).into()),
            pending: crate::create_map(),
            bus: ChangeBus::new(),
        }
    }

    /// The identity of the store this log belongs to.
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// The out-of-band broadcast bus fed by [`flush`](Self::flush).
    ///
    /// Subscribe here before handing the log to [`attach`](Self::attach).
    pub fn bus_mut(&mut self) -> &mut ChangeBus<T> {
        &mut self.bus
    }

    /// Number of identities with a pending snapshot in the open transaction.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the open transaction has recorded no mutations.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Captures a snapshot of `object` under the given mutation kind.
    ///
    /// If the open transaction already holds a snapshot for this identity it
    /// is overwritten — the last change prevails. A kind conflict (say, an
    /// `Add` later re-recorded as `Delete`) is advisory only: it is logged
    /// with both kinds and never surfaces as an error.
    pub fn record(&mut self, kind: ChangeKind, object: T) {
        let id = (self.primary_key)(&object);
        let snapshot = ChangeSnapshot::new(id.clone(), kind, object);
        if let Some(previous) = self.pending.insert(id.clone(), snapshot) {
            if previous.kind() != kind {
                tracing::warn!(
                    %id,
                    previous = %previous.kind(),
                    new = %kind,
                    "duplicate mutation on one identity within a transaction; last change prevails"
                );
            }
        }
    }

    /// Flushes the open transaction: returns its snapshots and clears the log
    /// for the next one.
    ///
    /// Call exactly once per committed transaction. The batch order is
    /// insignificant to the cache (it re-sorts); snapshots are returned sorted
    /// by identity so broadcast delivery order is stable.
    ///
    /// Before returning, the batch is re-broadcast out-of-band: once as a
    /// whole on [`store_channel`] for this log's store, and once per affected
    /// identity on that identity's [`object_channel`].
    pub fn flush(&mut self) -> Vec<ChangeSnapshot<T>> {
        let mut batch: Vec<ChangeSnapshot<T>> =
            self.pending.drain().map(|(_, snapshot)| snapshot).collect();
        batch.sort_by(|a, b| a.id().cmp(b.id()));
        tracing::debug!(
            store = %self.store_id,
            changes = batch.len(),
            "flushing transaction batch"
        );
        self.bus.publish(&store_channel(&self.store_id), &batch);
        for snapshot in &batch {
            self.bus
                .publish(&object_channel::<T>(snapshot.id()), std::slice::from_ref(snapshot));
        }
        batch
    }
}

impl<T: Send + 'static> TransactionLog<T> {
    /// Consumes the log and wires it to a store's change feed.
    ///
    /// The feed registration is performed **on the owning context** via
    /// [`OwningContext::run_sync`]: if the caller is not on that context,
    /// construction blocks only long enough to schedule and synchronously
    /// perform the registration — a bounded hand-off, not a general thread
    /// hop. From then on, every [`FeedEvent::Mutated`] is recorded and every
    /// [`FeedEvent::Committed`] flushes the batch into `on_batch` (which will
    /// typically call [`SectionedCache::apply`](crate::SectionedCache::apply)).
    pub fn attach<C, F, S>(mut self, context: &C, feed: &mut F, mut on_batch: S)
    where
        C: OwningContext + ?Sized,
        F: CommitFeed<T> + Send + ?Sized,
        S: FnMut(Vec<ChangeSnapshot<T>>) + Send + 'static,
    {
        context.run_sync(move || {
            feed.register(Box::new(move |event| match event {
                FeedEvent::Mutated { kind, object } => self.record(kind, object),
                FeedEvent::Committed => on_batch(self.flush()),
            }));
        });
    }
}

impl<T> fmt::Debug for TransactionLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionLog")
            .field("store_id", &self.store_id)
            .field("pending", &self.pending.len())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: u64,
        title: &'static str,
    }

    fn log() -> TransactionLog<Note> {
        TransactionLog::new("main", |note: &Note| note.id)
    }

    fn note(id: u64, title: &'static str) -> Note {
        Note { id, title }
    }

    #[test]
    fn one_snapshot_per_identity_last_change_prevails() {
        let mut log = log();
        log.record(ChangeKind::Add, note(1, "draft"));
        log.record(ChangeKind::Update, note(1, "edited"));
        log.record(ChangeKind::Delete, note(1, "edited"));
        log.record(ChangeKind::Add, note(2, "other"));
        assert_eq!(log.len(), 2);

        let batch = log.flush();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id(), &ObjectId::from(1u64));
        assert_eq!(batch[0].kind(), ChangeKind::Delete);
        assert_eq!(batch[1].kind(), ChangeKind::Add);
    }

    #[test]
    fn flush_clears_for_the_next_transaction() {
        let mut log = log();
        log.record(ChangeKind::Add, note(1, "a"));
        assert_eq!(log.flush().len(), 1);
        assert!(log.is_empty());

        log.record(ChangeKind::Update, note(1, "b"));
        let batch = log.flush();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind(), ChangeKind::Update);
        assert_eq!(batch[0].payload().title, "b");
    }

    #[test]
    fn flush_broadcasts_aggregate_and_per_identity() {
        let mut log = log();
        let aggregate: Arc<Mutex<Vec<usize>>> = Arc::default();
        let individual: Arc<Mutex<Vec<(ObjectId, ChangeKind)>>> = Arc::default();

        let sink = Arc::clone(&aggregate);
        log.bus_mut().subscribe(store_channel("main"), move |batch| {
            sink.lock().unwrap().push(batch.len());
        });
        let sink = Arc::clone(&individual);
        log.bus_mut()
            .subscribe(object_channel::<Note>(&2u64.into()), move |batch| {
                let snapshot = &batch[0];
                sink.lock()
                    .unwrap()
                    .push((snapshot.id().clone(), snapshot.kind()));
            });

        log.record(ChangeKind::Add, note(1, "a"));
        log.record(ChangeKind::Delete, note(2, "b"));
        log.flush();

        assert_eq!(*aggregate.lock().unwrap(), vec![2]);
        assert_eq!(
            *individual.lock().unwrap(),
            vec![(ObjectId::from(2u64), ChangeKind::Delete)]
        );
    }

    #[test]
    fn flush_of_an_empty_transaction_is_an_empty_batch() {
        let mut log = log();
        let aggregate: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = Arc::clone(&aggregate);
        log.bus_mut().subscribe(store_channel("main"), move |batch| {
            sink.lock().unwrap().push(batch.len());
        });
        assert!(log.flush().is_empty());
        // the commit boundary is still announced
        assert_eq!(*aggregate.lock().unwrap(), vec![0]);
    }
}

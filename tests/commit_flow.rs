// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Tests for the transaction-log commit flow: change-feed wiring through
//! `attach`, duplicate collapse across a transaction, and delivery of flushed
//! batches into a cache.

use pretty_assertions::assert_eq;
use sectioned::{
    CallerContext, ChangeKind, ChangeSnapshot, CommitFeed, DummyObserver, FeedEvent, IndexPath,
    ObjectId, OwningContext, SectionedCache, SortRule, TransactionLog, ViewConfig,
    broadcast::{object_channel, store_channel},
};
use std::{
    sync::{Arc, Mutex},
    thread::{self, ThreadId},
};

#[derive(Debug, Clone, PartialEq)]
struct Note {
    id: u64,
    folder: String,
    title: String,
}

fn note(id: u64, folder: &str, title: &str) -> Note {
    Note {
        id,
        folder: folder.to_owned(),
        title: title.to_owned(),
    }
}

fn log() -> TransactionLog<Note> {
    TransactionLog::new("notes.store", |n: &Note| n.id)
}

/// A change feed owned by the test, standing in for the store collaborator.
#[derive(Default)]
struct FakeFeed {
    listener: Option<Box<dyn FnMut(FeedEvent<Note>) + Send>>,
    registered_on: Option<ThreadId>,
}

impl CommitFeed<Note> for FakeFeed {
    fn register(&mut self, listener: Box<dyn FnMut(FeedEvent<Note>) + Send>) {
        self.registered_on = Some(thread::current().id());
        self.listener = Some(listener);
    }
}

impl FakeFeed {
    fn mutate(&mut self, kind: ChangeKind, object: Note) {
        self.listener.as_mut().unwrap()(FeedEvent::Mutated { kind, object });
    }

    fn commit(&mut self) {
        self.listener.as_mut().unwrap()(FeedEvent::Committed);
    }
}

/// An owning context backed by another thread: every closure runs over there
/// while the caller blocks for the result.
struct WorkerThreadContext;

impl OwningContext for WorkerThreadContext {
    fn run_sync<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        thread::scope(|scope| scope.spawn(f).join().unwrap())
    }
}

#[test]
fn attach_records_and_flushes_per_commit() {
    let batches: Arc<Mutex<Vec<Vec<ChangeSnapshot<Note>>>>> = Arc::default();
    let mut feed = FakeFeed::default();

    let sink = Arc::clone(&batches);
    log().attach(&CallerContext, &mut feed, move |batch| {
        sink.lock().unwrap().push(batch);
    });

    // first transaction: two objects, one of them mutated twice
    feed.mutate(ChangeKind::Add, note(1, "inbox", "draft"));
    feed.mutate(ChangeKind::Update, note(1, "inbox", "final"));
    feed.mutate(ChangeKind::Add, note(2, "inbox", "other"));
    feed.commit();

    // second transaction
    feed.mutate(ChangeKind::Delete, note(2, "inbox", "other"));
    feed.commit();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0][0].id(), &ObjectId::from(1u64));
    // last change prevails, kind included
    assert_eq!(batches[0][0].kind(), ChangeKind::Update);
    assert_eq!(batches[0][0].payload().title, "final");
    assert_eq!(batches[0][1].kind(), ChangeKind::Add);
    assert_eq!(batches[1].len(), 1);
    assert_eq!(batches[1][0].kind(), ChangeKind::Delete);
}

#[test]
fn add_then_update_then_delete_collapses_to_one_delete() {
    let batches: Arc<Mutex<Vec<Vec<ChangeSnapshot<Note>>>>> = Arc::default();
    let mut feed = FakeFeed::default();

    let sink = Arc::clone(&batches);
    log().attach(&CallerContext, &mut feed, move |batch| {
        sink.lock().unwrap().push(batch);
    });

    feed.mutate(ChangeKind::Add, note(1, "inbox", "a"));
    feed.mutate(ChangeKind::Update, note(1, "inbox", "b"));
    feed.mutate(ChangeKind::Delete, note(1, "inbox", "b"));
    feed.commit();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].kind(), ChangeKind::Delete);
}

#[test]
fn registration_runs_on_the_owning_context() {
    let mut feed = FakeFeed::default();

    // constructing off-context: the registration must happen on the worker,
    // with the calling thread blocked only for that bounded hand-off
    log().attach(&WorkerThreadContext, &mut feed, |_| {});
    let registered_on = feed.registered_on.expect("listener registered");
    assert_ne!(registered_on, thread::current().id());

    // the listener is live once attach returns
    feed.mutate(ChangeKind::Add, note(1, "inbox", "a"));
    feed.commit();
}

#[test]
fn flushed_batches_drive_a_cache_through_apply() {
    let config = ViewConfig::builder(|n: &Note| n.id)
        .section_key(|n: &Note| n.folder.clone())
        .sort_rule(SortRule::asc(|n: &Note| n.title.clone()))
        .build()
        .unwrap();
    let mut cache = SectionedCache::new(config);

    let batches: Arc<Mutex<Vec<Vec<ChangeSnapshot<Note>>>>> = Arc::default();
    let mut feed = FakeFeed::default();
    let sink = Arc::clone(&batches);
    log().attach(&CallerContext, &mut feed, move |batch| {
        sink.lock().unwrap().push(batch);
    });

    feed.mutate(ChangeKind::Add, note(1, "inbox", "buy milk"));
    feed.mutate(ChangeKind::Add, note(2, "archive", "old plan"));
    feed.commit();
    feed.mutate(ChangeKind::Update, note(1, "inbox", "buy oat milk"));
    feed.mutate(ChangeKind::Add, note(3, "inbox", "call back"));
    feed.commit();

    for batch in batches.lock().unwrap().drain(..) {
        cache.apply(batch, &mut DummyObserver).unwrap();
    }

    let keys: Vec<&str> = cache.sections().iter().map(|s| s.key()).collect();
    assert_eq!(keys, vec!["archive", "inbox"]);
    assert_eq!(
        cache.index_path_of(&1u64.into()),
        Some(IndexPath::new(1, 0)),
    );
    assert_eq!(
        cache.index_path_of(&3u64.into()),
        Some(IndexPath::new(1, 1)),
    );
    assert_eq!(cache.len(), 3);
}

#[test]
fn out_of_band_listeners_hear_flushes_after_attach() {
    let aggregate: Arc<Mutex<Vec<Vec<ObjectId>>>> = Arc::default();
    let individual: Arc<Mutex<Vec<ChangeKind>>> = Arc::default();

    let mut log = log();
    let sink = Arc::clone(&aggregate);
    log.bus_mut()
        .subscribe(store_channel("notes.store"), move |batch| {
            sink.lock()
                .unwrap()
                .push(batch.iter().map(|s| s.id().clone()).collect());
        });
    let sink = Arc::clone(&individual);
    log.bus_mut()
        .subscribe(object_channel::<Note>(&1u64.into()), move |batch| {
            sink.lock().unwrap().push(batch[0].kind());
        });

    let mut feed = FakeFeed::default();
    log.attach(&CallerContext, &mut feed, |_| {});

    feed.mutate(ChangeKind::Add, note(1, "inbox", "a"));
    feed.mutate(ChangeKind::Add, note(2, "inbox", "b"));
    feed.commit();
    feed.mutate(ChangeKind::Delete, note(1, "inbox", "a"));
    feed.commit();

    assert_eq!(
        *aggregate.lock().unwrap(),
        vec![
            vec![ObjectId::from(1u64), ObjectId::from(2u64)],
            vec![ObjectId::from(1u64)],
        ],
    );
    assert_eq!(
        *individual.lock().unwrap(),
        vec![ChangeKind::Add, ChangeKind::Delete],
    );
}

// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The sectioned-cache reconciler.
//!
//! A [`SectionedCache`] owns an ordered list of [`Section`]s and converts
//! batches of mutations into the minimal set of structural edits needed to
//! keep an external presentation synchronized, without ever recomputing the
//! projection from scratch.
//!
//! ## Index-path correctness
//!
//! Every emitted event carries index paths that are valid against the cache's
//! state *at the moment the event fires*. Two mechanisms make this hold across
//! whole batches:
//!
//! - Incoming insert batches are pre-sorted by the active ordering, so each
//!   object lands at a position that later objects in the same batch cannot
//!   displace downwards in a way the observer hasn't already seen.
//! - Delete batches are resolved up front and then processed from the highest
//!   index path to the lowest. Removing a row (or an emptied section) never
//!   shifts anything at a lower path, so the paths resolved for objects not
//!   yet processed remain valid.
//!
//! ## Identity-first resolution
//!
//! Deletes and updates locate their target by primary key against the live
//! section contents, never by recomputing the section key from the incoming
//! payload. The payload of a delete mirror may be arbitrarily stale — in
//! particular, the very field used for sectioning may have changed since the
//! row was placed — and identity is the only thing guaranteed to still match.
//!
//! ## Failure semantics
//!
//! A delete referencing an identity not present in any section is skipped,
//! recorded in a [`BatchError`], and the rest of the batch is processed
//! normally. No failure mode corrupts the sorted invariant or leaves an empty
//! section behind.

use crate::{
    config::{UpdatePolicy, ViewConfig, compare_section_keys},
    error::{BatchError, EntryNotFound},
    observer::{CacheObserver, DummyObserver, IndexPath, RowChange},
    section::Section,
    snapshot::{ChangeKind, ChangeSnapshot, ObjectId},
};

/// A live, sectioned, sorted projection of a mutable object store.
///
/// The cache owns its sections outright: sections are looked up by key, never
/// shared, and live exactly as long as they hold rows. All mutating calls are
/// synchronous and must be serialized by the embedder (see the crate docs on
/// the cooperative concurrency model); the observer passed to each call is
/// invoked inline, once per discrete structural change.
///
/// ```rust
/// use sectioned::{CacheObserver, IndexPath, SectionedCache, SortRule, ViewConfig};
///
/// #[derive(Clone)]
/// struct Contact {
///     id: u64,
///     initial: String,
///     name: String,
/// }
///
/// let config = ViewConfig::builder(|c: &Contact| c.id)
///     .section_key(|c: &Contact| c.initial.clone())
///     .sort_rule(SortRule::asc(|c: &Contact| c.name.clone()))
///     .build()
///     .unwrap();
/// let mut cache = SectionedCache::new(config);
///
/// struct PrintObserver;
/// impl CacheObserver<Contact> for PrintObserver {
///     fn section_inserted(&mut self, key: &str, index: usize) {
///         println!("new section {key:?} at {index}");
///     }
///     fn row_inserted(&mut self, contact: &Contact, at: IndexPath) {
///         println!("{} appears at {at}", contact.name);
///     }
/// }
///
/// cache.insert(
///     vec![
///         Contact { id: 1, initial: "B".into(), name: "Bea".into() },
///         Contact { id: 2, initial: "A".into(), name: "Ada".into() },
///     ],
///     &mut PrintObserver,
/// );
/// assert_eq!(cache.sections().len(), 2);
/// assert_eq!(cache.sections()[0].key(), "A");
/// ```
#[derive(Debug, Clone)]
pub struct SectionedCache<T> {
    config: ViewConfig<T>,
    sections: Vec<Section<T>>,
}

impl<T> SectionedCache<T> {
    /// Creates an empty cache under the given configuration.
    pub fn new(config: ViewConfig<T>) -> Self {
        Self {
            config,
            sections: Vec::new(),
        }
    }

    /// The configuration this cache reconciles under.
    pub fn config(&self) -> &ViewConfig<T> {
        &self.config
    }

    /// The live sections, sorted case-insensitively by key.
    pub fn sections(&self) -> &[Section<T>] {
        &self.sections
    }

    /// Total number of rows across all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    /// Whether the cache holds no rows at all.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// The current index path of the object with the given primary key.
    pub fn index_path_of(&self, id: &ObjectId) -> Option<IndexPath> {
        self.sections.iter().enumerate().find_map(|(section, s)| {
            s.position_of(id, &self.config)
                .map(|row| IndexPath::new(section, row))
        })
    }

    /// The object at `path`, if the path is currently occupied.
    pub fn object_at(&self, path: IndexPath) -> Option<&T> {
        self.sections.get(path.section)?.objects().get(path.row)
    }

    /// Clears all sections and repopulates from scratch, preserving the sort
    /// order. No diff events are emitted; the caller is expected to reload the
    /// presentation wholesale.
    pub fn reset(&mut self, objects: impl IntoIterator<Item = T>) {
        self.sections.clear();
        self.insert(objects, &mut DummyObserver);
    }

    /// Inserts a batch of objects, emitting a `section_inserted` for every
    /// section created and a `row_inserted` for every row placed.
    ///
    /// The batch is pre-sorted by the active ordering before processing, so
    /// the order objects arrive in never affects the resulting structure.
    /// Inserting an identity that is already present is a caller error (use
    /// [`update`](Self::update)); the cache does not check for it.
    pub fn insert(
        &mut self,
        objects: impl IntoIterator<Item = T>,
        observer: &mut impl CacheObserver<T>,
    ) {
        let mut batch: Vec<T> = objects.into_iter().collect();
        batch.sort_by(|a, b| self.config.compare(a, b));
        for object in batch {
            self.insert_one(object, &mut *observer);
        }
    }

    /// Deletes a batch of objects, resolved by primary-key identity.
    ///
    /// The payloads may be stale mirrors; only their identity is consulted.
    /// Emits a `row_deleted` per removed row (path computed before removal)
    /// and a `section_deleted` for every section that ends up empty.
    ///
    /// Identities that resolve to no live row are collected into the returned
    /// [`BatchError`]; the remainder of the batch is still processed.
    pub fn delete(
        &mut self,
        objects: impl IntoIterator<Item = T>,
        observer: &mut impl CacheObserver<T>,
    ) -> Result<(), BatchError> {
        let ids: Vec<ObjectId> = objects
            .into_iter()
            .map(|object| self.config.id_of(&object))
            .collect();
        self.delete_ids(ids, observer)
    }

    /// Like [`delete`](Self::delete), for callers that only hold primary keys.
    pub fn delete_ids(
        &mut self,
        ids: impl IntoIterator<Item = ObjectId>,
        observer: &mut impl CacheObserver<T>,
    ) -> Result<(), BatchError> {
        let mut missing = Vec::new();
        let mut resolved: Vec<IndexPath> = Vec::new();
        for id in ids {
            match self.index_path_of(&id) {
                Some(path) => resolved.push(path),
                None => missing.push(EntryNotFound { id }),
            }
        }
        // Highest paths first; duplicates (the same identity listed twice in
        // one batch) collapse to a single removal.
        resolved.sort_unstable();
        resolved.dedup();
        for path in resolved.into_iter().rev() {
            let section = &mut self.sections[path.section];
            let removed = section.remove(path.row);
            observer.row_deleted(&removed, path);
            if section.is_empty() {
                let section = self.sections.remove(path.section);
                observer.section_deleted(section.key(), path.section);
            }
        }
        BatchError::check(missing)
    }

    /// Applies a batch of updated payloads.
    ///
    /// Each object's previous location is resolved by identity. An identity
    /// the projection has never seen enters through the insert path (the
    /// object may only now have started matching the projection), so this
    /// call cannot fail.
    ///
    /// When the updated payload yields a different section key, behavior
    /// follows the configured [`UpdatePolicy`]: under
    /// [`RelocateAcrossSections`](UpdatePolicy::RelocateAcrossSections) the row
    /// moves into its new section (`row_updated` with [`RowChange::Move`],
    /// plus section insert/delete events as needed); under
    /// [`PinnedSection`](UpdatePolicy::PinnedSection) it re-sorts within the
    /// section it already occupies (`row_updated` with [`RowChange::Update`]).
    pub fn update(
        &mut self,
        objects: impl IntoIterator<Item = T>,
        observer: &mut impl CacheObserver<T>,
    ) {
        for object in objects {
            self.update_one(object, &mut *observer);
        }
    }

    /// Reconciles one flushed transaction batch.
    ///
    /// Snapshots are classified by mutation kind and handed to the
    /// delete/update/insert paths, in that order: an identity that left the
    /// store in this transaction is gone before any placement happens, and
    /// within one transaction each identity appears at most once anyway
    /// (the [`TransactionLog`](crate::TransactionLog) collapses duplicates).
    pub fn apply(
        &mut self,
        batch: impl IntoIterator<Item = ChangeSnapshot<T>>,
        observer: &mut impl CacheObserver<T>,
    ) -> Result<(), BatchError> {
        let mut added = Vec::new();
        let mut updated = Vec::new();
        let mut deleted = Vec::new();
        for snapshot in batch {
            match snapshot.kind() {
                ChangeKind::Add => added.push(snapshot.into_payload()),
                ChangeKind::Update => updated.push(snapshot.into_payload()),
                ChangeKind::Delete => deleted.push(snapshot.into_payload()),
            }
        }
        let result = self.delete(deleted, observer);
        self.update(updated, observer);
        self.insert(added, observer);
        result
    }

    /// Inserts one object, creating its section if needed, and returns the
    /// resulting path.
    fn insert_one(&mut self, object: T, mut observer: impl CacheObserver<T>) -> IndexPath {
        let key = self.config.section_key_of(&object);
        let section = self.resolve_section(&key, &mut observer);
        let row = self.place(section, object);
        let path = IndexPath::new(section, row);
        observer.row_inserted(&self.sections[section].objects()[row], path);
        path
    }

    fn update_one(&mut self, object: T, mut observer: impl CacheObserver<T>) {
        let id = self.config.id_of(&object);
        let Some(from) = self.index_path_of(&id) else {
            self.insert_one(object, observer);
            return;
        };
        // The stale entry comes out first; its payload is no longer
        // authoritative for anything.
        self.sections[from.section].remove(from.row);

        let new_key = self.config.section_key_of(&object);
        let stays = compare_section_keys(self.sections[from.section].key(), &new_key).is_eq()
            || self.config.update_policy() == UpdatePolicy::PinnedSection;
        if stays {
            let row = self.place(from.section, object);
            let to = IndexPath::new(from.section, row);
            observer.row_updated(
                &self.sections[from.section].objects()[row],
                from,
                to,
                RowChange::Update,
            );
        } else {
            if self.sections[from.section].is_empty() {
                let removed = self.sections.remove(from.section);
                observer.section_deleted(removed.key(), from.section);
            }
            let section = self.resolve_section(&new_key, &mut observer);
            let row = self.place(section, object);
            let to = IndexPath::new(section, row);
            observer.row_updated(
                &self.sections[section].objects()[row],
                from,
                to,
                RowChange::Move,
            );
        }
    }

    /// Returns the index of the section with the given key, creating it (and
    /// emitting `section_inserted`) if it does not exist yet.
    fn resolve_section(&mut self, key: &str, observer: &mut impl CacheObserver<T>) -> usize {
        match self
            .sections
            .binary_search_by(|s| compare_section_keys(s.key(), key))
        {
            Ok(section) => section,
            Err(section) => {
                self.sections.insert(section, Section::new(key.to_owned()));
                observer.section_inserted(key, section);
                section
            }
        }
    }

    /// Inserts `object` into the section at `section` at its sorted row.
    fn place(&mut self, section: usize, object: T) -> usize {
        let Self { config, sections } = self;
        sections[section].insert_sorted(object, config)
    }
}

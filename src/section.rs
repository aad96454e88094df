// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! An ordered group of objects sharing one section-key value.

use crate::{config::ViewConfig, snapshot::ObjectId};

/// One section of a [`SectionedCache`](crate::SectionedCache): all objects
/// whose section key equals [`Section::key`], kept fully sorted under the
/// cache's [`ViewConfig`].
///
/// Sections are identified by key alone; two sections are equal iff their keys
/// are. A section is created when the first object requiring its key arrives
/// and destroyed when its last object is removed — the owning cache never
/// keeps an empty section in its list.
#[derive(Debug, Clone)]
pub struct Section<T> {
    key: String,
    objects: Vec<T>,
}

impl<T> Section<T> {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            objects: Vec::new(),
        }
    }

    /// The section-discriminating key value.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The objects of this section, in sorted row order.
    pub fn objects(&self) -> &[T] {
        &self.objects
    }

    /// The number of rows in this section.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether this section holds no rows.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Inserts `object` at its sorted position and returns the row index.
    ///
    /// `config.compare` is a total order over distinct objects (primary-key
    /// tie-break), so the position is unique regardless of arrival order.
    pub(crate) fn insert_sorted(&mut self, object: T, config: &ViewConfig<T>) -> usize {
        let row = self
            .objects
            .partition_point(|existing| config.compare(existing, &object).is_lt());
        self.objects.insert(row, object);
        row
    }

    /// Removes and returns the row at `row`.
    pub(crate) fn remove(&mut self, row: usize) -> T {
        self.objects.remove(row)
    }

    /// The row index of the object with the given primary key, if present.
    ///
    /// Lookup is by identity, never by field values: the caller may hold a
    /// stale payload whose sort or section fields no longer match what this
    /// section last saw.
    pub(crate) fn position_of(&self, id: &ObjectId, config: &ViewConfig<T>) -> Option<usize> {
        self.objects
            .iter()
            .position(|object| config.id_of(object) == *id)
    }
}

impl<T> PartialEq for Section<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Section<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortRule;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u64,
        rank: i64,
    }

    fn config() -> ViewConfig<Row> {
        ViewConfig::builder(|r: &Row| r.id)
            .sort_rule(SortRule::asc(|r: &Row| r.rank))
            .build()
            .unwrap()
    }

    fn row(id: u64, rank: i64) -> Row {
        Row { id, rank }
    }

    #[test]
    fn sorted_insertion_reports_the_row_index() {
        let config = config();
        let mut section = Section::new("a".to_string());
        assert_eq!(section.insert_sorted(row(1, 10), &config), 0);
        assert_eq!(section.insert_sorted(row(2, 5), &config), 0);
        assert_eq!(section.insert_sorted(row(3, 7), &config), 1);
        let ranks: Vec<i64> = section.objects().iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![5, 7, 10]);
    }

    #[test]
    fn equal_sort_fields_fall_back_to_identity_order() {
        let config = config();
        let mut section = Section::new("a".to_string());
        section.insert_sorted(row(2, 1), &config);
        section.insert_sorted(row(1, 1), &config);
        section.insert_sorted(row(3, 1), &config);
        let ids: Vec<u64> = section.objects().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn position_is_resolved_by_identity() {
        let config = config();
        let mut section = Section::new("a".to_string());
        section.insert_sorted(row(1, 10), &config);
        section.insert_sorted(row(2, 20), &config);
        assert_eq!(section.position_of(&ObjectId::from(2u64), &config), Some(1));
        assert_eq!(section.position_of(&ObjectId::from(9u64), &config), None);
    }

    #[test]
    fn sections_are_equal_by_key() {
        let a: Section<Row> = Section::new("a".to_string());
        let mut also_a: Section<Row> = Section::new("a".to_string());
        also_a.objects.push(row(1, 1));
        let b: Section<Row> = Section::new("b".to_string());
        assert_eq!(a, also_a);
        assert_ne!(a, b);
    }
}

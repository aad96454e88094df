// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Sort-order and section-key configuration.
//!
//! A [`ViewConfig`] bundles everything a [`SectionedCache`](crate::SectionedCache)
//! needs to know about an object type: how to extract its primary key, which
//! (optional) field discriminates sections, and the ordered list of
//! [`SortRule`]s that define row order inside a section.
//!
//! Field access is by typed accessor function, resolved once when the
//! configuration is built. There is no runtime lookup of fields by name, so a
//! misspelled key path is a compile error in the embedder rather than a silent
//! misbehavior at reconciliation time.

use crate::{error::ConfigError, snapshot::ObjectId};
use smallvec::SmallVec;
use std::{cmp::Ordering, fmt, sync::Arc};

/// A typed field value used for ordering rows.
///
/// When two values of *different* variants are compared, they are ordered by a
/// fixed variant rank rather than by any numeric coercion, so a sort accessor
/// should always return the same variant for a given field.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum SortValue {
    /// Absent field value; sorts before everything else.
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Text(String),
}

impl SortValue {
    /// When ordering values of different variants, we order them according to
    /// this rank.
    const fn comparison_order(&self) -> usize {
        // Desired order: Text > F64 > U64 > I64 > Bool > Null
        match self {
            SortValue::Text(_) => 5,
            SortValue::F64(_) => 4,
            SortValue::U64(_) => 3,
            SortValue::I64(_) => 2,
            SortValue::Bool(_) => 1,
            SortValue::Null => 0,
        }
    }
}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use SortValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (I64(a), I64(b)) => a.cmp(b),
            (U64(a), U64(b)) => a.cmp(b),
            // total_cmp so that NaN payloads cannot poison the sorted
            // invariant of a section
            (F64(a), F64(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (a, b) => a.comparison_order().cmp(&b.comparison_order()),
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortValue {}

macro_rules! impl_from {
(
    $(
        $source:ty => $target:ident $(with $conv:ident)?
    ),* $(,)?
    ) => {
        $(
            impl From<$source> for SortValue {
                fn from(value: $source) -> Self {
                    Self::$target(impl_from!(value$(, $conv)?))
                }
            }
        )*
    };

    ($value:ident, $conv:ident) => {
        $value.$conv()
    };

    ($value:ident) => {
        $value
    };
}

impl_from!(
    bool => Bool,
    i64 => I64,
    i32 => I64 with into,
    u64 => U64,
    u32 => U64 with into,
    f64 => F64,
    String => Text,
);

impl From<&str> for SortValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl<V> From<Option<V>> for SortValue
where
    V: Into<SortValue>,
{
    fn from(value: Option<V>) -> Self {
        value.map_or(SortValue::Null, Into::into)
    }
}

/// One `(field, direction)` pair of the intra-section ordering.
pub struct SortRule<T> {
    key: Arc<dyn Fn(&T) -> SortValue + Send + Sync>,
    ascending: bool,
}

impl<T> SortRule<T> {
    /// An ascending rule over the given field accessor.
    pub fn asc<K, F>(key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortValue>,
    {
        Self {
            key: Arc::new(move |object| key(object).into()),
            ascending: true,
        }
    }

    /// A descending rule over the given field accessor.
    pub fn desc<K, F>(key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<SortValue>,
    {
        Self {
            ascending: false,
            ..Self::asc(key)
        }
    }

    /// Whether this rule sorts ascending.
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Compares two objects under this rule alone.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        let ord = (self.key)(a).cmp(&(self.key)(b));
        if self.ascending { ord } else { ord.reverse() }
    }
}

impl<T> Clone for SortRule<T> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            ascending: self.ascending,
        }
    }
}

impl<T> fmt::Debug for SortRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortRule")
            .field("ascending", &self.ascending)
            .finish_non_exhaustive()
    }
}

/// Whether an update whose new payload yields a different section key may
/// relocate the row into its new section.
///
/// The narrow [`PinnedSection`](UpdatePolicy::PinnedSection) behavior exists
/// for presentations that cannot animate cross-section moves and instead
/// reset wholesale when grouping changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Updates may move a row between sections; the cache emits a
    /// [`RowChange::Move`](crate::RowChange::Move) carrying both paths, and
    /// sections are created/destroyed as needed. This is the default.
    #[default]
    RelocateAcrossSections,
    /// Updates re-insert into the section the row currently occupies, even if
    /// the section-key field changed.
    PinnedSection,
}

/// Complete ordering/sectioning configuration for an object type.
///
/// Built via [`ViewConfig::builder`]; validation happens at build time, not at
/// first use.
pub struct ViewConfig<T> {
    primary_key: Arc<dyn Fn(&T) -> ObjectId + Send + Sync>,
    section_key: Option<Arc<dyn Fn(&T) -> String + Send + Sync>>,
    sort: SmallVec<[SortRule<T>; 4]>,
    update_policy: UpdatePolicy,
}

impl<T> ViewConfig<T> {
    /// Starts building a configuration around the given primary-key accessor.
    pub fn builder<I, F>(primary_key: F) -> ViewConfigBuilder<T>
    where
        F: Fn(&T) -> I + Send + Sync + 'static,
        I: Into<ObjectId>,
    {
        ViewConfigBuilder {
            primary_key: Arc::new(move |object| primary_key(object).into()),
            section_key: None,
            sort: SmallVec::new(),
            update_policy: UpdatePolicy::default(),
        }
    }

    /// The primary-key value of `object`.
    pub fn id_of(&self, object: &T) -> ObjectId {
        (self.primary_key)(object)
    }

    /// The section key of `object`.
    ///
    /// Without a section-key accessor all objects share the single default
    /// section, whose key is the empty string.
    pub fn section_key_of(&self, object: &T) -> String {
        match &self.section_key {
            Some(key) => key(object),
            None => String::new(),
        }
    }

    /// Whether sectioning is enabled (a section-key accessor is configured).
    pub fn is_sectioned(&self) -> bool {
        self.section_key.is_some()
    }

    /// The configured update relocation policy.
    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    /// Compares two objects under the full rule list.
    ///
    /// Ties after every rule are broken by primary key, so the relative order
    /// of any two distinct objects is always determined and reconciliation
    /// never depends on the order a batch arrived in.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        for rule in &self.sort {
            let ord = rule.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.id_of(a).cmp(&self.id_of(b))
    }
}

impl<T> Clone for ViewConfig<T> {
    fn clone(&self) -> Self {
        Self {
            primary_key: Arc::clone(&self.primary_key),
            section_key: self.section_key.as_ref().map(Arc::clone),
            sort: self.sort.clone(),
            update_policy: self.update_policy,
        }
    }
}

impl<T> fmt::Debug for ViewConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewConfig")
            .field("sectioned", &self.is_sectioned())
            .field("sort", &self.sort)
            .field("update_policy", &self.update_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ViewConfig`]; see [`ViewConfig::builder`].
pub struct ViewConfigBuilder<T> {
    primary_key: Arc<dyn Fn(&T) -> ObjectId + Send + Sync>,
    section_key: Option<Arc<dyn Fn(&T) -> String + Send + Sync>>,
    sort: SmallVec<[SortRule<T>; 4]>,
    update_policy: UpdatePolicy,
}

impl<T> ViewConfigBuilder<T> {
    /// Enables sectioning with the given section-key accessor.
    pub fn section_key<K, F>(mut self, key: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<String>,
    {
        self.section_key = Some(Arc::new(move |object| key(object).into()));
        self
    }

    /// Appends one sort rule. Rules apply in the order they were added.
    pub fn sort_rule(mut self, rule: SortRule<T>) -> Self {
        self.sort.push(rule);
        self
    }

    /// Appends a whole list of sort rules.
    pub fn sort(mut self, rules: impl IntoIterator<Item = SortRule<T>>) -> Self {
        self.sort.extend(rules);
        self
    }

    /// Sets the update relocation policy.
    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<ViewConfig<T>, ConfigError> {
        if self.sort.is_empty() {
            return Err(ConfigError::NoSortRules);
        }
        Ok(ViewConfig {
            primary_key: self.primary_key,
            section_key: self.section_key,
            sort: self.sort,
            update_policy: self.update_policy,
        })
    }
}

/// Compares two section keys: case-insensitively lexical, with the exact byte
/// ordering as tie-break so distinct keys never compare equal.
pub(crate) fn compare_section_keys(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.cmp(b))
}

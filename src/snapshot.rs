// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Immutable mutation snapshots ("mirrors").
//!
//! A [`ChangeSnapshot`] is a detached, thread-independent copy of one managed
//! object together with the mutation kind that produced it. Live store objects
//! are only safe to touch on the context that owns them; converting every
//! mutation into a snapshot *before* it crosses a context boundary is what
//! lets the rest of the pipeline read change data from anywhere.
//!
//! Snapshots are captured by a [`TransactionLog`](crate::TransactionLog) and
//! consumed in batches by a [`SectionedCache`](crate::SectionedCache).

use std::fmt;

/// A type-erased, stable primary-key value.
///
/// Identity comparison is the one operation the reconciler must be able to
/// perform on any object, even when every payload field — including the
/// section key — has changed underneath it. `ObjectId` therefore erases the
/// concrete key type into its canonical textual form: `ObjectId::from(42u64)`
/// and `ObjectId::from("42")` are the same identity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(::serde::Deserialize, ::serde::Serialize),
    serde(transparent)
)]
pub struct ObjectId(Box<str>);

impl ObjectId {
    /// Returns the canonical textual form of this identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

macro_rules! impl_from_int {
    ($($t:ty),+) => {
        $(
            impl From<$t> for ObjectId {
                fn from(value: $t) -> Self {
                    Self(value.to_string().into_boxed_str())
                }
            }
        )+
    };
}
impl_from_int!(u32, u64, usize, i32, i64);

/// The kind of mutation that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum ChangeKind {
    /// The object was newly added to the store.
    Add,
    /// An existing object's fields were modified.
    Update,
    /// The object was removed from the store.
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Add => "add",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        })
    }
}

/// An immutable copy of one managed object plus the mutation kind that
/// produced it.
///
/// The payload is captured at mutation time and never modified afterwards,
/// so a snapshot may be freely read from any context (`T: Send + Sync`
/// suffices; no locking is involved). For [`ChangeKind::Delete`] snapshots the
/// payload holds the *last observed* field values, which may be stale by the
/// time reconciliation runs — which is exactly why deletes are resolved by
/// identity rather than by recomputing keys from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct ChangeSnapshot<T> {
    id: ObjectId,
    kind: ChangeKind,
    payload: T,
}

impl<T> ChangeSnapshot<T> {
    /// Captures a snapshot of `payload` under the given identity.
    pub fn new(id: impl Into<ObjectId>, kind: ChangeKind, payload: T) -> Self {
        Self {
            id: id.into(),
            kind,
            payload,
        }
    }

    /// The primary-key value of the mutated object.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// The mutation kind recorded for this snapshot.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// The field values of the object at capture time.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the snapshot, returning the captured payload.
    pub fn into_payload(self) -> T {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_erases_the_key_type() {
        assert_eq!(ObjectId::from(42u64), ObjectId::from("42"));
        assert_eq!(ObjectId::from(7i32), ObjectId::from(7usize));
        assert_ne!(ObjectId::from("a"), ObjectId::from("A"));
    }

    #[test]
    fn object_id_orders_lexically() {
        let mut ids = vec![
            ObjectId::from("b"),
            ObjectId::from("a"),
            ObjectId::from("c"),
        ];
        ids.sort();
        assert_eq!(ids, vec!["a".into(), "b".into(), "c".into()]);
    }

    #[test]
    fn snapshot_exposes_captured_state() {
        let snap = ChangeSnapshot::new(1u64, ChangeKind::Update, "payload");
        assert_eq!(snap.id(), &ObjectId::from(1u64));
        assert_eq!(snap.kind(), ChangeKind::Update);
        assert_eq!(*snap.payload(), "payload");
        assert_eq!(snap.into_payload(), "payload");
    }
}

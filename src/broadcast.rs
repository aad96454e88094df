// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Out-of-band change broadcasts.
//!
//! Registered cache observers get structural diff events; everything else that
//! wants to know about committed changes listens on a [`ChangeBus`] channel.
//! On every [`TransactionLog::flush`](crate::TransactionLog::flush) two kinds
//! of broadcast fire:
//!
//! - one **aggregate** broadcast on the store-identity channel
//!   ([`store_channel`]), carrying the whole batch, and
//! - one broadcast **per affected identity** on a type-derived channel name
//!   ([`object_channel`]), carrying just that identity's snapshot.
//!
//! Delivery is synchronous, on the context that called `flush`. Listeners only
//! ever see immutable [`ChangeSnapshot`]s, never live store objects.

use crate::snapshot::{ChangeSnapshot, ObjectId};
use std::fmt;

type Listener<T> = Box<dyn FnMut(&[ChangeSnapshot<T>]) + Send>;

/// Handle identifying one subscription, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A synchronous, channel-named publish/subscribe registry for change
/// batches.
pub struct ChangeBus<T> {
    channels: Vec<(String, Vec<(SubscriptionId, Listener<T>)>)>,
    next_id: u64,
}

impl<T> Default for ChangeBus<T> {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> ChangeBus<T> {
    /// Creates a bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to `channel`.
    pub fn subscribe(
        &mut self,
        channel: impl Into<String>,
        listener: impl FnMut(&[ChangeSnapshot<T>]) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let channel = channel.into();
        let listeners = match self.channels.iter_mut().find(|(name, _)| *name == channel) {
            Some((_, listeners)) => listeners,
            None => {
                self.channels.push((channel, Vec::new()));
                &mut self.channels.last_mut().unwrap().1
            }
        };
        listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for (_, listeners) in &mut self.channels {
            if let Some(at) = listeners.iter().position(|(sub, _)| *sub == id) {
                listeners.remove(at);
                return true;
            }
        }
        false
    }

    /// Delivers `batch` to every listener of `channel`, synchronously and in
    /// subscription order.
    pub fn publish(&mut self, channel: &str, batch: &[ChangeSnapshot<T>]) {
        if let Some((_, listeners)) = self.channels.iter_mut().find(|(name, _)| name == channel) {
            for (_, listener) in listeners {
                listener(batch);
            }
        }
    }
}

impl<T> fmt::Debug for ChangeBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions: Vec<(&str, usize)> = self
            .channels
            .iter()
            .map(|(name, listeners)| (name.as_str(), listeners.len()))
            .collect();
        f.debug_struct("ChangeBus")
            .field("subscriptions", &subscriptions)
            .finish()
    }
}

/// The aggregate channel of the store with the given identity.
pub fn store_channel(store_id: &str) -> String {
    format!("store/{store_id}")
}

/// The channel carrying all per-identity broadcasts for objects of type `T`.
pub fn type_channel<T>() -> String {
    let name = std::any::type_name::<T>();
    let short = name.rsplit("::").next().unwrap_or(name);
    format!("objects/{short}")
}

/// The per-identity channel for one object of type `T`.
pub fn object_channel<T>(id: &ObjectId) -> String {
    format!("{}/{id}", type_channel::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ChangeKind;
    use std::sync::{Arc, Mutex};

    struct Note;

    #[test]
    fn channel_names_are_derived_from_the_type() {
        assert_eq!(type_channel::<Note>(), "objects/Note");
        assert_eq!(object_channel::<Note>(&7u64.into()), "objects/Note/7");
        assert_eq!(store_channel("main"), "store/main");
    }

    #[test]
    fn publish_reaches_only_the_named_channel() {
        let mut bus: ChangeBus<&str> = ChangeBus::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&hits);
        bus.subscribe("a", move |batch| {
            sink.lock().unwrap().push(("a", batch.len()));
        });
        let sink = Arc::clone(&hits);
        bus.subscribe("b", move |batch| {
            sink.lock().unwrap().push(("b", batch.len()));
        });

        let batch = [ChangeSnapshot::new(1u64, ChangeKind::Add, "x")];
        bus.publish("a", &batch);
        bus.publish("missing", &batch);
        assert_eq!(*hits.lock().unwrap(), vec![("a", 1)]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus: ChangeBus<&str> = ChangeBus::new();
        let hits = Arc::new(Mutex::new(0usize));

        let sink = Arc::clone(&hits);
        let id = bus.subscribe("a", move |_| *sink.lock().unwrap() += 1);
        let batch = [ChangeSnapshot::new(1u64, ChangeKind::Add, "x")];
        bus.publish("a", &batch);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish("a", &batch);
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}

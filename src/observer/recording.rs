// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! An observer that simply records every event it receives. This is mostly
//! useful for tests.

use super::{CacheObserver, IndexPath, RowChange};

/// One recorded [`CacheObserver`] callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent<T> {
    SectionInserted { key: String, index: usize },
    SectionDeleted { key: String, index: usize },
    RowInserted { object: T, at: IndexPath },
    RowUpdated {
        object: T,
        from: IndexPath,
        to: IndexPath,
        change: RowChange,
    },
    RowDeleted { object: T, at: IndexPath },
}

/// An observer that records all events, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver<T> {
    /// Every event received so far, oldest first.
    pub events: Vec<CacheEvent<T>>,
}

impl<T> RecordingObserver<T> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Returns the recorded events, clearing the recorder.
    pub fn take(&mut self) -> Vec<CacheEvent<T>> {
        std::mem::take(&mut self.events)
    }
}

impl<T: Clone> CacheObserver<T> for RecordingObserver<T> {
    fn section_inserted(&mut self, key: &str, index: usize) {
        self.events.push(CacheEvent::SectionInserted {
            key: key.to_owned(),
            index,
        });
    }

    fn section_deleted(&mut self, key: &str, index: usize) {
        self.events.push(CacheEvent::SectionDeleted {
            key: key.to_owned(),
            index,
        });
    }

    fn row_inserted(&mut self, object: &T, at: IndexPath) {
        self.events.push(CacheEvent::RowInserted {
            object: object.clone(),
            at,
        });
    }

    fn row_updated(&mut self, object: &T, from: IndexPath, to: IndexPath, change: RowChange) {
        self.events.push(CacheEvent::RowUpdated {
            object: object.clone(),
            from,
            to,
            change,
        });
    }

    fn row_deleted(&mut self, object: &T, at: IndexPath) {
        self.events.push(CacheEvent::RowDeleted {
            object: object.clone(),
            at,
        });
    }
}

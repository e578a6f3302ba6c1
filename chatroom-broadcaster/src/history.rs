//! Bounded, insertion-ordered chat history.
//!
//! Appending past `capacity` evicts from the oldest end. Storage and
//! snapshots are oldest-first.

use std::collections::VecDeque;

use crate::events::MessageRecord;

/// Default number of records kept for replay.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    records: VecDeque<MessageRecord>,
    capacity: usize,
}

impl HistoryBuffer {
    /// A capacity of 0 is allowed and keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Add `record` as the newest entry, trimming the oldest ones.
    pub fn append(&mut self, record: MessageRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Independent copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

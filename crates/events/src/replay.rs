//! Bounded history of emitted progress events.

use std::collections::VecDeque;

use pictopy_core::progress::ProgressMessage;
use pictopy_core::types::Seq;

/// Keeps the most recent `capacity` events in emission order.
///
/// Reconnecting clients ask for everything after the last sequence
/// number they saw; events older than the buffer are gone and the
/// client only learns the jobs' state from their next update.
#[derive(Debug)]
pub struct ReplayBuffer {
    events: VecDeque<ProgressMessage>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn push(&mut self, event: ProgressMessage) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events with `seq` strictly greater than `since`, or all of them
    /// when `since` is `None`.
    pub fn since(&self, since: Option<Seq>) -> Vec<ProgressMessage> {
        match since {
            None => self.events.iter().cloned().collect(),
            Some(after) => self
                .events
                .iter()
                .filter(|e| e.seq.is_some_and(|seq| seq > after))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

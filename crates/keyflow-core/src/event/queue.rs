// Keyflow Event Queue
// Bounded FIFO between the matrix scan and the engine

use std::collections::VecDeque;

/// Bounded queue of events waiting for the engine.
///
/// A full queue refuses new events instead of growing; the scan loop treats
/// that as an overrun and relieves the engine before retrying.
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    events: VecDeque<T>,
    capacity: usize,
}

impl<T> EventQueue<T> {
    /// Create a queue with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(queue_config::DEFAULT_CAPACITY)
    }

    /// Create a queue holding at most `capacity` events (clamped to
    /// `1..=MAX_CAPACITY`)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, queue_config::MAX_CAPACITY);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event; hands it back if the queue is full
    pub fn push(&mut self, event: T) -> Result<(), T> {
        if self.is_full() {
            return Err(event);
        }
        self.events.push_back(event);
        Ok(())
    }

    /// Take the oldest event
    pub fn pop(&mut self) -> Option<T> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove all events in FIFO order
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.events.drain(..)
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue sizing
pub mod queue_config {
    /// Events accepted per scan before an overrun
    pub const DEFAULT_CAPACITY: usize = 32;

    /// Upper bound for custom capacities
    pub const MAX_CAPACITY: usize = 256;
}

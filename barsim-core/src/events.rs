//! Event queue and simulation clock.
//!
//! Events are dispatched in non-decreasing `(timestamp, sequence)` order. The
//! sequence number is assigned at push time, so events sharing a timestamp
//! leave the queue in insertion order. The clock only moves forward: `now()` is
//! the timestamp of the last dispatched event, and pushing anything older is
//! refused.

use crate::domain::{Bar, Fill, Order, Signal, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EventQueueError {
    #[error("event at {event} is older than the clock ({now})")]
    TimeTravel { event: Timestamp, now: Timestamp },
}

/// What an event carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Market(Bar),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
}

impl EventPayload {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Market(bar) => bar.timestamp,
            Self::Signal(signal) => signal.timestamp,
            Self::Order(order) => order.created_at,
            Self::Fill(fill) => fill.timestamp,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Market(_) => "market",
            Self::Signal(_) => "signal",
            Self::Order(_) => "order",
            Self::Fill(_) => "fill",
        }
    }
}

/// A queued event with its dispatch key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: Timestamp,
    pub sequence: u64,
    pub payload: EventPayload,
}

impl Event {
    fn key(&self) -> (Timestamp, u64) {
        (self.timestamp, self.sequence)
    }
}

// Sequence numbers are unique per queue, so the key identifies the event.
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Chronological min-queue of events.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    next_sequence: u64,
    now: Option<Timestamp>,
    dispatched: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a payload, returning its sequence number.
    pub fn push(&mut self, payload: EventPayload) -> Result<u64, EventQueueError> {
        let timestamp = payload.timestamp();
        if let Some(now) = self.now {
            if timestamp < now {
                return Err(EventQueueError::TimeTravel {
                    event: timestamp,
                    now,
                });
            }
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(Event {
            timestamp,
            sequence,
            payload,
        }));
        Ok(sequence)
    }

    /// Dispatch the next event and advance the clock to it.
    pub fn pop(&mut self) -> Option<Event> {
        let Reverse(event) = self.heap.pop()?;
        self.now = Some(event.timestamp);
        self.dispatched += 1;
        Some(event)
    }

    /// Timestamp of the last dispatched event.
    pub fn now(&self) -> Option<Timestamp> {
        self.now
    }

    pub fn peek_timestamp(&self) -> Option<Timestamp> {
        self.heap.peek().map(|Reverse(e)| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Total events popped so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

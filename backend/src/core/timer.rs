//! Deferred callbacks keyed by due tick
//!
//! A single queue stands in for per-resource timer objects: every entry
//! carries its own typed payload, so no opaque timer identity is needed.
//! Entries due at the same tick fire in scheduling order.

use crate::core::time::Tick;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Entry<T> {
    due: Tick,
    seq: u64,
    payload: T,
}

/// Min-heap of payloads ordered by `(due tick, scheduling order)`
#[derive(Debug, Clone)]
pub struct TimerQueue<T: Ord> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T: Ord> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `payload` to fire no earlier than tick `due`
    pub fn schedule(&mut self, due: Tick, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due, seq, payload }));
    }

    /// Pop every payload due at or before `now`, earliest first
    pub fn pop_due(&mut self, now: Tick) -> Vec<T> {
        let mut fired = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                fired.push(entry.payload);
            }
        }
        fired
    }

    /// Tick of the earliest pending payload
    pub fn next_due(&self) -> Option<Tick> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Pending payloads with their due ticks, in firing order
    pub fn pending(&self) -> Vec<(Tick, &T)> {
        let mut entries: Vec<&Entry<T>> = self.heap.iter().map(|Reverse(e)| e).collect();
        entries.sort_by_key(|e| (e.due, e.seq));
        entries.into_iter().map(|e| (e.due, &e.payload)).collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

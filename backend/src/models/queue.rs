//! Per-tier waiting queue
//!
//! FIFO of patient ids. Entries are keyed by an insertion sequence number so
//! removal by id (death, promotion, admission) does not shift the remaining
//! entries.

use crate::models::patient::PatientId;
use std::collections::{BTreeMap, HashMap};

/// Ordered holding area for one tier
#[derive(Debug, Clone, Default)]
pub struct TierQueue {
    by_seq: BTreeMap<u64, PatientId>,
    seq_of: HashMap<PatientId, u64>,
    next_seq: u64,
}

impl TierQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail
    ///
    /// Returns `false` (and leaves the queue untouched) if the id is
    /// already queued here.
    pub fn push_back(&mut self, id: PatientId) -> bool {
        if self.seq_of.contains_key(&id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, id);
        self.seq_of.insert(id, seq);
        true
    }

    /// Remove by id, wherever it sits
    pub fn remove(&mut self, id: PatientId) -> bool {
        match self.seq_of.remove(&id) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: PatientId) -> bool {
        self.seq_of.contains_key(&id)
    }

    /// Ids in insertion order
    pub fn iter(&self) -> impl Iterator<Item = PatientId> + '_ {
        self.by_seq.values().copied()
    }

    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }
}

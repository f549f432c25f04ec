//! Bounded history of applied patch batches.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use orbit_protocol::PatchOperation;
use serde::Serialize;

/// One applied `patch` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchLogEntry {
    /// Monotonic per-workspace sequence number, starting at 1.
    pub seq: u64,
    pub applied_at: DateTime<Utc>,
    /// True if the batch replaced the collection instead of merging into it.
    pub resync: bool,
    pub operations: Vec<PatchOperation>,
}

/// Ring buffer of the most recent batches. Oldest entries fall off first.
#[derive(Debug, Clone, Default)]
pub struct PatchLog {
    entries: VecDeque<PatchLogEntry>,
    capacity: usize,
    last_seq: u64,
}

impl PatchLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            last_seq: 0,
        }
    }

    /// Append a batch and return its sequence number.
    pub fn record(
        &mut self,
        applied_at: DateTime<Utc>,
        resync: bool,
        operations: Vec<PatchOperation>,
    ) -> u64 {
        self.last_seq += 1;
        if self.capacity == 0 {
            return self.last_seq;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(PatchLogEntry {
            seq: self.last_seq,
            applied_at,
            resync,
            operations,
        });
        self.last_seq
    }

    /// Sequence number of the last recorded batch, 0 if none.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PatchLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&PatchLogEntry> {
        self.entries.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remove(id: &str) -> PatchOperation {
        PatchOperation::Remove {
            component_id: id.to_string(),
        }
    }

    #[test]
    fn test_record_evicts_oldest() {
        let mut log = PatchLog::with_capacity(2);
        let now = Utc::now();
        assert_eq!(log.record(now, true, vec![remove("a")]), 1);
        assert_eq!(log.record(now, false, vec![remove("b")]), 2);
        assert_eq!(log.record(now, false, vec![remove("c")]), 3);

        let seqs: Vec<u64> = log.entries().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3]);
        assert_eq!(log.last_seq(), 3);
        assert_eq!(log.latest().map(|e| e.operations.clone()), Some(vec![remove("c")]));
    }

    #[test]
    fn test_zero_capacity_still_counts() {
        let mut log = PatchLog::with_capacity(0);
        log.record(Utc::now(), false, Vec::new());
        log.record(Utc::now(), false, Vec::new());
        assert!(log.is_empty());
        assert_eq!(log.last_seq(), 2);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use armada_core::types::{Job, NamespacedId};
use chrono::{DateTime, Utc};

/// A tracked job waiting for its next launch.
#[derive(Debug, Clone)]
pub struct HeapEntry {
    pub job: Arc<Job>,
    pub next: DateTime<Utc>,
    key: NamespacedId,
    seq: u64,
}

impl HeapEntry {
    pub fn key(&self) -> &NamespacedId {
        &self.key
    }

    fn sort_key(&self) -> (DateTime<Utc>, u64) {
        (self.next, self.seq)
    }
}

/// Min-heap of periodic jobs keyed by next launch instant.
///
/// Ties on the instant are broken by push order, so jobs sharing an instant
/// always pop in the order they were (re)scheduled. A side index maps every
/// job to its slot, which keeps replace and remove at O(log n) and guarantees
/// at most one entry per job.
#[derive(Debug, Default)]
pub struct DispatchHeap {
    entries: Vec<HeapEntry>,
    index: HashMap<NamespacedId, usize>,
    next_seq: u64,
}

impl DispatchHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pending entry for `key`, if scheduled.
    pub fn get(&self, key: &NamespacedId) -> Option<&HeapEntry> {
        self.index.get(key).map(|&pos| &self.entries[pos])
    }

    /// Schedule `job` at `next`, replacing any entry the job already has.
    pub fn push(&mut self, job: Arc<Job>, next: DateTime<Utc>) {
        let key = job.namespaced_id();
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(&pos) = self.index.get(&key) {
            self.entries[pos] = HeapEntry { job, next, key, seq };
            self.fix(pos);
            return;
        }

        let pos = self.entries.len();
        self.index.insert(key.clone(), pos);
        self.entries.push(HeapEntry { job, next, key, seq });
        self.sift_up(pos);
    }

    /// Remove and return the entry with the earliest instant.
    pub fn pop(&mut self) -> Option<HeapEntry> {
        if self.entries.is_empty() {
            return None;
        }
        self.take(0)
    }

    /// Remove the entry for `key`. Returns `None` if the job isn't scheduled.
    pub fn remove(&mut self, key: &NamespacedId) -> Option<HeapEntry> {
        let pos = *self.index.get(key)?;
        self.take(pos)
    }

    pub fn peek(&self) -> Option<&HeapEntry> {
        self.entries.first()
    }

    /// Earliest scheduled instant, or `None` when nothing is scheduled.
    pub fn peek_instant(&self) -> Option<DateTime<Utc>> {
        self.peek().map(|e| e.next)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    // --- private helpers ---------------------------------------------------

    fn take(&mut self, pos: usize) -> Option<HeapEntry> {
        let last = self.entries.len() - 1;
        self.swap(pos, last);
        let entry = self.entries.pop()?;
        self.index.remove(&entry.key);
        if pos < self.entries.len() {
            self.fix(pos);
        }
        Some(entry)
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.entries[a].sort_key() < self.entries[b].sort_key()
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        if let Some(slot) = self.index.get_mut(&self.entries[a].key) {
            *slot = a;
        }
        if let Some(slot) = self.index.get_mut(&self.entries[b].key) {
            *slot = b;
        }
    }

    /// Restore the heap property around `pos` after its key changed.
    fn fix(&mut self, pos: usize) {
        if !self.sift_up(pos) {
            self.sift_down(pos);
        }
    }

    fn sift_up(&mut self, mut pos: usize) -> bool {
        let start = pos;
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos != start
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, pos) {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }
}

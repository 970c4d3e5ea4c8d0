//! Scrollback store — the bounded history behind the main tail view.
//!
//! Entries are kept in arrival order. Once an append pushes the store past
//! its capacity, entries are evicted from the oldest end until it fits
//! again. Capacity is a line count derived from the amount of log data the
//! user asked for (see [`capacity_for`]).

use std::collections::VecDeque;

use crate::classifier::{EntryId, EntryKind, LogEntry};
use crate::connection::protocol::Amount;

/// Approximate size of one log line, used to turn a byte amount into a line
/// capacity.
pub const DEFAULT_BYTES_PER_LINE: u64 = 100;

/// Convert a requested amount of log data into a scrollback capacity.
///
/// This is an estimate: real lines vary in length. Always at least 1.
pub fn capacity_for(amount: Amount, bytes_per_line: u64) -> usize {
    let per_line = bytes_per_line.max(1);
    let lines = amount.bytes().div_ceil(per_line);
    usize::try_from(lines).unwrap_or(usize::MAX).max(1)
}

#[derive(Debug)]
pub struct ScrollbackStore {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    evicted: u64,
}

impl ScrollbackStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    /// Add `entry` at the tail, then evict from the head until the store is
    /// within capacity. Returns the ids of evicted entries, oldest first.
    pub fn append(&mut self, entry: LogEntry) -> Vec<EntryId> {
        debug_assert!(
            self.entries.back().is_none_or(|last| last.id < entry.id),
            "entries must arrive in id order"
        );
        self.entries.push_back(entry);

        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            if let Some(old) = self.entries.pop_front() {
                evicted.push(old.id);
            }
        }
        self.evicted += evicted.len() as u64;
        evicted
    }

    /// Change the capacity. Takes effect on the next [`append`](Self::append).
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries evicted over the store's lifetime.
    pub fn evicted_total(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LogEntry> {
        self.entries.iter_mut()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn get(&self, id: EntryId) -> Option<&LogEntry> {
        self.position(id).map(|idx| &self.entries[idx])
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut LogEntry> {
        self.position(id).map(|idx| &mut self.entries[idx])
    }

    /// Fold a continuation line into the error section `id`.
    ///
    /// Returns `None` if the section has already been evicted.
    pub fn extend_section(&mut self, id: EntryId, line: &str) -> Option<&mut LogEntry> {
        let entry = self.get_mut(id)?;
        entry.append_line(line);
        Some(entry)
    }

    /// Record that `request` and `response` belong together.
    ///
    /// The response side is written even if the request has already been
    /// evicted.
    pub fn link(&mut self, request: EntryId, response: EntryId) {
        if let Some(entry) = self.get_mut(request)
            && entry.kind == EntryKind::RequestStart
        {
            entry.counterpart = Some(response);
        }
        if let Some(entry) = self.get_mut(response) {
            entry.counterpart = Some(request);
        }
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        // Ids are strictly increasing from front to back.
        self.entries.binary_search_by_key(&id, |entry| entry.id).ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

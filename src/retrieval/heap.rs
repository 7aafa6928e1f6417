//! Retrieval Heap
//!
//! Indexed binary max-heap of pending retrievals. Unlike
//! `std::collections::BinaryHeap` it tracks where each pointer sits, so a
//! retrieval whose priority is raised can be fixed up in place.

use crate::types::{BlockPointer, Priority};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Heap position key of one pending retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapEntry {
    pub pointer: BlockPointer,
    pub priority: Priority,
    /// Global insertion sequence number, lower is earlier
    pub insertion_order: u64,
}

impl Ord for HeapEntry {
    /// Order by priority (higher first), then by insertion order (earlier first)
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // Earlier insertions compare as Greater so they pop first
            Ordering::Equal => self.insertion_order.cmp(&other.insertion_order).reverse(),
            ordering => ordering,
        }
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct RetrievalHeap {
    entries: Vec<HeapEntry>,
    positions: HashMap<BlockPointer, usize>,
}

impl RetrievalHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, pointer: &BlockPointer) -> bool {
        self.positions.contains_key(pointer)
    }

    /// Current index of `pointer` in the heap
    pub fn position(&self, pointer: &BlockPointer) -> Option<usize> {
        self.positions.get(pointer).copied()
    }

    pub fn peek(&self) -> Option<&HeapEntry> {
        self.entries.first()
    }

    /// Insert an entry. A pointer already in the heap is replaced.
    pub fn push(&mut self, entry: HeapEntry) {
        if self.contains(&entry.pointer) {
            self.remove(&entry.pointer);
        }
        let index = self.entries.len();
        self.positions.insert(entry.pointer, index);
        self.entries.push(entry);
        self.sift_up(index);
    }

    /// Remove and return the highest-ranked entry
    pub fn pop(&mut self) -> Option<HeapEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let entry = self.entries.pop()?;
        self.positions.remove(&entry.pointer);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some(entry)
    }

    /// Remove the entry for `pointer` wherever it sits
    pub fn remove(&mut self, pointer: &BlockPointer) -> Option<HeapEntry> {
        let index = self.positions.get(pointer).copied()?;
        let last = self.entries.len() - 1;
        self.swap(index, last);
        let entry = self.entries.pop()?;
        self.positions.remove(&entry.pointer);
        if index < self.entries.len() {
            self.fix(index);
        }
        Some(entry)
    }

    /// Raise the priority of `pointer` to `priority`
    ///
    /// Returns false if the pointer is not queued. Lower priorities are
    /// ignored; a queued retrieval's priority never decreases.
    pub fn raise_priority(&mut self, pointer: &BlockPointer, priority: Priority) -> bool {
        let Some(index) = self.position(pointer) else {
            return false;
        };
        if priority > self.entries[index].priority {
            self.entries[index].priority = priority;
            self.sift_up(index);
        }
        true
    }

    fn fix(&mut self, index: usize) {
        if !self.sift_up(index) {
            self.sift_down(index);
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        self.positions.insert(self.entries[a].pointer, a);
        self.positions.insert(self.entries[b].pointer, b);
    }

    /// Returns whether the entry moved
    fn sift_up(&mut self, mut index: usize) -> bool {
        let start = index;
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.entries[index] <= self.entries[parent] {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
        index != start
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut best = index;
            if left < len && self.entries[left] > self.entries[best] {
                best = left;
            }
            if right < len && self.entries[right] > self.entries[best] {
                best = right;
            }
            if best == index {
                return;
            }
            self.swap(index, best);
            index = best;
        }
    }
}

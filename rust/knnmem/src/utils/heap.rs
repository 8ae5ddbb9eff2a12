//! Priority queues for nearest-neighbor search.
//!
//! - `MaxHeap`: bounded top-k result set (evicts the farthest entry)
//! - `MinHeap`: candidate frontier (yields the closest entry first)
//!
//! Entries are ordered by `(distance, id)`, so two entries at the same
//! distance compare by id and the lower id counts as closer.

use crate::types::IdType;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An entry in a priority queue: a vector id and its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct HeapEntry {
    pub id: IdType,
    pub distance: f32,
}

impl HeapEntry {
    #[inline]
    pub fn new(id: IdType, distance: f32) -> Self {
        Self { id, distance }
    }

    /// Total order on `(distance, id)`.
    #[inline]
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug, Clone, Copy)]
struct MaxHeapEntry(HeapEntry);

impl PartialEq for MaxHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MaxHeapEntry {}

impl PartialOrd for MaxHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_key(&other.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct MinHeapEntry(HeapEntry);

impl PartialEq for MinHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MinHeapEntry {}

impl PartialOrd for MinHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp_key(&self.0)
    }
}

/// Keeps the `capacity` closest entries seen so far.
///
/// The farthest kept entry sits on top, so deciding whether a new candidate
/// belongs in the result set is a single comparison.
#[derive(Debug)]
pub struct MaxHeap {
    heap: BinaryHeap<MaxHeapEntry>,
    capacity: usize,
}

impl MaxHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Distance of the farthest kept entry.
    #[inline]
    pub fn top_distance(&self) -> Option<f32> {
        self.heap.peek().map(|e| e.0.distance)
    }

    #[inline]
    pub fn peek(&self) -> Option<HeapEntry> {
        self.heap.peek().map(|e| e.0)
    }

    /// Insert if the heap has room or the entry beats the current farthest.
    /// Returns true if inserted.
    #[inline]
    pub fn try_insert(&mut self, id: IdType, distance: f32) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let entry = HeapEntry::new(id, distance);
        if self.heap.len() < self.capacity {
            self.heap.push(MaxHeapEntry(entry));
            true
        } else if let Some(mut top) = self.heap.peek_mut() {
            if entry.cmp_key(&top.0) == Ordering::Less {
                *top = MaxHeapEntry(entry);
                true
            } else {
                false
            }
        } else {
            false
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<HeapEntry> {
        self.heap.pop().map(|e| e.0)
    }

    /// Drain into a vector ordered closest first.
    pub fn into_sorted_vec(self) -> Vec<HeapEntry> {
        self.heap.into_sorted_vec().into_iter().map(|e| e.0).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = HeapEntry> + '_ {
        self.heap.iter().map(|e| e.0)
    }
}

/// Candidate queue that yields the closest entry first.
#[derive(Debug, Default)]
pub struct MinHeap {
    heap: BinaryHeap<MinHeapEntry>,
}

impl MinHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn top_distance(&self) -> Option<f32> {
        self.heap.peek().map(|e| e.0.distance)
    }

    #[inline]
    pub fn push(&mut self, id: IdType, distance: f32) {
        self.heap.push(MinHeapEntry(HeapEntry::new(id, distance)));
    }

    #[inline]
    pub fn pop(&mut self) -> Option<HeapEntry> {
        self.heap.pop().map(|e| e.0)
    }
}

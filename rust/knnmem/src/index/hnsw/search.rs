//! Graph traversal for HNSW.
//!
//! - `greedy_search`: walk to a local minimum on an upper level
//! - `search_layer`: beam search with `ef` candidates on one level
//! - `select_neighbors_heuristic`: diversity-preserving link selection

use super::graph::GraphNode;
use crate::distance::l2_squared;
use crate::index::traits::is_closer;
use crate::types::{IdType, Matrix};
use crate::utils::{HeapEntry, MaxHeap, MinHeap};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

/// Result of a layer search: `(id, squared distance)`, closest first.
pub type SearchResult = Vec<(IdType, f32)>;

/// Tag-based visited set. Resetting bumps the tag instead of clearing.
#[derive(Debug, Default)]
pub struct VisitedSet {
    tags: Vec<u32>,
    current: u32,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            tags: vec![0; capacity],
            current: 1,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.current.wrapping_add(1);
        if self.current == 0 {
            self.tags.fill(0);
            self.current = 1;
        }
    }

    /// Mark `id` visited. Returns true if it already was.
    #[inline]
    pub fn visit(&mut self, id: IdType) -> bool {
        match self.tags.get_mut(id as usize) {
            Some(tag) if *tag == self.current => true,
            Some(tag) => {
                *tag = self.current;
                false
            }
            None => false,
        }
    }
}

/// Pool of visited sets so concurrent queries do not allocate per call.
#[derive(Debug)]
pub struct VisitedPool {
    capacity: usize,
    free: Mutex<Vec<VisitedSet>>,
}

impl VisitedPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a reset visited set; it returns to the pool on drop.
    pub fn get(&self) -> PooledVisited<'_> {
        let mut set = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| VisitedSet::new(self.capacity));
        set.reset();
        PooledVisited { pool: self, set }
    }

    pub fn pooled(&self) -> usize {
        self.free.lock().len()
    }
}

pub struct PooledVisited<'a> {
    pool: &'a VisitedPool,
    set: VisitedSet,
}

impl Deref for PooledVisited<'_> {
    type Target = VisitedSet;

    fn deref(&self) -> &VisitedSet {
        &self.set
    }
}

impl DerefMut for PooledVisited<'_> {
    fn deref_mut(&mut self) -> &mut VisitedSet {
        &mut self.set
    }
}

impl Drop for PooledVisited<'_> {
    fn drop(&mut self) {
        let set = std::mem::take(&mut self.set);
        self.pool.free.lock().push(set);
    }
}

/// Follow strictly closer neighbors on `level` until none is left.
pub fn greedy_search(
    entry: (IdType, f32),
    query: &[f32],
    level: usize,
    graph: &[GraphNode],
    vectors: &Matrix<f32>,
) -> (IdType, f32) {
    let (mut current, mut current_dist) = entry;

    loop {
        let mut changed = false;
        for &neighbor in graph[current as usize].neighbors(level) {
            let dist = l2_squared(vectors.row(neighbor as usize), query);
            if is_closer(dist, neighbor, current_dist, current) {
                current = neighbor;
                current_dist = dist;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    (current, current_dist)
}

/// Beam search on `level` keeping the `ef` closest elements found.
pub fn search_layer(
    entry_points: &[(IdType, f32)],
    query: &[f32],
    level: usize,
    ef: usize,
    graph: &[GraphNode],
    vectors: &Matrix<f32>,
    visited: &mut VisitedSet,
) -> SearchResult {
    let mut candidates = MinHeap::with_capacity(ef * 2);
    let mut results = MaxHeap::new(ef);

    for &(id, dist) in entry_points {
        if !visited.visit(id) {
            candidates.push(id, dist);
            results.try_insert(id, dist);
        }
    }

    while let Some(candidate) = candidates.pop() {
        if results.is_full() {
            if let Some(worst) = results.peek() {
                if candidate.cmp_key(&worst) == Ordering::Greater {
                    break;
                }
            }
        }

        for &neighbor in graph[candidate.id as usize].neighbors(level) {
            if visited.visit(neighbor) {
                continue;
            }
            let dist = l2_squared(vectors.row(neighbor as usize), query);
            let entry = HeapEntry::new(neighbor, dist);
            let dominated = results.is_full()
                && results
                    .peek()
                    .is_some_and(|worst| entry.cmp_key(&worst) != Ordering::Less);
            if !dominated {
                results.try_insert(neighbor, dist);
                candidates.push(neighbor, dist);
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|e| (e.id, e.distance))
        .collect()
}

/// Pick up to `m` links for an element from `candidates`.
///
/// A candidate is kept only if it is closer to the element than to every
/// link already kept, which spreads links across directions. Remaining
/// slots are filled with the closest pruned candidates.
pub fn select_neighbors_heuristic(
    candidates: &[(IdType, f32)],
    m: usize,
    vectors: &Matrix<f32>,
) -> Vec<IdType> {
    let mut working = candidates.to_vec();
    working.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut selected: Vec<IdType> = Vec::with_capacity(m);
    let mut pruned: Vec<IdType> = Vec::new();

    for (id, dist) in working {
        if selected.len() >= m {
            break;
        }
        let candidate = vectors.row(id as usize);
        let diverse = selected
            .iter()
            .all(|&s| l2_squared(candidate, vectors.row(s as usize)) > dist);
        if diverse {
            selected.push(id);
        } else {
            pruned.push(id);
        }
    }

    let room = m.saturating_sub(selected.len());
    selected.extend(pruned.into_iter().take(room));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visited_set_reset() {
        let mut visited = VisitedSet::new(4);
        assert!(!visited.visit(2));
        assert!(visited.visit(2));
        visited.reset();
        assert!(!visited.visit(2));
        assert!(!visited.visit(10));
    }

    #[test]
    fn test_pool_reuses_sets() {
        let pool = VisitedPool::new(8);
        {
            let mut a = pool.get();
            a.visit(1);
        }
        assert_eq!(pool.pooled(), 1);
        let mut b = pool.get();
        assert!(!b.visit(1));
        assert_eq!(pool.pooled(), 0);
    }

    #[test]
    fn test_heuristic_prefers_diverse_links() {
        // Target at origin; 0 and 1 point the same way, 2 points elsewhere.
        let vectors = Matrix::from_rows(&[
            vec![1.0f32, 0.0],
            vec![1.1, 0.0],
            vec![0.0, 1.2],
        ])
        .unwrap();
        let candidates = vec![(0, 1.0f32), (1, 1.21), (2, 1.44)];
        assert_eq!(select_neighbors_heuristic(&candidates, 2, &vectors), vec![0, 2]);
        assert_eq!(select_neighbors_heuristic(&candidates, 3, &vectors), vec![0, 2, 1]);
    }
}

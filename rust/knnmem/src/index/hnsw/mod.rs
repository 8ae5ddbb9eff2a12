//! HNSW (Hierarchical Navigable Small World) shard index.
//!
//! Approximate: a query may settle on a vector of the shard that is close but
//! not the closest. Construction inserts vectors in id order and draws each
//! element's level from an RNG seeded by `HnswParams::seed`, so the same
//! vectors and seed always produce the same graph and the same answers.
//!
//! Key parameters:
//! - `m`: links per element on upper levels (`2 * m` on level 0)
//! - `ef_construction`: beam width while inserting
//! - `ef_runtime`: beam width while querying

pub mod graph;
pub mod search;

pub use graph::{GraphNode, DEFAULT_M, MAX_LEVEL};

use super::traits::{check_build_input, check_dimension};
use super::{IndexError, IndexType, NearestNeighborIndex};
use crate::distance::l2_squared;
use crate::types::{IdType, Matrix, INVALID_ID};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use search::{VisitedPool, VisitedSet};

/// Parameters for an HNSW index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HnswParams {
    /// Maximum links per element on levels above zero (default: 16).
    pub m: usize,
    /// Beam width during construction (default: 200).
    pub ef_construction: usize,
    /// Beam width during queries (default: 64).
    pub ef_runtime: usize,
    /// Seed for level generation.
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            ef_construction: 200,
            ef_runtime: 64,
            seed: 0,
        }
    }
}

impl HnswParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn with_ef_runtime(mut self, ef: usize) -> Self {
        self.ef_runtime = ef;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Link budget on level 0.
    #[inline]
    pub fn m_max_0(&self) -> usize {
        self.m * 2
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.m < 2 {
            return Err(IndexError::InvalidParameter(format!(
                "HNSW m must be at least 2, got {}",
                self.m
            )));
        }
        if self.ef_construction == 0 || self.ef_runtime == 0 {
            return Err(IndexError::InvalidParameter(
                "HNSW ef values must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Approximate top-1 index over a fixed set of vectors.
#[derive(Debug)]
pub struct HnswIndex {
    vectors: Matrix<f32>,
    params: HnswParams,
    graph: Vec<GraphNode>,
    entry_point: IdType,
    max_level: usize,
    level_mult: f64,
    visited: VisitedPool,
}

impl HnswIndex {
    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Highest level present in the graph.
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Total number of directed links.
    pub fn link_count(&self) -> usize {
        self.graph.iter().map(GraphNode::link_count).sum()
    }

    fn random_level(&self, rng: &mut StdRng) -> usize {
        let r: f64 = rng.gen();
        (-r.ln() * self.level_mult).floor().min(MAX_LEVEL as f64) as usize
    }

    #[inline]
    fn distance(&self, id: IdType, query: &[f32]) -> f32 {
        l2_squared(self.vectors.row(id as usize), query)
    }

    fn insert(&mut self, id: IdType, level: usize, visited: &mut VisitedSet) {
        self.graph.push(GraphNode::new(level));

        if self.entry_point == INVALID_ID {
            self.entry_point = id;
            self.max_level = level;
            return;
        }

        // Owned: links are rewired below while the query is still in use.
        let query = self.vectors.row(id as usize).to_vec();
        let query = query.as_slice();
        let mut current = (self.entry_point, self.distance(self.entry_point, query));
        for l in (level + 1..=self.max_level).rev() {
            current = search::greedy_search(current, query, l, &self.graph, &self.vectors);
        }

        let mut entry_points = vec![current];
        for l in (0..=level.min(self.max_level)).rev() {
            visited.reset();
            let neighbors = search::search_layer(
                &entry_points,
                query,
                l,
                self.params.ef_construction,
                &self.graph,
                &self.vectors,
                visited,
            );

            let m = if l == 0 { self.params.m_max_0() } else { self.params.m };
            let selected = search::select_neighbors_heuristic(&neighbors, m, &self.vectors);
            for &neighbor in &selected {
                self.add_link(neighbor, id, l);
            }
            self.graph[id as usize].set_neighbors(l, selected);

            if !neighbors.is_empty() {
                entry_points = neighbors;
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = id;
        }
    }

    /// Link `from -> to` on `level`, pruning `from`'s list back to budget.
    fn add_link(&mut self, from: IdType, to: IdType, level: usize) {
        let mut links = self.graph[from as usize].neighbors(level).to_vec();
        if links.contains(&to) {
            return;
        }
        links.push(to);

        let m = if level == 0 { self.params.m_max_0() } else { self.params.m };
        if links.len() > m {
            let base = self.vectors.row(from as usize);
            let candidates: Vec<(IdType, f32)> = links
                .iter()
                .map(|&n| (n, l2_squared(self.vectors.row(n as usize), base)))
                .collect();
            links = search::select_neighbors_heuristic(&candidates, m, &self.vectors);
        }
        self.graph[from as usize].set_neighbors(level, links);
    }
}

impl NearestNeighborIndex for HnswIndex {
    type Params = HnswParams;

    fn build(vectors: Matrix<f32>, params: &HnswParams) -> Result<Self, IndexError> {
        params.validate()?;
        check_build_input(&vectors)?;

        let count = vectors.rows();
        let mut index = Self {
            vectors,
            params: params.clone(),
            graph: Vec::with_capacity(count),
            entry_point: INVALID_ID,
            max_level: 0,
            level_mult: 1.0 / (params.m as f64).ln(),
            visited: VisitedPool::new(count),
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut visited = VisitedSet::new(count);
        for id in 0..count as IdType {
            let level = index.random_level(&mut rng);
            index.insert(id, level, &mut visited);
        }
        Ok(index)
    }

    fn query_one(&self, query: &[f32]) -> Result<(IdType, f32), IndexError> {
        check_dimension(self.vectors.dim(), query.len())?;
        if self.entry_point == INVALID_ID {
            return Err(IndexError::EmptyIndex);
        }

        let mut current = (self.entry_point, self.distance(self.entry_point, query));
        for l in (1..=self.max_level).rev() {
            current = search::greedy_search(current, query, l, &self.graph, &self.vectors);
        }

        let mut visited = self.visited.get();
        let results = search::search_layer(
            &[current],
            query,
            0,
            self.params.ef_runtime,
            &self.graph,
            &self.vectors,
            &mut visited,
        );
        results
            .first()
            .copied()
            .ok_or_else(|| IndexError::Internal("HNSW search returned no results".to_string()))
    }

    fn len(&self) -> usize {
        self.vectors.rows()
    }

    fn dimension(&self) -> usize {
        self.vectors.dim()
    }

    fn index_type(&self) -> IndexType {
        IndexType::HNSW
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.vectors.as_slice().len() * std::mem::size_of::<f32>()
            + self.graph.len() * std::mem::size_of::<GraphNode>()
            + self.link_count() * std::mem::size_of::<IdType>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BruteForceIndex, BruteForceParams};
    use crate::preprocessing::normalize_rows;

    fn random_unit_matrix(rng: &mut StdRng, rows: usize, dim: usize) -> Matrix<f32> {
        let data: Vec<f32> = (0..rows * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        normalize_rows(&Matrix::from_vec(data, rows, dim).unwrap())
    }

    #[test]
    fn test_self_queries_found() {
        let mut rng = StdRng::seed_from_u64(5);
        let data = random_unit_matrix(&mut rng, 400, 16);
        let index = HnswIndex::build(data.clone(), &HnswParams::default()).unwrap();

        let hits = data
            .iter_rows()
            .enumerate()
            .filter(|&(i, row)| index.query_one(row).unwrap().0 == i as IdType)
            .count();
        assert!(hits >= 396, "only {hits}/400 self queries found");
    }

    #[test]
    fn test_recall_against_brute_force() {
        let mut rng = StdRng::seed_from_u64(9);
        let data = random_unit_matrix(&mut rng, 1000, 24);
        let queries = random_unit_matrix(&mut rng, 200, 24);

        let hnsw = HnswIndex::build(data.clone(), &HnswParams::default()).unwrap();
        let exact = BruteForceIndex::build(data, &BruteForceParams::default()).unwrap();

        let approx = hnsw.query(&queries).unwrap();
        let truth = exact.query(&queries).unwrap();
        let matches = approx.iter().zip(&truth).filter(|(a, b)| a == b).count();
        assert!(matches >= 180, "recall too low: {matches}/200");
    }

    #[test]
    fn test_deterministic_for_seed() {
        let mut rng = StdRng::seed_from_u64(21);
        let data = random_unit_matrix(&mut rng, 300, 8);
        let queries = random_unit_matrix(&mut rng, 50, 8);
        let params = HnswParams::default().with_m(4).with_ef_runtime(2).with_seed(77);

        let a = HnswIndex::build(data.clone(), &params).unwrap();
        let b = HnswIndex::build(data, &params).unwrap();
        assert_eq!(a.max_level(), b.max_level());
        assert_eq!(a.link_count(), b.link_count());
        assert_eq!(a.query(&queries).unwrap(), b.query(&queries).unwrap());
    }

    #[test]
    fn test_link_budget_respected() {
        let mut rng = StdRng::seed_from_u64(2);
        let params = HnswParams::default().with_m(4);
        let index = HnswIndex::build(random_unit_matrix(&mut rng, 500, 8), &params).unwrap();
        for node in &index.graph {
            assert!(node.neighbors(0).len() <= params.m_max_0());
            for l in 1..=node.top_level() {
                assert!(node.neighbors(l).len() <= params.m);
            }
        }
    }

    #[test]
    fn test_single_vector() {
        let data = Matrix::from_rows(&[vec![0.0f32, 1.0]]).unwrap();
        let index = HnswIndex::build(data, &HnswParams::default()).unwrap();
        assert_eq!(index.query_one(&[1.0, 0.0]).unwrap().0, 0);
    }

    #[test]
    fn test_invalid_params() {
        let data = Matrix::from_rows(&[vec![1.0f32]]).unwrap();
        assert!(matches!(
            HnswIndex::build(data.clone(), &HnswParams::default().with_m(1)),
            Err(IndexError::InvalidParameter(_))
        ));
        assert!(matches!(
            HnswIndex::build(data, &HnswParams::default().with_ef_runtime(0)),
            Err(IndexError::InvalidParameter(_))
        ));
    }
}

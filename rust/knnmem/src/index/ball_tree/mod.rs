//! Exact ball tree index.
//!
//! Each node covers a contiguous range of a permutation of the build ids and
//! stores the ball (centroid and radius) enclosing them. Nodes are split at
//! the median of the projection onto the axis joining two far-apart points,
//! so the tree stays balanced even for heavily duplicated data.
//!
//! A query descends closest ball first and skips a ball only when its lower
//! bound `‖q - c‖ - r` exceeds the best distance found so far by more than a
//! small slack. The slack absorbs rounding in the bound, which keeps the
//! result identical to a brute-force scan, ties included.

use super::traits::{check_build_input, check_dimension, is_closer};
use super::{IndexError, IndexType, NearestNeighborIndex};
use crate::distance::{dot_product, l2_squared};
use crate::types::{IdType, Matrix, INVALID_ID};

/// Default number of points below which a node is not split.
pub const DEFAULT_LEAF_SIZE: usize = 40;

/// Relative slack applied to the pruning bound.
const PRUNE_SLACK: f32 = 1e-4;

/// Parameters for a ball tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallTreeParams {
    /// Maximum number of points in a leaf.
    pub leaf_size: usize,
}

impl Default for BallTreeParams {
    fn default() -> Self {
        Self {
            leaf_size: DEFAULT_LEAF_SIZE,
        }
    }
}

impl BallTreeParams {
    pub fn new(leaf_size: usize) -> Self {
        Self { leaf_size }
    }

    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.leaf_size == 0 {
            return Err(IndexError::InvalidParameter(
                "ball tree leaf_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct BallNode {
    center: Vec<f32>,
    radius: f32,
    /// Range into `BallTreeIndex::order`.
    start: usize,
    end: usize,
    children: Option<(usize, usize)>,
}

/// Exact ball tree over a fixed set of vectors.
#[derive(Debug)]
pub struct BallTreeIndex {
    vectors: Matrix<f32>,
    params: BallTreeParams,
    order: Vec<IdType>,
    nodes: Vec<BallNode>,
}

impl BallTreeIndex {
    /// Number of tree nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (the root is depth 1).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[BallNode], node: usize) -> usize {
            match nodes[node].children {
                Some((left, right)) => 1 + walk(nodes, left).max(walk(nodes, right)),
                None => 1,
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    #[inline]
    fn vector(&self, id: IdType) -> &[f32] {
        self.vectors.row(id as usize)
    }

    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let (center, radius) = self.bounding_ball(start, end);
        let node_id = self.nodes.len();
        self.nodes.push(BallNode {
            center,
            radius,
            start,
            end,
            children: None,
        });

        if end - start <= self.params.leaf_size || radius == 0.0 {
            return node_id;
        }

        let mid = self.partition(start, end, node_id);
        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[node_id].children = Some((left, right));
        node_id
    }

    /// Centroid and enclosing radius of `order[start..end]`.
    fn bounding_ball(&self, start: usize, end: usize) -> (Vec<f32>, f32) {
        let dim = self.vectors.dim();
        let mut sum = vec![0.0f64; dim];
        for &id in &self.order[start..end] {
            for (acc, &x) in sum.iter_mut().zip(self.vector(id)) {
                *acc += x as f64;
            }
        }
        let count = (end - start) as f64;
        let center: Vec<f32> = sum.into_iter().map(|s| (s / count) as f32).collect();

        let radius = self.order[start..end]
            .iter()
            .map(|&id| l2_squared(self.vector(id), &center).sqrt())
            .fold(0.0f32, f32::max);
        (center, radius)
    }

    /// The id in `order[start..end]` farthest from `target`, lowest id on ties.
    fn farthest_from(&self, start: usize, end: usize, target: &[f32]) -> IdType {
        let mut best = (INVALID_ID, f32::NEG_INFINITY);
        for &id in &self.order[start..end] {
            let dist = l2_squared(self.vector(id), target);
            if dist > best.1 || (dist == best.1 && id < best.0) {
                best = (id, dist);
            }
        }
        best.0
    }

    /// Split `order[start..end]` in half along the axis between two distant
    /// points. Returns the split position.
    fn partition(&mut self, start: usize, end: usize, node_id: usize) -> usize {
        let a = self.farthest_from(start, end, &self.nodes[node_id].center);
        let b = self.farthest_from(start, end, self.vector(a));
        let axis: Vec<f32> = self
            .vector(b)
            .iter()
            .zip(self.vector(a))
            .map(|(&x, &y)| x - y)
            .collect();

        let mut keyed: Vec<(f32, IdType)> = self.order[start..end]
            .iter()
            .map(|&id| (dot_product(self.vector(id), &axis), id))
            .collect();
        let half = keyed.len() / 2;
        keyed.select_nth_unstable_by(half, |x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

        for (slot, (_, id)) in self.order[start..end].iter_mut().zip(keyed) {
            *slot = id;
        }
        start + half
    }

    /// Lower bound on the distance (not squared) from `query` to any point
    /// inside the node's ball.
    #[inline]
    fn lower_bound(&self, node: usize, query: &[f32]) -> f32 {
        let node = &self.nodes[node];
        (l2_squared(query, &node.center).sqrt() - node.radius).max(0.0)
    }

    #[inline]
    fn can_prune(lower_bound: f32, best_squared: f32) -> bool {
        let best = best_squared.sqrt();
        lower_bound > best + PRUNE_SLACK * (1.0 + best)
    }

    fn search(&self, node: usize, query: &[f32], best: &mut (IdType, f32)) {
        let current = &self.nodes[node];
        match current.children {
            None => {
                for &id in &self.order[current.start..current.end] {
                    let dist = l2_squared(self.vector(id), query);
                    if is_closer(dist, id, best.1, best.0) {
                        *best = (id, dist);
                    }
                }
            }
            Some((left, right)) => {
                let left_bound = self.lower_bound(left, query);
                let right_bound = self.lower_bound(right, query);
                let visits = if left_bound <= right_bound {
                    [(left, left_bound), (right, right_bound)]
                } else {
                    [(right, right_bound), (left, left_bound)]
                };
                for (child, bound) in visits {
                    if !Self::can_prune(bound, best.1) {
                        self.search(child, query, best);
                    }
                }
            }
        }
    }
}

impl NearestNeighborIndex for BallTreeIndex {
    type Params = BallTreeParams;

    fn build(vectors: Matrix<f32>, params: &BallTreeParams) -> Result<Self, IndexError> {
        params.validate()?;
        check_build_input(&vectors)?;

        let count = vectors.rows();
        let mut index = Self {
            order: (0..count as IdType).collect(),
            nodes: Vec::with_capacity(2 * count.div_ceil(params.leaf_size)),
            vectors,
            params: params.clone(),
        };
        index.build_node(0, count);
        Ok(index)
    }

    fn query_one(&self, query: &[f32]) -> Result<(IdType, f32), IndexError> {
        check_dimension(self.vectors.dim(), query.len())?;
        let mut best = (INVALID_ID, f32::INFINITY);
        self.search(0, query, &mut best);
        if best.0 == INVALID_ID {
            return Err(IndexError::Internal(
                "ball tree search visited no points".to_string(),
            ));
        }
        Ok(best)
    }

    fn len(&self) -> usize {
        self.vectors.rows()
    }

    fn dimension(&self) -> usize {
        self.vectors.dim()
    }

    fn index_type(&self) -> IndexType {
        IndexType::BallTree
    }

    fn memory_usage(&self) -> usize {
        let dim = self.vectors.dim();
        std::mem::size_of::<Self>()
            + self.vectors.as_slice().len() * std::mem::size_of::<f32>()
            + self.order.len() * std::mem::size_of::<IdType>()
            + self.nodes.len() * (std::mem::size_of::<BallNode>() + dim * std::mem::size_of::<f32>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BruteForceIndex, BruteForceParams};
    use crate::preprocessing::normalize_rows;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_unit_matrix(rng: &mut StdRng, rows: usize, dim: usize) -> Matrix<f32> {
        let data: Vec<f32> = (0..rows * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        normalize_rows(&Matrix::from_vec(data, rows, dim).unwrap())
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        for &(rows, dim, leaf) in &[(1usize, 3usize, 1usize), (17, 2, 1), (500, 8, 4), (1000, 32, 40)] {
            let data = random_unit_matrix(&mut rng, rows, dim);
            let queries = random_unit_matrix(&mut rng, 100, dim);

            let tree = BallTreeIndex::build(data.clone(), &BallTreeParams::new(leaf)).unwrap();
            let reference = BruteForceIndex::build(data, &BruteForceParams::default()).unwrap();

            for q in queries.iter_rows() {
                assert_eq!(
                    tree.query_one(q).unwrap(),
                    reference.query_one(q).unwrap(),
                    "rows={rows} dim={dim} leaf={leaf}"
                );
            }
        }
    }

    #[test]
    fn test_self_query_finds_self() {
        let mut rng = StdRng::seed_from_u64(3);
        let data = random_unit_matrix(&mut rng, 200, 12);
        let tree = BallTreeIndex::build(data.clone(), &BallTreeParams::new(5)).unwrap();
        for (i, row) in data.iter_rows().enumerate() {
            assert_eq!(tree.query_one(row).unwrap(), (i as IdType, 0.0));
        }
    }

    #[test]
    fn test_duplicates_resolve_to_lowest_id() {
        // Two clusters of exact duplicates spread across many leaves.
        let mut rows = Vec::new();
        for i in 0..300 {
            rows.push(if i % 2 == 0 { vec![1.0f32, 0.0] } else { vec![0.0, 1.0] });
        }
        let data = Matrix::from_rows(&rows).unwrap();
        let tree = BallTreeIndex::build(data, &BallTreeParams::new(2)).unwrap();

        assert_eq!(tree.query_one(&[1.0, 0.0]).unwrap().0, 0);
        assert_eq!(tree.query_one(&[0.0, 1.0]).unwrap().0, 1);
        assert_eq!(tree.query_one(&[0.6, 0.8]).unwrap().0, 1);
    }

    #[test]
    fn test_identical_points_form_single_leaf() {
        let data = Matrix::from_rows(&vec![vec![0.5f32; 4]; 1000]).unwrap();
        let tree = BallTreeIndex::build(data, &BallTreeParams::new(1)).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.query_one(&[0.5; 4]).unwrap(), (0, 0.0));
    }

    #[test]
    fn test_tree_is_balanced() {
        let mut rng = StdRng::seed_from_u64(11);
        let data = random_unit_matrix(&mut rng, 1024, 8);
        let tree = BallTreeIndex::build(data, &BallTreeParams::new(1)).unwrap();
        // Median splits halve every range, so depth is log2(1024) + 1.
        assert_eq!(tree.depth(), 11);
    }

    #[test]
    fn test_zero_leaf_size_rejected() {
        let data = Matrix::from_rows(&[vec![1.0f32]]).unwrap();
        assert!(matches!(
            BallTreeIndex::build(data, &BallTreeParams::new(0)),
            Err(IndexError::InvalidParameter(_))
        ));
    }
}

//! Committed shards.
//!
//! Shard `j` owns the `capacity` vectors at global positions
//! `[j * capacity, (j + 1) * capacity)` and an immutable index built over
//! their normalized form. Shards are appended in ordinal order and never
//! modified afterwards.

use crate::index::{IndexError, IndexKind, NearestNeighborIndex, ShardIndex};
use crate::preprocessing::normalize_rows_in_place;
use crate::types::Matrix;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug)]
pub struct Shard {
    ordinal: usize,
    offset: usize,
    index: ShardIndex,
}

impl Shard {
    /// Normalize `raw` and build shard number `ordinal` from it.
    ///
    /// `raw` must hold exactly `capacity` rows.
    pub fn build(
        ordinal: usize,
        capacity: usize,
        raw: Matrix<f32>,
        kind: &IndexKind,
    ) -> Result<Self, IndexError> {
        if raw.rows() != capacity {
            return Err(IndexError::Internal(format!(
                "shard {ordinal} needs {capacity} vectors, got {}",
                raw.rows()
            )));
        }

        let mut vectors = raw;
        normalize_rows_in_place(&mut vectors);
        let index = ShardIndex::build(vectors, &kind.for_shard(ordinal))?;
        let offset = ordinal * capacity;

        debug!(ordinal, offset, kind = %index.index_type(), "built shard index");
        Ok(Self {
            ordinal,
            offset,
            index,
        })
    }

    #[inline]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Global position of this shard's first vector.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &ShardIndex {
        &self.index
    }

    /// Global position of the nearest shard vector for each normalized query.
    pub fn query(&self, queries: &Matrix<f32>) -> Result<Vec<usize>, IndexError> {
        Ok(self
            .index
            .query(queries)?
            .into_iter()
            .map(|local| self.offset + local as usize)
            .collect())
    }
}

/// All committed shards, in ordinal order.
#[derive(Debug, Default)]
pub struct ShardSet {
    shards: Vec<Shard>,
}

impl ShardSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Append the next shard. Its ordinal must equal the current length.
    pub fn push(&mut self, shard: Shard) -> Result<(), IndexError> {
        if shard.ordinal() != self.shards.len() {
            return Err(IndexError::Internal(format!(
                "expected shard {}, got shard {}",
                self.shards.len(),
                shard.ordinal()
            )));
        }
        self.shards.push(shard);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shard> {
        self.shards.iter()
    }

    pub fn clear(&mut self) {
        self.shards.clear();
    }

    /// Keep only the first `len` shards.
    pub fn truncate(&mut self, len: usize) {
        self.shards.truncate(len);
    }

    /// Query every shard in parallel. Result `j` holds shard `j`'s global
    /// winner for each query row.
    pub fn query_all(&self, queries: &Matrix<f32>) -> Result<Vec<Vec<usize>>, IndexError> {
        self.shards.par_iter().map(|shard| shard.query(queries)).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.shards.iter().map(|s| s.index().memory_usage()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BruteForceParams, IndexType};

    fn group(rows: &[[f32; 2]]) -> Matrix<f32> {
        Matrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_shard_maps_to_global_positions() {
        let shard = Shard::build(
            2,
            3,
            group(&[[1.0, 0.0], [0.0, 5.0], [-2.0, 0.0]]),
            &IndexKind::default(),
        )
        .unwrap();
        assert_eq!(shard.offset(), 6);
        assert_eq!(shard.index().index_type(), IndexType::BallTree);

        let queries = group(&[[0.0, 1.0], [-1.0, 0.1]]);
        assert_eq!(shard.query(&queries).unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_wrong_group_size_rejected() {
        let err = Shard::build(0, 4, group(&[[1.0, 0.0]]), &IndexKind::default()).unwrap_err();
        assert!(matches!(err, IndexError::Internal(_)));
    }

    #[test]
    fn test_shard_set_order_and_fan_out() {
        let kind = IndexKind::BruteForce(BruteForceParams::default());
        let mut set = ShardSet::new();
        set.push(Shard::build(0, 2, group(&[[1.0, 0.0], [0.0, 1.0]]), &kind).unwrap())
            .unwrap();
        set.push(Shard::build(1, 2, group(&[[0.0, -1.0], [-1.0, 0.0]]), &kind).unwrap())
            .unwrap();

        let out_of_order = Shard::build(5, 2, group(&[[1.0, 1.0], [1.0, -1.0]]), &kind).unwrap();
        assert!(set.push(out_of_order).is_err());

        let hits = set.query_all(&group(&[[0.0, 1.0]])).unwrap();
        assert_eq!(hits, vec![vec![1], vec![3]]);
    }
}

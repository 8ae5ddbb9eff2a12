//! Per-element adjacency lists, one list per level the element appears on.

use crate::types::IdType;

/// Default number of neighbors kept per element on levels above zero.
pub const DEFAULT_M: usize = 16;

/// Levels are capped so a degenerate random draw cannot blow up the graph.
pub const MAX_LEVEL: usize = 16;

#[derive(Debug, Clone)]
pub struct GraphNode {
    levels: Vec<Vec<IdType>>,
}

impl GraphNode {
    /// A node present on levels `0..=top_level` with no links yet.
    pub fn new(top_level: usize) -> Self {
        Self {
            levels: vec![Vec::new(); top_level + 1],
        }
    }

    #[inline]
    pub fn top_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Neighbors on `level`; empty if the node does not reach that level.
    #[inline]
    pub fn neighbors(&self, level: usize) -> &[IdType] {
        self.levels.get(level).map_or(&[], |links| links.as_slice())
    }

    pub fn set_neighbors(&mut self, level: usize, neighbors: Vec<IdType>) {
        if let Some(links) = self.levels.get_mut(level) {
            *links = neighbors;
        }
    }

    pub fn link_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

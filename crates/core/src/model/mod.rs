//! Core data model for samples and their attributed control-flow graphs.
//!
//! A sample's graph is a [`FeatureMatrix`] (one integer row per node, row index
//! is node identity) plus an [`AdjacencyRelation`] over the same node index space.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier for one input sample (file name without extension).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(String);

impl SampleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SampleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for SampleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Violations of the graph shape invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("edge ({from}, {to}) is outside the node range 0..{node_count}")]
    EdgeOutOfRange { from: usize, to: usize, node_count: usize },

    #[error("adjacency covers {adjacency} nodes but the feature matrix has {features} rows")]
    ShapeMismatch { features: usize, adjacency: usize },
}

/// Node feature matrix: one integer row per graph node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<Vec<i64>>,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<Vec<i64>>) -> Self {
        Self { rows }
    }

    pub fn node_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<i64>] {
        &self.rows
    }

    pub fn row(&self, node: usize) -> Option<&[i64]> {
        self.rows.get(node).map(Vec::as_slice)
    }

    pub fn into_rows(self) -> Vec<Vec<i64>> {
        self.rows
    }
}

/// Sparse directed edge set over `0..node_count`.
///
/// Edges are kept sorted by `(source, target)` with duplicates collapsed, which
/// is the order a sparse-matrix scan yields them in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdjacencyRelation {
    node_count: usize,
    edges: BTreeSet<(usize, usize)>,
}

impl AdjacencyRelation {
    pub fn new(node_count: usize) -> Self {
        Self { node_count, edges: BTreeSet::new() }
    }

    /// Build a relation, rejecting any endpoint `>= node_count`.
    pub fn from_edges(
        node_count: usize,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self, ModelError> {
        let mut relation = Self::new(node_count);
        for (source, target) in edges {
            relation.insert(source, target)?;
        }
        Ok(relation)
    }

    pub fn insert(&mut self, source: usize, target: usize) -> Result<bool, ModelError> {
        if source >= self.node_count || target >= self.node_count {
            return Err(ModelError::EdgeOutOfRange {
                from: source,
                to: target,
                node_count: self.node_count,
            });
        }
        Ok(self.edges.insert((source, target)))
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.edges.iter().copied()
    }

    /// Copy of this relation with every edge mirrored.
    pub fn symmetrized(&self) -> Self {
        let mut edges = self.edges.clone();
        for &(source, target) in &self.edges {
            edges.insert((target, source));
        }
        Self { node_count: self.node_count, edges }
    }

    /// Per-node neighbor lists for nodes `0..node_count`, built in one scan of the
    /// edge set. Nodes without outgoing edges get an empty list.
    pub fn neighbor_lists(&self, node_count: usize) -> Vec<Vec<usize>> {
        let mut by_source: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &(source, target) in &self.edges {
            by_source.entry(source).or_default().push(target);
        }
        (0..node_count).map(|node| by_source.remove(&node).unwrap_or_default()).collect()
    }
}

/// One sample's graph as produced by a graph extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedCfg {
    pub features: FeatureMatrix,
    pub adjacency: AdjacencyRelation,
}

impl AttributedCfg {
    pub fn new(features: FeatureMatrix, adjacency: AdjacencyRelation) -> Result<Self, ModelError> {
        if features.node_count() != adjacency.node_count() {
            return Err(ModelError::ShapeMismatch {
                features: features.node_count(),
                adjacency: adjacency.node_count(),
            });
        }
        Ok(Self { features, adjacency })
    }

    pub fn node_count(&self) -> usize {
        self.features.node_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_lists_follow_ascending_target_order() {
        let adj = AdjacencyRelation::from_edges(4, [(2, 3), (0, 2), (0, 1), (2, 0), (0, 1)])
            .expect("edges in range");
        assert_eq!(adj.edge_count(), 4);
        assert_eq!(adj.neighbor_lists(4), vec![vec![1, 2], vec![], vec![0, 3], vec![]]);
    }

    #[test]
    fn out_of_range_edge_is_rejected() {
        let err = AdjacencyRelation::from_edges(2, [(0, 2)]).unwrap_err();
        assert_eq!(err, ModelError::EdgeOutOfRange { from: 0, to: 2, node_count: 2 });
    }

    #[test]
    fn symmetrized_mirrors_edges() {
        let adj = AdjacencyRelation::from_edges(3, [(0, 1), (1, 2)]).unwrap().symmetrized();
        assert_eq!(adj.edges().collect::<Vec<_>>(), vec![(0, 1), (1, 0), (1, 2), (2, 1)]);
    }

    #[test]
    fn cfg_rejects_shape_mismatch() {
        let features = FeatureMatrix::new(vec![vec![1], vec![2]]);
        let err = AttributedCfg::new(features, AdjacencyRelation::new(3)).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { features: 2, adjacency: 3 }));
    }
}

//! Binary space partition over scene polygons.
//!
//! Nodes live in one arena addressed by [`NodeId`]; each node knows its parent
//! and children, so traversals can backtrack without owning cycles. Leaves
//! hold [`Fragment`]s: pieces of scene polygons clipped to the leaf, each
//! remembering the polygon it came from.
//!
//! The tree is immutable once built. Per-query bookkeeping goes in a
//! caller-owned [`VisitedSet`].

mod builder;
mod clip;

pub use clip::split_loop;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;

use crate::geom::PolygonId;
use crate::util::{BoundingBox, DVec3, Error, Result, EPS_BOX};

/// Index of a node in the arena. The root is always 0.
pub type NodeId = u32;

pub const ROOT: NodeId = 0;

/// Build parameters of the surface area heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Depth at which nodes become leaves unconditionally
    pub max_depth: u32,
    /// Nodes with this many fragments or fewer become leaves
    pub min_leaf_size: usize,
    /// Candidate planes per axis
    pub split_planes: usize,
    pub traversal_cost: f64,
    pub intersection_cost: f64,
    /// Multiplier on the SAH cost of a split that leaves one side without
    /// its own polygons
    pub empty_side_discount: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_leaf_size: 2,
            split_planes: 20,
            traversal_cost: 8.0,
            intersection_cost: 1.0,
            empty_side_discount: 0.8,
        }
    }
}

impl TreeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.split_planes == 0 {
            return Err(Error::invalid("split_planes must be at least 1"));
        }
        let costs = [self.traversal_cost, self.intersection_cost, self.empty_side_discount];
        if costs.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(Error::invalid("tree costs must be finite and non-negative"));
        }
        if self.intersection_cost == 0.0 {
            return Err(Error::invalid("intersection_cost must be positive"));
        }
        Ok(())
    }
}

/// Piece of a scene polygon stored in a leaf.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub source: PolygonId,
    pub vertices: SmallVec<[DVec3; 6]>,
    pub bbox: BoundingBox,
}

impl Fragment {
    pub fn new(source: PolygonId, vertices: impl IntoIterator<Item = DVec3>) -> Self {
        let vertices: SmallVec<[DVec3; 6]> = vertices.into_iter().collect();
        let bbox = BoundingBox::from_points(vertices.iter().copied());
        Self { source, vertices, bbox }
    }
}

/// A node of the partition.
#[derive(Debug, Clone)]
pub struct Node {
    pub bbox: BoundingBox,
    pub depth: u32,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 2]>,
    /// Indices into [`SpacePartition::fragments`], leaves only
    pub fragments: Vec<u32>,
}

impl Node {
    fn new(bbox: BoundingBox, depth: u32, parent: Option<NodeId>) -> Self {
        Self {
            bbox,
            depth,
            parent,
            children: SmallVec::new(),
            fragments: Vec::new(),
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// SAH-built binary tree over the polygons of a scene.
#[derive(Debug, Clone)]
pub struct SpacePartition {
    nodes: Vec<Node>,
    fragments: Vec<Fragment>,
    config: TreeConfig,
    polygon_count: usize,
}

impl SpacePartition {
    #[inline]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn root(&self) -> &Node {
        &self.nodes[ROOT as usize]
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    #[inline]
    pub fn fragment(&self, index: u32) -> &Fragment {
        &self.fragments[index as usize]
    }

    /// Number of polygons the tree was built from.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.polygon_count
    }

    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, n)| (i as NodeId, n))
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Distinct source polygons referenced by the leaves.
    pub fn covered_polygons(&self) -> BTreeSet<PolygonId> {
        self.leaves()
            .flat_map(|(_, leaf)| leaf.fragments.iter().map(|&f| self.fragments[f as usize].source))
            .collect()
    }

    /// Leaf whose box contains `p`, descending from the root.
    ///
    /// `None` when `p` is outside the root or falls in a gap between children.
    pub fn search_point(&self, p: DVec3) -> Option<NodeId> {
        let mut id = ROOT;
        if !self.nodes[id as usize].bbox.padded(EPS_BOX).contains_point(p) {
            return None;
        }
        loop {
            let node = &self.nodes[id as usize];
            if node.is_leaf() {
                return Some(id);
            }
            id = *node
                .children
                .iter()
                .find(|&&c| self.nodes[c as usize].bbox.padded(EPS_BOX).contains_point(p))?;
        }
    }
}

/// Per-query record of visited nodes.
///
/// Owned by the caller so the tree itself stays immutable and shareable.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    bits: Vec<u64>,
}

impl VisitedSet {
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
        }
    }

    /// Forget all visits, growing to hold `len` nodes.
    pub fn reset(&mut self, len: usize) {
        self.bits.clear();
        self.bits.resize(len.div_ceil(64), 0);
    }

    /// Mark `id`; returns `false` if it was already marked.
    #[inline]
    pub fn insert(&mut self, id: NodeId) -> bool {
        let (word, bit) = (id as usize / 64, id % 64);
        let mask = 1u64 << bit;
        let fresh = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        fresh
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        let (word, bit) = (id as usize / 64, id % 64);
        self.bits[word] & (1u64 << bit) != 0
    }
}

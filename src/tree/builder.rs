//! SAH construction of [`SpacePartition`].
//!
//! Each node tries `split_planes` evenly spaced planes per axis across the
//! tight box of its fragments and keeps the cheapest by surface area
//! heuristic. Fragments straddling the chosen plane are clipped into both
//! children. Construction runs off an explicit task stack.

use super::clip::split_loop;
use super::{Fragment, Node, NodeId, SpacePartition, TreeConfig};
use crate::scene::Scene;
use crate::util::{BoundingBox, Result};

/// Fragments poking less than this past a plane are kept on one side.
const EPS_SPLIT: f64 = 1e-6;

/// Axes narrower than this are not split.
const EPS_EXTENT: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Split {
    axis: usize,
    position: f64,
    cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Low,
    High,
    Both,
}

fn classify(fragment: &Fragment, axis: usize, position: f64) -> Side {
    if fragment.bbox.max[axis] <= position + EPS_SPLIT {
        Side::Low
    } else if fragment.bbox.min[axis] >= position - EPS_SPLIT {
        Side::High
    } else {
        Side::Both
    }
}

impl SpacePartition {
    /// Partition all polygons of `scene`.
    #[tracing::instrument(skip_all, fields(polygons = scene.polygon_count()))]
    pub fn from_scene(scene: &Scene, config: &TreeConfig) -> Result<Self> {
        config.validate()?;
        let fragments: Vec<Fragment> = scene
            .polygons()
            .map(|(id, _, view)| Fragment::new(id, view.positions()))
            .collect();
        let bbox = scene.bounding_box().unwrap_or(BoundingBox::EMPTY);
        let tree = Self::build(bbox, fragments, *config);
        tracing::debug!(
            nodes = tree.node_count(),
            leaves = tree.leaf_count(),
            depth = tree.depth(),
            fragments = tree.fragments.len(),
            "partition built"
        );
        Ok(tree)
    }

    /// Partition arbitrary fragments inside `bbox`.
    pub fn build(bbox: BoundingBox, fragments: Vec<Fragment>, config: TreeConfig) -> Self {
        let polygon_count = {
            let mut ids: Vec<_> = fragments.iter().map(|f| f.source).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        let mut tree = Self {
            nodes: vec![Node::new(bbox, 0, None)],
            fragments: Vec::with_capacity(fragments.len()),
            config,
            polygon_count,
        };

        struct Task {
            node: NodeId,
            fragments: Vec<Fragment>,
        }
        let mut stack = vec![Task { node: super::ROOT, fragments }];

        while let Some(task) = stack.pop() {
            let depth = tree.nodes[task.node as usize].depth;
            let split = tree.find_split(depth, &tree.nodes[task.node as usize].bbox, &task.fragments);
            let Some(split) = split else {
                tree.make_leaf(task.node, task.fragments);
                continue;
            };

            let (low, high) = partition(task.fragments, split.axis, split.position);
            let tight = BoundingBox::from_boxes(low.iter().chain(high.iter()).map(|f| &f.bbox));
            // children stay inside the parent so entry distances only grow on descent
            let low_box = tight.with_max(split.axis, (split.position + EPS_SPLIT).min(tight.max[split.axis]));
            let high_box = tight.with_min(split.axis, (split.position - EPS_SPLIT).max(tight.min[split.axis]));

            // high pushed first so the low side is built first
            for (bbox, fragments) in [(high_box, high), (low_box, low)] {
                if fragments.is_empty() {
                    continue;
                }
                let child = tree.nodes.len() as NodeId;
                tree.nodes.push(Node::new(bbox, depth + 1, Some(task.node)));
                tree.nodes[task.node as usize].children.push(child);
                stack.push(Task { node: child, fragments });
            }
            tree.nodes[task.node as usize].children.reverse();
        }
        tree
    }

    fn make_leaf(&mut self, node: NodeId, fragments: Vec<Fragment>) {
        let start = self.fragments.len() as u32;
        let count = fragments.len() as u32;
        self.fragments.extend(fragments);
        self.nodes[node as usize].fragments = (start..start + count).collect();
    }

    /// Cheapest candidate plane, if splitting beats testing every fragment.
    fn find_split(&self, depth: u32, node_box: &BoundingBox, fragments: &[Fragment]) -> Option<Split> {
        let cfg = &self.config;
        let count = fragments.len();
        if depth >= cfg.max_depth || count <= cfg.min_leaf_size {
            return None;
        }
        let node_area = node_box.area();
        if node_area <= 0.0 {
            return None;
        }

        let tight = BoundingBox::from_boxes(fragments.iter().map(|f| &f.bbox));
        let mut best: Option<Split> = None;
        for axis in 0..3 {
            let extent = tight.max[axis] - tight.min[axis];
            if extent <= EPS_EXTENT {
                continue;
            }
            let step = extent / (cfg.split_planes + 1) as f64;
            for i in 1..=cfg.split_planes {
                let position = tight.min[axis] + step * i as f64;
                let (mut low, mut high, mut both) = (0usize, 0usize, 0usize);
                for f in fragments {
                    match classify(f, axis, position) {
                        Side::Low => low += 1,
                        Side::High => high += 1,
                        Side::Both => both += 1,
                    }
                }
                let low_area = tight.with_max(axis, position).area();
                let high_area = tight.with_min(axis, position).area();
                let mut cost = (low + both) as f64 * low_area + (high + both) as f64 * high_area;
                if low == 0 || high == 0 {
                    cost *= cfg.empty_side_discount;
                }
                if best.map_or(true, |b| cost < b.cost) {
                    best = Some(Split { axis, position, cost });
                }
            }
        }

        let best = best?;
        let split_cost = cfg.traversal_cost + cfg.intersection_cost * best.cost / node_area;
        let leaf_cost = cfg.intersection_cost * count as f64;
        (split_cost < leaf_cost).then_some(best)
    }
}

/// Distribute fragments to the two sides, clipping the ones that straddle.
fn partition(fragments: Vec<Fragment>, axis: usize, position: f64) -> (Vec<Fragment>, Vec<Fragment>) {
    let mut low = Vec::new();
    let mut high = Vec::new();
    for fragment in fragments {
        match classify(&fragment, axis, position) {
            Side::Low => low.push(fragment),
            Side::High => high.push(fragment),
            Side::Both => {
                let (l, h) = split_loop(&fragment.vertices, axis, position);
                if !l.is_empty() {
                    low.push(Fragment::new(fragment.source, l));
                }
                if !h.is_empty() {
                    high.push(Fragment::new(fragment.source, h));
                }
            }
        }
    }
    (low, high)
}

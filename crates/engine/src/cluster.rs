//! Spatial cluster index over the active feature set.
//!
//! Supercluster-style greedy grid clustering: leaves are projected to
//! Web-Mercator world coordinates once per rebuild, then each zoom level
//! below `max_cluster_zoom` merges, from the bottom up, nodes of the level
//! above that fall within the pixel radius for that zoom. The result is an immutable
//! snapshot: queries never mutate it, and a feature-store change requires a
//! full rebuild (querying a stale index is a correctness bug upstream).
//!
//! Determinism: leaves are fed in stable feature-id order and clustering is
//! greedy in that order, so node ordering and `leaves_of` output are fixed
//! for a given active set.

use std::collections::HashMap;

use canopy_shared::geo::{self, LngLat};
use canopy_shared::models::TreeFeature;

use crate::viewport::Viewport;

/// Fixed per-deployment clustering parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// First zoom at which every feature is its own leaf; clusters form
    /// only below it.
    pub max_cluster_zoom: u8,
    /// Cluster radius in screen pixels.
    pub radius_px: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            max_cluster_zoom: 16,
            radius_px: 60.0,
        }
    }
}

/// A node visible at some zoom: either one feature or an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterNode {
    Point {
        feature_id: u64,
        position: LngLat,
    },
    Cluster {
        cluster_id: u64,
        point_count: u32,
        position: LngLat,
    },
}

impl ClusterNode {
    pub fn point_count(&self) -> u32 {
        match self {
            ClusterNode::Point { .. } => 1,
            ClusterNode::Cluster { point_count, .. } => *point_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeRef {
    Leaf(u64),
    Cluster(u64),
}

#[derive(Debug, Clone)]
struct IndexNode {
    x: f64,
    y: f64,
    count: u32,
    item: NodeRef,
}

#[derive(Debug)]
pub struct ClusterIndex {
    params: ClusterParams,
    /// `levels[z]` holds the nodes shown at integer zoom `z`;
    /// `levels[max_cluster_zoom]` is the leaf level.
    levels: Vec<Vec<IndexNode>>,
    /// Cluster id → direct children (refs into the level above).
    children: HashMap<u64, Vec<NodeRef>>,
}

impl ClusterIndex {
    /// Build an index over the given active features.
    ///
    /// An empty input yields an index with zero clusters, not an error.
    pub fn build<'a, I>(features: I, params: ClusterParams) -> Self
    where
        I: IntoIterator<Item = &'a TreeFeature>,
    {
        let leaves: Vec<IndexNode> = features
            .into_iter()
            .map(|f| {
                let (x, y) = geo::project(f.position);
                IndexNode {
                    x,
                    y,
                    count: 1,
                    item: NodeRef::Leaf(f.id),
                }
            })
            .collect();

        let leaf_zoom = params.max_cluster_zoom as usize;
        let mut levels = vec![Vec::new(); leaf_zoom + 1];
        let mut children = HashMap::new();
        let mut next_cluster_id = 0u64;

        levels[leaf_zoom] = leaves;
        for z in (0..leaf_zoom).rev() {
            let radius = geo::px_to_world(params.radius_px, z as f64);
            levels[z] = cluster_level(
                &levels[z + 1],
                radius,
                &mut next_cluster_id,
                &mut children,
            );
        }

        tracing::debug!(
            leaves = levels[leaf_zoom].len(),
            clusters = children.len(),
            "cluster index rebuilt"
        );

        Self {
            params,
            levels,
            children,
        }
    }

    pub fn params(&self) -> ClusterParams {
        self.params
    }

    /// Nodes falling inside the viewport at its (integer-floored) zoom.
    pub fn query_visible(&self, viewport: &Viewport) -> Vec<ClusterNode> {
        let leaf_zoom = self.params.max_cluster_zoom as usize;
        let z = (viewport.zoom.floor().max(0.0) as usize).min(leaf_zoom);
        let (min_x, min_y, max_x, max_y) = viewport.bounds.to_world();

        self.levels[z]
            .iter()
            .filter(|n| n.x >= min_x && n.x <= max_x && n.y >= min_y && n.y <= max_y)
            .map(|n| {
                let position = geo::unproject(n.x, n.y);
                match n.item {
                    NodeRef::Leaf(feature_id) => ClusterNode::Point {
                        feature_id,
                        position,
                    },
                    NodeRef::Cluster(cluster_id) => ClusterNode::Cluster {
                        cluster_id,
                        point_count: n.count,
                        position,
                    },
                }
            })
            .collect()
    }

    /// All leaf feature ids under a cluster, in deterministic build order.
    ///
    /// Read-only against the snapshot, so overlapping calls for the same id
    /// are safe. Unknown ids (from an older snapshot) yield an empty list.
    pub fn leaves_of(&self, cluster_id: u64) -> Vec<u64> {
        let mut out = Vec::new();
        let mut stack = vec![NodeRef::Cluster(cluster_id)];
        while let Some(item) = stack.pop() {
            match item {
                NodeRef::Leaf(id) => out.push(id),
                NodeRef::Cluster(id) => {
                    if let Some(kids) = self.children.get(&id) {
                        // Reversed so the DFS emits children in build order
                        for child in kids.iter().rev() {
                            stack.push(*child);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.levels.last().map(|l| l.is_empty()).unwrap_or(true)
    }
}

fn grid_cell(x: f64, y: f64, radius: f64) -> (i64, i64) {
    ((x / radius).floor() as i64, (y / radius).floor() as i64)
}

/// Merge one level's nodes into the next-lower zoom level.
///
/// Greedy in input order: each unclaimed node absorbs every unclaimed
/// neighbor within `radius`, forming a cluster when it absorbs at least one.
fn cluster_level(
    prev: &[IndexNode],
    radius: f64,
    next_cluster_id: &mut u64,
    children: &mut HashMap<u64, Vec<NodeRef>>,
) -> Vec<IndexNode> {
    if prev.is_empty() {
        return Vec::new();
    }

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, n) in prev.iter().enumerate() {
        grid.entry(grid_cell(n.x, n.y, radius)).or_default().push(i);
    }

    let r2 = radius * radius;
    let mut claimed = vec![false; prev.len()];
    let mut out = Vec::with_capacity(prev.len());

    for i in 0..prev.len() {
        if claimed[i] {
            continue;
        }
        claimed[i] = true;

        let (cx, cy) = grid_cell(prev[i].x, prev[i].y, radius);
        let mut members = vec![i];
        for dx in -1..=1i64 {
            for dy in -1..=1i64 {
                let Some(bucket) = grid.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &j in bucket {
                    if claimed[j] {
                        continue;
                    }
                    let ddx = prev[i].x - prev[j].x;
                    let ddy = prev[i].y - prev[j].y;
                    if ddx * ddx + ddy * ddy <= r2 {
                        claimed[j] = true;
                        members.push(j);
                    }
                }
            }
        }

        if members.len() == 1 {
            // Isolated node passes up unchanged (a cluster formed at a
            // higher zoom keeps its id and children).
            out.push(prev[i].clone());
        } else {
            let total: u32 = members.iter().map(|&j| prev[j].count).sum();
            let wx: f64 = members
                .iter()
                .map(|&j| prev[j].x * prev[j].count as f64)
                .sum::<f64>()
                / total as f64;
            let wy: f64 = members
                .iter()
                .map(|&j| prev[j].y * prev[j].count as f64)
                .sum::<f64>()
                / total as f64;

            let id = *next_cluster_id;
            *next_cluster_id += 1;
            children.insert(id, members.iter().map(|&j| prev[j].item).collect());
            out.push(IndexNode {
                x: wx,
                y: wy,
                count: total,
                item: NodeRef::Cluster(id),
            });
        }
    }

    out
}

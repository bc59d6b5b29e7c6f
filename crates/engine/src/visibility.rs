//! Visibility aggregation: which species are on screen, and how many of
//! each.
//!
//! Recomputed from scratch on every settled viewport and after every store
//! mutation; the summary is fully replaced, never patched, so there is no
//! stale partial state to reconcile.

use std::collections::{HashMap, HashSet};

use crate::cluster::{ClusterIndex, ClusterNode};
use crate::store::FeatureStore;
use crate::viewport::Viewport;

/// One on-screen species bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesGroup {
    pub name: String,
    pub members: Vec<u64>,
}

/// Species groups sorted by descending member count; ties keep the order in
/// which groups were first encountered in the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilitySummary {
    pub groups: Vec<SpeciesGroup>,
}

impl VisibilitySummary {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, name: &str) -> Option<&SpeciesGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Aggregate the visible nodes for `viewport` into a species summary.
///
/// Clusters are expanded to their leaves; features reachable through more
/// than one node are counted once (dedup by feature id).
pub fn recompute(
    index: &ClusterIndex,
    store: &FeatureStore,
    viewport: &Viewport,
) -> VisibilitySummary {
    let mut seen: HashSet<u64> = HashSet::new();
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<SpeciesGroup> = Vec::new();

    for node in index.query_visible(viewport) {
        let leaf_ids: Vec<u64> = match node {
            ClusterNode::Point { feature_id, .. } => vec![feature_id],
            ClusterNode::Cluster { cluster_id, .. } => index.leaves_of(cluster_id),
        };
        for id in leaf_ids {
            if !seen.insert(id) {
                continue;
            }
            // Leaves come from the index built over the active set; a miss
            // here means the caller queried a stale index.
            let Some(feature) = store.get(id).filter(|f| f.active) else {
                continue;
            };
            match order.get(&feature.common_name) {
                Some(&slot) => groups[slot].members.push(id),
                None => {
                    order.insert(feature.common_name.clone(), groups.len());
                    groups.push(SpeciesGroup {
                        name: feature.common_name.clone(),
                        members: vec![id],
                    });
                }
            }
        }
    }

    // Stable sort: equal counts keep first-encountered order
    groups.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
    VisibilitySummary { groups }
}

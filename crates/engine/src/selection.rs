//! Species selection and highlight filtering.
//!
//! At most one species is highlighted at a time. Whenever the viewport
//! settles or the feature set changes while a selection is active, the point
//! filter (matching features) and the cluster filter (visible clusters
//! containing at least one match) are recomputed together and swapped in as
//! one unit, so the map never renders a frame where only one of them has
//! been updated.

use std::collections::HashSet;

use crate::cluster::{ClusterIndex, ClusterNode};
use crate::store::FeatureStore;
use crate::viewport::Viewport;

/// Predicate state for the map surface: which points and which clusters to
/// draw highlighted. `HighlightFilter::none()` matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightFilter {
    pub species: Option<String>,
    pub point_ids: HashSet<u64>,
    pub cluster_ids: HashSet<u64>,
}

impl HighlightFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn matches_point(&self, feature_id: u64) -> bool {
        self.point_ids.contains(&feature_id)
    }

    pub fn matches_cluster(&self, cluster_id: u64) -> bool {
        self.cluster_ids.contains(&cluster_id)
    }
}

#[derive(Debug, Default)]
pub struct SelectionController {
    selected: Option<String>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Toggle semantics: selecting the current key clears it, anything else
    /// replaces it. Returns the selection now in effect.
    pub fn select(&mut self, species: &str) -> Option<&str> {
        if self.selected.as_deref() == Some(species) {
            self.selected = None;
        } else {
            self.selected = Some(species.to_string());
        }
        self.selected()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Recompute both highlight filters against the current index snapshot.
    ///
    /// Every visible cluster is expanded exactly once; both sets are built
    /// before anything is returned, which is what makes the swap atomic for
    /// the caller.
    pub fn recompute(
        &self,
        index: &ClusterIndex,
        store: &FeatureStore,
        viewport: &Viewport,
    ) -> HighlightFilter {
        let Some(species) = self.selected.as_deref() else {
            return HighlightFilter::none();
        };

        let point_ids: HashSet<u64> = store
            .active()
            .filter(|f| f.common_name == species)
            .map(|f| f.id)
            .collect();

        let mut cluster_ids = HashSet::new();
        for node in index.query_visible(viewport) {
            if let ClusterNode::Cluster { cluster_id, .. } = node {
                let contains_match = index
                    .leaves_of(cluster_id)
                    .iter()
                    .any(|id| point_ids.contains(id));
                if contains_match {
                    cluster_ids.insert(cluster_id);
                }
            }
        }

        HighlightFilter {
            species: Some(species.to_string()),
            point_ids,
            cluster_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterParams;
    use canopy_shared::geo::{LngLat, LngLatBounds};
    use canopy_shared::models::TreeFeature;

    fn tree(id: u64, name: &str, lng: f64, lat: f64) -> TreeFeature {
        TreeFeature {
            id,
            tree_id: format!("t-{id}"),
            position: LngLat::new(lng, lat),
            common_name: name.to_string(),
            latin_name: None,
            family: None,
            is_native: None,
            source: "test".to_string(),
            active: true,
            created_at: None,
            removed_at: None,
            removed_by: None,
        }
    }

    fn setup() -> (ClusterIndex, FeatureStore) {
        let mut store = FeatureStore::new();
        store.replace_all(vec![
            tree(1, "Oak", -71.0, 42.0),
            tree(2, "Oak", -71.0001, 42.0001),
            tree(3, "Maple", -72.0, 43.0),
        ]);
        let index = ClusterIndex::build(store.active(), ClusterParams::default());
        (index, store)
    }

    fn world_view(zoom: f64) -> Viewport {
        Viewport {
            bounds: LngLatBounds::world(),
            zoom,
        }
    }

    #[test]
    fn test_select_toggle_clears() {
        let mut sel = SelectionController::new();
        assert_eq!(sel.select("Oak"), Some("Oak"));
        assert_eq!(sel.select("Oak"), None);
        assert_eq!(sel.selected(), None);
    }

    #[test]
    fn test_select_replaces_other_key() {
        let mut sel = SelectionController::new();
        sel.select("Oak");
        assert_eq!(sel.select("Maple"), Some("Maple"));
    }

    #[test]
    fn test_no_selection_matches_nothing() {
        let (index, store) = setup();
        let sel = SelectionController::new();
        let filter = sel.recompute(&index, &store, &world_view(10.0));
        assert!(filter.point_ids.is_empty());
        assert!(filter.cluster_ids.is_empty());
    }

    #[test]
    fn test_filters_are_mutually_consistent() {
        let (index, store) = setup();
        let mut sel = SelectionController::new();
        sel.select("Oak");
        let viewport = world_view(10.0);
        let filter = sel.recompute(&index, &store, &viewport);

        assert_eq!(filter.point_ids, HashSet::from([1, 2]));
        // Every flagged cluster contains a matching leaf, and every cluster
        // containing a matching leaf is flagged
        for node in index.query_visible(&viewport) {
            if let ClusterNode::Cluster { cluster_id, .. } = node {
                let has_match = index
                    .leaves_of(cluster_id)
                    .iter()
                    .any(|id| filter.point_ids.contains(id));
                assert_eq!(filter.matches_cluster(cluster_id), has_match);
            }
        }
        assert!(!filter.cluster_ids.is_empty(), "Oak pair clusters at z=10");
    }

    #[test]
    fn test_clear_resets_filters() {
        let (index, store) = setup();
        let mut sel = SelectionController::new();
        sel.select("Maple");
        sel.clear();
        let filter = sel.recompute(&index, &store, &world_view(10.0));
        assert_eq!(filter, HighlightFilter::none());
    }

    #[test]
    fn test_inactive_features_never_highlighted() {
        let (_, mut store) = setup();
        store.set_active(2, false);
        let index = ClusterIndex::build(store.active(), ClusterParams::default());
        let mut sel = SelectionController::new();
        sel.select("Oak");
        let filter = sel.recompute(&index, &store, &world_view(10.0));
        assert_eq!(filter.point_ids, HashSet::from([1]));
    }
}

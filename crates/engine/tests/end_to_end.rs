//! End-to-end engine scenarios against a mock backend.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use canopy_engine::{
    ApiError, ClusterParams, EngineError, MapEngine, TreeApi, Viewport, ViewportTracker,
};
use canopy_shared::geo::{LngLat, LngLatBounds};
use canopy_shared::models::{TreeCandidate, TreeFeature};

fn tree(id: u64, name: &str, lng: f64, lat: f64) -> TreeFeature {
    TreeFeature {
        id,
        tree_id: format!("t-{id}"),
        position: LngLat::new(lng, lat),
        common_name: name.to_string(),
        latin_name: None,
        family: None,
        is_native: None,
        source: "survey".to_string(),
        active: true,
        created_at: None,
        removed_at: None,
        removed_by: None,
    }
}

/// Mock backend holding a mutable tree list; can be switched to fail all
/// writes.
struct MockBackend {
    trees: Mutex<Vec<TreeFeature>>,
    next_id: AtomicU64,
    fail_writes: AtomicBool,
}

impl MockBackend {
    fn with_trees(trees: Vec<TreeFeature>) -> Arc<Self> {
        let next = trees.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        Arc::new(Self {
            trees: Mutex::new(trees),
            next_id: AtomicU64::new(next),
            fail_writes: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TreeApi for MockBackend {
    async fn fetch_trees(&self) -> Result<Vec<TreeFeature>, ApiError> {
        Ok(self.trees.lock().unwrap().clone())
    }

    async fn create_tree(&self, candidate: &TreeCandidate) -> Result<TreeFeature, ApiError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::Http {
                status: 500,
                message: "create failed".to_string(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let feature = TreeFeature {
            id,
            tree_id: candidate
                .tree_id
                .clone()
                .unwrap_or_else(|| format!("srv-{id}")),
            position: candidate.position,
            common_name: candidate.common_name.clone(),
            latin_name: candidate.latin_name.clone(),
            family: candidate.family.clone(),
            is_native: candidate.is_native,
            source: candidate.source.clone(),
            active: true,
            created_at: None,
            removed_at: None,
            removed_by: None,
        };
        self.trees.lock().unwrap().push(feature.clone());
        Ok(feature)
    }

    async fn remove_tree(&self, location_id: u64, removed_by: &str) -> Result<(), ApiError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::Http {
                status: 502,
                message: "remove failed".to_string(),
            });
        }
        let mut trees = self.trees.lock().unwrap();
        match trees.iter_mut().find(|t| t.id == location_id) {
            Some(t) => {
                t.active = false;
                t.removed_by = Some(removed_by.to_string());
                Ok(())
            }
            None => Err(ApiError::Http {
                status: 404,
                message: "no such tree".to_string(),
            }),
        }
    }
}

fn world_view(zoom: f64) -> Viewport {
    Viewport {
        bounds: LngLatBounds::world(),
        zoom,
    }
}

fn seed() -> Vec<TreeFeature> {
    vec![
        tree(1, "Oak", -71.0, 42.0),
        tree(2, "Oak", -71.0001, 42.0001),
        tree(3, "Maple", -72.0, 43.0),
    ]
}

#[tokio::test]
async fn test_full_scenario_cluster_select_remove() {
    let backend = MockBackend::with_trees(seed());
    let mut engine = MapEngine::new(Arc::clone(&backend), ClusterParams::default());
    assert_eq!(engine.load().await.unwrap(), 3);

    // Zoom where trees 1 and 2 cluster together
    let update = engine.on_viewport_settled(world_view(10.0));
    let names: Vec<(&str, usize)> = update
        .summary
        .groups
        .iter()
        .map(|g| (g.name.as_str(), g.members.len()))
        .collect();
    assert_eq!(names, vec![("Oak", 2), ("Maple", 1)]);

    // Selecting Oak highlights the cluster and no standalone point node
    let update = engine.select_species("Oak");
    assert_eq!(update.highlight.cluster_ids.len(), 1);
    let data = engine.layer_data();
    let highlighted_points: Vec<_> = data["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| {
            f["properties"]["cluster"] == false && f["properties"]["highlighted"] == true
        })
        .collect();
    assert!(highlighted_points.is_empty());

    // Successful remove of tree 2: the pair dissolves to a lone Oak leaf
    engine.remove_tree(2, "ranger").await.unwrap();
    assert_eq!(engine.summary().group("Oak").unwrap().members, vec![1]);
    let data = engine.layer_data();
    let clusters: Vec<_> = data["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["properties"]["cluster"] == true)
        .collect();
    assert!(clusters.is_empty(), "no cluster remains at z=10");

    // Highlight followed the mutation atomically
    assert!(engine.highlight().matches_point(1));
    assert!(!engine.highlight().matches_point(2));
}

#[tokio::test]
async fn test_select_twice_clears_highlight() {
    let backend = MockBackend::with_trees(seed());
    let mut engine = MapEngine::new(backend, ClusterParams::default());
    engine.load().await.unwrap();
    engine.on_viewport_settled(world_view(10.0));

    engine.select_species("Oak");
    let update = engine.select_species("Oak");
    assert_eq!(engine.selected_species(), None);
    assert!(update.highlight.point_ids.is_empty());
    assert!(update.highlight.cluster_ids.is_empty());
}

#[tokio::test]
async fn test_failed_add_leaves_no_phantom_feature() {
    let backend = MockBackend::with_trees(seed());
    let mut engine = MapEngine::new(Arc::clone(&backend), ClusterParams::default());
    engine.load().await.unwrap();
    engine.on_viewport_settled(world_view(10.0));

    backend.fail_writes.store(true, Ordering::SeqCst);
    let err = engine
        .add_tree(TreeCandidate {
            tree_id: None,
            position: LngLat::new(-70.5, 41.5),
            common_name: "Birch".to_string(),
            latin_name: None,
            family: None,
            is_native: None,
            source: "alice".to_string(),
        })
        .await;
    assert!(matches!(err, Err(EngineError::Remote(_))));
    assert_eq!(engine.store().len(), 3);
    assert!(engine.summary().group("Birch").is_none());
}

#[tokio::test]
async fn test_failed_remove_keeps_tree_visible() {
    let backend = MockBackend::with_trees(seed());
    let mut engine = MapEngine::new(Arc::clone(&backend), ClusterParams::default());
    engine.load().await.unwrap();
    engine.on_viewport_settled(world_view(10.0));

    backend.fail_writes.store(true, Ordering::SeqCst);
    let err = engine.remove_tree(3, "ranger").await;
    assert!(matches!(err, Err(EngineError::Remote(_))));
    assert!(engine.store().get(3).unwrap().active);
    assert_eq!(engine.summary().group("Maple").unwrap().members, vec![3]);
}

#[tokio::test]
async fn test_successful_add_appears_in_summary() {
    let backend = MockBackend::with_trees(seed());
    let mut engine = MapEngine::new(backend, ClusterParams::default());
    engine.load().await.unwrap();
    engine.on_viewport_settled(world_view(10.0));

    let feature = engine
        .add_tree(TreeCandidate {
            tree_id: None,
            position: LngLat::new(-70.5, 41.5),
            common_name: "Birch".to_string(),
            latin_name: Some("Betula".to_string()),
            family: None,
            is_native: Some(true),
            source: "alice".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(feature.id, 4);
    assert_eq!(engine.summary().group("Birch").unwrap().members, vec![4]);
}

#[tokio::test(start_paused = true)]
async fn test_tracker_drives_engine_with_final_viewport_only() {
    let backend = MockBackend::with_trees(seed());
    let mut engine = MapEngine::new(backend, ClusterParams::default());
    engine.load().await.unwrap();

    let tracker = ViewportTracker::new();
    let mut settled = tracker.subscribe();

    // A pan burst ending on a viewport that only contains the Maple
    for step in 0..10 {
        let west = -72.5 + step as f64 * 0.01;
        tracker.on_map_event(Viewport {
            bounds: LngLatBounds::new(west, 42.5, west + 1.0, 43.5),
            zoom: 14.0,
        });
        tokio::time::advance(Duration::from_millis(20)).await;
    }
    tokio::time::advance(Duration::from_millis(400)).await;

    let viewport = settled.recv().await.unwrap();
    assert!(settled.try_recv().is_err(), "burst coalesced to one settle");

    let update = engine.on_viewport_settled(viewport);
    assert_eq!(update.summary.groups.len(), 1);
    assert_eq!(update.summary.groups[0].name, "Maple");
}

#[tokio::test]
async fn test_stale_leaf_lookup_is_discarded() {
    let backend = MockBackend::with_trees(seed());
    let mut engine = MapEngine::new(backend, ClusterParams::default());
    engine.load().await.unwrap();
    engine.on_viewport_settled(world_view(10.0));

    // Start derived work against the current snapshot...
    let token = engine.token();
    let index = engine.index();
    let cluster_id = engine.layer_data()["features"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["properties"]["cluster"] == true)
        .map(|f| f["properties"]["clusterId"].as_u64().unwrap())
        .unwrap();

    // ...then the store changes underneath it
    engine.remove_tree(2, "ranger").await.unwrap();

    let leaves = index.leaves_of(cluster_id);
    assert_eq!(leaves, vec![1, 2], "snapshot stays internally consistent");
    assert!(
        !engine.is_current(token),
        "result must be discarded instead of applied"
    );
}

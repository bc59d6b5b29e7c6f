//! Engine facade: owns the store, the derived cluster index, the selection,
//! and the interaction state, and keeps them consistent.
//!
//! Single logical thread of control: the host holds the engine exclusively
//! and drives it with settled viewports, pointer intents, and edit calls.
//! Every store mutation rebuilds the index before anything derived is
//! recomputed, and the summary and highlight filters are always recomputed
//! as a pair so the map never sees them disagree.

use std::sync::Arc;

use canopy_shared::models::{TreeCandidate, TreeFeature};

use crate::client::TreeApi;
use crate::cluster::{ClusterIndex, ClusterNode, ClusterParams};
use crate::edit::EditCoordinator;
use crate::error::EngineError;
use crate::interact::InteractionMediator;
use crate::selection::{HighlightFilter, SelectionController};
use crate::store::FeatureStore;
use crate::viewport::Viewport;
use crate::visibility::{self, VisibilitySummary};

/// Epoch marker captured before starting async derived work. Results whose
/// token is no longer current must be discarded, not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessToken(u64);

/// The pair of derived outputs, always replaced together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineUpdate {
    pub summary: VisibilitySummary,
    pub highlight: HighlightFilter,
}

pub struct MapEngine<A: TreeApi> {
    api: Arc<A>,
    params: ClusterParams,
    store: FeatureStore,
    index: Arc<ClusterIndex>,
    viewport: Option<Viewport>,
    selection: SelectionController,
    mediator: InteractionMediator,
    edits: EditCoordinator<A>,
    epoch: u64,
    summary: VisibilitySummary,
    highlight: HighlightFilter,
}

impl<A: TreeApi> MapEngine<A> {
    pub fn new(api: Arc<A>, params: ClusterParams) -> Self {
        Self {
            api: Arc::clone(&api),
            params,
            store: FeatureStore::new(),
            index: Arc::new(ClusterIndex::build([], params)),
            viewport: None,
            selection: SelectionController::new(),
            mediator: InteractionMediator::new(),
            edits: EditCoordinator::new(api),
            epoch: 0,
            summary: VisibilitySummary::default(),
            highlight: HighlightFilter::none(),
        }
    }

    /// Fetch the feature list from the backend and build the initial index.
    pub async fn load(&mut self) -> Result<usize, EngineError> {
        let trees = self.api.fetch_trees().await?;
        let count = trees.len();
        self.store.replace_all(trees);
        self.rebuild();
        self.recompute();
        tracing::info!(count, "initial tree set loaded");
        Ok(count)
    }

    // --- derived-state consistency ---

    pub fn token(&self) -> StalenessToken {
        StalenessToken(self.epoch)
    }

    pub fn is_current(&self, token: StalenessToken) -> bool {
        token.0 == self.epoch
    }

    /// Current index snapshot. Callers doing overlapping `leaves_of` work
    /// should hold this Arc plus a token and drop their results if the
    /// token has gone stale by the time they finish.
    pub fn index(&self) -> Arc<ClusterIndex> {
        Arc::clone(&self.index)
    }

    fn rebuild(&mut self) {
        self.index = Arc::new(ClusterIndex::build(self.store.active(), self.params));
        self.epoch += 1;
    }

    /// Recompute summary and highlight together against the current index.
    fn recompute(&mut self) -> EngineUpdate {
        match self.viewport {
            Some(viewport) => {
                self.summary = visibility::recompute(&self.index, &self.store, &viewport);
                self.highlight = self.selection.recompute(&self.index, &self.store, &viewport);
            }
            None => {
                self.summary = VisibilitySummary::default();
                self.highlight = HighlightFilter::none();
            }
        }
        EngineUpdate {
            summary: self.summary.clone(),
            highlight: self.highlight.clone(),
        }
    }

    // --- viewport ---

    /// A debounced viewport settle from the tracker.
    pub fn on_viewport_settled(&mut self, viewport: Viewport) -> EngineUpdate {
        self.viewport = Some(viewport);
        self.epoch += 1;
        self.recompute()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    // --- selection ---

    /// Toggle the highlighted species (selecting it again clears it).
    pub fn select_species(&mut self, species: &str) -> EngineUpdate {
        self.selection.select(species);
        self.recompute()
    }

    pub fn clear_selection(&mut self) -> EngineUpdate {
        self.selection.clear();
        self.recompute()
    }

    pub fn selected_species(&self) -> Option<&str> {
        self.selection.selected()
    }

    // --- edits ---

    /// Validate, create remotely, and (on success) fold the canonical
    /// feature into the store, index, and derived outputs.
    pub async fn add_tree(&mut self, candidate: TreeCandidate) -> Result<TreeFeature, EngineError> {
        let feature = self.edits.add(&mut self.store, candidate).await?;
        self.rebuild();
        self.recompute();
        Ok(feature)
    }

    /// Soft-remove a tree; rolls back and re-surfaces the error on failure.
    pub async fn remove_tree(&mut self, feature_id: u64, actor: &str) -> Result<(), EngineError> {
        self.edits.remove(&mut self.store, feature_id, actor).await?;
        self.rebuild();
        self.recompute();
        Ok(())
    }

    // --- reads ---

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn summary(&self) -> &VisibilitySummary {
        &self.summary
    }

    pub fn highlight(&self) -> &HighlightFilter {
        &self.highlight
    }

    pub fn mediator(&mut self) -> &mut InteractionMediator {
        &mut self.mediator
    }

    /// GeoJSON FeatureCollection of the visible nodes for the map surface,
    /// with highlight flags baked in.
    pub fn layer_data(&self) -> serde_json::Value {
        let features: Vec<serde_json::Value> = match self.viewport {
            None => Vec::new(),
            Some(viewport) => self
                .index
                .query_visible(&viewport)
                .into_iter()
                .map(|node| match node {
                    ClusterNode::Point {
                        feature_id,
                        position,
                    } => {
                        let name = self
                            .store
                            .get(feature_id)
                            .map(|f| f.common_name.as_str())
                            .unwrap_or_default();
                        serde_json::json!({
                            "type": "Feature",
                            "geometry": {
                                "type": "Point",
                                "coordinates": [position.lng, position.lat],
                            },
                            "properties": {
                                "id": feature_id,
                                "commonName": name,
                                "cluster": false,
                                "highlighted": self.highlight.matches_point(feature_id),
                            },
                        })
                    }
                    ClusterNode::Cluster {
                        cluster_id,
                        point_count,
                        position,
                    } => serde_json::json!({
                        "type": "Feature",
                        "geometry": {
                            "type": "Point",
                            "coordinates": [position.lng, position.lat],
                        },
                        "properties": {
                            "clusterId": cluster_id,
                            "pointCount": point_count,
                            "cluster": true,
                            "highlighted": self.highlight.matches_cluster(cluster_id),
                        },
                    }),
                })
                .collect(),
        };
        serde_json::json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

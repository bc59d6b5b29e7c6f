//! Add/remove editing against the backend.
//!
//! Adds are validated locally, sent to the backend, and appended to the
//! store only when the server accepts them, so the store can never hold a
//! feature the server rejected. Removes flip the active flag optimistically
//! and restore the captured snapshot if the remote call fails.
//!
//! Edits are serialized structurally: both operations hold `&mut
//! FeatureStore` across the await, so a second edit for the same feature
//! cannot start while one is outstanding. A remove submitted for an
//! already-removed feature is rejected before any network call.

use std::sync::Arc;
use std::time::Instant;

use canopy_shared::models::{TreeCandidate, TreeFeature};

use crate::client::TreeApi;
use crate::error::EngineError;
use crate::store::FeatureStore;

/// In-flight edit record, kept only for rollback.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    pub snapshot: Option<TreeFeature>,
    pub operation: EditOp,
    pub submitted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOp {
    Add,
    Remove,
}

pub struct EditCoordinator<A: TreeApi> {
    api: Arc<A>,
}

impl<A: TreeApi> EditCoordinator<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Validate and create a tree. On success the canonical feature is in
    /// the store; on any failure the store is exactly as it was.
    pub async fn add(
        &self,
        store: &mut FeatureStore,
        candidate: TreeCandidate,
    ) -> Result<TreeFeature, EngineError> {
        validate_candidate(&candidate)?;

        let pending = PendingEdit {
            snapshot: None,
            operation: EditOp::Add,
            submitted_at: Instant::now(),
        };
        let created = self.api.create_tree(&candidate).await;
        let elapsed_ms = pending.submitted_at.elapsed().as_millis() as u64;

        match created {
            Ok(feature) => {
                tracing::info!(
                    id = feature.id,
                    species = %feature.common_name,
                    elapsed_ms,
                    "tree added"
                );
                store.insert(feature.clone());
                Ok(feature)
            }
            Err(err) => {
                tracing::warn!(error = %err, elapsed_ms, "tree create rejected");
                Err(err.into())
            }
        }
    }

    /// Soft-remove a tree. The active flag flips immediately; a remote
    /// failure rolls the flag back and surfaces the error.
    pub async fn remove(
        &self,
        store: &mut FeatureStore,
        feature_id: u64,
        actor: &str,
    ) -> Result<(), EngineError> {
        if actor.trim().is_empty() {
            return Err(EngineError::Validation(
                "an identity is required to remove a tree".to_string(),
            ));
        }
        let snapshot = store
            .get(feature_id)
            .cloned()
            .ok_or(EngineError::UnknownFeature(feature_id))?;
        if !snapshot.active {
            return Err(EngineError::Validation(format!(
                "tree {feature_id} is already removed"
            )));
        }

        let pending = PendingEdit {
            snapshot: Some(snapshot),
            operation: EditOp::Remove,
            submitted_at: Instant::now(),
        };

        // Optimistic: hide the tree while the call is out
        store.set_active(feature_id, false);
        let result = self.api.remove_tree(feature_id, actor).await;

        match result {
            Ok(()) => {
                tracing::info!(id = feature_id, actor, "tree removed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(id = feature_id, error = %err, "remove failed, rolling back");
                if let Some(snapshot) = pending.snapshot {
                    store.restore(snapshot);
                }
                Err(err.into())
            }
        }
    }
}

/// Local validation, ahead of any network call.
fn validate_candidate(candidate: &TreeCandidate) -> Result<(), EngineError> {
    if candidate.common_name.trim().is_empty() {
        return Err(EngineError::Validation(
            "a species must be selected".to_string(),
        ));
    }
    if candidate.source.trim().is_empty() {
        return Err(EngineError::Validation(
            "an identity is required to add a tree".to_string(),
        ));
    }
    Ok(())
}

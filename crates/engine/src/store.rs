//! The feature store: single source of truth for the current tree set.
//!
//! Only the edit coordinator mutates it (add, soft-remove, rollback); every
//! other component reads. Soft-removed features stay in the map with
//! `active = false` so a failed remote remove can restore them and so the
//! host can show an audit view.

use std::collections::BTreeMap;

use canopy_shared::models::TreeFeature;

#[derive(Debug, Default)]
pub struct FeatureStore {
    // BTreeMap keeps iteration order stable across rebuilds, which the
    // cluster index relies on for deterministic leaf ordering.
    features: BTreeMap<u64, TreeFeature>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set (initial load).
    pub fn replace_all(&mut self, features: Vec<TreeFeature>) {
        self.features = features.into_iter().map(|f| (f.id, f)).collect();
    }

    /// Insert or overwrite one feature.
    pub fn insert(&mut self, feature: TreeFeature) {
        self.features.insert(feature.id, feature);
    }

    pub fn get(&self, id: u64) -> Option<&TreeFeature> {
        self.features.get(&id)
    }

    /// Flip the active flag; returns false if the id is unknown.
    pub fn set_active(&mut self, id: u64, active: bool) -> bool {
        match self.features.get_mut(&id) {
            Some(f) => {
                f.active = active;
                true
            }
            None => false,
        }
    }

    /// Restore a previously captured snapshot of one feature (rollback).
    pub fn restore(&mut self, snapshot: TreeFeature) {
        self.features.insert(snapshot.id, snapshot);
    }

    /// Active features in stable id order.
    pub fn active(&self) -> impl Iterator<Item = &TreeFeature> {
        self.features.values().filter(|f| f.active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

use serde::{Deserialize, Serialize};

use crate::geo::LngLat;

/// A single mapped tree.
///
/// `id` is assigned by the backend and is stable for the lifetime of the
/// record. `active = false` marks a soft-removed tree: it is kept for audit
/// but excluded from clustering, visibility, and selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeFeature {
    pub id: u64,
    /// External registry id (UUID string), assigned server-side when the
    /// submitted candidate does not carry one.
    pub tree_id: String,
    pub position: LngLat,
    pub common_name: String,
    pub latin_name: Option<String>,
    pub family: Option<String>,
    pub is_native: Option<bool>,
    /// Who or what contributed this record (survey name, user identity).
    pub source: String,
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub removed_at: Option<String>,
    #[serde(default)]
    pub removed_by: Option<String>,
}

/// User-submitted tree data, prior to server-side identity assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeCandidate {
    #[serde(default)]
    pub tree_id: Option<String>,
    pub position: LngLat,
    pub common_name: String,
    #[serde(default)]
    pub latin_name: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub is_native: Option<bool>,
    pub source: String,
}

/// Body of `PUT /trees/remove/{location_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRequest {
    pub removed_by: String,
}

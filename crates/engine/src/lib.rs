//! Viewport-driven spatial clustering and selection engine for the Canopy
//! tree map.
//!
//! The engine maintains a clustered spatial index over a mutable set of tree
//! features, recomputes what is visible whenever the viewport settles,
//! tracks a single highlighted species across viewport and data changes,
//! mediates pointer interactions (popups, double-tap add, confirmed remove),
//! and executes edits against the backend with rollback on failure.

pub mod client;
pub mod cluster;
pub mod edit;
pub mod engine;
pub mod error;
pub mod interact;
pub mod selection;
pub mod store;
pub mod viewport;
pub mod visibility;

pub use client::{HttpTreeApi, TreeApi};
pub use cluster::{ClusterIndex, ClusterNode, ClusterParams};
pub use engine::{EngineUpdate, MapEngine, StalenessToken};
pub use error::{ApiError, EngineError};
pub use interact::{InteractionMediator, MediatorAction, PointerTarget};
pub use selection::{HighlightFilter, SelectionController};
pub use store::FeatureStore;
pub use viewport::{Viewport, ViewportTracker};
pub use visibility::{SpeciesGroup, VisibilitySummary};

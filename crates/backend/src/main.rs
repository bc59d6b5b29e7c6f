mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use canopy_shared::models::{RemoveRequest, TreeCandidate, TreeFeature};
use storage::Storage;

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    include_removed: bool,
}

async fn list_trees(
    State(storage): State<Arc<Storage>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<TreeFeature>>, (StatusCode, String)> {
    let trees = storage
        .list_trees(params.include_removed)
        .map_err(internal_error)?;
    Ok(Json(trees))
}

async fn create_tree(
    State(storage): State<Arc<Storage>>,
    Json(candidate): Json<TreeCandidate>,
) -> Result<(StatusCode, Json<TreeFeature>), (StatusCode, String)> {
    if candidate.common_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "commonName is required".into()));
    }
    if candidate.source.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "source is required".into()));
    }

    let id = storage.next_id().map_err(internal_error)?;
    let tree = TreeFeature {
        id,
        tree_id: candidate
            .tree_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        position: candidate.position,
        common_name: candidate.common_name,
        latin_name: candidate.latin_name,
        family: candidate.family,
        is_native: candidate.is_native,
        source: candidate.source,
        active: true,
        created_at: Some(chrono::Utc::now().to_rfc3339()),
        removed_at: None,
        removed_by: None,
    };
    storage.save_tree(&tree).map_err(internal_error)?;

    tracing::info!(id = tree.id, common_name = %tree.common_name, "tree created");
    Ok((StatusCode::CREATED, Json(tree)))
}

async fn remove_tree(
    State(storage): State<Arc<Storage>>,
    Path(location_id): Path<u64>,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<TreeFeature>, (StatusCode, String)> {
    if req.removed_by.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "removedBy is required".into()));
    }

    let removed_at = chrono::Utc::now().to_rfc3339();
    match storage
        .soft_remove(location_id, &req.removed_by, &removed_at)
        .map_err(internal_error)?
    {
        Some(tree) => {
            tracing::info!(id = location_id, removed_by = %req.removed_by, "tree removed");
            Ok(Json(tree))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            format!("no tree with id {location_id}"),
        )),
    }
}

fn internal_error(err: String) -> (StatusCode, String) {
    tracing::error!(error = %err, "storage failure");
    (StatusCode::INTERNAL_SERVER_ERROR, err)
}

fn build_app(storage: Arc<Storage>) -> Router {
    Router::new()
        .route("/trees", get(list_trees).post(create_tree))
        .route("/trees/remove/{location_id}", put(remove_tree))
        .with_state(storage)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db_path =
        PathBuf::from(std::env::var("DB_PATH").unwrap_or_else(|_| "data/trees.redb".to_string()));
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create database directory");
    }
    let storage = Storage::open(&db_path);

    let app = build_app(storage);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

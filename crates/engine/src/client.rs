//! HTTP client for the tree backend.
//!
//! The engine only sees the `TreeApi` trait so tests can substitute a mock;
//! `HttpTreeApi` is the real reqwest implementation of the REST contract:
//! `GET /trees`, `POST /trees`, `PUT /trees/remove/{location_id}`.

use async_trait::async_trait;
use canopy_shared::models::{RemoveRequest, TreeCandidate, TreeFeature};

use crate::error::ApiError;

#[async_trait]
pub trait TreeApi: Send + Sync {
    /// Fetch the current feature list (active records).
    async fn fetch_trees(&self) -> Result<Vec<TreeFeature>, ApiError>;

    /// Create a tree; the backend assigns identity and returns the
    /// canonical feature.
    async fn create_tree(&self, candidate: &TreeCandidate) -> Result<TreeFeature, ApiError>;

    /// Soft-delete a tree, recording who removed it.
    async fn remove_tree(&self, location_id: u64, removed_by: &str) -> Result<(), ApiError>;
}

pub struct HttpTreeApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTreeApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Map a non-2xx response to a typed failure, reading the body as the
/// error message when there is one.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ApiError::Http {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TreeApi for HttpTreeApi {
    async fn fetch_trees(&self) -> Result<Vec<TreeFeature>, ApiError> {
        let resp = self.client.get(self.url("/trees")).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn create_tree(&self, candidate: &TreeCandidate) -> Result<TreeFeature, ApiError> {
        let resp = self
            .client
            .post(self.url("/trees"))
            .json(candidate)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn remove_tree(&self, location_id: u64, removed_by: &str) -> Result<(), ApiError> {
        let body = RemoveRequest {
            removed_by: removed_by.to_string(),
        };
        let resp = self
            .client
            .put(self.url(&format!("/trees/remove/{location_id}")))
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let api = HttpTreeApi::new("http://localhost:3000/");
        assert_eq!(api.url("/trees"), "http://localhost:3000/trees");
        let api = HttpTreeApi::new("http://localhost:3000");
        assert_eq!(
            api.url("/trees/remove/7"),
            "http://localhost:3000/trees/remove/7"
        );
    }
}

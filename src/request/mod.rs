pub mod mock;
pub mod types;

pub use mock::MockStore;
pub use types::{ApprovalRequest, Decision, RequestStatus, ReviewUpdate, RiskLevel};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::{Config, ConfigError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request table API call failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("request table token not found in config or FABRIC_TOKEN")]
    MissingToken,

    #[error("request {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid request table URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Backend holding approval request rows.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Rows whose status is `pending`.
    async fn fetch_pending(&self) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// Write a reviewer decision back to one row.
    async fn update_status(&self, request_id: &str, update: &ReviewUpdate)
        -> Result<(), StoreError>;
}

/// The rows endpoint answers either with a bare array or an OData-style
/// `{"value": [...]}` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum RowsResponse {
    Envelope { value: Vec<ApprovalRequest> },
    Bare(Vec<ApprovalRequest>),
}

impl RowsResponse {
    fn into_rows(self) -> Vec<ApprovalRequest> {
        match self {
            RowsResponse::Envelope { value } => value,
            RowsResponse::Bare(rows) => rows,
        }
    }
}

/// REST client for the lakehouse table that stores approval requests.
pub struct TableClient {
    client: reqwest::Client,
    rows_url: Url,
    token: String,
}

impl TableClient {
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let token = config.table_token().ok_or(StoreError::MissingToken)?;
        let raw = format!(
            "{}/workspaces/{}/lakehouses/{}/tables/{}/rows",
            config.table_base_url(),
            config.workspace_id()?,
            config.lakehouse_id()?,
            config.table_name()
        );
        let rows_url =
            Url::parse(&raw).map_err(|e| StoreError::InvalidUrl(format!("{raw}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            rows_url,
            token,
        })
    }

    fn list_request(&self) -> reqwest::RequestBuilder {
        self.client
            .get(self.rows_url.clone())
            .query(&[("$filter", "status eq 'pending'")])
            .header("User-Agent", "pr-approval")
            .bearer_auth(&self.token)
    }

    /// The id is pushed as one escaped path segment.
    fn update_request(
        &self,
        request_id: &str,
        update: &ReviewUpdate,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        let mut url = self.rows_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.rows_url.to_string()))?
            .push(request_id);
        Ok(self
            .client
            .patch(url)
            .header("User-Agent", "pr-approval")
            .bearer_auth(&self.token)
            .json(update))
    }
}

#[async_trait]
impl RequestStore for TableClient {
    #[instrument(skip(self))]
    async fn fetch_pending(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        debug!(url = %self.rows_url, "fetching pending rows");
        let rows = self
            .list_request()
            .send()
            .await?
            .error_for_status()?
            .json::<RowsResponse>()
            .await?
            .into_rows();

        let total = rows.len();
        let pending: Vec<_> = rows.into_iter().filter(ApprovalRequest::is_pending).collect();
        debug!(total, pending = pending.len(), "received rows");
        Ok(pending)
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn update_status(
        &self,
        request_id: &str,
        update: &ReviewUpdate,
    ) -> Result<(), StoreError> {
        let response = self.update_request(request_id, update)?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(request_id.to_string()));
        }
        response.error_for_status()?;
        debug!("row updated");
        Ok(())
    }
}

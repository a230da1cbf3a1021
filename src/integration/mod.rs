pub mod types;

pub use types::{IntegrationOutcome, PrUrl};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::{Config, ConfigError, IntegrationMode, MergeMethod};
use crate::request::ApprovalRequest;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("integration API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("{0} token not found in config or environment")]
    MissingToken(&'static str),

    #[error("pull request {0} was not merged: {1}")]
    NotMerged(String, String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Follow-up that integrates an approved change.
#[async_trait]
pub trait IntegrationTrigger: Send + Sync {
    /// Short label used in logs (e.g. "github-merge")
    fn name(&self) -> &str;

    /// False for the disabled trigger; the dashboard then skips the call.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn trigger(&self, request: &ApprovalRequest) -> Result<(), IntegrationError>;
}

/// Build the trigger selected by `[integration] mode`.
pub fn from_config(config: &Config) -> Result<Box<dyn IntegrationTrigger>, IntegrationError> {
    Ok(match config.integration.mode {
        IntegrationMode::GitHub => Box::new(GitHubMerge::from_config(config)?),
        IntegrationMode::Pipeline => Box::new(PipelineRun::from_config(config)?),
        IntegrationMode::None => Box::new(Disabled),
    })
}

/// Parse a GitHub PR URL into its component parts.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrUrl, IntegrationError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|_| IntegrationError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(IntegrationError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| IntegrationError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 4 || segments[2] != "pull" {
        return Err(IntegrationError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| IntegrationError::InvalidUrl(url.to_string()))?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

/// Merges the request's pull request through the GitHub REST API.
pub struct GitHubMerge {
    client: reqwest::Client,
    api_base: String,
    token: String,
    merge_method: MergeMethod,
}

impl GitHubMerge {
    pub fn from_config(config: &Config) -> Result<Self, IntegrationError> {
        let token = config
            .github_token()
            .ok_or(IntegrationError::MissingToken("GitHub"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: "https://api.github.com".to_string(),
            token,
            merge_method: config.github.merge_method,
        })
    }

    fn merge_request(
        &self,
        pr_url: &PrUrl,
        request: &ApprovalRequest,
    ) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/merge",
            self.api_base, pr_url.owner, pr_url.repo, pr_url.pr_number
        );
        self.client
            .put(url)
            .header("User-Agent", "pr-approval")
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "commit_title": format!("{} ({})", request.pr_title, request.request_id),
                "merge_method": self.merge_method.as_str(),
            }))
    }
}

#[async_trait]
impl IntegrationTrigger for GitHubMerge {
    fn name(&self) -> &str {
        "github-merge"
    }

    #[instrument(skip(self, request), fields(request_id = %request.request_id, pr_url = %request.pr_url))]
    async fn trigger(&self, request: &ApprovalRequest) -> Result<(), IntegrationError> {
        let pr_url = parse_pr_url(&request.pr_url)?;

        #[derive(Deserialize)]
        struct MergeResponse {
            merged: bool,
            message: String,
        }

        debug!(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number, "merging pull request");
        let merge = self
            .merge_request(&pr_url, request)
            .send()
            .await?
            .error_for_status()?
            .json::<MergeResponse>()
            .await?;

        if !merge.merged {
            return Err(IntegrationError::NotMerged(
                request.pr_url.clone(),
                merge.message,
            ));
        }
        debug!(message = %merge.message, "pull request merged");
        Ok(())
    }
}

/// Starts a pipeline job that performs the merge on the platform side.
pub struct PipelineRun {
    client: reqwest::Client,
    jobs_url: String,
    token: String,
}

impl PipelineRun {
    pub fn from_config(config: &Config) -> Result<Self, IntegrationError> {
        let token = config
            .table_token()
            .ok_or(IntegrationError::MissingToken("Fabric"))?;
        let pipeline_id = config
            .integration
            .pipeline_id
            .as_deref()
            .ok_or(ConfigError::Missing("integration.pipeline_id"))?;
        let jobs_url = format!(
            "{}/workspaces/{}/items/{}/jobs/instances",
            config.table_base_url(),
            config.workspace_id()?,
            pipeline_id
        );
        Ok(Self {
            client: reqwest::Client::new(),
            jobs_url,
            token,
        })
    }

    fn run_request(&self, request_id: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&self.jobs_url)
            .query(&[("jobType", "Pipeline")])
            .header("User-Agent", "pr-approval")
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "executionData": { "parameters": { "requestId": request_id } }
            }))
    }
}

#[async_trait]
impl IntegrationTrigger for PipelineRun {
    fn name(&self) -> &str {
        "pipeline-run"
    }

    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    async fn trigger(&self, request: &ApprovalRequest) -> Result<(), IntegrationError> {
        debug!(url = %self.jobs_url, "starting merge pipeline");
        self.run_request(&request.request_id)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// No follow-up after approval.
pub struct Disabled;

#[async_trait]
impl IntegrationTrigger for Disabled {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn trigger(&self, _request: &ApprovalRequest) -> Result<(), IntegrationError> {
        Ok(())
    }
}

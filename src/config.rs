use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".pr-approval.toml";
pub const DEFAULT_TABLE_BASE_URL: &str = "https://api.fabric.microsoft.com/v1";
pub const DEFAULT_TABLE_NAME: &str = "pr_approval_requests";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REVIEWER: &str = "unknown-reviewer";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Top-level configuration loaded from .pr-approval.toml.
/// All fields are optional; `--mock` runs work with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Request table location and credentials
    #[serde(default)]
    pub table: TableConfig,

    /// GitHub settings used by the merge trigger
    #[serde(default)]
    pub github: GitHubConfig,

    /// Which follow-up runs after an approval
    #[serde(default)]
    pub integration: IntegrationConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableConfig {
    /// REST base URL. Defaults to the public Fabric API.
    pub base_url: Option<String>,
    pub workspace_id: Option<String>,
    pub lakehouse_id: Option<String>,
    /// Defaults to "pr_approval_requests"
    pub table_name: Option<String>,
    /// Bearer token. If None, falls back to FABRIC_TOKEN env var.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    #[serde(default)]
    pub merge_method: MergeMethod,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Merge,
    #[default]
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMode {
    /// Merge the pull request through the GitHub API
    #[default]
    GitHub,
    /// Run a data pipeline that performs the merge
    Pipeline,
    None,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default)]
    pub mode: IntegrationMode,
    /// Item id of the merge pipeline, required when mode = "pipeline"
    pub pipeline_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollConfig {
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewConfig {
    /// Identity recorded on decisions. Falls back to PR_APPROVAL_REVIEWER.
    pub reviewer: Option<String>,
}

impl Config {
    /// Load configuration from .pr-approval.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the table token: config file value takes precedence,
    /// falls back to FABRIC_TOKEN env var.
    pub fn table_token(&self) -> Option<String> {
        self.table
            .token
            .clone()
            .or_else(|| std::env::var("FABRIC_TOKEN").ok())
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    pub fn table_base_url(&self) -> &str {
        self.table
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_TABLE_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn table_name(&self) -> &str {
        self.table.table_name.as_deref().unwrap_or(DEFAULT_TABLE_NAME)
    }

    pub fn workspace_id(&self) -> Result<&str, ConfigError> {
        self.table
            .workspace_id
            .as_deref()
            .ok_or(ConfigError::Missing("table.workspace_id"))
    }

    pub fn lakehouse_id(&self) -> Result<&str, ConfigError> {
        self.table
            .lakehouse_id
            .as_deref()
            .ok_or(ConfigError::Missing("table.lakehouse_id"))
    }

    pub fn poll_interval(&self) -> Duration {
        let secs = self
            .poll
            .interval_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    /// Reviewer identity: config value, then PR_APPROVAL_REVIEWER,
    /// then a placeholder.
    pub fn reviewer(&self) -> String {
        self.review
            .reviewer
            .clone()
            .or_else(|| std::env::var("PR_APPROVAL_REVIEWER").ok())
            .unwrap_or_else(|| DEFAULT_REVIEWER.to_string())
    }
}

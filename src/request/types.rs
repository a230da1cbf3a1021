use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Qualitative severity tag attached to a proposed fix.
///
/// Rows written by the fix generator are free text, so parsing is
/// case-insensitive and anything unrecognised becomes `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl From<String> for RiskLevel {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Unknown,
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        level.to_string()
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Lifecycle status of a request row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A reviewer's verdict. Only these two statuses can be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// Verb used in banners and log lines ("approve", "reject").
    pub fn verb(self) -> &'static str {
        match self {
            Decision::Approved => "approve",
            Decision::Rejected => "reject",
        }
    }
}

impl From<Decision> for RequestStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => RequestStatus::Approved,
            Decision::Rejected => RequestStatus::Rejected,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        RequestStatus::from(*self).fmt(f)
    }
}

/// A proposed automated fix awaiting human sign-off, as stored in the
/// request table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier, stable across fetches (e.g. "pr_20250802030341")
    pub request_id: String,
    /// Link to the pull request carrying the fix
    pub pr_url: String,
    pub pr_title: String,
    pub pr_branch: String,
    /// What went wrong
    pub problem_summary: String,
    /// What the generated fix changes
    pub fix_description: String,
    /// Pipeline or component the change touches
    pub affected_pipeline: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    pub created_timestamp: DateTime<Utc>,
    pub status: RequestStatus,
}

impl ApprovalRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Body of the status update written back for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub status: RequestStatus,
    pub reviewer: String,
    pub review_timestamp: DateTime<Utc>,
    /// Empty when the reviewer left no comment
    pub review_comments: String,
}

impl ReviewUpdate {
    /// Build an update stamped with the current time.
    pub fn new(decision: Decision, reviewer: &str, comments: Option<&str>) -> Self {
        Self {
            status: decision.into(),
            reviewer: reviewer.to_string(),
            review_timestamp: Utc::now(),
            review_comments: comments.unwrap_or_default().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_row() -> serde_json::Value {
        serde_json::json!({
            "request_id": "pr_20250802030341",
            "pr_url": "https://github.com/klockard12/AutoCure.AI/pull/21",
            "pr_title": "Fix Schema Drift in Pipeline",
            "pr_branch": "ai/fix_20250802030341",
            "problem_summary": "Extra column in source schema.",
            "fix_description": "Select explicit columns.",
            "affected_pipeline": "user_upload_pipeline",
            "risk_level": "Low",
            "created_timestamp": "2025-08-02T03:03:41Z",
            "status": "pending"
        })
    }

    #[test]
    fn test_parse_request_row() {
        let request: ApprovalRequest = serde_json::from_value(sample_row()).unwrap();
        assert_eq!(request.request_id, "pr_20250802030341");
        assert_eq!(request.risk_level, RiskLevel::Low);
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.is_pending());
        assert_eq!(request.created_timestamp.to_rfc3339(), "2025-08-02T03:03:41+00:00");
    }

    #[test]
    fn test_risk_level_is_case_insensitive() {
        assert_eq!(RiskLevel::from("HIGH".to_string()), RiskLevel::High);
        assert_eq!(RiskLevel::from(" medium ".to_string()), RiskLevel::Medium);
        assert_eq!(RiskLevel::from("critical".to_string()), RiskLevel::Unknown);
    }

    #[test]
    fn test_missing_risk_level_is_unknown() {
        let mut row = sample_row();
        row.as_object_mut().unwrap().remove("risk_level");
        let request: ApprovalRequest = serde_json::from_value(row).unwrap();
        assert_eq!(request.risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn test_risk_level_serializes_title_case() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"Medium\"");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut row = sample_row();
        row["status"] = serde_json::json!("merged");
        assert!(serde_json::from_value::<ApprovalRequest>(row).is_err());
    }

    #[test]
    fn test_review_update_body() {
        let update = ReviewUpdate::new(Decision::Rejected, "alice@example.com", None);
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["reviewer"], "alice@example.com");
        assert_eq!(body["review_comments"], "");
        assert!(body["review_timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_decision_display_and_verb() {
        assert_eq!(Decision::Approved.to_string(), "approved");
        assert_eq!(Decision::Rejected.verb(), "reject");
    }
}

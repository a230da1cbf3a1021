/// Represents the parsed components of a GitHub PR URL.
/// Extracted by parse_pr_url() in integration/mod.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

/// What happened after an approval was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// The change was merged (or the merge job was accepted)
    Merged,
    /// The trigger failed; the approval still stands
    MergeFailed(String),
    /// No trigger is configured
    Skipped,
}

impl std::fmt::Display for IntegrationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationOutcome::Merged => write!(f, "merged"),
            IntegrationOutcome::MergeFailed(reason) => write!(f, "merge-failed: {reason}"),
            IntegrationOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

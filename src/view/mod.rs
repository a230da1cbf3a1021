use chrono::Local;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::dashboard::DashboardSnapshot;
use crate::integration::IntegrationOutcome;
use crate::request::{ApprovalRequest, Decision, RiskLevel};

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Failed to write summary file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Render a snapshot as the terminal dashboard.
///
/// ═══ PR Approval Dashboard ═══
/// Pending: 1 | Approved: 0 | Rejected: 0
///
/// [1] Fix Schema Drift in Pipeline   (Low Risk)
///     ...
pub fn render(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "═══ PR Approval Dashboard ═══".bold());

    if snapshot.show_spinner() {
        let _ = writeln!(out, "Loading pending approvals...");
        return out;
    }

    let _ = writeln!(
        out,
        "Pending: {} | Approved: {} | Rejected: {}{}",
        snapshot.requests.len(),
        snapshot.decided(Decision::Approved),
        snapshot.decided(Decision::Rejected),
        if snapshot.loading { " | refreshing..." } else { "" }
    );
    out.push('\n');

    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "{} {}\n", "Error:".red().bold(), error.red());
    }
    if let Some(notice) = &snapshot.notice {
        let _ = writeln!(out, "{} {}\n", "Notice:".yellow().bold(), notice);
    }

    if snapshot.all_caught_up() {
        let _ = writeln!(out, "{}", "All Caught Up!".green().bold());
        let _ = writeln!(out, "No pending pull requests require approval.");
        return out;
    }

    for (index, request) in snapshot.requests.iter().enumerate() {
        render_request(&mut out, index + 1, request, snapshot.is_busy(&request.request_id));
    }
    out
}

fn render_request(out: &mut String, position: usize, request: &ApprovalRequest, busy: bool) {
    let _ = writeln!(
        out,
        "[{}] {}   {}{}",
        position,
        request.pr_title.bold(),
        risk_badge(request.risk_level),
        if busy { "   (processing...)".dimmed().to_string() } else { String::new() }
    );
    let _ = writeln!(out, "    id:       {}", request.request_id);
    let _ = writeln!(out, "    url:      {}", request.pr_url.blue().underline());
    let _ = writeln!(
        out,
        "    created:  {}",
        request
            .created_timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "    branch:   {}", request.pr_branch);
    let _ = writeln!(out, "    pipeline: {}", request.affected_pipeline);
    let _ = writeln!(out, "    Problem:  {}", request.problem_summary);
    let _ = writeln!(out, "    Fix:      {}", request.fix_description);
    out.push('\n');
}

/// Helper to colorize a risk level badge for terminal output.
fn risk_badge(level: RiskLevel) -> colored::ColoredString {
    let label = format!("{level} Risk");
    match level {
        RiskLevel::High => label.red().bold(),
        RiskLevel::Medium => label.yellow().bold(),
        RiskLevel::Low => label.green().bold(),
        RiskLevel::Unknown => label.dimmed(),
    }
}

/// Print the dashboard to stdout.
pub fn print(snapshot: &DashboardSnapshot) {
    println!("{}", render(snapshot));
}

/// Write the session's decisions as a markdown summary.
#[instrument(skip(snapshot), fields(decisions = snapshot.history.len()))]
pub fn write_summary(snapshot: &DashboardSnapshot, path: &Path) -> Result<(), ViewError> {
    debug!(path = %path.display(), "writing session summary");
    std::fs::write(path, summary_markdown(snapshot))?;
    Ok(())
}

fn summary_markdown(snapshot: &DashboardSnapshot) -> String {
    let mut md = String::new();
    md.push_str("# PR approval session\n\n");
    let _ = writeln!(
        md,
        "**Approved:** {} | **Rejected:** {} | **Still pending:** {}\n",
        snapshot.decided(Decision::Approved),
        snapshot.decided(Decision::Rejected),
        snapshot.requests.len()
    );

    if snapshot.history.is_empty() {
        md.push_str("No decisions recorded.\n");
        return md;
    }

    for record in &snapshot.history {
        let follow_up = match &record.integration {
            Some(IntegrationOutcome::Merged) => " (merged)".to_string(),
            Some(IntegrationOutcome::MergeFailed(reason)) => format!(" (merge failed: {reason})"),
            Some(IntegrationOutcome::Skipped) | None => String::new(),
        };
        let _ = writeln!(
            md,
            "- **{}** `{}` {}{}",
            record.decision, record.request_id, record.pr_title, follow_up
        );
    }
    md
}

mod config;
mod dashboard;
mod integration;
mod prompt;
mod request;
mod view;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use dashboard::{Dashboard, Poller, SubmitOutcome};
use integration::{IntegrationOutcome, IntegrationTrigger};
use prompt::PromptCommand;
use request::{Decision, MockStore, RequestStore, TableClient};

/// PR Approval: review automated pull-request fixes queued in the request
/// table, approve or reject them, and merge what gets approved.
#[derive(Parser, Debug)]
#[command(name = "pr-approval", version, about)]
struct Cli {
    /// Use an in-memory request table seeded with a sample fix (no credentials needed)
    #[arg(long, global = true)]
    r#mock: bool,

    /// Config file (defaults to ./.pr-approval.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show pending approval requests once
    List,

    /// Approve a pending request and trigger its merge
    Approve {
        request_id: String,
        /// Review comment stored with the decision
        #[arg(short = 'm', long)]
        comment: Option<String>,
    },

    /// Reject a pending request
    Reject {
        request_id: String,
        #[arg(short = 'm', long)]
        comment: Option<String>,
    },

    /// Keep the dashboard open, polling for new requests
    Watch {
        /// Poll interval in seconds (overrides [poll] interval_secs)
        #[arg(long)]
        interval: Option<u64>,

        /// Write a markdown summary of this session's decisions on exit
        #[arg(long)]
        summary: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    let (store, trigger): (Arc<dyn RequestStore>, Arc<dyn IntegrationTrigger>) = if cli.r#mock {
        info!("using mock request table for demo");
        (
            Arc::new(MockStore::sample()?.with_latency(Duration::from_millis(800))),
            Arc::new(integration::Disabled),
        )
    } else {
        (
            Arc::new(TableClient::from_config(&config)?),
            Arc::from(integration::from_config(&config)?),
        )
    };
    debug!(trigger = trigger.name(), "backend ready");

    let dashboard = Arc::new(Dashboard::new(store, trigger, config.reviewer()));

    match cli.command {
        Command::List => {
            let result = dashboard.refresh().await;
            view::print(&dashboard.snapshot());
            result?;
        }
        Command::Approve {
            request_id,
            comment,
        } => decide(&dashboard, &request_id, Decision::Approved, comment.as_deref()).await?,
        Command::Reject {
            request_id,
            comment,
        } => decide(&dashboard, &request_id, Decision::Rejected, comment.as_deref()).await?,
        Command::Watch { interval, summary } => {
            let period = interval
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.poll_interval());
            watch(dashboard, period, summary).await?;
        }
    }

    Ok(())
}

/// One-shot decision: load the pending list, then submit.
#[instrument(skip(dashboard, comment))]
async fn decide(
    dashboard: &Dashboard,
    request_id: &str,
    decision: Decision,
    comment: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    dashboard.refresh().await?;
    let outcome = dashboard.submit(request_id, decision, comment).await?;
    report_outcome(request_id, &outcome);
    Ok(())
}

fn report_outcome(request_id: &str, outcome: &SubmitOutcome) {
    let verdict = match outcome.decision {
        Decision::Approved => "approved".green().bold(),
        Decision::Rejected => "rejected".red().bold(),
    };
    println!("{request_id}: {verdict}");
    match &outcome.integration {
        Some(IntegrationOutcome::Merged) => println!("{request_id}: merge triggered"),
        Some(IntegrationOutcome::MergeFailed(reason)) => println!(
            "{} {request_id}: approval recorded but merge failed: {reason}",
            "warning:".yellow().bold()
        ),
        Some(IntegrationOutcome::Skipped) | None => {}
    }
}

/// Interactive session: poller in the background, redraw on every
/// snapshot, decisions submitted as independent tasks. Those tasks are
/// drained before the summary is written so no decision goes unrecorded.
async fn watch(
    dashboard: Arc<Dashboard>,
    period: Duration,
    summary: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let poller = Poller::spawn(dashboard.clone(), period);
    let mut updates = dashboard.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    println!("{}", prompt::HELP.dimmed());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                view::print(&snapshot);
            }
            Some(joined) = tasks.join_next() => {
                if let Err(e) = joined {
                    warn!(error = %e, "prompt task failed");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match prompt::parse(&line, &dashboard.snapshot()) {
                    Ok(PromptCommand::Decide { request_id, decision, comment }) => {
                        let dashboard = dashboard.clone();
                        tasks.spawn(async move {
                            match dashboard.submit(&request_id, decision, comment.as_deref()).await {
                                Ok(outcome) => report_outcome(&request_id, &outcome),
                                Err(e) => println!("{} {e}", "error:".red().bold()),
                            }
                        });
                    }
                    Ok(PromptCommand::Refresh) => {
                        let dashboard = dashboard.clone();
                        tasks.spawn(async move {
                            if let Err(e) = dashboard.refresh().await {
                                warn!(error = %e, "manual refresh failed");
                            }
                        });
                    }
                    Ok(PromptCommand::Dismiss) => dashboard.dismiss_banners(),
                    Ok(PromptCommand::Help) => println!("{}", prompt::HELP),
                    Ok(PromptCommand::Quit) => break,
                    Ok(PromptCommand::Empty) => {}
                    Err(e) => println!("{} {e}", "error:".red().bold()),
                }
            }
        }
    }

    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "waiting for submissions to finish");
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "prompt task failed");
        }
    }
    poller.shutdown().await;
    info!("watch session ended");

    if let Some(path) = summary {
        view::write_summary(&dashboard.snapshot(), &path)?;
        info!(path = %path.display(), "session summary written");
    }
    Ok(())
}

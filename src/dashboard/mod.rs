pub mod poller;
pub mod state;

pub use poller::Poller;
pub use state::DashboardSnapshot;

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::integration::{IntegrationOutcome, IntegrationTrigger};
use crate::request::{ApprovalRequest, Decision, RequestStore, ReviewUpdate, StoreError};
use state::{DashboardState, DecisionRecord};

#[derive(Debug, Error)]
#[error("Failed to fetch pending requests: {0}")]
pub struct FetchError(#[from] pub StoreError);

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("request {0} is not in the pending list")]
    NotPending(String),

    #[error("a decision for request {0} is already in flight")]
    InFlight(String),

    #[error("Failed to {} request {request_id}: {source}", .decision.verb())]
    Store {
        request_id: String,
        decision: Decision,
        #[source]
        source: StoreError,
    },
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub decision: Decision,
    /// Set for approvals only
    pub integration: Option<IntegrationOutcome>,
}

/// Owns the approval workflow: the visible pending list, per-request busy
/// flags and banners. Every change is published as a `DashboardSnapshot`.
pub struct Dashboard {
    store: Arc<dyn RequestStore>,
    trigger: Arc<dyn IntegrationTrigger>,
    reviewer: String,
    state: Mutex<DashboardState>,
    updates: watch::Sender<DashboardSnapshot>,
}

impl Dashboard {
    pub fn new(
        store: Arc<dyn RequestStore>,
        trigger: Arc<dyn IntegrationTrigger>,
        reviewer: impl Into<String>,
    ) -> Self {
        let (updates, _) = watch::channel(DashboardSnapshot::default());
        Self {
            store,
            trigger,
            reviewer: reviewer.into(),
            state: Mutex::new(DashboardState::default()),
            updates,
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.updates.borrow().clone()
    }

    /// Receiver that wakes on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.updates.subscribe()
    }

    /// Reload the pending list. On failure the previous list stays and an
    /// error banner is set. Responses older than the last applied one are
    /// dropped.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let seq = self.mutate(|state| state.begin_fetch());
        debug!(seq, "fetch started");

        let result = self.store.fetch_pending().await;

        self.mutate(|state| {
            let current = state.finish_fetch(seq, result.is_ok());
            match &result {
                _ if !current => debug!(seq, applied = state.applied_seq, "stale fetch dropped"),
                Ok(rows) => {
                    state.replace_requests(rows.clone());
                    state.error = None;
                    debug!(seq, pending = state.requests.len(), "fetch applied");
                }
                Err(e) => {
                    state.error = Some(format!("Failed to fetch pending requests: {e}"));
                }
            }
        });

        result.map(|_| ()).map_err(|e| {
            warn!(error = %e, "fetch failed");
            FetchError(e)
        })
    }

    /// Record a decision for one pending request. Only that request is
    /// marked busy while the update is in flight. Approvals then run the
    /// integration trigger; a trigger failure becomes a notice and never
    /// undoes the approval.
    #[instrument(skip(self, comments), fields(decision = %decision))]
    pub async fn submit(
        &self,
        request_id: &str,
        decision: Decision,
        comments: Option<&str>,
    ) -> Result<SubmitOutcome, SubmitError> {
        // Copied up front: a refresh may drop the row before the update lands.
        let target = self.try_mutate(|state| {
            let target = state
                .requests
                .iter()
                .find(|r| r.request_id == request_id)
                .cloned()
                .ok_or_else(|| SubmitError::NotPending(request_id.to_string()))?;
            if !state.busy.insert(request_id.to_string()) {
                return Err(SubmitError::InFlight(request_id.to_string()));
            }
            Ok(target)
        })?;

        let update = ReviewUpdate::new(decision, &self.reviewer, comments);
        if let Err(source) = self.store.update_status(request_id, &update).await {
            let err = SubmitError::Store {
                request_id: request_id.to_string(),
                decision,
                source,
            };
            warn!(error = %err, "decision not recorded");
            self.mutate(|state| {
                state.busy.remove(request_id);
                state.error = Some(err.to_string());
            });
            return Err(err);
        }

        self.mutate(|state| {
            state.busy.remove(request_id);
            state.decided.insert(request_id.to_string());
            state.remove_request(request_id);
            state.history.push(DecisionRecord {
                request_id: request_id.to_string(),
                pr_title: target.pr_title.clone(),
                decision,
                integration: None,
            });
        });
        info!(request_id, "{} request", decision);

        let integration = match decision {
            Decision::Approved => Some(self.integrate(&target).await),
            Decision::Rejected => None,
        };

        Ok(SubmitOutcome {
            decision,
            integration,
        })
    }

    async fn integrate(&self, request: &ApprovalRequest) -> IntegrationOutcome {
        let outcome = if !self.trigger.is_enabled() {
            IntegrationOutcome::Skipped
        } else {
            info!(request_id = %request.request_id, trigger = self.trigger.name(), "triggering merge");
            match self.trigger.trigger(request).await {
                Ok(()) => IntegrationOutcome::Merged,
                Err(e) => {
                    warn!(request_id = %request.request_id, error = %e, "merge trigger failed");
                    IntegrationOutcome::MergeFailed(e.to_string())
                }
            }
        };

        self.mutate(|state| {
            if let IntegrationOutcome::MergeFailed(reason) = &outcome {
                state.notice = Some(format!(
                    "Approved {} but the merge did not go through: {reason}",
                    request.request_id
                ));
            }
            if let Some(record) = state
                .history
                .iter_mut()
                .rev()
                .find(|r| r.request_id == request.request_id)
            {
                record.integration = Some(outcome.clone());
            }
        });
        outcome
    }

    /// Clear the error and notice banners.
    pub fn dismiss_banners(&self) {
        self.mutate(|state| {
            state.error = None;
            state.notice = None;
        });
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to the state and publish the resulting snapshot.
    fn mutate<R>(&self, f: impl FnOnce(&mut DashboardState) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state);
        self.updates.send_replace(state.snapshot());
        out
    }

    fn try_mutate<R, E>(
        &self,
        f: impl FnOnce(&mut DashboardState) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut state = self.lock();
        let out = f(&mut state)?;
        self.updates.send_replace(state.snapshot());
        Ok(out)
    }
}

use std::collections::{BTreeSet, HashSet};

use crate::integration::IntegrationOutcome;
use crate::request::{ApprovalRequest, Decision};

/// A decision recorded during this session.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub request_id: String,
    pub pr_title: String,
    pub decision: Decision,
    /// Set for approvals only
    pub integration: Option<IntegrationOutcome>,
}

/// Immutable view of the dashboard, published after every state change.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    /// Pending requests, in backend order
    pub requests: Vec<ApprovalRequest>,
    /// A fetch is in flight
    pub loading: bool,
    /// At least one fetch has resolved, successfully or not
    pub loaded: bool,
    /// Requests with a decision in flight
    pub busy: BTreeSet<String>,
    /// Blocking problem shown as a red banner
    pub error: Option<String>,
    /// Non-blocking follow-up problem (e.g. a failed merge)
    pub notice: Option<String>,
    pub history: Vec<DecisionRecord>,
}

impl DashboardSnapshot {
    /// Spinner only covers the very first load.
    pub fn show_spinner(&self) -> bool {
        self.loading && !self.loaded && self.requests.is_empty()
    }

    pub fn all_caught_up(&self) -> bool {
        self.loaded && self.requests.is_empty()
    }

    pub fn is_busy(&self, request_id: &str) -> bool {
        self.busy.contains(request_id)
    }

    pub fn decided(&self, decision: Decision) -> usize {
        self.history.iter().filter(|r| r.decision == decision).count()
    }
}

/// Mutable state behind the dashboard. Only `Dashboard` touches it.
#[derive(Debug, Default)]
pub(super) struct DashboardState {
    pub requests: Vec<ApprovalRequest>,
    pub loaded: bool,
    pub busy: BTreeSet<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub history: Vec<DecisionRecord>,
    /// Ids decided in this session; later fetches never bring them back
    pub decided: HashSet<String>,
    /// Sequence number handed to the latest fetch
    pub issued_seq: u64,
    /// Sequence number of the newest fetch whose result was applied
    pub applied_seq: u64,
    pub fetches_in_flight: usize,
}

impl DashboardState {
    pub fn begin_fetch(&mut self) -> u64 {
        self.issued_seq += 1;
        self.fetches_in_flight += 1;
        self.issued_seq
    }

    /// Returns false when a newer successful fetch already landed. Only
    /// successes advance `applied_seq`, so an older success arriving after
    /// a newer failure still applies.
    pub fn finish_fetch(&mut self, seq: u64, succeeded: bool) -> bool {
        self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
        self.loaded = true;
        if seq < self.applied_seq {
            return false;
        }
        if succeeded {
            self.applied_seq = seq;
        }
        true
    }

    pub fn replace_requests(&mut self, rows: Vec<ApprovalRequest>) {
        let mut seen = HashSet::new();
        self.requests = rows
            .into_iter()
            .filter(|r| r.is_pending())
            .filter(|r| !self.decided.contains(&r.request_id))
            .filter(|r| seen.insert(r.request_id.clone()))
            .collect();
    }

    pub fn remove_request(&mut self, request_id: &str) -> Option<ApprovalRequest> {
        let index = self
            .requests
            .iter()
            .position(|r| r.request_id == request_id)?;
        Some(self.requests.remove(index))
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            requests: self.requests.clone(),
            loading: self.fetches_in_flight > 0,
            loaded: self.loaded,
            busy: self.busy.clone(),
            error: self.error.clone(),
            notice: self.notice.clone(),
            history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{MockStore, RequestStatus};

    fn row(id: &str) -> ApprovalRequest {
        let mut request = MockStore::sample().unwrap().rows().remove(0);
        request.request_id = id.to_string();
        request
    }

    #[test]
    fn test_replace_drops_non_pending_and_duplicates() {
        let mut state = DashboardState::default();
        let mut approved = row("b");
        approved.status = RequestStatus::Approved;
        state.replace_requests(vec![row("a"), approved, row("a"), row("c")]);

        let ids: Vec<_> = state.requests.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_replace_skips_locally_decided() {
        let mut state = DashboardState::default();
        state.decided.insert("a".to_string());
        state.replace_requests(vec![row("a"), row("b")]);
        assert_eq!(state.requests.len(), 1);
        assert_eq!(state.requests[0].request_id, "b");
    }

    #[test]
    fn test_stale_fetch_is_not_applied() {
        let mut state = DashboardState::default();
        let first = state.begin_fetch();
        let second = state.begin_fetch();
        assert!(state.finish_fetch(second, true));
        assert!(!state.finish_fetch(first, false));
        assert_eq!(state.fetches_in_flight, 0);
    }

    #[test]
    fn test_failed_fetch_does_not_block_older_success() {
        let mut state = DashboardState::default();
        let first = state.begin_fetch();
        let second = state.begin_fetch();
        assert!(state.finish_fetch(second, false));
        assert!(state.finish_fetch(first, true));
        assert_eq!(state.applied_seq, first);
    }

    #[test]
    fn test_spinner_only_on_first_load() {
        let mut state = DashboardState::default();
        state.begin_fetch();
        assert!(state.snapshot().show_spinner());

        let seq = state.issued_seq;
        state.finish_fetch(seq, true);
        state.begin_fetch();
        let snapshot = state.snapshot();
        assert!(snapshot.loading);
        assert!(!snapshot.show_spinner());
    }

    #[test]
    fn test_all_caught_up_needs_a_load() {
        let snapshot = DashboardState::default().snapshot();
        assert!(!snapshot.all_caught_up());
    }
}

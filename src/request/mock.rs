use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::types::{ApprovalRequest, ReviewUpdate};
use super::{RequestStore, StoreError};

/// In-memory request table for demo runs (`--mock`) and tests.
pub struct MockStore {
    rows: Mutex<Vec<ApprovalRequest>>,
    latency: Duration,
}

impl MockStore {
    pub fn new(rows: Vec<ApprovalRequest>) -> Self {
        Self {
            rows: Mutex::new(rows),
            latency: Duration::ZERO,
        }
    }

    /// Seeded from the bundled fixture rows.
    pub fn sample() -> Result<Self, StoreError> {
        let fixture = include_str!("../../tests/fixtures/pending_requests.json");
        let rows = serde_json::from_str(fixture)
            .map_err(|e| StoreError::Unavailable(format!("bad fixture: {e}")))?;
        Ok(Self::new(rows))
    }

    /// Delay every call, to make busy and loading states visible.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Current copy of every row, decided ones included.
    #[cfg(test)]
    pub fn rows(&self) -> Vec<ApprovalRequest> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ApprovalRequest>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl RequestStore for MockStore {
    async fn fetch_pending(&self) -> Result<Vec<ApprovalRequest>, StoreError> {
        self.simulate_latency().await;
        let pending: Vec<_> = self
            .lock()
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        debug!(pending = pending.len(), "mock fetch");
        Ok(pending)
    }

    async fn update_status(
        &self,
        request_id: &str,
        update: &ReviewUpdate,
    ) -> Result<(), StoreError> {
        self.simulate_latency().await;
        let mut rows = self.lock();
        let row = rows
            .iter_mut()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| StoreError::NotFound(request_id.to_string()))?;
        row.status = update.status;
        debug!(request_id, status = %update.status, "mock update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::types::{Decision, RequestStatus, RiskLevel};

    #[test]
    fn test_sample_fixture_loads() {
        let store = MockStore::sample().unwrap();
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_id, "pr_20250802030341");
        assert_eq!(rows[0].risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn test_update_hides_row_from_pending() {
        let store = MockStore::sample().unwrap();
        let update = ReviewUpdate::new(Decision::Rejected, "ops", None);
        store.update_status("pr_20250802030341", &update).await.unwrap();

        assert!(store.fetch_pending().await.unwrap().is_empty());
        assert_eq!(store.rows()[0].status, RequestStatus::Rejected);
    }

    #[tokio::test]
    async fn test_update_unknown_row() {
        let store = MockStore::sample().unwrap();
        let update = ReviewUpdate::new(Decision::Approved, "ops", None);
        let err = store.update_status("missing", &update).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }
}

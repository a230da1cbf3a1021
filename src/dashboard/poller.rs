use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::Dashboard;

/// Background task that refreshes a dashboard on a fixed cadence.
///
/// The first tick fires immediately, so spawning the poller also performs
/// the startup fetch. The task lives as long as this handle: `shutdown()`
/// stops it cleanly and dropping the handle aborts it.
pub struct Poller {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn(dashboard: Arc<Dashboard>, period: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "poller started");

            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = ticker.tick() => {
                        debug!("poll tick");
                        if let Err(e) = dashboard.refresh().await {
                            warn!(error = %e, "scheduled refresh failed");
                        }
                    }
                }
            }
            info!("poller stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stop ticking and wait for an in-flight refresh to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::tests::{request, FlakyStore};
    use crate::integration::Disabled;
    use crate::request::RiskLevel;
    use std::sync::atomic::Ordering;

    fn setup() -> (Arc<FlakyStore>, Arc<Dashboard>) {
        let store = Arc::new(FlakyStore::new(vec![request("a", RiskLevel::Low)]));
        let dashboard = Arc::new(Dashboard::new(store.clone(), Arc::new(Disabled), "ops"));
        (store, dashboard)
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_startup_and_each_period() {
        let (store, dashboard) = setup();
        let poller = Poller::spawn(dashboard.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(dashboard.snapshot().requests.len(), 1);

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_shutdown() {
        let (store, dashboard) = setup();
        let poller = Poller::spawn(dashboard, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(1)).await;
        poller.shutdown().await;
        let after_shutdown = store.fetches.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let (store, dashboard) = setup();
        let poller = Poller::spawn(dashboard, Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(poller);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_polls_keep_running() {
        let (store, dashboard) = setup();
        store.fail_fetch.store(true, Ordering::SeqCst);
        let poller = Poller::spawn(dashboard.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 3);
        let snapshot = dashboard.snapshot();
        assert!(snapshot.error.is_some());
        assert!(!snapshot.show_spinner());

        poller.shutdown().await;
    }
}

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info};

use crate::{
    hub::{models::HubSnapshot, HubClient, HubError},
    notify::{Notification, Notifier, NOTIFICATION_ID},
    snapshot_cache::SnapshotCache,
};

/// Why a refresh failed. Kept small and `Copy` so a single fetch result can
/// be handed to every caller that waited on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Decode,
    Other,
}

impl From<&HubError> for FailureKind {
    fn from(err: &HubError) -> Self {
        match err {
            HubError::Timeout { .. } => Self::Timeout,
            HubError::Decode(_) => Self::Decode,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The hub was contacted and the snapshot replaced.
    Fetched,
    /// The cached snapshot is younger than the minimum interval.
    Cached,
    Failed(FailureKind),
}

impl RefreshOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, RefreshOutcome::Failed(_))
    }
}

/// Owns the hub client and the cached snapshot.
///
/// - Refreshes are throttled to one per `min_interval` unless forced.
/// - At most one fetch is in flight. Callers that queue behind a fetch which
///   started after they were issued take its outcome instead of fetching again.
/// - Failures never escape: they are logged, reported once per failure
///   streak through the [`Notifier`], and the previous snapshot stays cached.
pub struct RefreshCoordinator {
    client: Arc<dyn HubClient>,
    notifier: Arc<dyn Notifier>,
    cache: SnapshotCache,
    min_interval: Duration,
    /// Fetches started so far. Only incremented while `state` is held.
    fetches: AtomicU64,
    state: Mutex<RefreshState>,
}

#[derive(Default)]
struct RefreshState {
    last_fetch: Option<Instant>,
    last_outcome: Option<RefreshOutcome>,
    notified: bool,
}

impl RefreshCoordinator {
    pub fn new(
        client: Arc<dyn HubClient>,
        notifier: Arc<dyn Notifier>,
        min_interval: Duration,
    ) -> Self {
        Self {
            client,
            notifier,
            cache: SnapshotCache::new(),
            min_interval,
            fetches: AtomicU64::new(0),
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub(crate) fn client(&self) -> &dyn HubClient {
        self.client.as_ref()
    }

    /// Latest snapshot; `None` until the first successful fetch.
    pub async fn snapshot(&self) -> Option<Arc<HubSnapshot>> {
        self.cache.current().await
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.cache.fetched_at().await
    }

    /// Refresh the cached snapshot. `true` means the cache is usable: either
    /// freshly fetched or still within the minimum interval.
    pub async fn refresh(&self, force: bool) -> bool {
        self.refresh_outcome(force).await.is_success()
    }

    pub async fn refresh_outcome(&self, force: bool) -> RefreshOutcome {
        let ticket = self.fetches.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if !force {
            if let Some(last) = state.last_fetch {
                if last.elapsed() < self.min_interval {
                    debug!("Skipping update (data already fetched within scan interval)");
                    return RefreshOutcome::Cached;
                }
            }
        }

        if self.fetches.load(Ordering::Acquire) > ticket {
            if let Some(outcome) = state.last_outcome {
                debug!(?outcome, "Reusing result of fetch completed while waiting");
                return outcome;
            }
        }

        // Cleared first so a fetch dropped mid-flight leaves nothing for
        // later waiters to reuse.
        state.last_outcome = None;
        self.fetches.fetch_add(1, Ordering::AcqRel);
        info!(force, "Updating Wiser data from hub");

        let outcome = match self.client.fetch().await {
            Ok(snapshot) => {
                debug!(devices = snapshot.devices.len(), "Hub snapshot received");
                self.cache.replace(snapshot).await;
                state.last_fetch = Some(Instant::now());
                if std::mem::take(&mut state.notified) {
                    self.notifier.dismiss(NOTIFICATION_ID);
                }
                info!("Wiser hub data updated");
                RefreshOutcome::Fetched
            }
            Err(err) => {
                let kind = FailureKind::from(&err);
                match kind {
                    FailureKind::Decode => error!(
                        error = %err,
                        "Data not JSON when getting data from hub, did you enter the right host?"
                    ),
                    _ => error!(error = %err, "Unable to update from Wiser hub"),
                }
                if !state.notified {
                    self.notifier.create(failure_notification(&err));
                    state.notified = true;
                }
                RefreshOutcome::Failed(kind)
            }
        };

        state.last_outcome = Some(outcome);
        outcome
    }
}

fn failure_notification(err: &HubError) -> Notification {
    let message = match err {
        HubError::Timeout { host } => format!(
            "Error: {err}<br /> Check the hub at {host} is powered on and reachable. \
             Updates resume automatically once it answers."
        ),
        HubError::Decode(_) => format!(
            "Error: {err}<br /> The hub did not return JSON, did you enter the right host \
             address? You will need to restart the service after fixing."
        ),
        _ => format!("Error: {err}"),
    };
    Notification::new(message)
}

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    control::CommandDispatcher,
    coordinator::{FailureKind, RefreshOutcome},
    host::{Host, PLATFORMS},
};

/// Startup lifecycle, observable through [`SetupHandle::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SetupState {
    NotStarted,
    Connecting,
    /// Waiting for the next attempt after `attempt` failures.
    Retrying { attempt: u32 },
    Ready,
    Cancelled,
}

#[derive(Debug, Error, PartialEq, Eq)]
enum SetupFailure {
    #[error("hub did not answer in time")]
    Timeout,
    #[error("hub refresh failed ({0:?})")]
    Unreachable(FailureKind),
    #[error("hub reported no devices")]
    NoDevicesFound,
}

/// Brings the integration up: connect, and retry every `retry_delay` until
/// the hub answers with at least one device. Platforms are published to the
/// host exactly once, on the first success.
pub struct StartupSequencer {
    dispatcher: CommandDispatcher,
    host: Arc<dyn Host>,
    retry_delay: Duration,
    state: watch::Sender<SetupState>,
}

impl StartupSequencer {
    pub fn new(dispatcher: CommandDispatcher, host: Arc<dyn Host>, retry_delay: Duration) -> Self {
        let (state, _) = watch::channel(SetupState::NotStarted);
        Self {
            dispatcher,
            host,
            retry_delay,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SetupState> {
        self.state.subscribe()
    }

    /// Spawn the startup task and return immediately.
    pub fn start(self, cancel: CancellationToken) -> SetupHandle {
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(cancel.clone()));
        SetupHandle { state, cancel, task }
    }

    async fn run(self, cancel: CancellationToken) -> SetupState {
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return self.finish(SetupState::Cancelled);
            }

            self.state.send_replace(SetupState::Connecting);
            match self.connect().await {
                Ok(()) => {
                    self.publish_platforms().await;
                    info!(attempts = attempt + 1, "Wiser hub setup complete");
                    return self.finish(SetupState::Ready);
                }
                Err(SetupFailure::Timeout) => {
                    error!("Timed out connecting to the Wiser hub")
                }
                Err(SetupFailure::NoDevicesFound) => {
                    error!("Wiser hub answered but reported no devices")
                }
                Err(e) => error!(error = %e, "Wiser hub setup failed"),
            }

            attempt += 1;
            self.state.send_replace(SetupState::Retrying { attempt });
            info!(
                attempt,
                retry_secs = self.retry_delay.as_secs(),
                "Retrying Wiser hub setup"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.finish(SetupState::Cancelled),
                _ = time::sleep(self.retry_delay) => {}
            }
        }
    }

    async fn connect(&self) -> Result<(), SetupFailure> {
        let coordinator = self.dispatcher.coordinator();
        match coordinator.refresh_outcome(true).await {
            RefreshOutcome::Failed(FailureKind::Timeout) => return Err(SetupFailure::Timeout),
            RefreshOutcome::Failed(kind) => return Err(SetupFailure::Unreachable(kind)),
            RefreshOutcome::Fetched | RefreshOutcome::Cached => {}
        }

        match coordinator.snapshot().await {
            Some(s) if !s.devices.is_empty() => Ok(()),
            _ => Err(SetupFailure::NoDevicesFound),
        }
    }

    async fn publish_platforms(&self) {
        for platform in PLATFORMS {
            if let Err(e) = self
                .host
                .load_platform(platform, self.dispatcher.clone())
                .await
            {
                error!(?platform, error = %e, "Failed to load platform");
            }
        }
    }

    fn finish(&self, state: SetupState) -> SetupState {
        self.state.send_replace(state);
        if state == SetupState::Cancelled {
            info!("Wiser hub setup cancelled");
        }
        state
    }
}

/// Handle to a running [`StartupSequencer`].
pub struct SetupHandle {
    state: watch::Receiver<SetupState>,
    cancel: CancellationToken,
    task: JoinHandle<SetupState>,
}

impl SetupHandle {
    pub fn state(&self) -> SetupState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SetupState> {
        self.state.clone()
    }

    /// Stop retrying. An attempt already talking to the hub runs to completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> SetupState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Setup task failed");
                SetupState::Cancelled
            }
        }
    }
}

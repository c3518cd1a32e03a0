use std::{future::Future, sync::Arc, time::Duration};

use tokio::time;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    coordinator::RefreshCoordinator,
    hub::{
        models::{HomeAwayMode, HotwaterMode, PlugState, Room, RoomMode},
        HubError, TEMP_MAXIMUM, TEMP_MINIMUM,
    },
};

/// Pause before re-reading the hub after commands whose effect shows up late
/// in the hub's reported state.
pub const SLOW_COMMAND_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSettings {
    /// Lowest settable temperature, °C.
    pub minimum_temp: f64,
    /// Degrees added to the current room temperature when boosting.
    pub boost_temp: f64,
    pub boost_minutes: u32,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            minimum_temp: TEMP_MINIMUM,
            boost_temp: 2.0,
            boost_minutes: 30,
        }
    }
}

impl From<&Config> for CommandSettings {
    fn from(config: &Config) -> Self {
        Self {
            minimum_temp: config.minimum_temp,
            boost_temp: config.boost_temp,
            boost_minutes: config.boost_time_mins,
        }
    }
}

/// Turns user intents into hub writes.
///
/// Every command is followed by exactly one forced refresh so the cached
/// snapshot reflects the change as soon as the hub reports it. Hub errors
/// are logged and swallowed; commands never fail towards the caller.
#[derive(Clone)]
pub struct CommandDispatcher {
    coordinator: Arc<RefreshCoordinator>,
    settings: CommandSettings,
}

impl CommandDispatcher {
    pub fn new(coordinator: Arc<RefreshCoordinator>, settings: CommandSettings) -> Self {
        Self { coordinator, settings }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn settings(&self) -> CommandSettings {
        self.settings
    }

    pub async fn set_room_temperature(&self, room_id: u32, celsius: f64) {
        let target = self.clamp(celsius);
        info!(room_id, requested = celsius, target, "Setting room temperature");
        let call = self.coordinator.client().set_room_temperature(room_id, target);
        self.dispatch("set_room_temperature", None, call).await;
    }

    /// Boost raises the room to its current temperature plus the configured
    /// delta for the configured number of minutes.
    pub async fn set_room_mode(&self, room_id: u32, mode: RoomMode) {
        let boost_temp = self.boost_target(room_id).await;
        info!(room_id, ?mode, boost_temp, "Setting room mode");
        let call = self.coordinator.client().set_room_mode(
            room_id,
            mode,
            boost_temp,
            self.settings.boost_minutes,
        );
        self.dispatch("set_room_mode", None, call).await;
    }

    pub async fn set_away_mode(&self, away: bool, away_temperature: f64) {
        let mode = if away { HomeAwayMode::Away } else { HomeAwayMode::Home };
        let temperature = self.clamp(away_temperature);
        info!(?mode, temperature, "Setting away mode");
        let call = self.coordinator.client().set_home_away_mode(mode, temperature);
        self.dispatch("set_away_mode", None, call).await;
    }

    pub async fn set_system_switch(&self, switch: &str, on: bool) {
        info!(switch, on, "Setting system switch");
        let call = self.coordinator.client().set_system_switch(switch, on);
        self.dispatch("set_system_switch", None, call).await;
    }

    pub async fn set_smart_plug_state(&self, plug_id: u32, state: PlugState) {
        info!(plug_id, ?state, "Setting smart plug");
        let call = self.coordinator.client().set_smart_plug_state(plug_id, state);
        self.dispatch("set_smart_plug_state", Some(SLOW_COMMAND_DELAY), call)
            .await;
    }

    pub async fn set_hotwater_mode(&self, mode: HotwaterMode) {
        info!(?mode, "Setting hot water mode");
        let call = self.coordinator.client().set_hotwater_mode(mode);
        self.dispatch("set_hotwater_mode", Some(SLOW_COMMAND_DELAY), call)
            .await;
    }

    async fn dispatch(
        &self,
        command: &'static str,
        delay: Option<Duration>,
        call: impl Future<Output = Result<(), HubError>>,
    ) {
        if let Err(e) = call.await {
            error!(command, error = %e, "Hub command failed");
        }

        if let Some(delay) = delay {
            time::sleep(delay).await;
        }

        if !self.coordinator.refresh(true).await {
            warn!(command, "Refresh after command failed; serving cached data");
        }
    }

    async fn boost_target(&self, room_id: u32) -> f64 {
        let current = self
            .coordinator
            .snapshot()
            .await
            .and_then(|s| s.room(room_id).and_then(Room::current_temperature));
        self.clamp(current.unwrap_or(self.settings.minimum_temp) + self.settings.boost_temp)
    }

    fn clamp(&self, celsius: f64) -> f64 {
        celsius.max(self.settings.minimum_temp).min(TEMP_MAXIMUM)
    }
}

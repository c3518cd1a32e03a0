//! Stubs shared by the unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    control::CommandDispatcher,
    coordinator::RefreshCoordinator,
    host::{Host, Platform},
    hub::{
        models::{HomeAwayMode, HotwaterMode, HubSnapshot, PlugState, RoomMode},
        HubClient, HubError,
    },
    notify::{Notification, Notifier},
};

/// A small but complete `/data/domain/` answer: a controller, a room stat
/// and a TRV in the lounge, a TRV in the (switched off) kitchen, a smart
/// plug, one heating channel and hot water.
pub const SAMPLE_DOMAIN: &str = r#"{
  "System": {
    "CloudConnectionStatus": "Connected",
    "AwayModeSetPointLimit": 100,
    "HeatingButtonOverrideState": "Off",
    "HotWaterButtonOverrideState": "Off"
  },
  "HeatingChannel": [
    { "id": 1, "Name": "Channel-1", "RoomIds": [1, 2], "PercentageDemand": 35, "HeatingRelayState": "On" }
  ],
  "Room": [
    { "id": 1, "Name": "Lounge", "RoomStatId": 32, "SmartValveIds": [33],
      "CalculatedTemperature": 195, "CurrentSetPoint": 210, "Mode": "Auto" },
    { "id": 2, "Name": "Kitchen", "SmartValveIds": [34],
      "CalculatedTemperature": 180, "CurrentSetPoint": -200, "Mode": "Manual" }
  ],
  "Device": [
    { "id": 0, "ProductType": "Controller", "DisplayedSignalStrength": "VeryGood",
      "ModelIdentifier": "WT724R1S0902", "ActiveFirmwareVersion": "2.26.16-6340f5b" },
    { "id": 32, "ProductType": "RoomStat", "DisplayedSignalStrength": "VeryGood",
      "BatteryVoltage": 31, "BatteryLevel": "Normal", "SerialNumber": "RS001",
      "ModelIdentifier": "Thermostat", "DeviceLockEnabled": false,
      "ReceptionOfController": { "Rssi": -61, "Lqi": 216 } },
    { "id": 33, "ProductType": "iTRV", "DisplayedSignalStrength": "Good",
      "BatteryVoltage": 29, "BatteryLevel": "Normal", "SerialNumber": "TRV001",
      "ReceptionOfDevice": { "Rssi": -70, "Lqi": 140 } },
    { "id": 34, "ProductType": "iTRV", "DisplayedSignalStrength": "Poor",
      "BatteryVoltage": 26, "BatteryLevel": "Low", "SerialNumber": "TRV002" },
    { "id": 40, "ProductType": "SmartPlug", "DisplayedSignalStrength": "Medium",
      "SerialNumber": "SP001" }
  ],
  "RoomStat": [
    { "id": 32, "MeasuredHumidity": 55, "MeasuredTemperature": 196 }
  ],
  "SmartPlug": [
    { "id": 40, "Name": "Lamp", "OutputState": "Off", "Mode": "Manual" }
  ],
  "HotWater": [
    { "id": 2, "WaterHeatingState": "Off", "Mode": "Auto" }
  ],
  "UpgradeInfo": [ { "id": 0 } ]
}"#;

pub fn sample_snapshot() -> HubSnapshot {
    serde_json::from_str(SAMPLE_DOMAIN).unwrap()
}

/// The sample snapshot with `tag` as cloud status, so tests can tell
/// which fetch produced a snapshot.
pub fn tagged_snapshot(tag: &str) -> HubSnapshot {
    let mut snapshot = sample_snapshot();
    snapshot.system.cloud_connection_status = Some(tag.to_owned());
    snapshot
}

pub fn snapshot_tag(snapshot: &HubSnapshot) -> Option<&str> {
    snapshot.system.cloud_connection_status.as_deref()
}

// ---------------------------------------------------------------------------
// StubHub
// ---------------------------------------------------------------------------

/// One scripted answer to `fetch`.
#[derive(Debug, Clone)]
pub enum Scripted {
    Snapshot(HubSnapshot),
    Timeout,
    Decode,
}

/// Every call the stub receives, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch,
    SetRoomTemperature(u32, f64),
    SetRoomMode(u32, RoomMode, f64, u32),
    SetHomeAway(HomeAwayMode, f64),
    SetSystemSwitch(String, bool),
    SetSmartPlug(u32, PlugState),
    SetHotwater(HotwaterMode),
}

/// In-memory [`HubClient`]. Fetches follow the script, then fall back to
/// the sample snapshot (or a timeout for [`StubHub::unreachable`]).
pub struct StubHub {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    fetch_delay: Duration,
    fail_commands: bool,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubHub {
    pub fn new() -> Self {
        Self::with_fallback(Scripted::Snapshot(sample_snapshot()))
    }

    pub fn unreachable() -> Self {
        Self::with_fallback(Scripted::Timeout)
    }

    fn with_fallback(fallback: Scripted) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            fetch_delay: Duration::ZERO,
            fail_commands: false,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_script(self, script: Vec<Scripted>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_failing_commands(mut self) -> Self {
        self.fail_commands = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Fetch).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) -> Result<(), HubError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_commands {
            Err(HubError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                path: "/stub".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HubClient for StubHub {
    async fn fetch(&self) -> Result<HubSnapshot, HubError> {
        self.calls.lock().unwrap().push(Call::Fetch);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match next {
            Scripted::Snapshot(s) => Ok(s),
            Scripted::Timeout => Err(HubError::Timeout { host: "stub-hub".into() }),
            Scripted::Decode => Err(HubError::Decode(
                serde_json::from_str::<serde_json::Value>("<html>").unwrap_err(),
            )),
        }
    }

    async fn set_room_temperature(&self, room_id: u32, celsius: f64) -> Result<(), HubError> {
        self.record(Call::SetRoomTemperature(room_id, celsius))
    }

    async fn set_room_mode(
        &self,
        room_id: u32,
        mode: RoomMode,
        boost_temp: f64,
        boost_minutes: u32,
    ) -> Result<(), HubError> {
        self.record(Call::SetRoomMode(room_id, mode, boost_temp, boost_minutes))
    }

    async fn set_home_away_mode(
        &self,
        mode: HomeAwayMode,
        away_temperature: f64,
    ) -> Result<(), HubError> {
        self.record(Call::SetHomeAway(mode, away_temperature))
    }

    async fn set_system_switch(&self, switch: &str, on: bool) -> Result<(), HubError> {
        self.record(Call::SetSystemSwitch(switch.to_owned(), on))
    }

    async fn set_smart_plug_state(&self, plug_id: u32, state: PlugState) -> Result<(), HubError> {
        self.record(Call::SetSmartPlug(plug_id, state))
    }

    async fn set_hotwater_mode(&self, mode: HotwaterMode) -> Result<(), HubError> {
        self.record(Call::SetHotwater(mode))
    }
}

// ---------------------------------------------------------------------------
// Host and notifier doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    created: Mutex<Vec<Notification>>,
    dismissed: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn created(&self) -> Vec<Notification> {
        self.created.lock().unwrap().clone()
    }

    pub fn dismissed(&self) -> Vec<String> {
        self.dismissed.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn create(&self, notification: Notification) {
        self.created.lock().unwrap().push(notification);
    }

    fn dismiss(&self, id: &str) {
        self.dismissed.lock().unwrap().push(id.to_owned());
    }
}

#[derive(Default)]
pub struct RecordingHost {
    loads: Mutex<Vec<Platform>>,
}

impl RecordingHost {
    pub fn loads(&self) -> Vec<Platform> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn load_platform(
        &self,
        platform: Platform,
        _dispatcher: CommandDispatcher,
    ) -> anyhow::Result<()> {
        self.loads.lock().unwrap().push(platform);
        Ok(())
    }
}

pub fn coordinator_with(
    hub: Arc<StubHub>,
    min_interval: Duration,
) -> (Arc<RefreshCoordinator>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = Arc::new(RefreshCoordinator::new(hub, notifier.clone(), min_interval));
    (coordinator, notifier)
}

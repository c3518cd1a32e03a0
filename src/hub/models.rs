use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Domain snapshot: GET /data/domain/
//
// The hub answers with one JSON object holding every collection it knows
// about. Keys are PascalCase, except for `id`:
//
//   { "System": {...}, "HeatingChannel": [...], "Room": [...],
//     "Device": [...], "RoomStat": [...], "SmartPlug": [...],
//     "HotWater": [...], ... }
//
// Collections the hub does not report (no hot water cylinder, no smart
// plugs) are simply absent. Unknown keys are ignored.
// ---------------------------------------------------------------------------

/// Everything the hub reported in a single fetch.
///
/// Replaced wholesale on every successful refresh; never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HubSnapshot {
    #[serde(rename = "System", default)]
    pub system: System,

    #[serde(rename = "HeatingChannel", default)]
    pub heating_channels: Vec<HeatingChannel>,

    #[serde(rename = "Room", default)]
    pub rooms: Vec<Room>,

    #[serde(rename = "Device", default)]
    pub devices: Vec<Device>,

    #[serde(rename = "RoomStat", default)]
    pub room_stats: Vec<RoomStat>,

    #[serde(rename = "SmartPlug", default)]
    pub smart_plugs: Vec<SmartPlug>,

    #[serde(rename = "HotWater", default)]
    pub hot_water: Vec<HotWater>,
}

impl HubSnapshot {
    pub fn device(&self, device_id: u32) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == device_id)
    }

    pub fn room(&self, room_id: u32) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    /// The room a device is fitted in, matched on its room stat or valve ids.
    pub fn device_room(&self, device_id: u32) -> Option<&Room> {
        self.rooms.iter().find(|r| r.has_device(device_id))
    }

    pub fn room_stat(&self, device_id: u32) -> Option<&RoomStat> {
        self.room_stats.iter().find(|s| s.id == device_id)
    }

    pub fn smart_plug(&self, plug_id: u32) -> Option<&SmartPlug> {
        self.smart_plugs.iter().find(|p| p.id == plug_id)
    }

    /// `None` when the hub has no hot water circuit.
    pub fn hotwater(&self) -> Option<&HotWater> {
        self.hot_water.first()
    }

    /// `"On"` if any heating channel is calling for heat, `"Off"` otherwise.
    /// `None` when the hub reports no heating channels.
    pub fn heating_relay_status(&self) -> Option<&str> {
        if self.heating_channels.is_empty() {
            return None;
        }
        let on = self
            .heating_channels
            .iter()
            .any(|c| c.heating_relay_state.as_deref() == Some("On"));
        Some(if on { "On" } else { "Off" })
    }

    pub fn hotwater_relay_status(&self) -> Option<&str> {
        self.hotwater()?.water_heating_state.as_deref()
    }

    /// Percentage demand of the heating channel serving `room_id`.
    pub fn room_demand(&self, room_id: u32) -> Option<i64> {
        self.heating_channels
            .iter()
            .find(|c| c.room_ids.contains(&room_id))?
            .percentage_demand
    }
}

// ---------------------------------------------------------------------------
// HubValue: numbers the hub sometimes reports as strings
//
// `AwayModeSetPointLimit` has been observed both as `100` and `"100"`.
// Integer MUST come before Float so whole numbers stay exact.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HubValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl HubValue {
    /// Integer view of the value; text must parse as a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HubValue::Integer(v) => Some(*v),
            HubValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            HubValue::Float(_) => None,
            HubValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct System {
    /// `"Connected"` when the hub can reach the Wiser cloud.
    pub cloud_connection_status: Option<String>,

    /// `"Away"` while away mode is active.
    pub override_type: Option<String>,

    /// Away-mode set point in tenths of °C.
    pub away_mode_set_point_limit: Option<HubValue>,

    pub heating_button_override_state: Option<String>,

    pub hot_water_button_override_state: Option<String>,
}

// ---------------------------------------------------------------------------
// Heating channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeatingChannel {
    #[serde(rename = "id")]
    pub id: u32,

    pub name: Option<String>,

    pub percentage_demand: Option<i64>,

    #[serde(default)]
    pub room_ids: Vec<u32>,

    /// `"On"` | `"Off"`.
    pub heating_relay_state: Option<String>,
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// Set point the hub uses for a room that has been switched off.
pub const SET_POINT_OFF: i64 = -200;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Room {
    #[serde(rename = "id")]
    pub id: u32,

    pub name: Option<String>,

    pub room_stat_id: Option<u32>,

    #[serde(default)]
    pub smart_valve_ids: Vec<u32>,

    /// Tenths of °C.
    pub calculated_temperature: Option<i64>,

    /// Tenths of °C; `-200` means off.
    pub current_set_point: Option<i64>,

    /// `"Auto"` | `"Manual"`.
    pub mode: Option<String>,

    pub override_type: Option<String>,
}

impl Room {
    pub fn has_device(&self, device_id: u32) -> bool {
        self.room_stat_id == Some(device_id) || self.smart_valve_ids.contains(&device_id)
    }

    pub fn name_or_default(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.calculated_temperature.map(from_tenths)
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.current_set_point
            .filter(|sp| *sp != SET_POINT_OFF)
            .map(from_tenths)
    }

    pub fn is_off(&self) -> bool {
        self.current_set_point == Some(SET_POINT_OFF)
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    #[serde(rename = "id")]
    pub id: u32,

    /// `"Controller"`, `"iTRV"`, `"RoomStat"`, `"SmartPlug"`, ...
    pub product_type: Option<String>,

    /// `"Poor"` | `"Medium"` | `"Good"` | `"VeryGood"` | ...
    pub displayed_signal_strength: Option<String>,

    /// Tenths of a volt; 31 is a full pair of cells.
    pub battery_voltage: Option<f64>,

    /// Coarse level reported by the hub, e.g. `"Normal"`.
    pub battery_level: Option<String>,

    pub serial_number: Option<String>,

    pub active_firmware_version: Option<String>,

    pub model_identifier: Option<String>,

    pub device_lock_enabled: Option<bool>,

    pub reception_of_device: Option<Reception>,

    pub reception_of_controller: Option<Reception>,
}

impl Device {
    pub fn kind(&self) -> ProductType {
        self.product_type
            .as_deref()
            .map(ProductType::from)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reception {
    pub rssi: Option<i64>,
    pub lqi: Option<i64>,
}

/// Device product type. Unknown types are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProductType {
    Controller,
    Itrv,
    RoomStat,
    SmartPlug,
    Other(String),
    #[default]
    Unknown,
}

impl From<&str> for ProductType {
    fn from(s: &str) -> Self {
        match s {
            "Controller" => Self::Controller,
            "iTRV" => Self::Itrv,
            "RoomStat" => Self::RoomStat,
            "SmartPlug" => Self::SmartPlug,
            "" => Self::Unknown,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProductType::Controller => "Controller",
            ProductType::Itrv => "iTRV",
            ProductType::RoomStat => "RoomStat",
            ProductType::SmartPlug => "SmartPlug",
            ProductType::Other(s) => s.as_str(),
            ProductType::Unknown => "",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomStat {
    #[serde(rename = "id")]
    pub id: u32,

    /// Relative humidity, %.
    pub measured_humidity: Option<i64>,

    /// Tenths of °C.
    pub measured_temperature: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmartPlug {
    #[serde(rename = "id")]
    pub id: u32,

    pub name: Option<String>,

    /// `"On"` | `"Off"`.
    pub output_state: Option<String>,

    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HotWater {
    #[serde(rename = "id")]
    pub id: u32,

    /// Hot water relay, `"On"` or `"Off"`.
    pub water_heating_state: Option<String>,

    pub mode: Option<String>,
}

// ---------------------------------------------------------------------------
// Command parameters
// ---------------------------------------------------------------------------

/// Room operating mode as accepted by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    Auto,
    Manual,
    Boost,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HomeAwayMode {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlugState {
    On,
    Off,
}

impl PlugState {
    pub fn as_hub_str(self) -> &'static str {
        match self {
            PlugState::On => "On",
            PlugState::Off => "Off",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HotwaterMode {
    On,
    Off,
    Auto,
}

/// Convert a hub tenths-of-a-degree reading to °C.
#[inline]
pub fn from_tenths(v: i64) -> f64 {
    v as f64 / 10.0
}

/// Convert °C to the tenths-of-a-degree integer the hub expects.
#[inline]
pub fn to_tenths(celsius: f64) -> i64 {
    (celsius * 10.0).round() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_snapshot;

    #[test]
    fn hub_value_integer_deserializes() {
        let v: HubValue = serde_json::from_str("100").unwrap();
        assert_eq!(v, HubValue::Integer(100));
        assert_eq!(v.as_i64(), Some(100));
    }

    #[test]
    fn hub_value_numeric_text_parses() {
        let v: HubValue = serde_json::from_str(r#""100""#).unwrap();
        assert_eq!(v.as_i64(), Some(100));
    }

    #[test]
    fn hub_value_garbage_text_is_none() {
        let v: HubValue = serde_json::from_str(r#""ten""#).unwrap();
        assert_eq!(v.as_i64(), None);
    }

    #[test]
    fn hub_value_float_truncates() {
        let v: HubValue = serde_json::from_str("105.7").unwrap();
        assert_eq!(v.as_i64(), Some(105));
    }

    #[test]
    fn empty_object_is_empty_snapshot() {
        let snap: HubSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snap, HubSnapshot::default());
        assert!(snap.devices.is_empty());
        assert!(snap.hotwater().is_none());
        assert!(snap.heating_relay_status().is_none());
    }

    #[test]
    fn sample_snapshot_decodes_all_collections() {
        let snap = sample_snapshot();
        assert_eq!(snap.devices.len(), 5);
        assert_eq!(snap.rooms.len(), 2);
        assert_eq!(snap.heating_channels.len(), 1);
        assert_eq!(snap.room_stats.len(), 1);
        assert_eq!(snap.smart_plugs.len(), 1);
        assert_eq!(snap.system.cloud_connection_status.as_deref(), Some("Connected"));
    }

    #[test]
    fn device_room_matches_room_stat_and_valves() {
        let snap = sample_snapshot();
        assert_eq!(snap.device_room(32).unwrap().name_or_default(), "Lounge");
        assert_eq!(snap.device_room(33).unwrap().name_or_default(), "Lounge");
        assert_eq!(snap.device_room(34).unwrap().name_or_default(), "Kitchen");
        assert!(snap.device_room(0).is_none());
    }

    #[test]
    fn room_temperatures_are_in_celsius() {
        let snap = sample_snapshot();
        let lounge = snap.room(1).unwrap();
        assert_eq!(lounge.current_temperature(), Some(19.5));
        assert_eq!(lounge.target_temperature(), Some(21.0));

        let kitchen = snap.room(2).unwrap();
        assert!(kitchen.is_off());
        assert_eq!(kitchen.target_temperature(), None);
    }

    #[test]
    fn relay_status_helpers() {
        let snap = sample_snapshot();
        assert_eq!(snap.heating_relay_status(), Some("On"));
        assert_eq!(snap.hotwater_relay_status(), Some("Off"));
        assert_eq!(snap.room_demand(1), Some(35));
        assert_eq!(snap.room_demand(99), None);
    }

    #[test]
    fn product_type_parses_known_and_unknown() {
        assert_eq!(ProductType::from("Controller"), ProductType::Controller);
        assert_eq!(ProductType::from("iTRV"), ProductType::Itrv);
        assert_eq!(
            ProductType::from("HeatingActuator"),
            ProductType::Other("HeatingActuator".into())
        );
        assert_eq!(ProductType::Itrv.to_string(), "iTRV");
    }

    #[test]
    fn tenths_conversions() {
        assert_eq!(to_tenths(21.5), 215);
        assert_eq!(to_tenths(-20.0), -200);
        assert_eq!(from_tenths(195), 19.5);
    }
}

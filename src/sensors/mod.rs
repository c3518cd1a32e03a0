use std::{collections::BTreeMap, sync::Arc};

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    coordinator::RefreshCoordinator,
    host::{EntityState, Platform},
    hub::models::{Device, HubSnapshot, HubValue, ProductType},
};

/// Battery voltage (in hub units) treated as a full battery.
pub const BATTERY_FULL: f64 = 31.0;

pub const VENDOR: &str = "Drayton Wiser";

/// Reported when the away set point is missing or not a number.
pub const AWAY_TEMPERATURE_UNKNOWN: f64 = -1.0;

pub fn battery_percentage(voltage: f64) -> f64 {
    voltage / BATTERY_FULL * 100.0
}

pub fn signal_icon(signal_strength: Option<&str>) -> &'static str {
    match signal_strength {
        Some("Poor") => "mdi:wifi-strength-1",
        Some("Medium") => "mdi:wifi-strength-2",
        Some("Good") => "mdi:wifi-strength-3",
        Some("VeryGood") => "mdi:wifi-strength-4",
        _ => "mdi:wifi-strength-alert-outline",
    }
}

/// Away-mode set point limit in °C.
pub fn away_mode_temperature(limit: Option<&HubValue>) -> f64 {
    let Some(limit) = limit else {
        return AWAY_TEMPERATURE_UNKNOWN;
    };
    match limit.as_i64() {
        Some(tenths) => {
            debug!(?limit, "Used value for away temperature");
            tenths as f64 / 10.0
        }
        None => {
            debug!(?limit, "Unexpected value for away temperature");
            AWAY_TEMPERATURE_UNKNOWN
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Heating,
    HotWater,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorKind {
    /// One per hub device. `product_type` is captured when the entity is
    /// created and selects the extra attributes it exposes.
    Device { device_id: u32, product_type: ProductType },
    CircuitState(Circuit),
    CloudStatus,
    OperationMode,
}

impl SensorKind {
    pub fn unique_id(&self) -> String {
        match self {
            SensorKind::Device { device_id, .. } => format!("wiser_device_{device_id}"),
            SensorKind::CircuitState(Circuit::Heating) => "wiser_heating".into(),
            SensorKind::CircuitState(Circuit::HotWater) => "wiser_hot_water".into(),
            SensorKind::CloudStatus => "wiser_cloud_status".into(),
            SensorKind::OperationMode => "wiser_operation_mode".into(),
        }
    }

    /// Render the sensor against `snapshot`. A missing snapshot or record
    /// yields absent state and no attributes.
    pub fn render(&self, snapshot: Option<&HubSnapshot>) -> EntityState {
        let mut out = EntityState::new(self.unique_id(), Platform::Sensor, self.name(snapshot));

        match self {
            SensorKind::Device { device_id, product_type } => {
                let device = snapshot.and_then(|s| s.device(*device_id));
                let signal = device.and_then(|d| d.displayed_signal_strength.as_deref());
                out.icon = Some(signal_icon(signal).to_owned());
                out.state = signal.map(str::to_owned);
                if let (Some(snapshot), Some(device)) = (snapshot, device) {
                    out.attributes = device_attributes(snapshot, device, product_type);
                }
            }
            SensorKind::CircuitState(circuit) => {
                let status = snapshot.and_then(|s| match circuit {
                    Circuit::Heating => s.heating_relay_status(),
                    Circuit::HotWater => s.hotwater_relay_status(),
                });
                let off = status == Some("Off");
                let icon = match (circuit, off) {
                    (Circuit::Heating, true) => "mdi:radiator-disabled",
                    (Circuit::Heating, false) => "mdi:radiator",
                    (Circuit::HotWater, true) => "mdi:water-off",
                    (Circuit::HotWater, false) => "mdi:water",
                };
                out.icon = Some(icon.to_owned());
                out.state = status.map(str::to_owned);
                if let (Circuit::Heating, Some(snapshot)) = (circuit, snapshot) {
                    for channel in &snapshot.heating_channels {
                        let name = channel.name.as_deref().unwrap_or_default();
                        out.attributes
                            .insert(format!("percentage_demand_{name}"), json!(channel.percentage_demand));
                        out.attributes
                            .insert(format!("room_ids_{name}"), json!(channel.room_ids));
                    }
                }
            }
            SensorKind::CloudStatus => {
                let status = snapshot.and_then(|s| s.system.cloud_connection_status.as_deref());
                out.icon = Some(
                    if status == Some("Connected") { "mdi:cloud-check" } else { "mdi:cloud-alert" }
                        .to_owned(),
                );
                out.state = status.map(str::to_owned);
            }
            SensorKind::OperationMode => {
                let system = snapshot.map(|s| &s.system);
                let away = system.and_then(|s| s.override_type.as_deref()) == Some("Away");
                out.state = Some(if away { "Away" } else { "Normal" }.to_owned());
                out.icon = Some(if away { "mdi:alert" } else { "mdi:check" }.to_owned());
                out.attributes.insert(
                    "AwayModeTemperature".into(),
                    json!(away_mode_temperature(
                        system.and_then(|s| s.away_mode_set_point_limit.as_ref())
                    )),
                );
            }
        }

        out
    }

    fn name(&self, snapshot: Option<&HubSnapshot>) -> String {
        match self {
            SensorKind::Device { device_id, product_type } => {
                let device = snapshot.and_then(|s| s.device(*device_id));
                let kind = device.map(Device::kind).unwrap_or_else(|| product_type.clone());
                match kind {
                    ProductType::Controller => "Wiser Heathub".to_owned(),
                    ProductType::Itrv | ProductType::RoomStat => {
                        let room = snapshot
                            .and_then(|s| s.device_room(*device_id))
                            .map(|r| r.name_or_default())
                            .unwrap_or("Unknown");
                        format!("Wiser {kind}-{room}")
                    }
                    _ => {
                        let serial = device
                            .and_then(|d| d.serial_number.as_deref())
                            .unwrap_or_default();
                        format!("Wiser {kind}-{serial}")
                    }
                }
            }
            SensorKind::CircuitState(Circuit::Heating) => "Wiser Heating".to_owned(),
            SensorKind::CircuitState(Circuit::HotWater) => "Wiser Hot Water".to_owned(),
            SensorKind::CloudStatus => "Wiser Cloud Status".to_owned(),
            SensorKind::OperationMode => "Wiser Operation Mode".to_owned(),
        }
    }
}

fn device_attributes(
    snapshot: &HubSnapshot,
    device: &Device,
    product_type: &ProductType,
) -> BTreeMap<String, Value> {
    let mut attrs = BTreeMap::new();
    attrs.insert("vendor".into(), json!(VENDOR));
    attrs.insert("product_type".into(), json!(device.product_type));
    attrs.insert("model_identifier".into(), json!(device.model_identifier));
    attrs.insert("device_lock_enabled".into(), json!(device.device_lock_enabled));
    attrs.insert("displayed_signal_strength".into(), json!(device.displayed_signal_strength));
    attrs.insert("firmware".into(), json!(device.active_firmware_version));

    if let Some(r) = &device.reception_of_device {
        attrs.insert("device_reception_RSSI".into(), json!(r.rssi));
        attrs.insert("device_reception_LQI".into(), json!(r.lqi));
    }
    if let Some(r) = &device.reception_of_controller {
        attrs.insert("controller_reception_RSSI".into(), json!(r.rssi));
        attrs.insert("controller_reception_LQI".into(), json!(r.lqi));
    }

    if matches!(
        product_type,
        ProductType::RoomStat | ProductType::Itrv | ProductType::SmartPlug
    ) {
        attrs.insert("battery_voltage".into(), json!(device.battery_voltage));
        attrs.insert(
            "battery_percentage".into(),
            json!(device.battery_voltage.map(battery_percentage)),
        );
        attrs.insert("battery_level".into(), json!(device.battery_level));
        attrs.insert("serial_number".into(), json!(device.serial_number));
    }

    if *product_type == ProductType::RoomStat {
        let humidity = snapshot.room_stat(device.id).and_then(|s| s.measured_humidity);
        attrs.insert("humidity".into(), json!(humidity));
    }

    attrs
}

// ---------------------------------------------------------------------------
// SensorEntity
// ---------------------------------------------------------------------------

/// A sensor bound to the shared coordinator. It never owns hub state.
#[derive(Clone)]
pub struct SensorEntity {
    coordinator: Arc<RefreshCoordinator>,
    kind: SensorKind,
}

impl SensorEntity {
    pub fn new(coordinator: Arc<RefreshCoordinator>, kind: SensorKind) -> Self {
        Self { coordinator, kind }
    }

    pub fn kind(&self) -> &SensorKind {
        &self.kind
    }

    /// Poll hook: refresh unless the cache is still fresh.
    pub async fn update(&self) -> bool {
        self.coordinator.refresh(false).await
    }

    pub async fn state(&self) -> EntityState {
        let snapshot = self.coordinator.snapshot().await;
        self.kind.render(snapshot.as_deref())
    }
}

/// One sensor per device, the heating circuit, hot water when the hub has
/// it, cloud status and operation mode.
pub fn setup_entities(
    coordinator: &Arc<RefreshCoordinator>,
    snapshot: &HubSnapshot,
) -> Vec<SensorEntity> {
    let mut kinds: Vec<SensorKind> = snapshot
        .devices
        .iter()
        .map(|d| SensorKind::Device { device_id: d.id, product_type: d.kind() })
        .collect();

    kinds.push(SensorKind::CircuitState(Circuit::Heating));
    if snapshot.hotwater().is_some() {
        kinds.push(SensorKind::CircuitState(Circuit::HotWater));
    }
    kinds.push(SensorKind::CloudStatus);
    kinds.push(SensorKind::OperationMode);

    info!(count = kinds.len(), "Wiser sensors created");
    kinds
        .into_iter()
        .map(|kind| SensorEntity::new(Arc::clone(coordinator), kind))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

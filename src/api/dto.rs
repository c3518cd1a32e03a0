use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    hub::models::{HotwaterMode, PlugState, RoomMode},
    setup::SetupState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct SetupStatusDto {
    pub setup: SetupState,
    /// When the hub snapshot was last refreshed. `null` before the first
    /// successful fetch.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Request body for `PUT /rooms/{room_id}/temperature`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TemperatureRequest {
    /// Target temperature in °C. Clamped to the configured minimum and 30 °C.
    pub temperature: f64,
}

/// Request body for `PUT /rooms/{room_id}/mode`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RoomModeRequest {
    pub mode: RoomMode,
}

/// Request body for `PUT /system/away`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AwayModeRequest {
    pub away: bool,
    /// Away set point in °C. Defaults to the hub's current away limit.
    pub temperature: Option<f64>,
}

/// Request body for `PUT /system/switches/{switch}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchRequest {
    pub on: bool,
}

/// Request body for `PUT /smartplugs/{plug_id}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SmartPlugRequest {
    pub state: PlugState,
}

/// Request body for `PUT /hotwater`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct HotwaterRequest {
    pub mode: HotwaterMode,
}

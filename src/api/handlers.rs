use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{
        AwayModeRequest, HotwaterRequest, RoomModeRequest, SetupStatusDto, SmartPlugRequest,
        SwitchRequest, TemperatureRequest,
    },
    errors::AppError,
    AppState,
};
use crate::{
    host::{EntityState, Platform},
    hub::models::{HotwaterMode, HubSnapshot, PlugState, RoomMode},
    notify::Notification,
    sensors::{away_mode_temperature, AWAY_TEMPERATURE_UNKNOWN},
    setup::SetupState,
};

/// Commands need a snapshot to validate ids against.
async fn loaded_snapshot(state: &AppState) -> Result<Arc<HubSnapshot>, AppError> {
    state
        .dispatcher
        .coordinator()
        .snapshot()
        .await
        .ok_or_else(|| AppError::unavailable("no data from the Wiser hub yet"))
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

/// Startup state and the time of the last successful hub refresh.
#[utoipa::path(
    get,
    path = "/setup",
    responses(
        (status = 200, description = "Startup state", body = SetupStatusDto),
    ),
    tag = "system"
)]
pub async fn get_setup(State(state): State<AppState>) -> Json<SetupStatusDto> {
    let setup = *state.setup.borrow();
    Json(SetupStatusDto {
        setup,
        last_updated: state.dispatcher.coordinator().last_updated().await,
    })
}

/// Render every published entity from the cached snapshot.
#[utoipa::path(
    get,
    path = "/entities",
    responses(
        (status = 200, description = "Current entity states", body = Vec<EntityState>),
    ),
    tag = "entities"
)]
pub async fn get_entities(State(state): State<AppState>) -> Json<Vec<EntityState>> {
    Json(state.registry.states().await)
}

#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Active persistent notifications", body = Vec<Notification>),
    ),
    tag = "system"
)]
pub async fn get_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifier.active())
}

// ---------------------------------------------------------------------------
// Commands
//
// Each command is sent to the hub and followed by a forced refresh before
// the response is returned. Hub failures are logged, not reported: the
// entities show the hub's actual state on the next read.
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/rooms/{room_id}/temperature",
    params(("room_id" = u32, Path, description = "Hub room id")),
    request_body = TemperatureRequest,
    responses(
        (status = 202, description = "Command sent to the hub"),
        (status = 404, description = "Unknown room"),
        (status = 503, description = "No hub data yet"),
    ),
    tag = "rooms"
)]
pub async fn set_room_temperature(
    State(state): State<AppState>,
    Path(room_id): Path<u32>,
    Json(body): Json<TemperatureRequest>,
) -> Result<StatusCode, AppError> {
    loaded_snapshot(&state).await?;
    let room = state
        .registry
        .climate(room_id)
        .await
        .ok_or_else(|| AppError::not_found(format!("unknown room {room_id}")))?;

    room.set_temperature(body.temperature).await;
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    put,
    path = "/rooms/{room_id}/mode",
    params(("room_id" = u32, Path, description = "Hub room id")),
    request_body = RoomModeRequest,
    responses(
        (status = 202, description = "Command sent to the hub"),
        (status = 404, description = "Unknown room"),
        (status = 503, description = "No hub data yet"),
    ),
    tag = "rooms"
)]
pub async fn set_room_mode(
    State(state): State<AppState>,
    Path(room_id): Path<u32>,
    Json(body): Json<RoomModeRequest>,
) -> Result<StatusCode, AppError> {
    loaded_snapshot(&state).await?;
    let room = state
        .registry
        .climate(room_id)
        .await
        .ok_or_else(|| AppError::not_found(format!("unknown room {room_id}")))?;

    room.set_mode(body.mode).await;
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    put,
    path = "/system/away",
    request_body = AwayModeRequest,
    responses(
        (status = 202, description = "Command sent to the hub"),
        (status = 503, description = "No hub data yet"),
    ),
    tag = "system"
)]
pub async fn set_away_mode(
    State(state): State<AppState>,
    Json(body): Json<AwayModeRequest>,
) -> Result<StatusCode, AppError> {
    let snapshot = loaded_snapshot(&state).await?;
    let temperature = body.temperature.unwrap_or_else(|| {
        match away_mode_temperature(snapshot.system.away_mode_set_point_limit.as_ref()) {
            t if t == AWAY_TEMPERATURE_UNKNOWN => state.dispatcher.settings().minimum_temp,
            t => t,
        }
    });

    state.dispatcher.set_away_mode(body.away, temperature).await;
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    put,
    path = "/system/switches/{switch}",
    params(("switch" = String, Path, description = "Hub system switch, e.g. `ValveProtectionEnabled`")),
    request_body = SwitchRequest,
    responses(
        (status = 202, description = "Command sent to the hub"),
    ),
    tag = "system"
)]
pub async fn set_system_switch(
    State(state): State<AppState>,
    Path(switch): Path<String>,
    Json(body): Json<SwitchRequest>,
) -> StatusCode {
    state.dispatcher.set_system_switch(&switch, body.on).await;
    StatusCode::ACCEPTED
}

#[utoipa::path(
    put,
    path = "/smartplugs/{plug_id}",
    params(("plug_id" = u32, Path, description = "Hub smart plug id")),
    request_body = SmartPlugRequest,
    responses(
        (status = 202, description = "Command sent to the hub"),
        (status = 404, description = "Unknown smart plug"),
        (status = 503, description = "No hub data yet"),
    ),
    tag = "devices"
)]
pub async fn set_smart_plug(
    State(state): State<AppState>,
    Path(plug_id): Path<u32>,
    Json(body): Json<SmartPlugRequest>,
) -> Result<StatusCode, AppError> {
    let snapshot = loaded_snapshot(&state).await?;
    if snapshot.smart_plug(plug_id).is_none() {
        return Err(AppError::not_found(format!("unknown smart plug {plug_id}")));
    }

    state.dispatcher.set_smart_plug_state(plug_id, body.state).await;
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    put,
    path = "/hotwater",
    request_body = HotwaterRequest,
    responses(
        (status = 202, description = "Command sent to the hub"),
        (status = 404, description = "Hub has no hot water circuit"),
        (status = 503, description = "No hub data yet"),
    ),
    tag = "devices"
)]
pub async fn set_hotwater(
    State(state): State<AppState>,
    Json(body): Json<HotwaterRequest>,
) -> Result<StatusCode, AppError> {
    let snapshot = loaded_snapshot(&state).await?;
    if snapshot.hotwater().is_none() {
        return Err(AppError::not_found("hub has no hot water circuit"));
    }

    state.dispatcher.set_hotwater_mode(body.mode).await;
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_setup,
        get_entities,
        get_notifications,
        set_room_temperature,
        set_room_mode,
        set_away_mode,
        set_system_switch,
        set_smart_plug,
        set_hotwater,
        health
    ),
    components(schemas(
        SetupStatusDto,
        SetupState,
        EntityState,
        Platform,
        Notification,
        TemperatureRequest,
        RoomModeRequest,
        AwayModeRequest,
        SwitchRequest,
        SmartPlugRequest,
        HotwaterRequest,
        RoomMode,
        PlugState,
        HotwaterMode
    )),
    tags(
        (name = "entities", description = "Rendered Wiser entities"),
        (name = "rooms",    description = "Room climate commands"),
        (name = "devices",  description = "Smart plug and hot water commands"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Wiser Hub Service API",
        version = "0.1.0",
        description = "REST API for a Drayton Wiser heating hub"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

pub mod models;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

use self::models::{to_tenths, HomeAwayMode, HotwaterMode, HubSnapshot, PlugState, RoomMode};

/// Lowest set point the hub accepts, °C.
pub const TEMP_MINIMUM: f64 = 5.0;
/// Highest set point the hub accepts, °C.
pub const TEMP_MAXIMUM: f64 = 30.0;

/// Per-request timeout applied by [`WiserClient`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Hot water is always exposed by the hub under this id.
const HOTWATER_ID: u32 = 2;

/// Set point the hub uses to force a circuit on (hot water) and off.
const HOTWATER_ON_SET_POINT: i64 = 1100;
const OFF_SET_POINT: i64 = -200;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("timed out talking to the hub at {host}")]
    Timeout { host: String },

    #[error("hub response was not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("hub request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("hub returned {status} for {path}")]
    Status { status: StatusCode, path: String },

    #[error("hub secret contains characters that cannot be sent in a header")]
    InvalidSecret,
}

/// Capabilities the rest of the service needs from the heating hub.
///
/// Every write is fire-and-forget from the hub's point of view; callers
/// re-read state with [`HubClient::fetch`] to observe the effect.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Read the full domain snapshot.
    async fn fetch(&self) -> Result<HubSnapshot, HubError>;

    async fn set_room_temperature(&self, room_id: u32, celsius: f64) -> Result<(), HubError>;

    /// `boost_temp` is the absolute boost set point in °C; it is only used
    /// for [`RoomMode::Boost`].
    async fn set_room_mode(
        &self,
        room_id: u32,
        mode: RoomMode,
        boost_temp: f64,
        boost_minutes: u32,
    ) -> Result<(), HubError>;

    async fn set_home_away_mode(
        &self,
        mode: HomeAwayMode,
        away_temperature: f64,
    ) -> Result<(), HubError>;

    async fn set_system_switch(&self, switch: &str, on: bool) -> Result<(), HubError>;

    async fn set_smart_plug_state(&self, plug_id: u32, state: PlugState) -> Result<(), HubError>;

    async fn set_hotwater_mode(&self, mode: HotwaterMode) -> Result<(), HubError>;
}

// ---------------------------------------------------------------------------
// WiserClient: local REST API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WiserClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    host: String,
    base_url: String,
    headers: HeaderMap,
}

impl WiserClient {
    pub fn new(config: &Config) -> Result<Self, HubError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(HubError::Transport)?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                host: config.host.clone(),
                base_url: format!("http://{}/data/domain", config.host),
                headers: build_headers(config.secret.as_deref())?,
            }),
        })
    }

    /// Send a request and return the raw body of a successful response.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Vec<u8>, HubError> {
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(method = %method, url = %url, "Hub request");

        let mut request = self
            .inner
            .http
            .request(method, &url)
            .headers(self.inner.headers.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(HubError::Status { status, path: path.to_owned() });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(bytes.to_vec())
    }

    async fn apply(&self, patches: Vec<Patch>) -> Result<(), HubError> {
        for patch in patches {
            self.send(Method::PATCH, &patch.path, Some(&patch.body)).await?;
        }
        Ok(())
    }

    fn classify(&self, err: reqwest::Error) -> HubError {
        if err.is_timeout() {
            HubError::Timeout { host: self.inner.host.clone() }
        } else {
            HubError::Transport(err)
        }
    }
}

#[async_trait]
impl HubClient for WiserClient {
    async fn fetch(&self) -> Result<HubSnapshot, HubError> {
        let bytes = self.send(Method::GET, "/", None).await?;
        let snapshot = serde_json::from_slice::<HubSnapshot>(&bytes).map_err(HubError::Decode)?;
        debug!(
            devices = snapshot.devices.len(),
            rooms = snapshot.rooms.len(),
            "Hub domain data decoded"
        );
        Ok(snapshot)
    }

    async fn set_room_temperature(&self, room_id: u32, celsius: f64) -> Result<(), HubError> {
        self.apply(vec![room_set_point(room_id, to_tenths(celsius))]).await
    }

    async fn set_room_mode(
        &self,
        room_id: u32,
        mode: RoomMode,
        boost_temp: f64,
        boost_minutes: u32,
    ) -> Result<(), HubError> {
        self.apply(room_mode_patches(room_id, mode, boost_temp, boost_minutes)).await
    }

    async fn set_home_away_mode(
        &self,
        mode: HomeAwayMode,
        away_temperature: f64,
    ) -> Result<(), HubError> {
        self.apply(vec![home_away_patch(mode, away_temperature)]).await
    }

    async fn set_system_switch(&self, switch: &str, on: bool) -> Result<(), HubError> {
        let mut body = serde_json::Map::new();
        body.insert(switch.to_owned(), Value::Bool(on));
        self.apply(vec![Patch::new("/System", Value::Object(body))]).await
    }

    async fn set_smart_plug_state(&self, plug_id: u32, state: PlugState) -> Result<(), HubError> {
        self.apply(vec![Patch::new(
            format!("/SmartPlug/{plug_id}/RequestOutput"),
            json!({ "RequestOutput": state.as_hub_str() }),
        )])
        .await
    }

    async fn set_hotwater_mode(&self, mode: HotwaterMode) -> Result<(), HubError> {
        self.apply(vec![hotwater_patch(mode)]).await
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// A single PATCH against `/data/domain{path}`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Patch {
    pub path: String,
    pub body: Value,
}

impl Patch {
    fn new(path: impl Into<String>, body: Value) -> Self {
        Self { path: path.into(), body }
    }
}

fn room_set_point(room_id: u32, tenths: i64) -> Patch {
    Patch::new(
        format!("/Room/{room_id}"),
        json!({ "RequestOverride": { "Type": "Manual", "SetPoint": tenths } }),
    )
}

fn cancel_room_override(room_id: u32) -> Patch {
    Patch::new(
        format!("/Room/{room_id}"),
        json!({ "RequestOverride": { "Type": "None", "DurationMinutes": 0, "SetPoint": 0, "Originator": "App" } }),
    )
}

fn room_mode(room_id: u32, mode: &str) -> Patch {
    Patch::new(format!("/Room/{room_id}"), json!({ "Mode": mode }))
}

/// Translate a room mode into the hub's PATCH sequence.
pub(crate) fn room_mode_patches(
    room_id: u32,
    mode: RoomMode,
    boost_temp: f64,
    boost_minutes: u32,
) -> Vec<Patch> {
    match mode {
        RoomMode::Auto => vec![room_mode(room_id, "Auto"), cancel_room_override(room_id)],
        RoomMode::Manual => vec![room_mode(room_id, "Manual"), cancel_room_override(room_id)],
        RoomMode::Off => vec![room_mode(room_id, "Manual"), room_set_point(room_id, OFF_SET_POINT)],
        RoomMode::Boost => vec![Patch::new(
            format!("/Room/{room_id}"),
            json!({
                "RequestOverride": {
                    "Type": "Manual",
                    "DurationMinutes": boost_minutes,
                    "SetPoint": to_tenths(boost_temp),
                    "Originator": "App",
                }
            }),
        )],
    }
}

pub(crate) fn home_away_patch(mode: HomeAwayMode, away_temperature: f64) -> Patch {
    let body = match mode {
        HomeAwayMode::Away => json!({ "Type": 2, "SetPoint": to_tenths(away_temperature) }),
        HomeAwayMode::Home => json!({ "Type": 0, "SetPoint": 0 }),
    };
    Patch::new("/System/RequestOverride", body)
}

pub(crate) fn hotwater_patch(mode: HotwaterMode) -> Patch {
    let body = match mode {
        HotwaterMode::On => {
            json!({ "RequestOverride": { "Type": "Manual", "SetPoint": HOTWATER_ON_SET_POINT } })
        }
        HotwaterMode::Off => {
            json!({ "RequestOverride": { "Type": "Manual", "SetPoint": OFF_SET_POINT } })
        }
        HotwaterMode::Auto => json!({ "RequestOverride": { "Type": "None" } }),
    };
    Patch::new(format!("/HotWater/{HOTWATER_ID}/RequestOverride"), body)
}

/// Headers sent with every hub request.
///
/// The hub is addressed without a `secret` header when no secret is
/// configured.
pub(crate) fn build_headers(secret: Option<&str>) -> Result<HeaderMap, HubError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json;charset=UTF-8"),
    );
    if let Some(secret) = secret {
        let value = HeaderValue::from_str(secret).map_err(|_| HubError::InvalidSecret)?;
        headers.insert("secret", value);
    }
    Ok(headers)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

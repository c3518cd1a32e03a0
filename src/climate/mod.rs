use serde_json::json;
use tracing::info;

use crate::{
    control::CommandDispatcher,
    host::{EntityState, Platform},
    hub::{
        models::{HubSnapshot, RoomMode},
        TEMP_MAXIMUM,
    },
};

/// Thermostat view of one room. Reads come from the cached snapshot and
/// writes go through the [`CommandDispatcher`].
#[derive(Clone)]
pub struct ClimateEntity {
    dispatcher: CommandDispatcher,
    room_id: u32,
}

impl ClimateEntity {
    pub fn new(dispatcher: CommandDispatcher, room_id: u32) -> Self {
        Self { dispatcher, room_id }
    }

    pub fn room_id(&self) -> u32 {
        self.room_id
    }

    pub async fn update(&self) -> bool {
        self.dispatcher.coordinator().refresh(false).await
    }

    pub async fn state(&self) -> EntityState {
        let snapshot = self.dispatcher.coordinator().snapshot().await;
        render_room(
            snapshot.as_deref(),
            self.room_id,
            self.dispatcher.settings().minimum_temp,
        )
    }

    pub async fn set_temperature(&self, celsius: f64) {
        self.dispatcher.set_room_temperature(self.room_id, celsius).await;
    }

    pub async fn set_mode(&self, mode: RoomMode) {
        self.dispatcher.set_room_mode(self.room_id, mode).await;
    }
}

pub fn render_room(snapshot: Option<&HubSnapshot>, room_id: u32, minimum_temp: f64) -> EntityState {
    let room = snapshot.and_then(|s| s.room(room_id));
    let name = format!("Wiser {}", room.map(|r| r.name_or_default()).unwrap_or("Unknown"));
    let mut out = EntityState::new(format!("wiser_room_{room_id}"), Platform::Climate, name);

    out.attributes.insert("min_temp".into(), json!(minimum_temp));
    out.attributes.insert("max_temp".into(), json!(TEMP_MAXIMUM));

    let (Some(snapshot), Some(room)) = (snapshot, room) else {
        return out;
    };

    let state = if room.is_off() {
        "off"
    } else if room.override_type.as_deref().is_some_and(|t| t != "None") {
        "boost"
    } else {
        match room.mode.as_deref() {
            Some("Auto") => "auto",
            Some("Manual") => "manual",
            _ => "unknown",
        }
    };
    out.state = Some(state.to_owned());
    out.icon = Some(if room.is_off() { "mdi:radiator-off" } else { "mdi:radiator" }.to_owned());

    out.attributes.insert("current_temperature".into(), json!(room.current_temperature()));
    out.attributes.insert("target_temperature".into(), json!(room.target_temperature()));
    out.attributes.insert("mode".into(), json!(room.mode));
    out.attributes.insert("override_type".into(), json!(room.override_type));
    out.attributes.insert("percentage_demand".into(), json!(snapshot.room_demand(room_id)));

    out
}

/// One climate entity per room the hub reports.
pub fn setup_entities(dispatcher: &CommandDispatcher, snapshot: &HubSnapshot) -> Vec<ClimateEntity> {
    let entities: Vec<_> = snapshot
        .rooms
        .iter()
        .map(|r| ClimateEntity::new(dispatcher.clone(), r.id))
        .collect();
    info!(count = entities.len(), "Wiser climate entities created");
    entities
}

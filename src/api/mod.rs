pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use tokio::sync::watch;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    control::CommandDispatcher, host::EntityRegistry, notify::LogNotifier, setup::SetupState,
};

/// Everything the handlers need, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub registry: EntityRegistry,
    pub dispatcher: CommandDispatcher,
    pub notifier: Arc<LogNotifier>,
    pub setup: watch::Receiver<SetupState>,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/setup", get(handlers::get_setup))
        .route("/entities", get(handlers::get_entities))
        .route("/notifications", get(handlers::get_notifications))
        .route("/rooms/{room_id}/temperature", put(handlers::set_room_temperature))
        .route("/rooms/{room_id}/mode", put(handlers::set_room_mode))
        .route("/system/away", put(handlers::set_away_mode))
        .route("/system/switches/{switch}", put(handlers::set_system_switch))
        .route("/smartplugs/{plug_id}", put(handlers::set_smart_plug))
        .route("/hotwater", put(handlers::set_hotwater))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}

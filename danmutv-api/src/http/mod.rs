// Module: http
// HTTP/JSON API over the room registry

pub mod error;
pub mod health;
pub mod rooms;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use danmutv_core::service::RoomRegistry;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
}

/// Create the HTTP router with all routes
pub fn create_router(registry: Arc<RoomRegistry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/rooms", get(rooms::list_rooms))
        .route("/api/set_rooms/add_room", post(rooms::add_room))
        .route(
            "/api/set_rooms/modify_recording_settings",
            post(rooms::modify_recording_settings),
        )
        .route(
            "/api/set_rooms/modify_room_prompt_settings",
            post(rooms::modify_room_prompt_settings),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

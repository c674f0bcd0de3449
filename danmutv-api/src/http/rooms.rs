// Room management HTTP handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use danmutv_core::models::Room;

use super::{AppError, AppResult, AppState};

/// Success envelope shared by the management endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiMessage<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> ApiMessage<T> {
    fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data,
        }
    }
}

/// Register-room request
#[derive(Debug, Deserialize)]
pub struct AddRoomRequest {
    #[serde(default)]
    pub uid: u64,
    #[serde(default)]
    pub room_id: u64,
    pub auto_rec: bool,
    pub remind: bool,
    pub rec_danmu: bool,
}

/// Bulk flag-toggle request
#[derive(Debug, Deserialize)]
pub struct ModifyRoomsRequest {
    pub uids: Vec<u64>,
    pub state: bool,
}

/// Register a new room with its per-room switches
pub async fn add_room(
    State(state): State<AppState>,
    Json(req): Json<AddRoomRequest>,
) -> AppResult<Json<ApiMessage<Room>>> {
    if req.room_id == 0 {
        return Err(AppError::BadRequest("room_id is required".to_string()));
    }

    let room = state
        .registry
        .add(req.room_id, req.uid, req.auto_rec, req.remind, req.rec_danmu)?;

    Ok(Json(ApiMessage::ok(
        format!("room {} registered", room.room_id),
        room,
    )))
}

/// Toggle auto-recording for a batch of rooms; returns the ids updated
pub async fn modify_recording_settings(
    State(state): State<AppState>,
    Json(req): Json<ModifyRoomsRequest>,
) -> AppResult<Json<ApiMessage<Vec<u64>>>> {
    let updated = state.registry.set_auto_record(&req.uids, req.state);
    Ok(Json(ApiMessage::ok(
        format!("auto recording set to {}", req.state),
        updated,
    )))
}

/// Toggle the start-notification prompt for a batch of rooms; returns the
/// ids updated
pub async fn modify_room_prompt_settings(
    State(state): State<AppState>,
    Json(req): Json<ModifyRoomsRequest>,
) -> AppResult<Json<ApiMessage<Vec<u64>>>> {
    let updated = state.registry.set_live_remind(&req.uids, req.state);
    Ok(Json(ApiMessage::ok(
        format!("live reminder set to {}", req.state),
        updated,
    )))
}

/// List every registered room
pub async fn list_rooms(State(state): State<AppState>) -> AppResult<Json<ApiMessage<Vec<Room>>>> {
    Ok(Json(ApiMessage::ok("registered rooms", state.registry.list())))
}

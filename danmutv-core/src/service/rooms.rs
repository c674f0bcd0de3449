//! In-memory registry of monitored rooms.
//!
//! Persistent room storage lives outside this crate; the registry only holds
//! what the chat client and the management API need at runtime.

use chrono::Utc;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::models::Room;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<u64, Room>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Register a room with its per-room switches.
    pub fn add(
        &self,
        room_id: u64,
        uid: u64,
        auto_record: bool,
        live_remind: bool,
        record_danmu: bool,
    ) -> Result<Room> {
        if room_id == 0 {
            return Err(Error::InvalidInput("room_id must be non-zero".to_string()));
        }
        if self.rooms.contains_key(&room_id) {
            return Err(Error::AlreadyExists(format!("room {room_id}")));
        }

        let room = Room {
            room_id,
            uid,
            auto_record,
            live_remind,
            record_danmu,
            added_at: Utc::now(),
        };
        self.rooms.insert(room_id, room.clone());
        Ok(room)
    }

    #[must_use]
    pub fn get(&self, room_id: u64) -> Option<Room> {
        self.rooms.get(&room_id).map(|entry| entry.value().clone())
    }

    /// All registered rooms, ordered by room id for stable output.
    #[must_use]
    pub fn list(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|entry| entry.value().clone()).collect();
        rooms.sort_by_key(|room| room.room_id);
        rooms
    }

    pub fn remove(&self, room_id: u64) -> Option<Room> {
        self.rooms.remove(&room_id).map(|(_, room)| room)
    }

    /// Set the auto-record switch for every listed room that is registered.
    /// Returns the ids that were updated.
    pub fn set_auto_record(&self, room_ids: &[u64], state: bool) -> Vec<u64> {
        self.update_rooms(room_ids, |room| room.auto_record = state)
    }

    /// Set the start-notification switch for every listed room that is
    /// registered. Returns the ids that were updated.
    pub fn set_live_remind(&self, room_ids: &[u64], state: bool) -> Vec<u64> {
        self.update_rooms(room_ids, |room| room.live_remind = state)
    }

    fn update_rooms(&self, room_ids: &[u64], apply: impl Fn(&mut Room)) -> Vec<u64> {
        let mut updated = Vec::new();
        for &room_id in room_ids {
            if let Some(mut entry) = self.rooms.get_mut(&room_id) {
                apply(&mut entry);
                updated.push(room_id);
            }
        }
        updated
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

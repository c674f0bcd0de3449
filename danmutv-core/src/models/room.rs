use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored live room and its per-room switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Platform room id used to open chat connections.
    pub room_id: u64,
    /// Streamer account id.
    pub uid: u64,
    /// Record the stream automatically when it goes live.
    pub auto_record: bool,
    /// Notify when the stream starts.
    pub live_remind: bool,
    /// Record chat messages alongside the stream.
    pub record_danmu: bool,
    pub added_at: DateTime<Utc>,
}

//! Classification of decoded command payloads into typed events.

use serde_json::Value;

/// Application events produced by a live session.
///
/// Bodies are the parsed command payloads as delivered by the gateway; the
/// viewer-count variant carries the decoded integer instead.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A chat (danmaku) message.
    ChatMessage { room_id: u64, body: Value },
    /// A paid highlighted message.
    SuperChat { room_id: u64, body: Value },
    Gift { room_id: u64, body: Value },
    /// Fleet membership purchase.
    GuardPurchase { room_id: u64, body: Value },
    /// Moderator warning directed at the room.
    ModerationWarning { room_id: u64, body: Value },
    /// The platform cut the stream off.
    StreamCutOff { room_id: u64, body: Value },
    /// Viewer-count pulse decoded from an operation-3 frame.
    ViewerCount { room_id: u64, count: u32 },
    /// Recognized command with no dedicated variant.
    Generic { room_id: u64, body: Value },
}

impl LiveEvent {
    #[must_use]
    pub fn room_id(&self) -> u64 {
        match self {
            Self::ChatMessage { room_id, .. }
            | Self::SuperChat { room_id, .. }
            | Self::Gift { room_id, .. }
            | Self::GuardPurchase { room_id, .. }
            | Self::ModerationWarning { room_id, .. }
            | Self::StreamCutOff { room_id, .. }
            | Self::ViewerCount { room_id, .. }
            | Self::Generic { room_id, .. } => *room_id,
        }
    }

    /// Short tag for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatMessage { .. } => "chat_message",
            Self::SuperChat { .. } => "super_chat",
            Self::Gift { .. } => "gift",
            Self::GuardPurchase { .. } => "guard_purchase",
            Self::ModerationWarning { .. } => "moderation_warning",
            Self::StreamCutOff { .. } => "stream_cut_off",
            Self::ViewerCount { .. } => "viewer_count",
            Self::Generic { .. } => "generic",
        }
    }
}

/// Commands that are recognized but intentionally produce no event: banner
/// and rank rotations, entry effects, combo aggregation, welcome and
/// start/stop pulses the subscriber has no use for.
const SUPPRESSED_COMMANDS: &[&str] = &[
    "ACTIVITY_BANNER_UPDATE_V2",
    "COMBO_SEND",
    "ENTRY_EFFECT",
    "USER_TOAST_MSG",
    "NOTICE_MSG",
    "WELCOME",
    "LIVE",
    "PREPARING",
    "INTERACT_WORD",
    "PANEL",
    "ONLINE_RANK_COUNT",
    "ONLINE_RANK_V2",
    "ROOM_BANNER",
    "ACTIVITY_RED_PACKET",
];

/// Map a parsed command payload to an event.
///
/// Returns `None` for suppressed commands and for payloads without a string
/// `cmd` tag; unknown tags become [`LiveEvent::Generic`].
#[must_use]
pub fn classify(room_id: u64, body: Value) -> Option<LiveEvent> {
    let cmd = body.get("cmd")?.as_str()?.to_owned();

    Some(match cmd.as_str() {
        "DANMU_MSG" => LiveEvent::ChatMessage { room_id, body },
        "SUPER_CHAT_MESSAGE" => LiveEvent::SuperChat { room_id, body },
        "SEND_GIFT" => LiveEvent::Gift { room_id, body },
        "GUARD_BUY" => LiveEvent::GuardPurchase { room_id, body },
        "WARNING" => LiveEvent::ModerationWarning { room_id, body },
        "CUT_OFF" => LiveEvent::StreamCutOff { room_id, body },
        tag if SUPPRESSED_COMMANDS.contains(&tag) => return None,
        _ => LiveEvent::Generic { room_id, body },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn known_commands_map_to_their_variants() {
        let cases = [
            ("DANMU_MSG", "chat_message"),
            ("SUPER_CHAT_MESSAGE", "super_chat"),
            ("SEND_GIFT", "gift"),
            ("GUARD_BUY", "guard_purchase"),
            ("WARNING", "moderation_warning"),
            ("CUT_OFF", "stream_cut_off"),
        ];
        for (cmd, kind) in cases {
            let event = classify(1, json!({"cmd": cmd})).unwrap();
            assert_eq!(event.kind(), kind);
            assert_eq!(event.room_id(), 1);
        }
    }

    #[test]
    fn suppressed_commands_produce_nothing() {
        for cmd in SUPPRESSED_COMMANDS {
            assert!(classify(1, json!({"cmd": cmd})).is_none());
        }
    }

    #[test]
    fn unknown_command_is_generic() {
        let event = classify(1, json!({"cmd": "UNKNOWN_X", "n": 3})).unwrap();
        match event {
            LiveEvent::Generic { body, .. } => assert_eq!(body["n"], 3),
            other => panic!("expected generic, got {other:?}"),
        }
    }

    #[test]
    fn missing_or_non_string_cmd_produces_nothing() {
        assert!(classify(1, json!({"data": 1})).is_none());
        assert!(classify(1, json!({"cmd": 5})).is_none());
    }
}

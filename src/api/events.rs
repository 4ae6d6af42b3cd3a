//! Push event categories and payloads.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Destination, Reaction, Tip, User, VoiceStatus};

/// Closed set of push event categories a handler can be registered for.
///
/// `Chat` and `Whisper` arrive as the same wire event and share a
/// subscription; they are told apart by the event's `whisper` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventCategory {
    Chat,
    Whisper,
    Emote,
    Reaction,
    UserJoined,
    UserLeft,
    Tip,
    Channel,
    UserMoved,
    VoiceChange,
    Message,
}

impl EventCategory {
    /// Every category, in subscription order.
    pub const ALL: [EventCategory; 11] = [
        EventCategory::Chat,
        EventCategory::Whisper,
        EventCategory::Emote,
        EventCategory::Reaction,
        EventCategory::UserJoined,
        EventCategory::UserLeft,
        EventCategory::Tip,
        EventCategory::Channel,
        EventCategory::UserMoved,
        EventCategory::VoiceChange,
        EventCategory::Message,
    ];

    /// Classify a push frame by its `_type` and payload.
    ///
    /// Returns `None` for event kinds this client does not know.
    pub fn classify(kind: &str, payload: &Value) -> Option<Self> {
        let category = match kind {
            "ChatEvent" => {
                let whisper = payload
                    .get("whisper")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if whisper {
                    EventCategory::Whisper
                } else {
                    EventCategory::Chat
                }
            }
            "EmoteEvent" => EventCategory::Emote,
            "ReactionEvent" => EventCategory::Reaction,
            "UserJoinedEvent" => EventCategory::UserJoined,
            "UserLeftEvent" => EventCategory::UserLeft,
            "TipReactionEvent" => EventCategory::Tip,
            "ChannelEvent" => EventCategory::Channel,
            "UserMovedEvent" => EventCategory::UserMoved,
            "VoiceEvent" => EventCategory::VoiceChange,
            "MessageEvent" => EventCategory::Message,
            _ => return None,
        };
        Some(category)
    }

    /// Name used in the `events` subscription list of the connect URL.
    pub fn subscription_name(self) -> &'static str {
        match self {
            EventCategory::Chat | EventCategory::Whisper => "chat",
            EventCategory::Emote => "emote",
            EventCategory::Reaction => "reaction",
            EventCategory::UserJoined => "user_joined",
            EventCategory::UserLeft => "user_left",
            EventCategory::Tip => "tip_reaction",
            EventCategory::Channel => "channel",
            EventCategory::UserMoved => "user_moved",
            EventCategory::VoiceChange => "voice",
            EventCategory::Message => "message",
        }
    }

    /// Wire `_type` of the events in this category.
    pub fn wire_type(self) -> &'static str {
        match self {
            EventCategory::Chat | EventCategory::Whisper => "ChatEvent",
            EventCategory::Emote => "EmoteEvent",
            EventCategory::Reaction => "ReactionEvent",
            EventCategory::UserJoined => "UserJoinedEvent",
            EventCategory::UserLeft => "UserLeftEvent",
            EventCategory::Tip => "TipReactionEvent",
            EventCategory::Channel => "ChannelEvent",
            EventCategory::UserMoved => "UserMovedEvent",
            EventCategory::VoiceChange => "VoiceEvent",
            EventCategory::Message => "MessageEvent",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventCategory::Whisper => "whisper",
            other => other.subscription_name(),
        };
        f.write_str(name)
    }
}

/// A room chat message or a whisper to the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub user: User,
    pub message: String,
    #[serde(default)]
    pub whisper: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmoteEvent {
    pub user: User,
    pub emote_id: String,
    #[serde(default)]
    pub receiver: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub user: User,
    pub reaction: Reaction,
    pub receiver: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJoinedEvent {
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeftEvent {
    pub user: User,
}

/// A hidden message on the room channel, visible only to bots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub sender_id: String,
    pub msg: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Someone tipped someone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipReactionEvent {
    pub sender: User,
    pub receiver: User,
    pub item: Tip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMovedEvent {
    pub user: User,
    pub position: Destination,
}

/// Voice chat state changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEvent {
    pub users: Vec<(User, VoiceStatus)>,
    pub seconds_left: u64,
}

/// A new inbox message for the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub user_id: String,
    pub conversation_id: String,
    pub is_new_conversation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_chat_and_whisper() {
        assert_eq!(
            EventCategory::classify("ChatEvent", &json!({"whisper": false})),
            Some(EventCategory::Chat)
        );
        assert_eq!(
            EventCategory::classify("ChatEvent", &json!({"whisper": true})),
            Some(EventCategory::Whisper)
        );
        assert_eq!(
            EventCategory::classify("ChatEvent", &json!({})),
            Some(EventCategory::Chat)
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(EventCategory::classify("FireworksEvent", &json!({})), None);
    }

    #[test]
    fn test_wire_type_round_trips_through_classify() {
        for category in EventCategory::ALL {
            let payload = json!({"whisper": category == EventCategory::Whisper});
            assert_eq!(
                EventCategory::classify(category.wire_type(), &payload),
                Some(category)
            );
        }
    }

    #[test]
    fn test_decode_user_moved() {
        let event: UserMovedEvent = serde_json::from_value(json!({
            "user": {"id": "u1", "username": "alice"},
            "position": {"entity_id": "sofa", "anchor_ix": 0}
        }))
        .unwrap();
        assert!(matches!(event.position, Destination::Anchor(_)));
    }

    #[test]
    fn test_decode_voice_event() {
        let event: VoiceEvent = serde_json::from_value(json!({
            "users": [[{"id": "u1", "username": "alice"}, "muted"]],
            "seconds_left": 120
        }))
        .unwrap();
        assert_eq!(event.users[0].1, VoiceStatus::Muted);
        assert_eq!(event.seconds_left, 120);
    }
}

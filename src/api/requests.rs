//! Request shapes and their typed replies.
//!
//! Each request serializes to the fields of its JSON object; the `_type`
//! and `rid` envelope is added by the dispatcher. Reply payloads arrive with
//! the envelope already stripped.

use std::collections::HashMap;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};

use super::types::{
    AnchorPosition, Backpack, Conversation, CurrencyItem, Destination, GoldBar, Item, Message,
    MessageKind, ModerationAction, PaymentMethod, Position, PurchaseResult, Reaction,
    RoomPermissions, TipResult, User, VoiceStatus,
};

/// A command the room service understands.
pub trait Request: Serialize + Send + Sync {
    /// Wire `_type` of the request.
    const KIND: &'static str;

    /// Decoded reply payload.
    type Response: DeserializeOwned + Send + 'static;
}

/// Reply that carries nothing beyond the acknowledgement itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ack;

impl<'de> Deserialize<'de> for Ack {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Ack)
    }
}

macro_rules! request {
    ($req:ty => $kind:literal, $resp:ty) => {
        impl Request for $req {
            const KIND: &'static str = $kind;
            type Response = $resp;
        }
    };
}

/// Room chat, or a whisper when `whisper_target_id` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whisper_target_id: Option<String>,
}
request!(ChatRequest => "ChatRequest", Ack);

/// Set or clear (`None`) the bot's status icon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRequest {
    pub icon: Option<String>,
}
request!(IndicatorRequest => "IndicatorRequest", Ack);

/// Hidden message to other bots in the room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRequest {
    pub message: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_to: Option<Vec<String>>,
}
request!(ChannelRequest => "ChannelRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmoteRequest {
    pub emote_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<String>,
}
request!(EmoteRequest => "EmoteRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionRequest {
    pub reaction: Reaction,
    pub target_user_id: String,
}
request!(ReactionRequest => "ReactionRequest", Ack);

/// Liveness probe; the server answers with an empty reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KeepaliveRequest;
request!(KeepaliveRequest => "KeepaliveRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeleportRequest {
    pub user_id: String,
    pub destination: Position,
}
request!(TeleportRequest => "TeleportRequest", Ack);

/// Walk the bot to a floor position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorHitRequest {
    pub destination: Position,
}
request!(FloorHitRequest => "FloorHitRequest", Ack);

/// Walk the bot to an anchor (sit down).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorHitRequest {
    pub anchor: AnchorPosition,
}
request!(AnchorHitRequest => "AnchorHitRequest", Ack);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GetRoomUsersRequest;
request!(GetRoomUsersRequest => "GetRoomUsersRequest", RoomUsers);

/// Users in the room with their positions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomUsers {
    pub content: Vec<(User, Destination)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GetWalletRequest;
request!(GetWalletRequest => "GetWalletRequest", Wallet);

/// The bot's currency balances.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Wallet {
    pub content: Vec<CurrencyItem>,
}

impl Wallet {
    /// Balance of one currency, zero if absent.
    pub fn balance(&self, currency: &str) -> i64 {
        self.content
            .iter()
            .filter(|c| c.kind == currency)
            .map(|c| c.amount)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerateRoomRequest {
    pub user_id: String,
    pub moderation_action: ModerationAction,
    /// Duration in seconds for bans and mutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_length: Option<u64>,
}
request!(ModerateRoomRequest => "ModerateRoomRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetRoomPrivilegeRequest {
    pub user_id: String,
}
request!(GetRoomPrivilegeRequest => "GetRoomPrivilegeRequest", RoomPrivilege);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomPrivilege {
    pub content: RoomPermissions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRoomPrivilegeRequest {
    pub user_id: String,
    pub permissions: RoomPermissions,
}
request!(ChangeRoomPrivilegeRequest => "ChangeRoomPrivilegeRequest", Ack);

/// Send a user to another room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveUserToRoomRequest {
    pub user_id: String,
    pub room_id: String,
}
request!(MoveUserToRoomRequest => "MoveUserToRoomRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetBackpackRequest {
    pub user_id: String,
}
request!(GetBackpackRequest => "GetBackpackRequest", BackpackContents);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackpackContents {
    pub backpack: Backpack,
}

/// Add (positive) or remove (negative) items from a user's backpack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeBackpackRequest {
    pub user_id: String,
    pub changes: Backpack,
}
request!(ChangeBackpackRequest => "ChangeBackpackRequest", Ack);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CheckVoiceChatRequest;
request!(CheckVoiceChatRequest => "CheckVoiceChatRequest", VoiceChatState);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceChatState {
    pub seconds_left: u64,
    /// Users that always have voice, such as moderators.
    #[serde(default)]
    pub auto_speakers: Vec<String>,
    #[serde(default)]
    pub users: HashMap<String, VoiceStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InviteSpeakerRequest {
    pub user_id: String,
}
request!(InviteSpeakerRequest => "InviteSpeakerRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoveSpeakerRequest {
    pub user_id: String,
}
request!(RemoveSpeakerRequest => "RemoveSpeakerRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetUserOutfitRequest {
    pub user_id: String,
}
request!(GetUserOutfitRequest => "GetUserOutfitRequest", Outfit);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Outfit {
    pub outfit: Vec<Item>,
}

/// Page through the bot's conversations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GetConversationsRequest {
    pub not_joined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_id: Option<String>,
}
request!(GetConversationsRequest => "GetConversationsRequest", Conversations);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Conversations {
    pub conversations: Vec<Conversation>,
    /// Number of conversations the bot has not joined.
    pub not_joined: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Room to invite to, for invite messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}
request!(SendMessageRequest => "SendMessageRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetMessagesRequest {
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
}
request!(GetMessagesRequest => "GetMessagesRequest", Messages);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Messages {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaveConversationRequest {
    pub conversation_id: String,
}
request!(LeaveConversationRequest => "LeaveConversationRequest", Ack);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyVoiceTimeRequest {
    pub payment_method: PaymentMethod,
}
request!(BuyVoiceTimeRequest => "BuyVoiceTimeRequest", Purchase);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyRoomBoostRequest {
    pub payment_method: PaymentMethod,
    pub amount: u32,
}
request!(BuyRoomBoostRequest => "BuyRoomBoostRequest", Purchase);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Purchase {
    pub result: PurchaseResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TipUserRequest {
    pub user_id: String,
    pub gold_bar: GoldBar,
}
request!(TipUserRequest => "TipUserRequest", TipOutcome);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TipOutcome {
    pub result: TipResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use serde_json::{json, Value};

    #[test]
    fn test_ack_accepts_anything() {
        assert_eq!(JsonCodec::from_value::<Ack>(Value::Null).unwrap(), Ack);
        assert_eq!(
            JsonCodec::from_value::<Ack>(json!({"extra": 1})).unwrap(),
            Ack
        );
    }

    #[test]
    fn test_unit_request_is_empty_object() {
        assert!(JsonCodec::to_object(&KeepaliveRequest).unwrap().is_empty());
        assert!(JsonCodec::to_object(&GetWalletRequest).unwrap().is_empty());
    }

    #[test]
    fn test_chat_request_omits_missing_target() {
        let chat = ChatRequest {
            message: "hi".into(),
            whisper_target_id: None,
        };
        assert_eq!(serde_json::to_value(&chat).unwrap(), json!({"message": "hi"}));
    }

    #[test]
    fn test_send_message_kind_field() {
        let req = SendMessageRequest {
            conversation_id: "c1".into(),
            content: "come visit".into(),
            kind: MessageKind::Invite,
            room_id: Some("r1".into()),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "conversation_id": "c1",
                "content": "come visit",
                "type": "invite",
                "room_id": "r1"
            })
        );
    }

    #[test]
    fn test_room_users_reply() {
        let users: RoomUsers = JsonCodec::from_value(json!({
            "content": [
                [
                    {"id": "u1", "username": "alice"},
                    {"x": 1, "y": 0, "z": 1, "facing": "FrontLeft"}
                ],
                [{"id": "u2", "username": "bob"}, {"entity_id": "chair", "anchor_ix": 0}]
            ]
        }))
        .unwrap();
        assert_eq!(users.content.len(), 2);
        assert!(matches!(users.content[0].1, Destination::Floor(_)));
        assert!(matches!(users.content[1].1, Destination::Anchor(_)));
    }

    #[test]
    fn test_wallet_balance() {
        let wallet: Wallet = JsonCodec::from_value(json!({
            "content": [{"type": "gold", "amount": 120}, {"type": "bubbles", "amount": 3}]
        }))
        .unwrap();
        assert_eq!(wallet.balance("gold"), 120);
        assert_eq!(wallet.balance("tokens"), 0);
    }

    #[test]
    fn test_voice_chat_state() {
        let state: VoiceChatState = JsonCodec::from_value(json!({
            "seconds_left": 60,
            "auto_speakers": ["owner"],
            "users": {"u1": "invited", "u2": "voice"}
        }))
        .unwrap();
        assert_eq!(state.users["u1"], VoiceStatus::Invited);
        assert_eq!(state.auto_speakers, vec!["owner".to_string()]);
    }

    #[test]
    fn test_kind_constants() {
        assert_eq!(<ChatRequest as Request>::KIND, "ChatRequest");
        assert_eq!(<TipUserRequest as Request>::KIND, "TipUserRequest");
        assert_eq!(<KeepaliveRequest as Request>::KIND, "KeepaliveRequest");
    }
}

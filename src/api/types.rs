//! Value types shared by requests, replies and events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A user in the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// The direction an avatar faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    FrontRight,
    FrontLeft,
    BackRight,
    BackLeft,
}

/// A point on the room floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub facing: Facing,
}

impl Position {
    /// A position facing the default direction.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            facing: Facing::default(),
        }
    }

    /// Same position, different facing.
    pub fn facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }
}

/// A seat or other anchor on a room entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorPosition {
    pub entity_id: String,
    pub anchor_ix: u32,
}

/// Where a user is: on the floor or on an anchor.
///
/// Serialized without a tag; the two shapes have disjoint fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Anchor(AnchorPosition),
    Floor(Position),
}

impl From<Position> for Destination {
    fn from(p: Position) -> Self {
        Destination::Floor(p)
    }
}

impl From<AnchorPosition> for Destination {
    fn from(a: AnchorPosition) -> Self {
        Destination::Anchor(a)
    }
}

/// Reactions a user can send to another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Clap,
    Heart,
    Thumbs,
    Wave,
    Wink,
}

/// An amount of some currency (`gold`, `bubbles`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: i64,
}

/// An inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: i64,
    pub id: String,
}

/// What a tip consisted of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tip {
    Item(Item),
    Currency(CurrencyItem),
}

/// Room privileges of a user. `None` leaves a privilege unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderator: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designer: Option<bool>,
}

/// Voice state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStatus {
    Invited,
    Voice,
    Muted,
}

/// Moderation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Kick,
    Ban,
    Unban,
    Mute,
}

/// Who pays for a purchase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    BotWalletOnly,
    BotWalletPriority,
    UserWalletOnly,
}

/// Result of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseResult {
    Success,
    InsufficientFunds,
    OnlyTokenBought,
}

/// Gold bar denominations that can be tipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoldBar {
    #[serde(rename = "gold_bar_1")]
    One,
    #[serde(rename = "gold_bar_5")]
    Five,
    #[serde(rename = "gold_bar_10")]
    Ten,
    #[serde(rename = "gold_bar_50")]
    Fifty,
    #[serde(rename = "gold_bar_100")]
    Hundred,
    #[serde(rename = "gold_bar_500")]
    FiveHundred,
    #[serde(rename = "gold_bar_1k")]
    Thousand,
    #[serde(rename = "gold_bar_5000")]
    FiveThousand,
    #[serde(rename = "gold_bar_10k")]
    TenThousand,
}

impl GoldBar {
    /// Gold value of the bar.
    pub fn amount(self) -> u32 {
        match self {
            GoldBar::One => 1,
            GoldBar::Five => 5,
            GoldBar::Ten => 10,
            GoldBar::Fifty => 50,
            GoldBar::Hundred => 100,
            GoldBar::FiveHundred => 500,
            GoldBar::Thousand => 1_000,
            GoldBar::FiveThousand => 5_000,
            GoldBar::TenThousand => 10_000,
        }
    }
}

/// Result of a tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipResult {
    Success,
    InsufficientFunds,
}

/// Kind of a conversation message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Invite,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    /// Creation time as sent by the server (ISO 8601).
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    pub content: String,
    pub sender_id: String,
    pub category: MessageKind,
}

/// A direct or group conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub did_join: bool,
    pub unread_count: u32,
    #[serde(default)]
    pub last_message: Option<Message>,
    pub muted: bool,
    #[serde(default)]
    pub member_ids: Option<Vec<String>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Item counts keyed by item id.
pub type Backpack = HashMap<String, i64>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_destination_untagged() {
        let floor: Destination = serde_json::from_value(json!({
            "x": 1.0, "y": 0.0, "z": 2.5, "facing": "BackLeft"
        }))
        .unwrap();
        assert_eq!(
            floor,
            Destination::Floor(Position::new(1.0, 0.0, 2.5).facing(Facing::BackLeft))
        );

        let anchor: Destination =
            serde_json::from_value(json!({"entity_id": "chair", "anchor_ix": 1})).unwrap();
        assert!(matches!(anchor, Destination::Anchor(a) if a.entity_id == "chair"));
    }

    #[test]
    fn test_position_default_facing() {
        let p: Position = serde_json::from_value(json!({"x": 0, "y": 0, "z": 0})).unwrap();
        assert_eq!(p.facing, Facing::FrontRight);
    }

    #[test]
    fn test_tip_union() {
        let item: Tip = serde_json::from_value(json!({
            "type": "clothing", "amount": 1, "id": "shirt-1"
        }))
        .unwrap();
        assert!(matches!(item, Tip::Item(_)));

        let gold: Tip =
            serde_json::from_value(json!({"type": "gold", "amount": 50})).unwrap();
        assert_eq!(
            gold,
            Tip::Currency(CurrencyItem {
                kind: "gold".into(),
                amount: 50
            })
        );
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(GoldBar::Thousand).unwrap(), json!("gold_bar_1k"));
        assert_eq!(
            serde_json::to_value(PaymentMethod::BotWalletPriority).unwrap(),
            json!("bot_wallet_priority")
        );
        assert_eq!(serde_json::to_value(Reaction::Thumbs).unwrap(), json!("thumbs"));
        assert_eq!(
            serde_json::to_value(RoomPermissions {
                moderator: Some(true),
                designer: None
            })
            .unwrap(),
            json!({"moderator": true})
        );
    }
}

//! Typed room API: request shapes, event payloads and the actions a bot
//! performs through [`RoomClient`](crate::RoomClient).

mod actions;
mod events;
mod requests;
mod types;

pub use events::{
    ChannelEvent, ChatEvent, EmoteEvent, EventCategory, MessageEvent, ReactionEvent,
    TipReactionEvent, UserJoinedEvent, UserLeftEvent, UserMovedEvent, VoiceEvent,
};
pub use requests::*;
pub use types::{
    AnchorPosition, Backpack, Conversation, CurrencyItem, Destination, Facing, GoldBar, Item,
    Message, MessageKind, ModerationAction, PaymentMethod, Position, PurchaseResult, Reaction,
    RoomPermissions, Tip, TipResult, User, VoiceStatus,
};

//! Convenience actions on [`RoomClient`].
//!
//! Each method builds one request, sends it with the default timeout and
//! returns the decoded reply.

use std::collections::HashMap;

use super::requests::*;
use super::types::{
    AnchorPosition, Backpack, Conversation, CurrencyItem, Destination, GoldBar, Item, Message,
    MessageKind, ModerationAction, PaymentMethod, Position, PurchaseResult, Reaction,
    RoomPermissions, TipResult, User, VoiceStatus,
};
use crate::dispatcher::RoomClient;
use crate::error::Result;

impl RoomClient {
    /// Broadcast a chat message to the room.
    pub async fn chat(&self, message: impl Into<String>) -> Result<()> {
        self.request(&ChatRequest {
            message: message.into(),
            whisper_target_id: None,
        })
        .await?;
        Ok(())
    }

    /// Whisper to one user in the room.
    pub async fn send_whisper(
        &self,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.request(&ChatRequest {
            message: message.into(),
            whisper_target_id: Some(user_id.into()),
        })
        .await?;
        Ok(())
    }

    /// Perform an emote, optionally towards a user.
    pub async fn send_emote(
        &self,
        emote_id: impl Into<String>,
        target_user_id: Option<String>,
    ) -> Result<()> {
        self.request(&EmoteRequest {
            emote_id: emote_id.into(),
            target_user_id,
        })
        .await?;
        Ok(())
    }

    pub async fn react(&self, reaction: Reaction, target_user_id: impl Into<String>) -> Result<()> {
        self.request(&ReactionRequest {
            reaction,
            target_user_id: target_user_id.into(),
        })
        .await?;
        Ok(())
    }

    /// Set the status icon above the bot, or clear it with `None`.
    pub async fn set_indicator(&self, icon: Option<String>) -> Result<()> {
        self.request(&IndicatorRequest { icon }).await?;
        Ok(())
    }

    /// Send a hidden message to the other bots in the room.
    pub async fn send_channel(&self, message: impl Into<String>, tags: Vec<String>) -> Result<()> {
        self.request(&ChannelRequest {
            message: message.into(),
            tags,
            only_to: None,
        })
        .await?;
        Ok(())
    }

    /// Walk to a floor position or sit on an anchor.
    pub async fn walk_to(&self, destination: impl Into<Destination>) -> Result<()> {
        match destination.into() {
            Destination::Floor(destination) => {
                self.request(&FloorHitRequest { destination }).await?;
            }
            Destination::Anchor(anchor) => {
                self.request(&AnchorHitRequest { anchor }).await?;
            }
        }
        Ok(())
    }

    /// Teleport a user to a floor position.
    pub async fn teleport(&self, user_id: impl Into<String>, destination: Position) -> Result<()> {
        self.request(&TeleportRequest {
            user_id: user_id.into(),
            destination,
        })
        .await?;
        Ok(())
    }

    /// Users in the room with their positions.
    pub async fn get_room_users(&self) -> Result<Vec<(User, Destination)>> {
        Ok(self.request(&GetRoomUsersRequest).await?.content)
    }

    /// The bot's currency balances.
    pub async fn get_wallet(&self) -> Result<Vec<CurrencyItem>> {
        Ok(self.request(&GetWalletRequest).await?.content)
    }

    pub async fn moderate_room(
        &self,
        user_id: impl Into<String>,
        action: ModerationAction,
        action_length: Option<u64>,
    ) -> Result<()> {
        self.request(&ModerateRoomRequest {
            user_id: user_id.into(),
            moderation_action: action,
            action_length,
        })
        .await?;
        Ok(())
    }

    pub async fn get_room_privilege(&self, user_id: impl Into<String>) -> Result<RoomPermissions> {
        let reply = self
            .request(&GetRoomPrivilegeRequest {
                user_id: user_id.into(),
            })
            .await?;
        Ok(reply.content)
    }

    pub async fn change_room_privilege(
        &self,
        user_id: impl Into<String>,
        permissions: RoomPermissions,
    ) -> Result<()> {
        self.request(&ChangeRoomPrivilegeRequest {
            user_id: user_id.into(),
            permissions,
        })
        .await?;
        Ok(())
    }

    pub async fn move_user_to_room(
        &self,
        user_id: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Result<()> {
        self.request(&MoveUserToRoomRequest {
            user_id: user_id.into(),
            room_id: room_id.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn get_voice_status(&self) -> Result<VoiceChatState> {
        self.request(&CheckVoiceChatRequest).await
    }

    /// Voice status of every user that has or was offered voice.
    pub async fn voice_users(&self) -> Result<HashMap<String, VoiceStatus>> {
        Ok(self.get_voice_status().await?.users)
    }

    pub async fn add_user_to_voice(&self, user_id: impl Into<String>) -> Result<()> {
        self.request(&InviteSpeakerRequest {
            user_id: user_id.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn remove_user_from_voice(&self, user_id: impl Into<String>) -> Result<()> {
        self.request(&RemoveSpeakerRequest {
            user_id: user_id.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn get_user_outfit(&self, user_id: impl Into<String>) -> Result<Vec<Item>> {
        let reply = self
            .request(&GetUserOutfitRequest {
                user_id: user_id.into(),
            })
            .await?;
        Ok(reply.outfit)
    }

    pub async fn get_backpack(&self, user_id: impl Into<String>) -> Result<Backpack> {
        let reply = self
            .request(&GetBackpackRequest {
                user_id: user_id.into(),
            })
            .await?;
        Ok(reply.backpack)
    }

    pub async fn change_backpack(
        &self,
        user_id: impl Into<String>,
        changes: Backpack,
    ) -> Result<()> {
        self.request(&ChangeBackpackRequest {
            user_id: user_id.into(),
            changes,
        })
        .await?;
        Ok(())
    }

    /// One page of conversations, starting after `last_id`.
    pub async fn get_conversations(
        &self,
        not_joined: bool,
        last_id: Option<String>,
    ) -> Result<Conversations> {
        self.request(&GetConversationsRequest {
            not_joined,
            last_id,
        })
        .await
    }

    /// Every conversation, following pages until one comes back empty.
    pub async fn all_conversations(&self, not_joined: bool) -> Result<Vec<Conversation>> {
        let mut all = Vec::new();
        let mut last_id = None;
        loop {
            let page = self.get_conversations(not_joined, last_id.take()).await?;
            match page.conversations.last() {
                Some(last) => last_id = Some(last.id.clone()),
                None => return Ok(all),
            }
            all.extend(page.conversations);
        }
    }

    pub async fn send_message(
        &self,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        self.request(&SendMessageRequest {
            conversation_id: conversation_id.into(),
            content: content.into(),
            kind: MessageKind::Text,
            room_id: None,
        })
        .await?;
        Ok(())
    }

    /// Invite the members of a conversation to a room.
    pub async fn send_room_invite(
        &self,
        conversation_id: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Result<()> {
        self.request(&SendMessageRequest {
            conversation_id: conversation_id.into(),
            content: String::new(),
            kind: MessageKind::Invite,
            room_id: Some(room_id.into()),
        })
        .await?;
        Ok(())
    }

    pub async fn get_messages(
        &self,
        conversation_id: impl Into<String>,
        last_message_id: Option<String>,
    ) -> Result<Vec<Message>> {
        let reply = self
            .request(&GetMessagesRequest {
                conversation_id: conversation_id.into(),
                last_message_id,
            })
            .await?;
        Ok(reply.messages)
    }

    pub async fn leave_conversation(&self, conversation_id: impl Into<String>) -> Result<()> {
        self.request(&LeaveConversationRequest {
            conversation_id: conversation_id.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn buy_voice_time(&self, payment_method: PaymentMethod) -> Result<PurchaseResult> {
        Ok(self
            .request(&BuyVoiceTimeRequest { payment_method })
            .await?
            .result)
    }

    pub async fn buy_room_boost(
        &self,
        payment_method: PaymentMethod,
        amount: u32,
    ) -> Result<PurchaseResult> {
        Ok(self
            .request(&BuyRoomBoostRequest {
                payment_method,
                amount,
            })
            .await?
            .result)
    }

    pub async fn tip_user(
        &self,
        user_id: impl Into<String>,
        gold_bar: GoldBar,
    ) -> Result<TipResult> {
        Ok(self
            .request(&TipUserRequest {
                user_id: user_id.into(),
                gold_bar,
            })
            .await?
            .result)
    }

    /// Sit on an anchor.
    pub async fn sit(&self, entity_id: impl Into<String>, anchor_ix: u32) -> Result<()> {
        self.walk_to(AnchorPosition {
            entity_id: entity_id.into(),
            anchor_ix,
        })
        .await
    }
}

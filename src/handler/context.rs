//! Context passed to event handlers.

use std::sync::Arc;

use crate::api::EventCategory;
use crate::dispatcher::RoomClient;
use crate::protocol::SessionMetadata;

/// What a handler knows about the event it is running for.
///
/// `EventContext` is `Clone` and can be moved into tasks the handler spawns.
/// Requests sent through [`EventContext::client`] go out on whatever
/// connection is live when they are sent.
#[derive(Debug, Clone)]
pub struct EventContext {
    category: Option<EventCategory>,
    session: Arc<SessionMetadata>,
    client: RoomClient,
}

impl EventContext {
    pub(crate) fn new(
        category: Option<EventCategory>,
        session: Arc<SessionMetadata>,
        client: RoomClient,
    ) -> Self {
        Self {
            category,
            session,
            client,
        }
    }

    /// Category of the event; `None` for `on_start`.
    #[inline]
    pub fn category(&self) -> Option<EventCategory> {
        self.category
    }

    /// Metadata of the connection the event arrived on.
    #[inline]
    pub fn session(&self) -> &SessionMetadata {
        &self.session
    }

    /// The bot's own user id.
    #[inline]
    pub fn bot_id(&self) -> &str {
        &self.session.user_id
    }

    #[inline]
    pub fn client(&self) -> &RoomClient {
        &self.client
    }
}

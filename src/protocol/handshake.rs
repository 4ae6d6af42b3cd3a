//! Session handshake.
//!
//! The first frame on every fresh connection is either `SessionMetadata`
//! (the session is usable) or an `Error` (credentials rejected, room closed,
//! etc.). Nothing else is accepted before the connection goes live.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::wire_format::{ERROR_TYPE, SESSION_METADATA_TYPE, TYPE_FIELD};
use crate::error::{Result, RoomwireError, ServerError};

/// Information about the connected room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    /// User id of the room owner.
    pub owner_id: String,
    /// Display name of the room.
    pub room_name: String,
}

/// Initial session data sent once per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// The bot's own user id.
    pub user_id: String,
    /// The room this session is attached to.
    pub room_info: RoomInfo,
    /// Rate limits by name: `(limit, period in seconds)`.
    #[serde(default)]
    pub rate_limits: HashMap<String, (u64, f64)>,
    /// Server-side id of this connection.
    pub connection_id: String,
    /// SDK version recommended by the server.
    #[serde(default)]
    pub sdk_version: Option<String>,
}

impl SessionMetadata {
    /// Whether the server recommends a different client version than `ours`.
    pub fn version_mismatch(&self, ours: &str) -> Option<&str> {
        self.sdk_version.as_deref().filter(|v| *v != ours)
    }
}

/// Decode the first frame of a connection.
pub fn decode_handshake(text: &str) -> Result<SessionMetadata> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RoomwireError::Handshake(format!("invalid JSON: {e}")))?;

    let kind = value
        .get(TYPE_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| RoomwireError::Handshake(format!("missing `{TYPE_FIELD}`")))?;

    match kind {
        SESSION_METADATA_TYPE => serde_json::from_value(value)
            .map_err(|e| RoomwireError::Handshake(format!("malformed session metadata: {e}"))),
        ERROR_TYPE => {
            let error: ServerError = serde_json::from_value(value)
                .map_err(|e| RoomwireError::Handshake(format!("malformed error: {e}")))?;
            Err(RoomwireError::Handshake(error.to_string()))
        }
        other => Err(RoomwireError::Handshake(format!(
            "expected {SESSION_METADATA_TYPE}, got {other}"
        ))),
    }
}

//! Wire format for the room service protocol.
//!
//! Every frame is one JSON object sent as a WebSocket text message:
//!
//! ```text
//! {"_type": "ChatRequest", "rid": "17", "message": "hi"}      client -> server
//! {"_type": "ChatResponse", "rid": "17"}                      reply
//! {"_type": "Error", "rid": "17", "message": "rate limited"}  error reply
//! {"_type": "UserJoinedEvent", "user": {...}}                 push
//! ```
//!
//! - `_type` is the discriminator (request, response or event class name)
//! - `rid` links a reply to the request that caused it; pushes have none
//! - all other fields are the command- or event-specific payload

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

use crate::codec::JsonCodec;
use crate::error::Result;

/// Field carrying the frame discriminator.
pub const TYPE_FIELD: &str = "_type";

/// Field carrying the correlation id.
pub const RID_FIELD: &str = "rid";

/// `_type` of error frames (both per-request and connection-level).
pub const ERROR_TYPE: &str = "Error";

/// `_type` of the first frame the server sends on a fresh connection.
pub const SESSION_METADATA_TYPE: &str = "SessionMetadata";

/// Correlation identifier linking a request to its reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an identifier received from the wire.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Monotonic request id source.
///
/// Ids start at 1 and are never reused for the lifetime of the generator,
/// which is shared across reconnects of one session.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Produce the next unique id.
    pub fn next_id(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed).to_string())
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode an outbound request into a text frame.
///
/// The envelope fields are written last so a payload can never shadow the
/// discriminator or the correlation id.
pub fn encode_request(
    kind: &str,
    rid: &RequestId,
    mut payload: Map<String, Value>,
) -> Result<String> {
    payload.insert(TYPE_FIELD.to_string(), Value::String(kind.to_string()));
    payload.insert(RID_FIELD.to_string(), Value::String(rid.0.clone()));
    JsonCodec::encode(&Value::Object(payload))
}

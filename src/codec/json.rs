//! JSON codec using `serde_json`.
//!
//! The room service speaks one JSON document per WebSocket text message.
//! Structs are always encoded as objects so that the `_type` and `rid`
//! envelope fields can be merged into them (see [`crate::protocol`]).
//!
//! # Example
//!
//! ```
//! use roomwire_client::codec::JsonCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = JsonCodec::encode(&msg).unwrap();
//! let decoded: Message = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use serde_json::{Map, Value};

use crate::error::{Result, RoomwireError};

/// JSON codec for structured payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to a JSON string.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode a JSON string to a value.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert a value into a JSON object map.
    ///
    /// `null` (unit structs, `()`) becomes an empty map. Anything that is not
    /// an object cannot carry envelope fields and is rejected.
    pub fn to_object<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(RoomwireError::Protocol(format!(
                "payload must serialize to a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Decode a typed value out of an already-parsed JSON value.
    #[inline]
    pub fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
        Ok(serde_json::from_value(value)?)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

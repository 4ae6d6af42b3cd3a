//! Inbound frame classification.
//!
//! Decoding never panics on hostile input: anything that is not a JSON
//! object with a string `_type` comes back as a [`DecodeError`], and the read
//! loop simply moves on to the next frame.
//!
//! # Example
//!
//! ```
//! use roomwire_client::protocol::{decode_frame, Frame};
//!
//! let frame = decode_frame(r#"{"_type":"ChatResponse","rid":"1"}"#).unwrap();
//! assert!(matches!(frame, Frame::Reply { .. }));
//!
//! assert!(decode_frame("{ nope").is_err());
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

use super::wire_format::{RequestId, ERROR_TYPE, RID_FIELD, TYPE_FIELD};
use crate::codec::json_kind;
use crate::error::{RoomwireError, ServerError};

/// Maximum number of characters of a bad frame kept for diagnostics.
const SNIPPET_LEN: usize = 120;

/// A frame that could not be classified.
#[derive(Debug, Clone, Error)]
#[error("{reason} (frame: {snippet})")]
pub struct DecodeError {
    /// What was wrong with the frame.
    pub reason: String,
    /// Leading part of the offending text.
    pub snippet: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>, text: &str) -> Self {
        Self {
            reason: reason.into(),
            snippet: text.chars().take(SNIPPET_LEN).collect(),
        }
    }
}

impl From<DecodeError> for RoomwireError {
    fn from(e: DecodeError) -> Self {
        RoomwireError::Decode(e.to_string())
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Answer to an outstanding request.
    Reply {
        /// Correlation id of the request being answered.
        rid: RequestId,
        /// Result payload or the server's error.
        outcome: std::result::Result<Value, ServerError>,
    },
    /// Unsolicited server event.
    Push {
        /// The event's `_type` (e.g. `ChatEvent`).
        kind: String,
        /// Event fields, without the envelope.
        payload: Value,
    },
    /// Connection-level error not tied to any request.
    Fault(ServerError),
}

impl Frame {
    /// Whether this frame answers a request.
    #[inline]
    pub fn is_reply(&self) -> bool {
        matches!(self, Frame::Reply { .. })
    }

    /// The correlation id, for replies.
    pub fn rid(&self) -> Option<&RequestId> {
        match self {
            Frame::Reply { rid, .. } => Some(rid),
            _ => None,
        }
    }
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> std::result::Result<Frame, DecodeError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| DecodeError::new(format!("invalid JSON: {e}"), text))?;

    let mut object = match value {
        Value::Object(map) => map,
        other => {
            return Err(DecodeError::new(
                format!("expected object, got {}", json_kind(&other)),
                text,
            ))
        }
    };

    let kind = match object.remove(TYPE_FIELD) {
        Some(Value::String(kind)) => kind,
        Some(other) => {
            return Err(DecodeError::new(
                format!("`{TYPE_FIELD}` must be a string, got {}", json_kind(&other)),
                text,
            ))
        }
        None => return Err(DecodeError::new(format!("missing `{TYPE_FIELD}`"), text)),
    };

    let rid = match object.remove(RID_FIELD) {
        None | Some(Value::Null) => None,
        Some(Value::String(rid)) => Some(RequestId::new(rid)),
        Some(Value::Number(n)) => Some(RequestId::new(n.to_string())),
        Some(other) => {
            return Err(DecodeError::new(
                format!("`{RID_FIELD}` must be a string, got {}", json_kind(&other)),
                text,
            ))
        }
    };

    if kind == ERROR_TYPE {
        let error: ServerError = serde_json::from_value(Value::Object(object))
            .map_err(|e| DecodeError::new(format!("malformed error frame: {e}"), text))?;
        return Ok(match rid {
            Some(rid) => Frame::Reply {
                rid,
                outcome: Err(error),
            },
            None => Frame::Fault(error),
        });
    }

    Ok(match rid {
        Some(rid) => Frame::Reply {
            rid,
            outcome: Ok(into_payload(object)),
        },
        None => Frame::Push {
            kind,
            payload: Value::Object(object),
        },
    })
}

/// Reply fields without the envelope; an empty remainder is `null`.
fn into_payload(object: Map<String, Value>) -> Value {
    if object.is_empty() {
        Value::Null
    } else {
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_reply_is_null() {
        let frame = decode_frame(r#"{"_type":"ChatResponse","rid":"1"}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Reply {
                rid: RequestId::from("1"),
                outcome: Ok(Value::Null),
            }
        );
    }

    #[test]
    fn test_reply_with_content() {
        let frame = decode_frame(
            r#"{"_type":"GetWalletResponse","rid":"4","content":[{"type":"gold","amount":3}]}"#,
        )
        .unwrap();

        let Frame::Reply { rid, outcome } = frame else {
            panic!("expected reply");
        };
        assert_eq!(rid.as_str(), "4");
        assert_eq!(
            outcome.unwrap(),
            json!({"content": [{"type": "gold", "amount": 3}]})
        );
    }

    #[test]
    fn test_error_reply() {
        let frame = decode_frame(r#"{"_type":"Error","rid":"2","message":"not allowed"}"#).unwrap();
        let Frame::Reply { rid, outcome } = frame else {
            panic!("expected reply");
        };
        assert_eq!(rid.as_str(), "2");
        assert_eq!(outcome.unwrap_err().message, "not allowed");
    }

    #[test]
    fn test_error_with_code() {
        let frame =
            decode_frame(r#"{"_type":"Error","rid":"2","code":"rate_limited","message":"slow"}"#)
                .unwrap();
        let Frame::Reply { outcome, .. } = frame else {
            panic!("expected reply");
        };
        assert_eq!(outcome.unwrap_err().code(), "rate_limited");
    }

    #[test]
    fn test_error_without_rid_is_fault() {
        let frame = decode_frame(r#"{"_type":"Error","message":"kicked"}"#).unwrap();
        assert_eq!(frame, Frame::Fault(ServerError::new("kicked")));

        let frame = decode_frame(r#"{"_type":"Error","rid":null,"message":"kicked"}"#).unwrap();
        assert!(matches!(frame, Frame::Fault(_)));
    }

    #[test]
    fn test_push_frame() {
        let frame = decode_frame(
            r#"{"_type":"UserJoinedEvent","user":{"id":"u1","username":"alice"}}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            Frame::Push {
                kind: "UserJoinedEvent".into(),
                payload: json!({"user": {"id": "u1", "username": "alice"}}),
            }
        );
        assert!(!frame.is_reply());
        assert!(frame.rid().is_none());
    }

    #[test]
    fn test_numeric_rid_accepted() {
        let frame = decode_frame(r#"{"_type":"ChatResponse","rid":12}"#).unwrap();
        assert_eq!(frame.rid().unwrap().as_str(), "12");
    }

    #[test]
    fn test_malformed_inputs() {
        let cases = [
            "",
            "not json",
            "[1,2,3]",
            "\"string\"",
            "{}",
            r#"{"_type": 5}"#,
            r#"{"_type":"ChatResponse","rid":{"x":1}}"#,
            r#"{"_type":"Error","rid":"1"}"#,
        ];
        for case in cases {
            assert!(decode_frame(case).is_err(), "accepted: {case:?}");
        }
    }

    #[test]
    fn test_decode_error_snippet_is_bounded() {
        let long = "x".repeat(10_000);
        let err = decode_frame(&long).unwrap_err();
        assert_eq!(err.snippet.chars().count(), SNIPPET_LEN);
    }

    #[test]
    fn test_decode_error_converts() {
        let err: RoomwireError = decode_frame("{").unwrap_err().into();
        assert!(matches!(err, RoomwireError::Decode(_)));
    }
}

//! Protocol module - wire format, frame classification and handshake.
//!
//! This module implements the JSON text protocol spoken with the room service:
//! - `_type`/`rid` envelope encoding for outbound requests
//! - classification of inbound frames into replies, pushes and faults
//! - decoding of the `SessionMetadata` handshake

mod frame;
mod handshake;
mod wire_format;

pub use frame::{decode_frame, DecodeError, Frame};
pub use handshake::{decode_handshake, RoomInfo, SessionMetadata};
pub use wire_format::{
    encode_request, RequestId, RequestIdGenerator, ERROR_TYPE, RID_FIELD,
    SESSION_METADATA_TYPE, TYPE_FIELD,
};

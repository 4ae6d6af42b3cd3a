//! Codec module - serialization/deserialization for frame payloads.
//!
//! - [`JsonCodec`] - JSON using `serde_json`, the room service's wire format
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so the call sites stay monomorphic.

mod json;

pub use json::JsonCodec;
pub(crate) use json::json_kind;

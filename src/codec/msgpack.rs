//! MsgPack codec using `rmp-serde`.
//!
//! **CRITICAL**: Always use `to_vec_named`, NEVER `to_vec`!
//! The response envelope must be a map (`{"result", "error"}`), and
//! `to_vec` would serialize it as a positional array.
//!
//! # Example
//!
//! ```
//! use httprpc::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = MsgPackCodec::encode(&msg).unwrap();
//! let decoded: Message = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use bytes::Bytes;
use http::request::Parts;

use super::{Codec, CodecRequest, EnvelopeRequest, RequestEnvelope, WireResponse};
use crate::error::Result;

/// Content type the MsgPack codec is normally registered under.
pub const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";

/// MessagePack codec.
///
/// Uses `rmp_serde::to_vec_named` so structs are serialized as maps
/// (with field names) rather than arrays (positional).
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        // CRITICAL: to_vec_named, NOT to_vec!
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl Codec for MsgPackCodec {
    fn new_request(&self, head: &Parts, body: &Bytes) -> Box<dyn CodecRequest> {
        let envelope = RequestEnvelope::parse(head, body, MsgPackCodec::decode);
        Box::new(EnvelopeRequest::new(envelope, MSGPACK_CONTENT_TYPE, encode))
    }
}

fn encode(res: &WireResponse<'_>) -> Result<Vec<u8>> {
    MsgPackCodec::encode(res)
}

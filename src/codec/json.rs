//! JSON codec using `serde_json`.
//!
//! Request body: `{"method": "Service.Method", "params": {...}}`.
//! Response body: `{"result": ..., "error": null}` on success,
//! `{"result": null, "error": ...}` on failure.

use bytes::Bytes;
use http::request::Parts;

use super::{Codec, CodecRequest, EnvelopeRequest, RequestEnvelope, WireResponse};
use crate::error::Result;

/// Content type the JSON codec is normally registered under.
pub const JSON_CONTENT_TYPE: &str = "application/json";

const RESPONSE_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn new_request(&self, head: &Parts, body: &Bytes) -> Box<dyn CodecRequest> {
        let envelope =
            RequestEnvelope::parse(head, body, |bytes| Ok(serde_json::from_slice(bytes)?));
        Box::new(EnvelopeRequest::new(envelope, RESPONSE_CONTENT_TYPE, encode))
    }
}

fn encode(res: &WireResponse<'_>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(res)?)
}

//! Codec module - wire formats for RPC requests and responses.
//!
//! A [`Codec`] is registered on the server under a content type and turns
//! each inbound request into a [`CodecRequest`], which yields the method
//! name and params and later encodes the reply or error.
//!
//! - [`JsonCodec`] - `{"method", "params"}` in, `{"result", "error"}` out
//! - [`MsgPackCodec`] - the same envelope in MessagePack (`to_vec_named`)
//!
//! # Method name sources
//!
//! Both codecs resolve the method name from the first non-empty of:
//! 1. the remainder of a `/rpc/<name>` path
//! 2. the last path segment, if it looks like `Service.Method`
//! 3. the `method` query field
//! 4. the `method` field of the decoded body
//!
//! GET requests carry no body: their params are built from the query
//! string, with repeated keys collected into arrays.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use httprpc::codec::{Codec, JsonCodec};
//!
//! let (head, ()) = http::Request::get("/rpc/hello.say?who=World")
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//!
//! let request = JsonCodec::new().new_request(&head, &Bytes::new());
//! assert_eq!(request.method().unwrap(), "hello.say");
//! assert_eq!(request.read_request().unwrap()["who"], "World");
//! ```

mod envelope;
mod json;
mod msgpack;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::request::Parts;
use http::{Response, StatusCode};
use serde_json::Value;

use crate::error::{Result, RpcError};

pub use envelope::{WireRequest, WireResponse};
pub use json::{JsonCodec, JSON_CONTENT_TYPE};
pub use msgpack::{MsgPackCodec, MSGPACK_CONTENT_TYPE};

pub(crate) use envelope::{EnvelopeRequest, RequestEnvelope};

/// Path prefix that routes directly to a method: `/rpc/<Service.Method>`.
pub const RPC_PATH_PREFIX: &str = "/rpc/";

/// Creates a [`CodecRequest`] for each inbound request.
///
/// Codecs are shared between all requests and must be stateless.
pub trait Codec: Send + Sync + 'static {
    /// Parse a request head and body.
    fn new_request(&self, head: &Parts, body: &Bytes) -> Box<dyn CodecRequest>;
}

/// Decodes one request and encodes its response.
pub trait CodecRequest: Send {
    /// The RPC method name, in dotted `Service.Method` form.
    fn method(&self) -> Result<String>;

    /// The params value. Absent params read as an empty object.
    fn read_request(&self) -> Result<Value>;

    /// Encode a successful reply with status 200.
    fn write_response(&self, reply: &Value) -> Response<Bytes>;

    /// Encode an error with the given status.
    fn write_error(&self, status: StatusCode, error: &RpcError) -> Response<Bytes>;
}

/// Value placed in the `error` field: the detached data if the error
/// carries any, else its message.
pub fn error_value(error: &RpcError) -> Value {
    match error.data() {
        Some(data) => data.clone(),
        None => Value::String(error.to_string()),
    }
}

pub(crate) fn encoded_response(
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

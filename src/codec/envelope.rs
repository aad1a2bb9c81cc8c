//! Request/response envelope shared by all codecs.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::request::Parts;
use http::{Method, Response, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{encoded_response, error_value, CodecRequest, RPC_PATH_PREFIX};
use crate::error::{Result, RpcError};
use crate::server::write_error;

/// Decoded request body: `{"method": ..., "params": ...}`.
#[derive(Debug, Default, Deserialize)]
pub struct WireRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Response body: `{"result": ..., "error": ...}`.
///
/// Exactly one of the two is non-null.
#[derive(Debug, Serialize)]
pub struct WireResponse<'a> {
    pub result: Option<&'a Value>,
    pub error: Value,
}

impl<'a> WireResponse<'a> {
    pub fn success(reply: &'a Value) -> Self {
        Self {
            result: Some(reply),
            error: Value::Null,
        }
    }

    pub fn failure(error: Value) -> Self {
        Self {
            result: None,
            error,
        }
    }
}

#[derive(Debug)]
enum EnvelopeError {
    MissingMethod,
    Invalid(String),
}

/// Method name and params of one request, or why they are unavailable.
#[derive(Debug)]
pub(crate) struct RequestEnvelope {
    method: String,
    params: Option<Value>,
    error: Option<EnvelopeError>,
}

impl RequestEnvelope {
    /// Build the envelope, decoding the body with `decode` for
    /// body-bearing verbs.
    ///
    /// A body that fails to decode is tolerated when the URL names the
    /// method; params are then treated as absent.
    pub(crate) fn parse<F>(head: &Parts, body: &Bytes, decode: F) -> Self
    where
        F: FnOnce(&[u8]) -> Result<WireRequest>,
    {
        let url_method = method_from_uri(&head.uri);

        if head.method == Method::GET {
            return match url_method {
                Some(method) => {
                    let params = Value::Object(query_params(&head.uri));
                    Self::resolved(method, Some(params))
                }
                None => Self::failed(EnvelopeError::MissingMethod),
            };
        }

        let decoded = if body.is_empty() {
            Ok(WireRequest::default())
        } else {
            decode(body)
        };

        match (decoded, url_method) {
            (Ok(wire), Some(method)) => Self::resolved(method, wire.params),
            (Ok(wire), None) if !wire.method.is_empty() => Self::resolved(wire.method, wire.params),
            (Ok(_), None) => Self::failed(EnvelopeError::MissingMethod),
            (Err(_), Some(method)) => Self::resolved(method, None),
            (Err(e), None) => Self::failed(EnvelopeError::Invalid(e.to_string())),
        }
    }

    fn resolved(method: String, params: Option<Value>) -> Self {
        Self {
            method,
            params,
            error: None,
        }
    }

    fn failed(error: EnvelopeError) -> Self {
        Self {
            method: String::new(),
            params: None,
            error: Some(error),
        }
    }

    fn error(&self) -> Option<RpcError> {
        self.error.as_ref().map(|e| match e {
            EnvelopeError::MissingMethod => RpcError::MethodNameMissing,
            EnvelopeError::Invalid(msg) => RpcError::InvalidRequest(msg.clone()),
        })
    }

    pub(crate) fn method(&self) -> Result<String> {
        match self.error() {
            Some(e) => Err(e),
            None => Ok(self.method.clone()),
        }
    }

    pub(crate) fn params(&self) -> Result<Value> {
        if let Some(e) = self.error() {
            return Err(e);
        }
        Ok(match &self.params {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(params) => params.clone(),
        })
    }
}

/// Serializes a response envelope into a codec's wire format.
pub(crate) type EncodeFn = fn(&WireResponse<'_>) -> Result<Vec<u8>>;

/// [`CodecRequest`] shared by the envelope codecs; they differ only in
/// how the envelope is encoded and labelled.
#[derive(Debug)]
pub(crate) struct EnvelopeRequest {
    envelope: RequestEnvelope,
    content_type: &'static str,
    encode: EncodeFn,
}

impl EnvelopeRequest {
    pub(crate) fn new(
        envelope: RequestEnvelope,
        content_type: &'static str,
        encode: EncodeFn,
    ) -> Self {
        Self {
            envelope,
            content_type,
            encode,
        }
    }

    fn write_envelope(&self, status: StatusCode, res: &WireResponse<'_>) -> Response<Bytes> {
        match (self.encode)(res) {
            Ok(body) => encoded_response(status, self.content_type, body),
            Err(e) => {
                tracing::error!("Failed to encode {} response: {}", self.content_type, e);
                write_error(StatusCode::BAD_REQUEST, &e.to_string())
            }
        }
    }
}

impl CodecRequest for EnvelopeRequest {
    fn method(&self) -> Result<String> {
        self.envelope.method()
    }

    fn read_request(&self) -> Result<Value> {
        self.envelope.params()
    }

    fn write_response(&self, reply: &Value) -> Response<Bytes> {
        self.write_envelope(StatusCode::OK, &WireResponse::success(reply))
    }

    fn write_error(&self, status: StatusCode, error: &RpcError) -> Response<Bytes> {
        self.write_envelope(status, &WireResponse::failure(error_value(error)))
    }
}

/// Method name carried by the URL, if any.
fn method_from_uri(uri: &Uri) -> Option<String> {
    let path = uri.path();

    if let Some(rest) = path.strip_prefix(RPC_PATH_PREFIX) {
        if !rest.is_empty() {
            return Some(rest.to_string());
        }
    }

    // Only a dotted segment names a method; `/rpc` itself does not.
    if let Some(last) = path.trim_matches('/').rsplit('/').next() {
        if last.contains('.') {
            return Some(last.to_string());
        }
    }

    uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == "method" && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

/// Query string as a params object, without the `method` key.
fn query_params(uri: &Uri) -> Map<String, Value> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(query) = uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "method" {
                continue;
            }
            grouped
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::Array(values.into_iter().map(Value::String).collect())
            };
            (key, value)
        })
        .collect()
}

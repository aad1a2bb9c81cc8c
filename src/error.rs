//! Error types for httprpc.
//!
//! [`RpcError`] covers registration failures, dispatch failures and the
//! plumbing errors of the codecs and transport. [`ServiceError`] is what a
//! service method (or the validate hook) returns.

use std::fmt;

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Main error type for all httprpc operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Service name does not start with an upper-case letter.
    #[error("rpc: type {0:?} is not exported")]
    NameNotExported(String),

    /// A service with the same name is already registered.
    #[error("rpc: service already defined: {0:?}")]
    DuplicateService(String),

    /// Registration found no method binding that qualifies.
    #[error("rpc: {0:?} has no exported methods of suitable type")]
    NoSuitableMethods(String),

    /// Method name is not of the form `Service.Method`.
    #[error("rpc: service/method request ill-formed: {0}")]
    MalformedMethodName(String),

    #[error("rpc: can't find service {0}")]
    ServiceNotFound(String),

    #[error("rpc: can't find method {0}")]
    MethodNotFound(String),

    /// No source (path, query, body) supplied a method name.
    #[error("rpc: method name missing")]
    MethodNameMissing,

    /// HTTP verb is not in the allow-list.
    #[error("rpc: only {allowed} methods are allowed, received {received}")]
    VerbNotAllowed { allowed: String, received: String },

    /// No codec is registered for the request's content type.
    #[error("rpc: unrecognized Content-Type: {0}")]
    UnsupportedContentType(String),

    /// The request envelope could not be decoded.
    #[error("rpc: invalid request: {0}")]
    InvalidRequest(String),

    /// Request body is larger than the transport accepts.
    #[error("rpc: request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Request body could not be read off the connection.
    #[error("rpc: can't read request body: {0}")]
    Body(String),

    /// Params could not be decoded into the method's args type.
    #[error("{0}")]
    ArgumentDecode(#[source] serde_json::Error),

    /// Error returned by a service method or the validate hook.
    #[error(transparent)]
    Method(#[from] ServiceError),

    /// JSON serialization error (reply encoding).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// I/O error on the listening socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Default HTTP status for this error.
    ///
    /// Lookup misses map to 400 here; the `/rpc/<name>` route answers them
    /// with 404 on its own.
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::VerbNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RpcError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RpcError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Structured payload carried by a [`ServiceError`], if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            RpcError::Method(e) => e.data(),
            _ => None,
        }
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Error returned by service methods.
///
/// Either a plain message, or a structured JSON payload that codecs emit
/// untouched in the `error` field of the response.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    message: String,
    data: Option<Value>,
}

impl ServiceError {
    /// Create an error with a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// Create an error carrying a structured payload.
    pub fn with_data(data: Value) -> Self {
        let message = match &data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            message,
            data: Some(data),
        }
    }

    /// Get the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured payload.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServiceError {}

impl From<String> for ServiceError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ServiceError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        let verb = RpcError::VerbNotAllowed {
            allowed: "POST".into(),
            received: "GET".into(),
        };
        assert_eq!(verb.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            RpcError::UnsupportedContentType("text/xml".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            RpcError::PayloadTooLarge { limit: 8 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(RpcError::MethodNameMissing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RpcError::MethodNotFound("Missing".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_messages_name_the_culprit() {
        assert_eq!(
            RpcError::MethodNotFound("Missing".into()).to_string(),
            "rpc: can't find method Missing"
        );
        assert_eq!(
            RpcError::DuplicateService("Hello".into()).to_string(),
            "rpc: service already defined: \"Hello\""
        );
    }

    #[test]
    fn test_service_error_data() {
        let plain = ServiceError::new("boom");
        assert_eq!(plain.message(), "boom");
        assert!(plain.data().is_none());

        let structured = ServiceError::with_data(json!({"code": 7}));
        assert_eq!(structured.data(), Some(&json!({"code": 7})));
        assert_eq!(structured.to_string(), r#"{"code":7}"#);

        let wrapped = RpcError::from(structured);
        assert_eq!(wrapped.data(), Some(&json!({"code": 7})));
        assert_eq!(wrapped.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_string_data_message_is_unquoted() {
        let err = ServiceError::with_data(json!("denied"));
        assert_eq!(err.message(), "denied");
    }
}

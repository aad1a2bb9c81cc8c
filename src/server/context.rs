//! Per-request information handed to hooks.

use std::sync::Arc;

use http::request::Parts;
use http::StatusCode;

use crate::error::RpcError;

/// Shared head of the in-flight HTTP request.
///
/// Service methods receive it as their request argument; the intercept hook
/// may replace it before the method runs.
pub type RequestHandle = Arc<Parts>;

/// Information passed to the intercept, before, validate and after hooks.
///
/// `error` and `status_code` are only filled in for the after hook.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Resolved `Service.Method`, empty if resolution failed.
    pub method: String,
    pub request: RequestHandle,
    pub error: Option<Arc<RpcError>>,
    pub status_code: Option<StatusCode>,
}

impl RequestInfo {
    pub fn new(request: RequestHandle) -> Self {
        Self {
            method: String::new(),
            request,
            error: None,
            status_code: None,
        }
    }

    /// Whether the request produced an error response.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_creation() {
        let (parts, ()) = http::Request::get("/rpc").body(()).unwrap().into_parts();
        let info = RequestInfo::new(Arc::new(parts));

        assert!(info.method.is_empty());
        assert_eq!(info.request.uri.path(), "/rpc");
        assert!(!info.is_error());
        assert!(info.status_code.is_none());
    }

    #[test]
    fn test_info_is_clone() {
        let (parts, ()) = http::Request::get("/rpc").body(()).unwrap().into_parts();
        let mut info = RequestInfo::new(Arc::new(parts));
        info.error = Some(Arc::new(RpcError::MethodNameMissing));

        let copy = info.clone();
        assert!(copy.is_error());
        assert!(Arc::ptr_eq(&info.request, &copy.request));
    }
}

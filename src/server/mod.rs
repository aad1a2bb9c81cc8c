//! RPC server - codec negotiation, method resolution and the hook chain.
//!
//! [`Server::dispatch`] turns one HTTP request into one HTTP response:
//! 1. Check the verb against the allow-list (405)
//! 2. Resolve a `/rpc/<Service.Method>` path, if present (404 on a miss)
//! 3. Pick a codec by `Content-Type`, or by preference for GET (415)
//! 4. Resolve the method name through the codec (400 on a miss)
//! 5. Decode args, unless the method takes none (400)
//! 6. Run intercept, before and validate hooks
//! 7. Invoke the method and encode its reply (200) or error (400)
//! 8. Run the after hook
//!
//! # Registration happens before serving
//!
//! All `register_*` and `disable_*` calls take `&mut self`. Finish them,
//! then share the server behind an `Arc`; dispatch only needs `&self`.
//!
//! # Example
//!
//! ```ignore
//! use httprpc::codec::{JsonCodec, JSON_CONTENT_TYPE};
//! use httprpc::{Server, Service};
//!
//! let mut server = Server::new();
//! server.register_codec(JsonCodec::new(), JSON_CONTENT_TYPE);
//! server.register_service(Service::new(HelloService).method("Say", say), "")?;
//!
//! let response = server.dispatch(request).await;
//! ```

mod context;
mod hooks;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::request::Parts;
use http::{Method, Request, Response, StatusCode};

use crate::codec::{Codec, CodecRequest, JSON_CONTENT_TYPE, RPC_PATH_PREFIX};
use crate::error::{Result, RpcError, ServiceError};
use crate::service::{Service, ServiceRegistry};

pub use context::{RequestHandle, RequestInfo};
pub use hooks::{AfterFunc, BeforeFunc, InterceptFunc, ValidateFunc};

use hooks::Hooks;

/// Verbs accepted by a new server.
pub const DEFAULT_ALLOWED_METHODS: [Method; 4] =
    [Method::POST, Method::GET, Method::DELETE, Method::PUT];

/// Serves registered services using registered codecs.
pub struct Server {
    codecs: BTreeMap<String, Arc<dyn Codec>>,
    registry: ServiceRegistry,
    hooks: Hooks,
    allowed_methods: Vec<Method>,
}

impl Server {
    /// Create a server with no codecs, no services and the default verbs.
    pub fn new() -> Self {
        Self {
            codecs: BTreeMap::new(),
            registry: ServiceRegistry::new(),
            hooks: Hooks::default(),
            allowed_methods: DEFAULT_ALLOWED_METHODS.to_vec(),
        }
    }

    /// Register a codec for a content type (matched case-insensitively,
    /// without parameters such as `charset`).
    pub fn register_codec<C: Codec>(&mut self, codec: C, content_type: &str) {
        self.codecs
            .insert(content_type.trim().to_ascii_lowercase(), Arc::new(codec));
    }

    /// Register a service. An empty `name` uses the receiver's type name.
    pub fn register_service<S>(&mut self, service: Service<S>, name: &str) -> Result<()>
    where
        S: Send + Sync + 'static,
    {
        self.registry.register(service, name)
    }

    /// Set the intercept hook, replacing any previous one.
    pub fn register_intercept_func<F>(&mut self, f: F)
    where
        F: Fn(&RequestInfo) -> Option<Parts> + Send + Sync + 'static,
    {
        self.hooks.intercept = Some(Arc::new(f));
    }

    /// Set the before hook, replacing any previous one.
    pub fn register_before_func<F>(&mut self, f: F)
    where
        F: Fn(&RequestInfo) + Send + Sync + 'static,
    {
        self.hooks.before = Some(Arc::new(f));
    }

    /// Set the validate hook, replacing any previous one.
    ///
    /// It runs after the before hook for methods that take args. An error
    /// skips the method and becomes the call's result.
    pub fn register_validate_request_func<F>(&mut self, f: F)
    where
        F: Fn(&RequestInfo, &(dyn Any + Send)) -> std::result::Result<(), ServiceError>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.validate = Some(Arc::new(f));
    }

    /// Set the after hook, replacing any previous one.
    pub fn register_after_func<F>(&mut self, f: F)
    where
        F: Fn(&RequestInfo) + Send + Sync + 'static,
    {
        self.hooks.after = Some(Arc::new(f));
    }

    pub fn disable_get(&mut self) {
        self.remove_method(&Method::GET);
    }

    pub fn disable_post(&mut self) {
        self.remove_method(&Method::POST);
    }

    pub fn disable_put(&mut self) {
        self.remove_method(&Method::PUT);
    }

    pub fn disable_delete(&mut self) {
        self.remove_method(&Method::DELETE);
    }

    fn remove_method(&mut self, method: &Method) {
        self.allowed_methods.retain(|m| m != method);
    }

    /// Verbs currently accepted.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    /// Returns true if the dotted method name resolves.
    pub fn has_method(&self, method: &str) -> bool {
        self.registry.has_method(method)
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Handle one request.
    ///
    /// Never fails: every error becomes an error response.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        let (head, body) = request.into_parts();
        let mut info = RequestInfo::new(Arc::new(head));
        let (response, error) = self.handle(&mut info, body).await;
        self.finish(info, response, error)
    }

    /// Answer a request the transport could not hand to [`dispatch`]
    /// (e.g. an oversized body) with a plain-text error.
    ///
    /// The response gets the same headers as a dispatched one and the after
    /// hook runs for it.
    ///
    /// [`dispatch`]: Server::dispatch
    pub fn reject(&self, head: Parts, status: StatusCode, err: RpcError) -> Response<Bytes> {
        let info = RequestInfo::new(Arc::new(head));
        let response = write_error(status, &err.to_string());
        self.finish(info, response, Some(err))
    }

    fn finish(
        &self,
        mut info: RequestInfo,
        mut response: Response<Bytes>,
        error: Option<RpcError>,
    ) -> Response<Bytes> {
        response
            .headers_mut()
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

        let verb = &info.request.method;
        let path = info.request.uri.path();
        match &error {
            Some(e) => tracing::debug!(
                "{} {} -> {} ({}): {}",
                verb,
                path,
                response.status(),
                info.method,
                e
            ),
            None => tracing::debug!("{} {} -> {} ({})", verb, path, response.status(), info.method),
        }

        info.status_code = Some(response.status());
        info.error = error.map(Arc::new);
        if let Some(after) = &self.hooks.after {
            after(&info);
        }

        response
    }

    async fn handle(
        &self,
        info: &mut RequestInfo,
        body: Bytes,
    ) -> (Response<Bytes>, Option<RpcError>) {
        if !self.allowed_methods.contains(&info.request.method) {
            let err = RpcError::VerbNotAllowed {
                allowed: self.allowed_list(),
                received: info.request.method.to_string(),
            };
            return plain_failure(err.status(), err);
        }

        // A `/rpc/<name>` path wins over any other method source.
        let mut path_method = None;
        if let Some(name) = info
            .request
            .uri
            .path()
            .strip_prefix(RPC_PATH_PREFIX)
            .filter(|name| !name.is_empty())
        {
            match self.registry.get(name) {
                Ok((service, method)) => {
                    path_method = Some(format!("{}.{}", service.name(), method.name()))
                }
                Err(e) => return plain_failure(StatusCode::NOT_FOUND, e),
            }
        }

        let codec = match self.select_codec(&info.request) {
            Ok(codec) => codec,
            Err(e) => return plain_failure(e.status(), e),
        };
        let codec_req = codec.new_request(&info.request, &body);

        let method = match path_method {
            Some(method) => method,
            None => match codec_req.method() {
                Ok(method) if !method.is_empty() => method,
                Ok(_) => return codec_failure(&*codec_req, RpcError::MethodNameMissing),
                Err(e) => return codec_failure(&*codec_req, e),
            },
        };

        let (service, descriptor) = match self.registry.get(&method) {
            Ok(found) => found,
            Err(e) => return codec_failure(&*codec_req, e),
        };
        info.method = format!("{}.{}", service.name(), descriptor.name());

        let params = if descriptor.has_args() {
            match codec_req.read_request() {
                Ok(params) => Some(params),
                Err(e) => return codec_failure(&*codec_req, e),
            }
        } else {
            None
        };
        let call = match descriptor.prepare(params) {
            Ok(call) => call,
            Err(e) => return codec_failure(&*codec_req, e),
        };

        if let Some(intercept) = &self.hooks.intercept {
            if let Some(head) = intercept(&*info) {
                info.request = Arc::new(head);
            }
        }
        if let Some(before) = &self.hooks.before {
            before(&*info);
        }

        let validated = match (&self.hooks.validate, call.args()) {
            (Some(validate), Some(args)) => validate(&*info, args).map_err(RpcError::from),
            _ => Ok(()),
        };
        let outcome = match validated {
            Ok(()) => call.invoke(info.request.clone()).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reply) => (codec_req.write_response(&reply), None),
            Err(e) => codec_failure(&*codec_req, e),
        }
    }

    fn select_codec(&self, head: &Parts) -> Result<&Arc<dyn Codec>> {
        if head.method == Method::GET {
            // GET carries no body, so the content type is not required.
            let codec = if self.codecs.len() == 1 {
                self.codecs.values().next()
            } else {
                self.codecs
                    .get(JSON_CONTENT_TYPE)
                    .or_else(|| self.codecs.values().next())
            };
            return codec.ok_or_else(|| RpcError::UnsupportedContentType(String::new()));
        }

        let header = head
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        let content_type = header
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if content_type.is_empty() && self.codecs.len() == 1 {
            if let Some(codec) = self.codecs.values().next() {
                return Ok(codec);
            }
        }
        self.codecs
            .get(&content_type)
            .ok_or(RpcError::UnsupportedContentType(content_type))
    }

    fn allowed_list(&self) -> String {
        self.allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .field("allowed_methods", &self.allowed_methods)
            .finish()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a plain-text error response.
pub fn write_error(status: StatusCode, msg: &str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::copy_from_slice(msg.as_bytes()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn plain_failure(status: StatusCode, err: RpcError) -> (Response<Bytes>, Option<RpcError>) {
    (write_error(status, &err.to_string()), Some(err))
}

fn codec_failure(
    codec_req: &dyn CodecRequest,
    err: RpcError,
) -> (Response<Bytes>, Option<RpcError>) {
    (codec_req.write_error(StatusCode::BAD_REQUEST, &err), Some(err))
}

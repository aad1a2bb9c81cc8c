//! Typed method bindings and the descriptors built from them.
//!
//! A [`Service`] collects a receiver and its named method bindings. Each
//! binding is erased behind [`MethodHandler`], which decodes params into the
//! binding's args type and produces a [`PreparedCall`] the dispatcher can
//! hand to the validate hook before invoking.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use httprpc::{RequestHandle, Service, ServiceError};
//! use serde::{Deserialize, Serialize};
//!
//! struct HelloService;
//!
//! #[derive(Deserialize)]
//! struct HelloArgs { who: String }
//!
//! #[derive(Serialize)]
//! struct HelloReply { message: String }
//!
//! let service = Service::new(HelloService)
//!     .method("Say", |_svc: Arc<HelloService>, _req: RequestHandle, args: HelloArgs| async move {
//!         Ok::<_, ServiceError>(HelloReply { message: format!("Hello, {}!", args.who) })
//!     });
//!
//! assert_eq!(service.receiver_type_name(), "HelloService");
//! ```

use std::any::{self, Any};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, RpcError, ServiceError};
use crate::server::RequestHandle;

/// Boxed future for method results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A decoded call, ready to run.
pub trait PreparedCall: Send {
    /// Decoded args, `None` for no-args methods.
    fn args(&self) -> Option<&(dyn Any + Send)>;

    /// Run the method and serialize its reply.
    fn invoke(self: Box<Self>, request: RequestHandle) -> BoxFuture<'static, Result<Value>>;
}

/// Type-erased method binding.
pub trait MethodHandler: Send + Sync + 'static {
    /// Decode params into the binding's args type.
    ///
    /// `params` is `None` for no-args methods, which never decode.
    fn prepare(&self, params: Option<Value>) -> Result<Box<dyn PreparedCall>>;
}

/// Binding for `(receiver, request, args) -> Result<reply, ServiceError>`.
struct TypedMethod<S, F, A, R, Fut> {
    receiver: Arc<S>,
    handler: Arc<F>,
    /// Args type has no fields, so a params value that does not fit it
    /// means "no args supplied".
    tolerate_decode: bool,
    _phantom: PhantomData<fn(A) -> (R, Fut)>,
}

struct TypedCall<S, F, A> {
    receiver: Arc<S>,
    handler: Arc<F>,
    args: A,
}

impl<S, F, A, R, Fut> MethodHandler for TypedMethod<S, F, A, R, Fut>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, RequestHandle, A) -> Fut + Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    R: Serialize + 'static,
    Fut: Future<Output = std::result::Result<R, ServiceError>> + Send + 'static,
{
    fn prepare(&self, params: Option<Value>) -> Result<Box<dyn PreparedCall>> {
        let params = params.unwrap_or_else(|| Value::Object(Default::default()));
        let args: A = match serde_json::from_value(params) {
            Ok(args) => args,
            Err(e) if self.tolerate_decode => decode_fieldless(e)?,
            Err(e) => return Err(RpcError::ArgumentDecode(e)),
        };

        Ok(Box::new(TypedCall {
            receiver: self.receiver.clone(),
            handler: self.handler.clone(),
            args,
        }))
    }
}

impl<S, F, A, R, Fut> PreparedCall for TypedCall<S, F, A>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, RequestHandle, A) -> Fut + Send + Sync + 'static,
    A: Send + 'static,
    R: Serialize + 'static,
    Fut: Future<Output = std::result::Result<R, ServiceError>> + Send + 'static,
{
    fn args(&self) -> Option<&(dyn Any + Send)> {
        Some(&self.args)
    }

    fn invoke(self: Box<Self>, request: RequestHandle) -> BoxFuture<'static, Result<Value>> {
        let this = *self;
        let fut = (this.handler)(this.receiver, request, this.args);
        Box::pin(async move { encode_reply(fut.await) })
    }
}

/// Binding for `(receiver, request) -> Result<reply, ServiceError>`.
struct NoArgsMethod<S, F, R, Fut> {
    receiver: Arc<S>,
    handler: Arc<F>,
    _phantom: PhantomData<fn() -> (R, Fut)>,
}

struct NoArgsCall<S, F> {
    receiver: Arc<S>,
    handler: Arc<F>,
}

impl<S, F, R, Fut> MethodHandler for NoArgsMethod<S, F, R, Fut>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, RequestHandle) -> Fut + Send + Sync + 'static,
    R: Serialize + 'static,
    Fut: Future<Output = std::result::Result<R, ServiceError>> + Send + 'static,
{
    fn prepare(&self, _params: Option<Value>) -> Result<Box<dyn PreparedCall>> {
        Ok(Box::new(NoArgsCall {
            receiver: self.receiver.clone(),
            handler: self.handler.clone(),
        }))
    }
}

impl<S, F, R, Fut> PreparedCall for NoArgsCall<S, F>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, RequestHandle) -> Fut + Send + Sync + 'static,
    R: Serialize + 'static,
    Fut: Future<Output = std::result::Result<R, ServiceError>> + Send + 'static,
{
    fn args(&self) -> Option<&(dyn Any + Send)> {
        None
    }

    fn invoke(self: Box<Self>, request: RequestHandle) -> BoxFuture<'static, Result<Value>> {
        let fut = (self.handler)(self.receiver.clone(), request);
        Box::pin(async move { encode_reply(fut.await) })
    }
}

/// Build a field-less args value from nothing, for unit (`null`) and
/// braced (`{}`) shapes alike.
fn decode_fieldless<A: DeserializeOwned>(original: serde_json::Error) -> Result<A> {
    serde_json::from_value(Value::Null)
        .or_else(|_| serde_json::from_value(Value::Object(Default::default())))
        .map_err(|_| RpcError::ArgumentDecode(original))
}

fn encode_reply<R: Serialize>(outcome: std::result::Result<R, ServiceError>) -> Result<Value> {
    let reply = outcome?;
    Ok(serde_json::to_value(&reply)?)
}

/// A method binding before registration.
pub(crate) struct MethodBinding {
    pub(crate) name: String,
    pub(crate) args_type: &'static str,
    pub(crate) reply_type: &'static str,
    pub(crate) has_args: bool,
    pub(crate) handler: Arc<dyn MethodHandler>,
}

/// A receiver plus its method bindings, ready for
/// [`ServiceRegistry::register`](super::ServiceRegistry::register).
pub struct Service<S> {
    receiver: Arc<S>,
    pub(crate) bindings: Vec<MethodBinding>,
}

impl<S: Send + Sync + 'static> Service<S> {
    /// Create a service around a receiver.
    pub fn new(receiver: S) -> Self {
        Self::from_arc(Arc::new(receiver))
    }

    /// Create a service around a shared receiver.
    pub fn from_arc(receiver: Arc<S>) -> Self {
        Self {
            receiver,
            bindings: Vec::new(),
        }
    }

    /// Bind a method taking decoded args.
    pub fn method<F, A, R, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Arc<S>, RequestHandle, A) -> Fut + Send + Sync + 'static,
        A: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        Fut: Future<Output = std::result::Result<R, ServiceError>> + Send + 'static,
    {
        let typed = TypedMethod {
            receiver: self.receiver.clone(),
            handler: Arc::new(handler),
            tolerate_decode: std::mem::size_of::<A>() == 0,
            _phantom: PhantomData::<fn(A) -> (R, Fut)>,
        };
        self.bindings.push(MethodBinding {
            name: name.to_string(),
            args_type: any::type_name::<A>(),
            reply_type: any::type_name::<R>(),
            has_args: true,
            handler: Arc::new(typed),
        });
        self
    }

    /// Bind a method that takes no args.
    pub fn method_no_args<F, R, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Arc<S>, RequestHandle) -> Fut + Send + Sync + 'static,
        R: Serialize + 'static,
        Fut: Future<Output = std::result::Result<R, ServiceError>> + Send + 'static,
    {
        let typed = NoArgsMethod {
            receiver: self.receiver.clone(),
            handler: Arc::new(handler),
            _phantom: PhantomData::<fn() -> (R, Fut)>,
        };
        self.bindings.push(MethodBinding {
            name: name.to_string(),
            args_type: any::type_name::<()>(),
            reply_type: any::type_name::<R>(),
            has_args: false,
            handler: Arc::new(typed),
        });
        self
    }

    /// Receiver type name without module path or generics.
    pub fn receiver_type_name(&self) -> &'static str {
        short_type_name(any::type_name::<S>())
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn Any + Send + Sync>, Vec<MethodBinding>) {
        let receiver: Arc<dyn Any + Send + Sync> = self.receiver;
        (receiver, self.bindings)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Metadata for one registered method.
pub struct MethodDescriptor {
    name: String,
    args_type: &'static str,
    reply_type: &'static str,
    has_args: bool,
    handler: Arc<dyn MethodHandler>,
}

impl MethodDescriptor {
    pub(crate) fn from_binding(binding: MethodBinding) -> Self {
        Self {
            name: binding.name,
            args_type: binding.args_type,
            reply_type: binding.reply_type,
            has_args: binding.has_args,
            handler: binding.handler,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type name of the args; `()` for no-args methods.
    #[inline]
    pub fn args_type(&self) -> &'static str {
        self.args_type
    }

    #[inline]
    pub fn reply_type(&self) -> &'static str {
        self.reply_type
    }

    /// Whether the method decodes args.
    #[inline]
    pub fn has_args(&self) -> bool {
        self.has_args
    }

    /// Decode params and bind them to the method.
    pub fn prepare(&self, params: Option<Value>) -> Result<Box<dyn PreparedCall>> {
        self.handler.prepare(params)
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("args_type", &self.args_type)
            .field("reply_type", &self.reply_type)
            .field("has_args", &self.has_args)
            .finish()
    }
}

/// Metadata for one registered service.
pub struct ServiceDescriptor {
    name: String,
    receiver: Arc<dyn Any + Send + Sync>,
    receiver_type: &'static str,
    pub(crate) methods: std::collections::HashMap<String, MethodDescriptor>,
}

impl ServiceDescriptor {
    pub(crate) fn new(
        name: String,
        receiver: Arc<dyn Any + Send + Sync>,
        receiver_type: &'static str,
    ) -> Self {
        Self {
            name,
            receiver,
            receiver_type,
            methods: Default::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The implementing instance.
    pub fn receiver(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.receiver
    }

    #[inline]
    pub fn receiver_type(&self) -> &'static str {
        self.receiver_type
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("receiver_type", &self.receiver_type)
            .field("methods", &self.method_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    struct Calculator {
        offset: i64,
    }

    #[derive(Deserialize)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    fn request() -> RequestHandle {
        let (parts, ()) = http::Request::new(()).into_parts();
        Arc::new(parts)
    }

    fn calculator() -> Service<Calculator> {
        Service::new(Calculator { offset: 100 })
            .method("Add", |calc: Arc<Calculator>, _req, args: AddArgs| async move {
                Ok::<_, ServiceError>(calc.offset + args.a + args.b)
            })
            .method_no_args("Offset", |calc: Arc<Calculator>, _req| async move {
                Ok::<_, ServiceError>(calc.offset)
            })
    }

    #[test]
    fn test_receiver_type_name() {
        assert_eq!(calculator().receiver_type_name(), "Calculator");
        assert_eq!(short_type_name("a::b::Wrapper<c::D>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_binding_metadata() {
        let service = calculator();
        let add = &service.bindings[0];
        assert_eq!(add.name, "Add");
        assert!(add.has_args);
        assert!(add.args_type.ends_with("AddArgs"));
        assert_eq!(add.reply_type, "i64");

        let offset = &service.bindings[1];
        assert!(!offset.has_args);
        assert_eq!(offset.args_type, "()");
    }

    #[tokio::test]
    async fn test_prepare_and_invoke() {
        let service = calculator();
        let call = service.bindings[0]
            .handler
            .prepare(Some(json!({"a": 1, "b": 2})))
            .unwrap();

        let args = call.args().unwrap();
        assert_eq!(args.downcast_ref::<AddArgs>().map(|a| a.a), Some(1));

        let reply = call.invoke(request()).await.unwrap();
        assert_eq!(reply, json!(103));
    }

    #[tokio::test]
    async fn test_no_args_ignores_params() {
        let service = calculator();
        let call = service.bindings[1]
            .handler
            .prepare(Some(json!("garbage")))
            .unwrap();
        assert!(call.args().is_none());
        assert_eq!(call.invoke(request()).await.unwrap(), json!(100));
    }

    #[test]
    fn test_decode_error() {
        let service = calculator();
        let result = service.bindings[0].handler.prepare(Some(json!({"a": "x"})));
        assert!(matches!(result, Err(RpcError::ArgumentDecode(_))));
    }

    #[test]
    fn test_absent_params_decode_as_empty_object() {
        #[derive(Deserialize)]
        struct Optional {
            #[serde(default)]
            who: Option<String>,
        }

        let service =
            Service::new(()).method("Greet", |_s: Arc<()>, _req, args: Optional| async move {
                Ok::<_, ServiceError>(args.who.unwrap_or_default())
            });
        let call = service.bindings[0].handler.prepare(None).unwrap();
        assert!(call.args().is_some());
    }

    #[tokio::test]
    async fn test_fieldless_args_tolerate_any_params() {
        #[derive(Deserialize)]
        struct Empty {}

        let service = Service::new(())
            .method("Unit", |_s: Arc<()>, _req, _args: ()| async move {
                Ok::<_, ServiceError>("unit")
            })
            .method("Empty", |_s: Arc<()>, _req, _args: Empty| async move {
                Ok::<_, ServiceError>("empty")
            });

        let unit = &service.bindings[0].handler;
        for params in [None, Some(json!({})), Some(json!([1])), Some(json!("x"))] {
            let call = unit.prepare(params).unwrap();
            assert_eq!(call.invoke(request()).await.unwrap(), json!("unit"));
        }

        let empty = &service.bindings[1].handler;
        for params in [None, Some(json!([1])), Some(json!(null)), Some(json!(7))] {
            let call = empty.prepare(params).unwrap();
            assert_eq!(call.invoke(request()).await.unwrap(), json!("empty"));
        }
    }

    #[test]
    fn test_args_with_fields_stay_strict() {
        let service = calculator();
        let result = service.bindings[0].handler.prepare(Some(json!([1])));
        assert!(matches!(result, Err(RpcError::ArgumentDecode(_))));
    }

    #[tokio::test]
    async fn test_method_error_propagates() {
        let service = Service::new(()).method_no_args("Fail", |_s: Arc<()>, _req| async move {
            Err::<(), _>(ServiceError::with_data(json!({"reason": "nope"})))
        });
        let call = service.bindings[0].handler.prepare(None).unwrap();
        let err = call.invoke(request()).await.unwrap_err();
        assert_eq!(err.data(), Some(&json!({"reason": "nope"})));
    }
}

//! Service module - registration and method resolution.
//!
//! Provides:
//! - [`Service`] - a receiver plus its typed method bindings
//! - [`ServiceRegistry`] - maps `Service.Method` names to descriptors
//! - [`ServiceDescriptor`] / [`MethodDescriptor`] - static metadata built at
//!   registration time
//!
//! # Example
//!
//! ```ignore
//! use httprpc::{Service, ServiceRegistry};
//!
//! let mut registry = ServiceRegistry::new();
//!
//! registry.register(
//!     Service::new(HelloService)
//!         .method("Say", |svc, req, args: HelloArgs| async move { svc.say(&req, args).await })
//!         .method_no_args("NoArgs", |svc, req| async move { svc.no_args(&req).await }),
//!     "",
//! )?;
//! ```

mod descriptor;
mod registry;

pub use descriptor::{
    BoxFuture, MethodDescriptor, MethodHandler, PreparedCall, Service, ServiceDescriptor,
};
pub use registry::ServiceRegistry;

//! Service registry for resolving `Service.Method` names.
//!
//! The registry is filled during startup and only read while serving.
//! Lookups upper-case the first letter of both name segments, so
//! `helloService.say` resolves to `HelloService.Say`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use httprpc::{RequestHandle, Service, ServiceError, ServiceRegistry};
//!
//! struct Clock;
//!
//! let mut registry = ServiceRegistry::new();
//! registry
//!     .register(
//!         Service::new(Clock).method_no_args("Now", |_c: Arc<Clock>, _r: RequestHandle| async {
//!             Ok::<_, ServiceError>(0u64)
//!         }),
//!         "",
//!     )
//!     .unwrap();
//!
//! assert!(registry.has_method("clock.now"));
//! ```

use std::collections::HashMap;

use super::descriptor::{MethodDescriptor, Service, ServiceDescriptor};
use crate::error::{Result, RpcError};

/// Registry mapping service names to their descriptors.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Register a service.
    ///
    /// # Arguments
    ///
    /// * `service` - Receiver plus its method bindings
    /// * `name` - Service name; when empty the receiver's type name is used
    ///
    /// Bindings whose name is not exported, or which repeat an earlier
    /// binding's name, are skipped.
    pub fn register<S>(&mut self, service: Service<S>, name: &str) -> Result<()>
    where
        S: Send + Sync + 'static,
    {
        let name = if name.is_empty() {
            service.receiver_type_name().to_string()
        } else {
            name.to_string()
        };
        if !is_exported(&name) {
            return Err(RpcError::NameNotExported(name));
        }
        if self.services.contains_key(&name) {
            return Err(RpcError::DuplicateService(name));
        }

        let receiver_type = service.receiver_type_name();
        let (receiver, bindings) = service.into_parts();
        let mut descriptor = ServiceDescriptor::new(name.clone(), receiver, receiver_type);

        for binding in bindings {
            if !is_exported(&binding.name) {
                tracing::debug!("Skipping method {}.{}: not exported", name, binding.name);
                continue;
            }
            if descriptor.methods.contains_key(&binding.name) {
                tracing::debug!("Skipping method {}.{}: already bound", name, binding.name);
                continue;
            }
            descriptor
                .methods
                .insert(binding.name.clone(), MethodDescriptor::from_binding(binding));
        }

        if descriptor.methods.is_empty() {
            return Err(RpcError::NoSuitableMethods(name));
        }

        tracing::debug!(
            "Registered service {} with methods {:?}",
            name,
            descriptor.method_names()
        );
        self.services.insert(name, descriptor);
        Ok(())
    }

    /// Look up a method by its dotted `Service.Method` name.
    pub fn get(&self, method: &str) -> Result<(&ServiceDescriptor, &MethodDescriptor)> {
        let (service_name, method_name) = split_method(method)?;

        let service = self
            .services
            .get(&service_name)
            .ok_or(RpcError::ServiceNotFound(service_name))?;
        let descriptor = service
            .method(&method_name)
            .ok_or(RpcError::MethodNotFound(method_name))?;

        Ok((service, descriptor))
    }

    /// Returns true if the dotted method name resolves.
    pub fn has_method(&self, method: &str) -> bool {
        self.get(method).is_ok()
    }

    /// Get a service by its registered name.
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    /// Registered service names, sorted.
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Split `Service.Method` and capitalize the first letter of each part.
fn split_method(method: &str) -> Result<(String, String)> {
    let mut parts = method.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(service), Some(name), None) if !service.is_empty() && !name.is_empty() => {
            Ok((capitalize(service), capitalize(name)))
        }
        _ => Err(RpcError::MalformedMethodName(method.to_string())),
    }
}

/// Upper-case the first character, leave the rest untouched.
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Exported names start with an upper-case letter and are identifier-like.
fn is_exported(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

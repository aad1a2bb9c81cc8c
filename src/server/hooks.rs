//! Single-slot hooks run around every dispatched call.
//!
//! Each slot holds at most one function. Registering again replaces the
//! previous function; hooks are never chained.

use std::any::Any;
use std::sync::Arc;

use http::request::Parts;

use super::RequestInfo;
use crate::error::ServiceError;

/// May return a replacement request head, e.g. with extra extensions.
pub type InterceptFunc = Arc<dyn Fn(&RequestInfo) -> Option<Parts> + Send + Sync>;

/// Observes the request right before validation and invocation.
pub type BeforeFunc = Arc<dyn Fn(&RequestInfo) + Send + Sync>;

/// Checks decoded args; an error replaces the method call.
///
/// Args arrive type-erased; downcast them to the method's args type.
pub type ValidateFunc =
    Arc<dyn Fn(&RequestInfo, &(dyn Any + Send)) -> Result<(), ServiceError> + Send + Sync>;

/// Observes the finished request, including its error and status.
pub type AfterFunc = Arc<dyn Fn(&RequestInfo) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) intercept: Option<InterceptFunc>,
    pub(crate) before: Option<BeforeFunc>,
    pub(crate) validate: Option<ValidateFunc>,
    pub(crate) after: Option<AfterFunc>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("intercept", &self.intercept.is_some())
            .field("before", &self.before.is_some())
            .field("validate", &self.validate.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

//! Receiver sources.
//!
//! A [`TargetSource`] owns or produces the real receiver behind a proxy.
//! The proxy acquires a receiver as late as possible, for exactly one call,
//! and releases it when the call unwinds — pooled and prototype sources rely
//! on that bracket.

use std::any::Any;
use std::sync::Arc;

use crate::error::InvokeResult;
use crate::types::{Callable, TypeInfo, same_callable};

/// Owns/produces the real receiver for proxied calls.
pub trait TargetSource: Any + Send + Sync {
    /// The class of receivers this source produces, when known.
    fn target_class(&self) -> Option<Arc<TypeInfo>>;

    /// Whether every acquisition returns the same receiver. Static sources
    /// enable the frozen fast paths in the subclass-shaped dispatch table.
    fn is_static(&self) -> bool;

    /// Obtains a receiver for one call. `None` means behavior is supplied
    /// entirely by advice.
    fn acquire(&self) -> InvokeResult<Option<Arc<dyn Callable>>>;

    /// Returns a receiver after its call finished. Default: no-op.
    fn release(&self, target: Arc<dyn Callable>) {
        let _ = target;
    }

    /// Equality of receiver sources, one dimension of proxy equality.
    fn source_eq(&self, other: &dyn TargetSource) -> bool;
}

// =============================================================================
// Fixed singleton
// =============================================================================

/// Holds one fixed receiver for the proxy's whole lifetime.
pub struct SingletonTargetSource {
    target: Arc<dyn Callable>,
}

impl SingletonTargetSource {
    pub fn new(target: Arc<dyn Callable>) -> Self {
        Self { target }
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_class(&self) -> Option<Arc<TypeInfo>> {
        Some(self.target.type_info())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn acquire(&self) -> InvokeResult<Option<Arc<dyn Callable>>> {
        Ok(Some(self.target.clone()))
    }

    fn source_eq(&self, other: &dyn TargetSource) -> bool {
        (other as &dyn Any)
            .downcast_ref::<Self>()
            .is_some_and(|o| same_callable(&self.target, &o.target))
    }
}

// =============================================================================
// Prototype
// =============================================================================

/// Produces a fresh receiver per call from a factory closure.
pub struct PrototypeTargetSource {
    class: Arc<TypeInfo>,
    factory: Arc<dyn Fn() -> Arc<dyn Callable> + Send + Sync>,
}

impl PrototypeTargetSource {
    pub fn new<F>(class: Arc<TypeInfo>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Callable> + Send + Sync + 'static,
    {
        Self {
            class,
            factory: Arc::new(factory),
        }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_class(&self) -> Option<Arc<TypeInfo>> {
        Some(self.class.clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn acquire(&self) -> InvokeResult<Option<Arc<dyn Callable>>> {
        Ok(Some((self.factory)()))
    }

    fn release(&self, target: Arc<dyn Callable>) {
        // Dropping the Arc ends the prototype's single-call lifetime.
        drop(target);
    }

    fn source_eq(&self, other: &dyn TargetSource) -> bool {
        (other as &dyn Any)
            .downcast_ref::<Self>()
            .is_some_and(|o| std::ptr::addr_eq(Arc::as_ptr(&self.factory), Arc::as_ptr(&o.factory)))
    }
}

// =============================================================================
// Empty
// =============================================================================

/// A source with no receiver at all: the proxy's behavior comes entirely
/// from advice (typically introductions).
#[derive(Default)]
pub struct EmptyTargetSource;

impl TargetSource for EmptyTargetSource {
    fn target_class(&self) -> Option<Arc<TypeInfo>> {
        None
    }

    fn is_static(&self) -> bool {
        true
    }

    fn acquire(&self) -> InvokeResult<Option<Arc<dyn Callable>>> {
        Ok(None)
    }

    fn source_eq(&self, other: &dyn TargetSource) -> bool {
        (other as &dyn Any).downcast_ref::<Self>().is_some()
    }
}

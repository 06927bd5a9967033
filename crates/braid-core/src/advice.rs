//! Advice capabilities and the interceptor boundary.
//!
//! Advice is polymorphic over five kinds. Rather than a class hierarchy,
//! each kind is a small capability trait and [`Advice`] is the tagged
//! variant that advisors carry. The around kind *is* the [`Interceptor`]
//! trait: it receives the live invocation chain and decides whether, when,
//! and how often the rest of the chain runs.
//!
//! The non-around kinds are adapted into interceptors by the chain resolver,
//! so the invocation executor only ever deals with one shape.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::InvokeResult;
use crate::types::{ArgValue, Args, Callable, Method, ReturnValue, TypeInfo};

// =============================================================================
// The invocation boundary seen by advice
// =============================================================================

/// The live call an interceptor participates in.
///
/// Implemented by the engine's chain executor; advice only ever sees this
/// trait. `proceed` hands control to the next interceptor in the chain (or
/// to the real receiver once the chain is exhausted) and returns whatever
/// the inner portion of the chain produced.
pub trait Invocation: Send {
    /// The method being invoked.
    fn method(&self) -> &Method;

    /// The current argument buffer.
    fn args(&self) -> &Args;

    /// Mutable access to the argument buffer. Rewrites are visible to every
    /// later interceptor and to the terminal call.
    fn args_mut(&mut self) -> &mut Args;

    /// The class the call is matched against.
    fn target_class(&self) -> Arc<TypeInfo>;

    /// The proxy this call came through, when still alive.
    fn proxy(&self) -> Option<Arc<dyn Callable>>;

    /// Runs the rest of the chain and the terminal call.
    fn proceed(&mut self) -> InvokeResult<ReturnValue>;

    /// Produces an independent replay copy: own argument buffer, same
    /// receiver/method/chain/cursor, shared attribute map.
    fn fork(&mut self) -> Box<dyn Invocation>;

    /// Sets (or with `None`, removes) an opaque string-keyed attribute.
    /// The attribute map is shared by reference across [`fork`](Self::fork)
    /// clones so replays can communicate.
    fn set_attribute(&mut self, key: &str, value: Option<ArgValue>);

    /// Reads an attribute previously stored on this call (or a fork of it).
    fn attribute(&self, key: &str) -> Option<ArgValue>;
}

/// An interception unit: one link of the invocation chain.
///
/// Around advice implements this directly. The other advice kinds are
/// wrapped into interceptors by the resolver's adapters.
pub trait Interceptor: Any + Send + Sync {
    /// Runs this unit. Implementations decide whether to call
    /// `invocation.proceed()` — not calling it prevents the rest of the
    /// chain and the terminal call from running.
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvokeResult<ReturnValue>;
}

// =============================================================================
// Non-around advice capabilities
// =============================================================================

/// Runs before the matched call; cannot replace the result, but an error
/// aborts the chain.
pub trait BeforeAdvice: Any + Send + Sync {
    fn before(&self, method: &Method, args: &Args) -> InvokeResult<()>;
}

/// Runs after the matched call returned normally.
pub trait AfterReturningAdvice: Any + Send + Sync {
    fn after_returning(
        &self,
        result: &ReturnValue,
        method: &Method,
        args: &Args,
    ) -> InvokeResult<()>;
}

/// Observes an error raised by the inner chain; the error continues to
/// propagate unchanged afterwards.
pub trait AfterThrowingAdvice: Any + Send + Sync {
    fn after_throwing(&self, error: &crate::error::InvokeError, method: &Method, args: &Args);
}

/// Runs after the matched call regardless of outcome (finally semantics).
pub trait AfterAdvice: Any + Send + Sync {
    fn after(&self, method: &Method, args: &Args);
}

// =============================================================================
// The tagged advice variant advisors carry
// =============================================================================

/// One cross-cutting behavior unit, tagged by kind.
#[derive(Clone)]
pub enum Advice {
    Before(Arc<dyn BeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn AfterThrowingAdvice>),
    After(Arc<dyn AfterAdvice>),
    Around(Arc<dyn Interceptor>),
}

impl Advice {
    /// A short tag for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Before(_) => "before",
            Self::AfterReturning(_) => "after-returning",
            Self::AfterThrowing(_) => "after-throwing",
            Self::After(_) => "after",
            Self::Around(_) => "around",
        }
    }

    /// The `TypeId` of the concrete advice implementation.
    ///
    /// Advisor equality (and therefore proxy equality) compares advice by
    /// implementation type, not by instance identity.
    pub fn impl_type_id(&self) -> TypeId {
        match self {
            Self::Before(a) => (a.as_ref() as &dyn Any).type_id(),
            Self::AfterReturning(a) => (a.as_ref() as &dyn Any).type_id(),
            Self::AfterThrowing(a) => (a.as_ref() as &dyn Any).type_id(),
            Self::After(a) => (a.as_ref() as &dyn Any).type_id(),
            Self::Around(a) => (a.as_ref() as &dyn Any).type_id(),
        }
    }
}

impl std::fmt::Debug for Advice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Advice")
            .field("kind", &self.kind_name())
            .finish_non_exhaustive()
    }
}

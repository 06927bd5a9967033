//! Thread-confined exposure of the current invocation and proxy.
//!
//! Some advice needs to see the call it is participating in (or the proxy
//! it came through) without having it threaded through its own signature.
//! The engine keeps both in thread-local slots with a strict save/restore
//! discipline: each exposure swaps the previous value out and a guard swaps
//! it back in on drop, so nested and reentrant calls on one thread each see
//! their own innermost invocation and unwind correctly.
//!
//! This is deliberately global mutable state (per thread); the guards are
//! the only writers.

use std::cell::RefCell;
use std::sync::Arc;

use braid_core::advice::{Interceptor, Invocation};
use braid_core::error::{InvokeError, InvokeResult};
use braid_core::types::{Args, Callable, Method, ReturnValue, TypeInfo};

thread_local! {
    static CURRENT_INVOCATION: RefCell<Option<ExposedInvocation>> = const { RefCell::new(None) };
    static CURRENT_PROXY: RefCell<Option<Arc<dyn Callable>>> = const { RefCell::new(None) };
}

/// A read-only snapshot of the innermost exposed invocation.
#[derive(Clone)]
pub struct ExposedInvocation {
    method: Method,
    args: Args,
    target_class: Arc<TypeInfo>,
}

impl ExposedInvocation {
    fn snapshot(invocation: &dyn Invocation) -> Self {
        Self {
            method: invocation.method().clone(),
            args: invocation.args().clone(),
            target_class: invocation.target_class(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn target_class(&self) -> &Arc<TypeInfo> {
        &self.target_class
    }
}

/// The invocation currently executing on this thread.
///
/// # Errors
///
/// [`InvokeError::NotExposed`] when no exposing chain is active — the
/// configuration's expose flag was off, or the caller is outside any
/// proxied call.
pub fn current_invocation() -> InvokeResult<ExposedInvocation> {
    CURRENT_INVOCATION
        .with(|slot| slot.borrow().clone())
        .ok_or(InvokeError::NotExposed)
}

/// The proxy currently executing on this thread, when exposure is enabled.
pub fn current_proxy() -> InvokeResult<Arc<dyn Callable>> {
    CURRENT_PROXY
        .with(|slot| slot.borrow().clone())
        .ok_or(InvokeError::NotExposed)
}

/// Save/restore guard for the current-proxy slot.
pub(crate) struct ProxyExposure {
    prior: Option<Arc<dyn Callable>>,
}

impl ProxyExposure {
    pub(crate) fn expose(proxy: Arc<dyn Callable>) -> Self {
        let prior = CURRENT_PROXY.with(|slot| slot.borrow_mut().replace(proxy));
        Self { prior }
    }
}

impl Drop for ProxyExposure {
    fn drop(&mut self) {
        let prior = self.prior.take();
        CURRENT_PROXY.with(|slot| *slot.borrow_mut() = prior);
    }
}

struct InvocationExposure {
    prior: Option<ExposedInvocation>,
}

impl InvocationExposure {
    fn expose(snapshot: ExposedInvocation) -> Self {
        let prior = CURRENT_INVOCATION.with(|slot| slot.borrow_mut().replace(snapshot));
        Self { prior }
    }
}

impl Drop for InvocationExposure {
    fn drop(&mut self) {
        let prior = self.prior.take();
        CURRENT_INVOCATION.with(|slot| *slot.borrow_mut() = prior);
    }
}

/// The designated advice unit that publishes the current invocation.
///
/// Installed as the first link of any chain whose configuration enables
/// exposure, so every inner interceptor and the terminal call run with the
/// snapshot in place; the prior value is restored on the way out, error or
/// not.
pub struct ExposeInvocationInterceptor;

impl Interceptor for ExposeInvocationInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
        let _guard = InvocationExposure::expose(ExposedInvocation::snapshot(invocation));
        invocation.proceed()
    }
}

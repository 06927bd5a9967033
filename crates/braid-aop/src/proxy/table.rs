//! Subclass-shaped dispatch: one routing decision per method, made at proxy
//! construction.
//!
//! The table maps every method of the receiver's class to a [`Route`]. For
//! frozen configurations over a static receiver, plain methods collapse to
//! fast paths that skip chain resolution entirely: `Direct` calls straight
//! through, and `Fixed` binds the resolved chain into the table so dispatch
//! never touches the cache again.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Level, span, trace};

use braid_core::error::{InvokeError, InvokeResult};
use braid_core::types::{Args, Method, MethodKey, MethodKind, ReturnKind, ReturnValue, TypeInfo};

use crate::chain::ChainEntry;
use crate::config::ProxyConfig;
use crate::expose::ProxyExposure;
use crate::invocation::MethodInvocation;
use crate::proxy::{
    Proxy, TargetGuard, advised_interface, finish_result, introspection_answer,
};

/// Per-method routing decision of a subclass-shaped proxy.
#[derive(Clone)]
pub enum Route {
    /// Never forwarded; answers void. Lifecycle finalizers only.
    Passthrough,
    /// Configuration-based identity (equality, hash-code).
    Identity,
    /// Answered from the configuration, bypassing advice.
    Config,
    /// The general path: resolve the chain per call (cached) and run it.
    Advised,
    /// Frozen + static + empty chain: straight to the receiver.
    Direct,
    /// `Direct`, plus the receiver may return itself, so the result is
    /// checked for self-substitution.
    DirectSelfAware,
    /// Frozen + static + non-empty chain, bound at construction. Dispatch
    /// performs no cache lookup and no re-resolution, ever.
    Fixed(Arc<[ChainEntry]>),
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Route::Passthrough => "Passthrough",
            Route::Identity => "Identity",
            Route::Config => "Config",
            Route::Advised => "Advised",
            Route::Direct => "Direct",
            Route::DirectSelfAware => "DirectSelfAware",
            Route::Fixed(chain) => return write!(f, "Fixed({})", chain.len()),
        };
        f.write_str(name)
    }
}

/// Builds the routing table for every method of `target_class`, plus the
/// canonical identity methods and (unless opaque) the introspection surface.
pub(crate) fn build_routes(
    config: &Arc<ProxyConfig>,
    target_class: &Arc<TypeInfo>,
) -> HashMap<MethodKey, Route> {
    let flags = config.flags();
    let fixed_world = config.is_frozen() && config.target_source().is_static();
    let mut routes = HashMap::new();

    for method in target_class.methods() {
        let route = match method.kind() {
            MethodKind::Finalizer => Route::Passthrough,
            MethodKind::Equality | MethodKind::HashCode => Route::Identity,
            MethodKind::Introspection => {
                if flags.opaque {
                    Route::Advised
                } else {
                    Route::Config
                }
            }
            MethodKind::Plain => {
                if !fixed_world {
                    Route::Advised
                } else {
                    let chain = config.chain_for(method, Some(target_class));
                    if !chain.is_empty() {
                        Route::Fixed(chain)
                    } else if flags.expose_invocation {
                        // Exposure needs the general path even without advice.
                        Route::Advised
                    } else if may_return_receiver(method, target_class) {
                        Route::DirectSelfAware
                    } else {
                        Route::Direct
                    }
                }
            }
        };
        trace!(method = %method, route = ?route, "routed");
        routes.insert(method.key(), route);
    }

    routes.insert(Method::equality().key(), Route::Identity);
    routes.insert(Method::hash_code().key(), Route::Identity);
    if !flags.opaque {
        for method in advised_interface().methods() {
            routes.insert(method.key(), Route::Config);
        }
    }
    routes
}

/// Whether a method's declared return type could hold the receiver itself,
/// requiring the self-substitution check on the direct path.
fn may_return_receiver(method: &Method, target_class: &TypeInfo) -> bool {
    match method.return_kind() {
        ReturnKind::Object(name) => target_class.is_assignable_to(name),
        _ => false,
    }
}

pub(crate) fn dispatch(
    proxy: &Proxy,
    routes: &HashMap<MethodKey, Route>,
    target_class: &Arc<TypeInfo>,
    method: &Method,
    args: &mut Args,
) -> InvokeResult<ReturnValue> {
    let Some(route) = routes.get(&method.key()) else {
        return Err(InvokeError::UnknownMethod {
            method: method.to_string(),
            class: target_class.name().to_string(),
        });
    };
    let span = span!(Level::DEBUG, "proxy_call", method = %method, route = ?route);
    let _enter = span.enter();

    match route {
        Route::Passthrough => Ok(None),
        Route::Identity => proxy.identity_answer(method, args),
        Route::Config => introspection_answer(proxy.config(), method),
        Route::Advised => proxy.advised_dispatch(method, args),
        Route::Direct => {
            let guard = TargetGuard::acquire(proxy.config().target_source())?;
            let target = guard.target().cloned().ok_or_else(|| InvokeError::NoTarget {
                method: method.to_string(),
            })?;
            let result = target.call(method, args)?;
            finish_result(result, method, None, None, false)
        }
        Route::DirectSelfAware => {
            let guard = TargetGuard::acquire(proxy.config().target_source())?;
            let target = guard.target().cloned().ok_or_else(|| InvokeError::NoTarget {
                method: method.to_string(),
            })?;
            let result = target.call(method, args)?;
            finish_result(result, method, guard.target(), proxy.self_callable(), true)
        }
        Route::Fixed(chain) => {
            let _proxy_exposure = if proxy.config().flags().expose_invocation {
                proxy.self_callable().map(ProxyExposure::expose)
            } else {
                None
            };
            let guard = TargetGuard::acquire(proxy.config().target_source())?;
            let mut invocation = MethodInvocation::new(
                proxy.weak_callable(),
                guard.target().cloned(),
                target_class.clone(),
                method.clone(),
                std::mem::take(args),
                chain.clone(),
            );
            let outcome = braid_core::advice::Invocation::proceed(&mut invocation);
            *args = invocation.into_args();
            finish_result(outcome?, method, guard.target(), proxy.self_callable(), true)
        }
    }
}

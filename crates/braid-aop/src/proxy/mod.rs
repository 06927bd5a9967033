//! Dual-strategy proxy construction and dispatch.
//!
//! A [`Proxy`] stands in for the real receiver and routes every call through
//! the interception engine. Two shapes exist:
//!
//! - **Interface-shaped** ([`interface`]): dispatches over the declared
//!   interfaces, with routing decisions evaluated per call.
//! - **Subclass-shaped** ([`table`]): built over the receiver's own class,
//!   with one routing decision per method made at construction time and
//!   several fast paths for frozen configurations with a fixed receiver.
//!
//! There is no runtime code generation here: the subclass shape requires
//! the receiver's class to enumerate its methods through [`TypeInfo`], and
//! falls back to the interface shape when it cannot (interface-typed
//! receivers, existing proxy classes).

use std::any::Any;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Weak};

use tracing::debug;

use braid_core::advisor::Advisor;
use braid_core::error::{ConfigError, InvokeError, InvokeResult, ProxyError, ProxyResult};
use braid_core::target::{SingletonTargetSource, TargetSource};
use braid_core::types::{
    Args, Callable, Method, MethodKey, MethodKind, ReturnKind, ReturnValue, TypeInfo, same_callable,
    value,
};

use crate::config::ProxyConfig;
use crate::expose::ProxyExposure;
use crate::invocation::MethodInvocation;

mod interface;
mod table;

pub use table::Route;

// =============================================================================
// The configuration introspection surface
// =============================================================================

/// The built-in interface through which callers introspect a proxy's
/// configuration — unless the configuration is opaque.
pub fn advised_interface() -> Arc<TypeInfo> {
    Arc::new(
        TypeInfo::interface("braid.Advised")
            .with_method(Method::introspection("is_frozen"))
            .with_method(Method::introspection("advisor_count"))
            .with_method(Method::introspection("proxied_interfaces"))
            .with_method(Method::introspection("target_class_name")),
    )
}

/// Answers an introspection method straight from the configuration,
/// bypassing advice.
pub(crate) fn introspection_answer(
    config: &ProxyConfig,
    method: &Method,
) -> InvokeResult<ReturnValue> {
    match method.name() {
        "is_frozen" => Ok(Some(value(config.is_frozen()))),
        "advisor_count" => Ok(Some(value(config.advisor_count()))),
        "proxied_interfaces" => {
            let names: Vec<String> = config
                .interfaces()
                .iter()
                .map(|i| i.name().to_string())
                .collect();
            Ok(Some(value(names)))
        }
        "target_class_name" => Ok(config
            .target_source()
            .target_class()
            .map(|c| value(c.name().to_string()))),
        other => Err(InvokeError::UnknownMethod {
            method: other.to_string(),
            class: "braid.Advised".to_string(),
        }),
    }
}

// =============================================================================
// Receiver acquisition bracket
// =============================================================================

/// Acquires a receiver for exactly one call and releases it when dropped —
/// the release happens on every exit path, error or not.
pub(crate) struct TargetGuard {
    source: Arc<dyn TargetSource>,
    target: Option<Arc<dyn Callable>>,
}

impl TargetGuard {
    pub(crate) fn acquire(source: &Arc<dyn TargetSource>) -> InvokeResult<Self> {
        Ok(Self {
            source: source.clone(),
            target: source.acquire()?,
        })
    }

    pub(crate) fn target(&self) -> Option<&Arc<dyn Callable>> {
        self.target.as_ref()
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            self.source.release(target);
        }
    }
}

// =============================================================================
// Result normalization
// =============================================================================

/// Post-processes a call result: substitutes the proxy for a returned
/// "self" when asked to, and rejects null results for primitive-returning
/// methods.
pub(crate) fn finish_result(
    mut result: ReturnValue,
    method: &Method,
    target: Option<&Arc<dyn Callable>>,
    proxy: Option<Arc<dyn Callable>>,
    substitute_self: bool,
) -> InvokeResult<ReturnValue> {
    if substitute_self {
        if let (Some(target), Some(proxy)) = (target, proxy) {
            let returned_self = result
                .as_ref()
                .and_then(|v| v.downcast_ref::<Arc<dyn Callable>>())
                .is_some_and(|c| same_callable(c, target));
            if returned_self {
                result = Some(value(proxy));
            }
        }
    }

    if result.is_none() && matches!(method.return_kind(), ReturnKind::Primitive(_)) {
        return Err(InvokeError::InvalidAdviceResult {
            method: method.to_string(),
        });
    }
    Ok(result)
}

// =============================================================================
// Strategy selection
// =============================================================================

/// The two proxy shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStrategy {
    /// Dispatch over the declared interfaces.
    Interface,
    /// Per-method dispatch table over the receiver's class.
    Subclass,
}

/// Decides the shape once per configuration, at proxy-creation time.
pub fn select_strategy(config: &ProxyConfig) -> ProxyStrategy {
    let flags = config.flags();
    let wants_subclass =
        flags.optimize || flags.proxy_target_class || config.interfaces().is_empty();
    if wants_subclass {
        if let Some(class) = config.target_source().target_class() {
            if !class.is_interface() && !class.is_proxy() {
                return ProxyStrategy::Subclass;
            }
        }
    }
    ProxyStrategy::Interface
}

// =============================================================================
// Proxy
// =============================================================================

enum Shape {
    Interface,
    Table {
        routes: HashMap<MethodKey, Route>,
        target_class: Arc<TypeInfo>,
    },
}

/// A stand-in for the real receiver; every call goes through the engine.
pub struct Proxy {
    config: Arc<ProxyConfig>,
    shape: Shape,
    type_info: Arc<TypeInfo>,
    weak_self: Weak<Proxy>,
}

impl Proxy {
    /// Builds a proxy for `config`, choosing the dispatch strategy and —
    /// for the subclass shape — the per-method routing table.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NothingToProxy`] with neither advisors nor a
    /// receiver; [`ProxyError::Construction`] when no shape is buildable.
    pub fn create(config: Arc<ProxyConfig>) -> ProxyResult<Arc<Proxy>> {
        if config.advisor_count() == 0 && config.target_source().target_class().is_none() {
            return Err(ConfigError::NothingToProxy.into());
        }

        let strategy = select_strategy(&config);
        let shape = match strategy {
            ProxyStrategy::Subclass => {
                let target_class = config.target_source().target_class().ok_or_else(|| {
                    ProxyError::construction("subclass strategy requires a known receiver class")
                })?;
                if target_class.methods().is_empty() {
                    return Err(ProxyError::construction(format!(
                        "receiver class '{}' does not enumerate its methods",
                        target_class.name()
                    )));
                }
                let routes = table::build_routes(&config, &target_class);
                Shape::Table {
                    routes,
                    target_class,
                }
            }
            ProxyStrategy::Interface => {
                if config.interfaces().is_empty() {
                    return Err(ProxyError::construction(
                        "no interfaces declared and the receiver class cannot be subclassed",
                    ));
                }
                Shape::Interface
            }
        };

        let type_info = Arc::new(proxy_type_info(&config, &shape));
        debug!(class = %type_info, strategy = ?strategy, "created proxy");
        Ok(Arc::new_cyclic(|weak| Proxy {
            config,
            shape,
            type_info,
            weak_self: weak.clone(),
        }))
    }

    pub fn config(&self) -> &Arc<ProxyConfig> {
        &self.config
    }

    /// The strategy this proxy was built with.
    pub fn strategy(&self) -> ProxyStrategy {
        match self.shape {
            Shape::Interface => ProxyStrategy::Interface,
            Shape::Table { .. } => ProxyStrategy::Subclass,
        }
    }

    pub(crate) fn self_callable(&self) -> Option<Arc<dyn Callable>> {
        self.weak_self.upgrade().map(|p| p as Arc<dyn Callable>)
    }

    pub(crate) fn weak_callable(&self) -> Weak<dyn Callable> {
        let weak: Weak<dyn Callable> = self.weak_self.clone();
        weak
    }

    /// The general advice-chain path shared by both shapes: acquire the
    /// receiver as late as possible, resolve the chain (cached), and either
    /// call straight through (empty chain — no chain object allocated) or
    /// run a [`MethodInvocation`].
    pub(crate) fn advised_dispatch(
        &self,
        method: &Method,
        args: &mut Args,
    ) -> InvokeResult<ReturnValue> {
        let _proxy_exposure = if self.config.flags().expose_invocation {
            self.self_callable().map(ProxyExposure::expose)
        } else {
            None
        };

        let guard = TargetGuard::acquire(self.config.target_source())?;
        let acquired_class = guard.target().map(|t| t.type_info());
        let actual_class = self.config.actual_class(method, acquired_class.as_ref());
        let chain = self.config.chain_for(method, Some(&actual_class));

        if chain.is_empty() {
            let target = guard.target().cloned().ok_or_else(|| InvokeError::NoTarget {
                method: method.to_string(),
            })?;
            let result = target.call(method, args)?;
            return finish_result(result, method, guard.target(), self.self_callable(), true);
        }

        let mut invocation = MethodInvocation::new(
            self.weak_callable(),
            guard.target().cloned(),
            actual_class,
            method.clone(),
            std::mem::take(args),
            chain,
        );
        let outcome = braid_core::advice::Invocation::proceed(&mut invocation);
        *args = invocation.into_args();
        finish_result(outcome?, method, guard.target(), self.self_callable(), true)
    }

    /// Configuration-based identity for equals/hash-code style methods.
    pub(crate) fn identity_answer(
        &self,
        method: &Method,
        args: &Args,
    ) -> InvokeResult<ReturnValue> {
        match method.kind() {
            MethodKind::Equality => {
                let equal = args
                    .first()
                    .and_then(|v| v.downcast_ref::<Arc<dyn Callable>>())
                    .and_then(|c| (c.as_ref() as &dyn Any).downcast_ref::<Proxy>())
                    .is_some_and(|other| self == other);
                Ok(Some(value(equal)))
            }
            MethodKind::HashCode => Ok(Some(value(self.identity_hash()))),
            _ => Err(InvokeError::UnknownMethod {
                method: method.to_string(),
                class: self.type_info.name().to_string(),
            }),
        }
    }

    fn identity_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        let mut names: Vec<String> = self
            .config
            .interfaces()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        names.sort();
        names.hash(&mut hasher);
        for advisor in self.config.advisors() {
            match advisor.as_ref() {
                Advisor::Pointcut { pointcut, advice } => {
                    0_u8.hash(&mut hasher);
                    advice.impl_type_id().hash(&mut hasher);
                    pointcut.expression().hash(&mut hasher);
                }
                Advisor::Introduction(introduction) => {
                    1_u8.hash(&mut hasher);
                    let mut introduced: Vec<&str> =
                        introduction.interfaces().iter().map(|i| i.name()).collect();
                    introduced.sort_unstable();
                    introduced.hash(&mut hasher);
                }
                Advisor::Plain { advice } => {
                    2_u8.hash(&mut hasher);
                    advice.impl_type_id().hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

impl Callable for Proxy {
    fn type_info(&self) -> Arc<TypeInfo> {
        self.type_info.clone()
    }

    fn call(&self, method: &Method, args: &mut Args) -> InvokeResult<ReturnValue> {
        match &self.shape {
            Shape::Interface => interface::dispatch(self, method, args),
            Shape::Table {
                routes,
                target_class,
            } => table::dispatch(self, routes, target_class, method, args),
        }
    }
}

/// Two proxies are equal iff they proxy the same interface set, carry the
/// same advisor sequence (compared by advice implementation and pointcut,
/// not instance identity), and have equal receiver sources.
impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.config.config_eq(&other.config)
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.identity_hash());
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("class", &self.type_info.name())
            .field("strategy", &self.strategy())
            .finish_non_exhaustive()
    }
}

fn proxy_type_info(config: &ProxyConfig, shape: &Shape) -> TypeInfo {
    let base_name = config
        .target_source()
        .target_class()
        .map(|c| c.name().to_string())
        .or_else(|| config.interfaces().first().map(|i| i.name().to_string()))
        .unwrap_or_else(|| "braid".to_string());

    let mut info = TypeInfo::class(format!("{base_name}$BraidProxy")).as_proxy_class();
    for iface in config.interfaces() {
        info = info.with_interface(iface);
    }
    if let Shape::Table { target_class, .. } = shape {
        for method in target_class.methods() {
            if !info.declares(method) {
                info = info.with_method(method.clone());
            }
        }
    }
    info
}

// =============================================================================
// ProxyFactory — the container's entry point
// =============================================================================

/// The single entry point a container uses to obtain proxies.
pub struct ProxyFactory {
    config: Arc<ProxyConfig>,
}

impl ProxyFactory {
    /// Wraps an existing configuration.
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        Self { config }
    }

    /// Convenience: a default-flag configuration over a fixed receiver.
    pub fn with_target(target: Arc<dyn Callable>) -> Self {
        Self::new(Arc::new(ProxyConfig::new(Arc::new(
            SingletonTargetSource::new(target),
        ))))
    }

    pub fn config(&self) -> &Arc<ProxyConfig> {
        &self.config
    }

    /// Creates one proxy over the current configuration. Called once per
    /// singleton, or once per instantiation for prototypes — prototype
    /// containers pair this with [`ProxyConfig::split_clone`].
    pub fn proxy(&self) -> ProxyResult<Arc<Proxy>> {
        Proxy::create(self.config.clone())
    }
}

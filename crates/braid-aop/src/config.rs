//! Proxy configuration: the advised state behind every proxy.
//!
//! A [`ProxyConfig`] owns the receiver source, the declared interfaces, the
//! ordered advisor list, the control flags, and the per-method interceptor
//! chain cache. It is created once per proxy template (container-owned) and
//! may be mutated until it is frozen; proxies hold it via `Arc` and observe
//! mutations through cache invalidation.
//!
//! The cache supports concurrent reads without blocking on writers; any
//! advisor mutation clears it wholesale. Coarse invalidation is an accepted
//! trade-off, not a bug.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use braid_core::advisor::Advisor;
use braid_core::error::{ConfigError, ConfigResult};
use braid_core::target::TargetSource;
use braid_core::types::{Method, MethodKey, TypeInfo};

use crate::chain::{ChainEntry, resolve_chain};
use crate::expose::ExposeInvocationInterceptor;

// =============================================================================
// Flags
// =============================================================================

/// Control flags of a proxy configuration.
///
/// Deserializable so a container can seed them from declarative config.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyFlags {
    /// Reject all advisor mutations.
    pub frozen: bool,
    /// Publish the current invocation/proxy in thread-confined storage for
    /// the duration of each call.
    pub expose_invocation: bool,
    /// Prefer the subclass-shaped proxy strategy.
    pub optimize: bool,
    /// Force the subclass-shaped proxy strategy.
    pub proxy_target_class: bool,
    /// Hide configuration introspection from proxy callers.
    pub opaque: bool,
    /// Assert advisors are already narrowed to the target class, skipping
    /// class-filter checks during resolution.
    pub pre_filtered: bool,
}

impl ProxyFlags {
    /// Parses flags from a JSON config section.
    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

// =============================================================================
// ProxyConfig
// =============================================================================

type ChainKey = (MethodKey, Arc<str>);

/// Shared, mutable state of one proxy template.
pub struct ProxyConfig {
    target_source: Arc<dyn TargetSource>,
    flags: ProxyFlags,
    frozen: AtomicBool,
    interfaces: RwLock<Vec<Arc<TypeInfo>>>,
    advisors: RwLock<Vec<Arc<Advisor>>>,
    /// method × class → resolved chain. Keyed by class as well as method:
    /// one configuration can be matched against more than one concrete
    /// receiver class (prototype sources), and a chain resolved for one
    /// class must never be applied to another.
    cache: DashMap<ChainKey, Arc<[ChainEntry]>>,
}

impl ProxyConfig {
    /// Creates a configuration over `target_source` with default flags.
    pub fn new(target_source: Arc<dyn TargetSource>) -> Self {
        Self::with_flags(target_source, ProxyFlags::default())
    }

    /// Creates a configuration with explicit flags.
    pub fn with_flags(target_source: Arc<dyn TargetSource>, flags: ProxyFlags) -> Self {
        Self {
            target_source,
            frozen: AtomicBool::new(flags.frozen),
            flags,
            interfaces: RwLock::new(Vec::new()),
            advisors: RwLock::new(Vec::new()),
            cache: DashMap::new(),
        }
    }

    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.target_source
    }

    pub fn flags(&self) -> &ProxyFlags {
        &self.flags
    }

    /// Whether advisor mutations are rejected.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    /// Permanently rejects further advisor mutations. Enables the fixed
    /// dispatch fast paths for proxies created afterwards.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    fn ensure_mutable(&self) -> ConfigResult<()> {
        if self.is_frozen() {
            return Err(ConfigError::Frozen);
        }
        Ok(())
    }

    // ─── Interfaces ──────────────────────────────────────────────────────────

    /// Declares an interface the proxy must expose.
    pub fn add_interface(&self, iface: Arc<TypeInfo>) -> ConfigResult<()> {
        if !iface.is_interface() {
            return Err(ConfigError::NotAnInterface {
                name: iface.name().to_string(),
            });
        }
        let mut interfaces = self.interfaces.write();
        if !interfaces.iter().any(|i| i.name() == iface.name()) {
            interfaces.push(iface);
        }
        Ok(())
    }

    /// Snapshot of the declared interfaces (including introduced ones).
    pub fn interfaces(&self) -> Vec<Arc<TypeInfo>> {
        self.interfaces.read().clone()
    }

    /// Whether one of the declared interfaces declares `method` itself.
    pub fn interface_declares(&self, method: &Method) -> bool {
        self.interfaces.read().iter().any(|i| i.declares(method))
    }

    // ─── Advisors ────────────────────────────────────────────────────────────

    /// Appends an advisor. Introduction advisors are validated and their
    /// interfaces auto-registered.
    pub fn add_advisor(&self, advisor: Advisor) -> ConfigResult<()> {
        let len = self.advisors.read().len();
        self.insert_advisor(len, advisor)
    }

    /// Inserts an advisor at `index` (advisor order is execution precedence,
    /// outermost first).
    ///
    /// All validation happens before any state changes: a rejected insert
    /// leaves the configuration exactly as it was.
    pub fn insert_advisor(&self, index: usize, advisor: Advisor) -> ConfigResult<()> {
        self.ensure_mutable()?;
        let mut advisors = self.advisors.write();
        if index > advisors.len() {
            return Err(ConfigError::IndexOutOfBounds {
                index,
                len: advisors.len(),
            });
        }
        self.register_introduced(&advisor)?;
        advisors.insert(index, Arc::new(advisor));
        drop(advisors);
        self.invalidate();
        Ok(())
    }

    /// Removes the advisor at `index`. Removing an introduction also
    /// removes the interfaces it introduced.
    pub fn remove_advisor(&self, index: usize) -> ConfigResult<Arc<Advisor>> {
        self.ensure_mutable()?;
        let mut advisors = self.advisors.write();
        if index >= advisors.len() {
            return Err(ConfigError::IndexOutOfBounds {
                index,
                len: advisors.len(),
            });
        }
        let removed = advisors.remove(index);
        drop(advisors);
        self.unregister_introduced(&removed);
        self.invalidate();
        Ok(removed)
    }

    /// Replaces the advisor at `index` in place, with introduction
    /// bookkeeping on both sides. One cache invalidation; a rejected
    /// replace changes nothing.
    pub fn replace_advisor(&self, index: usize, advisor: Advisor) -> ConfigResult<()> {
        self.ensure_mutable()?;
        if let Advisor::Introduction(introduction) = &advisor {
            introduction.validate()?;
        }
        let incoming = Arc::new(advisor);
        let mut advisors = self.advisors.write();
        if index >= advisors.len() {
            return Err(ConfigError::IndexOutOfBounds {
                index,
                len: advisors.len(),
            });
        }
        let outgoing = std::mem::replace(&mut advisors[index], incoming.clone());
        drop(advisors);
        // Outgoing interfaces go first so a shared interface survives the
        // swap under the incoming advisor.
        self.unregister_introduced(&outgoing);
        self.register_introduced(&incoming)?;
        self.invalidate();
        Ok(())
    }

    /// Validates an incoming introduction and registers its interfaces.
    /// Non-introduction advisors pass through untouched.
    fn register_introduced(&self, advisor: &Advisor) -> ConfigResult<()> {
        if let Advisor::Introduction(introduction) = advisor {
            introduction.validate()?;
            for iface in introduction.interfaces() {
                self.add_interface(iface.clone())?;
            }
        }
        Ok(())
    }

    /// Removes the interfaces a departing introduction advisor brought in.
    fn unregister_introduced(&self, advisor: &Advisor) {
        if let Advisor::Introduction(introduction) = advisor {
            let mut interfaces = self.interfaces.write();
            interfaces.retain(|i| {
                !introduction
                    .interfaces()
                    .iter()
                    .any(|departing| departing.name() == i.name())
            });
        }
    }

    /// Snapshot of the ordered advisor list.
    pub fn advisors(&self) -> Vec<Arc<Advisor>> {
        self.advisors.read().clone()
    }

    pub fn advisor_count(&self) -> usize {
        self.advisors.read().len()
    }

    fn invalidate(&self) {
        debug!(cached = self.cache.len(), "advisor list changed, clearing chain cache");
        self.cache.clear();
    }

    // ─── Chain resolution ────────────────────────────────────────────────────

    /// The interceptor chain for `method` on `target_class`, cached.
    ///
    /// When no target class is known the method's declaring interface
    /// stands in, per the declared-interface list.
    pub fn chain_for(
        &self,
        method: &Method,
        target_class: Option<&Arc<TypeInfo>>,
    ) -> Arc<[ChainEntry]> {
        let class = self.actual_class(method, target_class);
        let key: ChainKey = (method.key(), class.name_arc());
        self.cache
            .entry(key)
            .or_insert_with(|| {
                let advisors = self.advisors.read().clone();
                let mut chain =
                    resolve_chain(&advisors, method, class.as_ref(), self.flags.pre_filtered);
                if self.flags.expose_invocation && !chain.is_empty() {
                    chain.insert(0, ChainEntry::Static(Arc::new(ExposeInvocationInterceptor)));
                }
                chain.into()
            })
            .clone()
    }

    /// The class a call on `method` is matched against.
    pub fn actual_class(
        &self,
        method: &Method,
        target_class: Option<&Arc<TypeInfo>>,
    ) -> Arc<TypeInfo> {
        if let Some(class) = target_class {
            return class.clone();
        }
        if let Some(class) = self.target_source.target_class() {
            return class;
        }
        self.interfaces
            .read()
            .iter()
            .find(|i| i.name() == method.owner())
            .cloned()
            .unwrap_or_else(|| Arc::new(TypeInfo::interface(method.owner_arc())))
    }

    // ─── Cloning ─────────────────────────────────────────────────────────────

    /// An independent copy for per-instance proxies: shares advisor objects,
    /// copies the lists, starts with a fresh cache.
    pub fn split_clone(&self) -> Self {
        Self {
            target_source: self.target_source.clone(),
            flags: self.flags,
            frozen: AtomicBool::new(self.is_frozen()),
            interfaces: RwLock::new(self.interfaces.read().clone()),
            advisors: RwLock::new(self.advisors.read().clone()),
            cache: DashMap::new(),
        }
    }

    /// Configuration equality: same proxied-interface set, same advisor
    /// sequence (by advice type and pointcut), equal receiver sources.
    pub fn config_eq(&self, other: &ProxyConfig) -> bool {
        let a_ifaces = self.interfaces.read();
        let b_ifaces = other.interfaces.read();
        if a_ifaces.len() != b_ifaces.len()
            || !a_ifaces
                .iter()
                .all(|a| b_ifaces.iter().any(|b| a.name() == b.name()))
        {
            return false;
        }
        drop(a_ifaces);
        drop(b_ifaces);

        let a_advisors = self.advisors.read();
        let b_advisors = other.advisors.read();
        if a_advisors.len() != b_advisors.len()
            || !a_advisors
                .iter()
                .zip(b_advisors.iter())
                .all(|(a, b)| a.advises_eq(b))
        {
            return false;
        }
        drop(a_advisors);
        drop(b_advisors);

        self.target_source.source_eq(other.target_source.as_ref())
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("advisors", &self.advisor_count())
            .field("interfaces", &self.interfaces.read().len())
            .field("frozen", &self.is_frozen())
            .field("cached_chains", &self.cache.len())
            .finish()
    }
}

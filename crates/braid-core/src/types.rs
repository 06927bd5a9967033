//! The dynamic call model.
//!
//! Braid intercepts calls made against objects it does not know at compile
//! time, so the engine works over an explicit runtime description of classes
//! and methods rather than over Rust's static type system:
//!
//! - [`TypeInfo`] describes one class or interface: its name, the interfaces
//!   it implements, and its method table.
//! - [`Method`] identifies one callable operation of an interface.
//! - [`Callable`] is the single dynamic boundary every real receiver (and
//!   every proxy) implements: `call(method, args)`.
//!
//! Arguments and return values are type-erased [`ArgValue`]s. The argument
//! buffer is a plain `Vec` owned by exactly one call at a time and passed
//! down the interceptor chain by `&mut`, so argument rewrites made by an
//! early interceptor are visible to every later one and to the terminal call.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::InvokeResult;

/// A type-erased argument or return value.
///
/// Stored behind `Arc` so that cloning an argument buffer (for invocation
/// replay) is a shallow copy, the same way the source model copies object
/// references rather than objects.
pub type ArgValue = Arc<dyn Any + Send + Sync>;

/// The mutable argument buffer threaded through an interceptor chain.
pub type Args = Vec<ArgValue>;

/// A type-erased return value; `None` models void/null results.
pub type ReturnValue = Option<ArgValue>;

/// Wraps a concrete value into an [`ArgValue`].
pub fn value<T: Send + Sync + 'static>(v: T) -> ArgValue {
    Arc::new(v)
}

// =============================================================================
// Method identity
// =============================================================================

/// The declared return type of a [`Method`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// No return value; a `None` result is the only valid outcome.
    Void,
    /// A non-nullable primitive (`"i64"`, `"bool"`, ...). A `None` result is
    /// a contract violation and fails the call.
    Primitive(&'static str),
    /// An object reference, named by its class or interface. `None` models a
    /// legal null.
    Object(Arc<str>),
}

impl ReturnKind {
    /// Convenience constructor for [`ReturnKind::Object`].
    pub fn object(name: impl Into<Arc<str>>) -> Self {
        Self::Object(name.into())
    }
}

/// Dispatch-relevant classification of a method, decided by whoever declares
/// the interface. The proxy dispatch tables route on this marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// An ordinary business method.
    Plain,
    /// An equality test (`equals`-style, arity 1).
    Equality,
    /// An identity-hash accessor (arity 0).
    HashCode,
    /// A lifecycle finalizer; proxies never forward these.
    Finalizer,
    /// A proxy-configuration introspection method.
    Introspection,
}

/// Identity of one callable operation.
///
/// Two methods are the same operation iff their [`MethodKey`]s are equal;
/// return kind and [`MethodKind`] are carried along for dispatch decisions
/// but do not participate in identity.
#[derive(Debug, Clone)]
pub struct Method {
    owner: Arc<str>,
    name: Arc<str>,
    arity: usize,
    return_kind: ReturnKind,
    kind: MethodKind,
}

/// Hashable identity of a [`Method`]: owning type, name, and arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub owner: Arc<str>,
    pub name: Arc<str>,
    pub arity: usize,
}

impl Method {
    /// Creates a plain business method.
    pub fn new(
        owner: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        arity: usize,
        return_kind: ReturnKind,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            arity,
            return_kind,
            kind: MethodKind::Plain,
        }
    }

    /// Overrides the [`MethodKind`] marker.
    pub fn with_kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
    }

    /// The canonical equality method every proxy answers.
    pub fn equality() -> Self {
        Self::new("braid.Object", "equals", 1, ReturnKind::Primitive("bool"))
            .with_kind(MethodKind::Equality)
    }

    /// The canonical identity-hash method every proxy answers.
    pub fn hash_code() -> Self {
        Self::new("braid.Object", "hash_code", 0, ReturnKind::Primitive("u64"))
            .with_kind(MethodKind::HashCode)
    }

    /// A finalizer-style lifecycle method of `owner`.
    pub fn finalizer(owner: impl Into<Arc<str>>) -> Self {
        Self::new(owner, "finalize", 0, ReturnKind::Void).with_kind(MethodKind::Finalizer)
    }

    /// A proxy-configuration introspection method.
    pub fn introspection(name: impl Into<Arc<str>>) -> Self {
        Self::new("braid.Advised", name, 0, ReturnKind::object("object"))
            .with_kind(MethodKind::Introspection)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn owner_arc(&self) -> Arc<str> {
        self.owner.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn return_kind(&self) -> &ReturnKind {
        &self.return_kind
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Returns this method's hashable identity.
    pub fn key(&self) -> MethodKey {
        MethodKey {
            owner: self.owner.clone(),
            name: self.name.clone(),
            arity: self.arity,
        }
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name && self.arity == other.arity
    }
}

impl Eq for Method {}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}/{}", self.owner, self.name, self.arity)
    }
}

// =============================================================================
// TypeInfo
// =============================================================================

/// Runtime description of a class or interface.
///
/// A `TypeInfo` is built once by whoever owns the type (the container, an
/// adapter layer, a test fixture) and shared via `Arc`. Equality is by name:
/// the engine assumes type names are unique within one proxy configuration.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    name: Arc<str>,
    is_interface: bool,
    is_proxy: bool,
    implements: Vec<Arc<TypeInfo>>,
    methods: Vec<Method>,
}

impl TypeInfo {
    /// Describes an interface named `name`.
    pub fn interface(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            is_interface: true,
            is_proxy: false,
            implements: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Describes a concrete class named `name`.
    pub fn class(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            is_interface: false,
            is_proxy: false,
            implements: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Marks this type as a generated proxy class. The strategy selector
    /// refuses to build a subclass-shaped proxy over another proxy.
    pub fn as_proxy_class(mut self) -> Self {
        self.is_proxy = true;
        self
    }

    /// Adds one method to this type's method table.
    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Records that this type implements `iface` and absorbs its method
    /// table (the flattened-transitive view the matcher works against).
    pub fn with_interface(mut self, iface: Arc<TypeInfo>) -> Self {
        for m in iface.methods() {
            if !self.methods.iter().any(|own| own.key() == m.key()) {
                self.methods.push(m.clone());
            }
        }
        for nested in &iface.implements {
            if !self.implements.iter().any(|i| i.name == nested.name) {
                self.implements.push(nested.clone());
            }
        }
        if !self.implements.iter().any(|i| i.name == iface.name) {
            self.implements.push(iface);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_proxy(&self) -> bool {
        self.is_proxy
    }

    /// The interfaces this type implements (transitively flattened).
    pub fn interfaces(&self) -> &[Arc<TypeInfo>] {
        &self.implements
    }

    /// This type's full method table.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Whether a value of this type can stand where `type_name` is expected:
    /// it is that type, or implements it.
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        *self.name == *type_name || self.implements.iter().any(|i| *i.name == *type_name)
    }

    /// Whether this type implements `iface`.
    pub fn implements(&self, iface: &TypeInfo) -> bool {
        self.is_assignable_to(iface.name())
    }

    /// Whether `method` appears in this type's method table.
    pub fn declares(&self, method: &Method) -> bool {
        let key = method.key();
        self.methods.iter().any(|m| m.key() == key)
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeInfo {}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// =============================================================================
// Callable — the dynamic receiver boundary
// =============================================================================

/// The dynamic boundary between the engine and a real receiver.
///
/// Every proxied object, introduction dispatcher, and generated proxy
/// implements `Callable`. The `Any` supertrait allows identity-sensitive
/// code (proxy equality, self-return substitution) to downcast.
pub trait Callable: Any + Send + Sync {
    /// The runtime class of this receiver.
    fn type_info(&self) -> Arc<TypeInfo>;

    /// Performs `method` with the given argument buffer.
    ///
    /// Errors propagate to the proxy caller unchanged; the engine never
    /// wraps them.
    fn call(&self, method: &Method, args: &mut Args) -> InvokeResult<ReturnValue>;
}

/// Compares two receivers by allocation identity, ignoring vtable metadata.
pub fn same_callable(a: &Arc<dyn Callable>, b: &Arc<dyn Callable>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audited() -> Arc<TypeInfo> {
        Arc::new(
            TypeInfo::interface("Audited")
                .with_method(Method::new("Audited", "audit_id", 0, ReturnKind::object("string"))),
        )
    }

    #[test]
    fn interface_absorption_flattens_methods() {
        let ledger = TypeInfo::interface("Ledger")
            .with_method(Method::new("Ledger", "post", 2, ReturnKind::Void))
            .with_interface(audited());

        assert!(ledger.is_assignable_to("Audited"));
        assert!(ledger.declares(&Method::new("Audited", "audit_id", 0, ReturnKind::object("string"))));
        assert_eq!(ledger.methods().len(), 2);
    }

    #[test]
    fn assignability_is_name_based() {
        let class = TypeInfo::class("LedgerImpl").with_interface(audited());
        assert!(class.is_assignable_to("LedgerImpl"));
        assert!(class.is_assignable_to("Audited"));
        assert!(!class.is_assignable_to("Ledger"));
    }

    #[test]
    fn method_identity_ignores_return_kind() {
        let a = Method::new("I", "m", 1, ReturnKind::Void);
        let b = Method::new("I", "m", 1, ReturnKind::Primitive("i64"));
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn canonical_identity_methods_are_marked() {
        assert_eq!(Method::equality().kind(), MethodKind::Equality);
        assert_eq!(Method::hash_code().kind(), MethodKind::HashCode);
        assert_eq!(Method::finalizer("LedgerImpl").kind(), MethodKind::Finalizer);
    }
}

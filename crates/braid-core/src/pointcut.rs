//! Pointcuts: where advice applies.
//!
//! A [`Pointcut`] is a predicate pair — a [`ClassFilter`] deciding which
//! receiver classes are eligible, and a [`MethodMatcher`] deciding which of
//! their methods are. A method matcher is *static* by default (decidable
//! from method and class alone); a *dynamic* matcher must additionally be
//! re-evaluated per call against the current argument buffer, because an
//! earlier interceptor may have rewritten the arguments.
//!
//! Pointcuts are normally produced by an expression evaluator outside this
//! crate. The closure-based builders here cover programmatic use and tests.

use std::sync::Arc;

use crate::types::{Args, Method, TypeInfo};

/// Predicate over receiver classes.
pub trait ClassFilter: Send + Sync {
    fn matches_class(&self, class: &TypeInfo) -> bool;
}

/// Predicate over methods of an eligible class.
pub trait MethodMatcher: Send + Sync {
    /// Static match, decided once per (method, class) and cached.
    ///
    /// `has_introductions` reports whether any introduction advisor applies
    /// to the class, for matchers that want to consider introduced methods.
    fn matches(&self, method: &Method, class: &TypeInfo, has_introductions: bool) -> bool;

    /// Whether [`matches_args`](Self::matches_args) must be re-evaluated on
    /// every call.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Per-call match against the *current* argument buffer. Only consulted
    /// when [`is_dynamic`](Self::is_dynamic) returns `true`.
    fn matches_args(&self, method: &Method, class: &TypeInfo, args: &Args) -> bool {
        let _ = (method, class, args);
        true
    }
}

// =============================================================================
// Stock filters and matchers
// =============================================================================

/// Matches every class.
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches_class(&self, _class: &TypeInfo) -> bool {
        true
    }
}

/// Matches every method.
pub struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    fn matches(&self, _method: &Method, _class: &TypeInfo, _has_introductions: bool) -> bool {
        true
    }
}

struct FnClassFilter<F>(F);

impl<F> ClassFilter for FnClassFilter<F>
where
    F: Fn(&TypeInfo) -> bool + Send + Sync,
{
    fn matches_class(&self, class: &TypeInfo) -> bool {
        (self.0)(class)
    }
}

/// Creates a class filter from a predicate closure.
pub fn class_filter<F>(f: F) -> Arc<dyn ClassFilter>
where
    F: Fn(&TypeInfo) -> bool + Send + Sync + 'static,
{
    Arc::new(FnClassFilter(f))
}

struct FnMethodMatcher<F> {
    matches: F,
}

impl<F> MethodMatcher for FnMethodMatcher<F>
where
    F: Fn(&Method, &TypeInfo) -> bool + Send + Sync,
{
    fn matches(&self, method: &Method, class: &TypeInfo, _has_introductions: bool) -> bool {
        (self.matches)(method, class)
    }
}

/// Creates a static method matcher from a predicate closure.
pub fn method_matcher<F>(f: F) -> Arc<dyn MethodMatcher>
where
    F: Fn(&Method, &TypeInfo) -> bool + Send + Sync + 'static,
{
    Arc::new(FnMethodMatcher { matches: f })
}

struct FnDynamicMatcher<S, D> {
    matches: S,
    matches_args: D,
}

impl<S, D> MethodMatcher for FnDynamicMatcher<S, D>
where
    S: Fn(&Method, &TypeInfo) -> bool + Send + Sync,
    D: Fn(&Method, &Args) -> bool + Send + Sync,
{
    fn matches(&self, method: &Method, class: &TypeInfo, _has_introductions: bool) -> bool {
        (self.matches)(method, class)
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn matches_args(&self, method: &Method, _class: &TypeInfo, args: &Args) -> bool {
        (self.matches_args)(method, args)
    }
}

/// Creates a dynamic method matcher: `statically` gates the static phase,
/// `per_call` is re-evaluated against the live argument buffer.
pub fn dynamic_matcher<S, D>(statically: S, per_call: D) -> Arc<dyn MethodMatcher>
where
    S: Fn(&Method, &TypeInfo) -> bool + Send + Sync + 'static,
    D: Fn(&Method, &Args) -> bool + Send + Sync + 'static,
{
    Arc::new(FnDynamicMatcher {
        matches: statically,
        matches_args: per_call,
    })
}

/// Creates a static matcher for methods whose name equals `name`.
pub fn method_named(name: impl Into<String>) -> Arc<dyn MethodMatcher> {
    let name = name.into();
    method_matcher(move |method, _| method.name() == name)
}

// =============================================================================
// Pointcut
// =============================================================================

/// A (class filter, method matcher) pair.
///
/// Equality: pointcuts produced by an expression evaluator carry their
/// source expression and compare by it; programmatic pointcuts compare by
/// filter/matcher identity. Structural equality over arbitrary closures is
/// not decidable.
#[derive(Clone)]
pub struct Pointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
    expression: Option<Arc<str>>,
}

impl Pointcut {
    /// Creates a pointcut from its two predicates.
    pub fn new(class_filter: Arc<dyn ClassFilter>, method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter,
            method_matcher,
            expression: None,
        }
    }

    /// The pointcut that matches everything.
    pub fn truthy() -> Self {
        Self::new(Arc::new(TrueClassFilter), Arc::new(TrueMethodMatcher))
    }

    /// Records the source expression this pointcut was parsed from; used
    /// for pointcut equality.
    pub fn with_expression(mut self, expression: impl Into<Arc<str>>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn class_filter(&self) -> &Arc<dyn ClassFilter> {
        &self.class_filter
    }

    pub fn method_matcher(&self) -> &Arc<dyn MethodMatcher> {
        &self.method_matcher
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }
}

impl PartialEq for Pointcut {
    fn eq(&self, other: &Self) -> bool {
        match (&self.expression, &other.expression) {
            (Some(a), Some(b)) => a == b,
            _ => {
                std::ptr::addr_eq(
                    Arc::as_ptr(&self.class_filter),
                    Arc::as_ptr(&other.class_filter),
                ) && std::ptr::addr_eq(
                    Arc::as_ptr(&self.method_matcher),
                    Arc::as_ptr(&other.method_matcher),
                )
            }
        }
    }
}

impl Eq for Pointcut {}

impl std::fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pointcut")
            .field("expression", &self.expression)
            .finish_non_exhaustive()
    }
}

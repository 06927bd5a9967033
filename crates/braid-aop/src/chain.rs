//! Advisor-to-interceptor chain resolution.
//!
//! Given the ordered advisor list and one (method, class) pair, the resolver
//! produces the list of interceptor units that apply — in declaration order,
//! first advisor outermost. Static matches are settled here; dynamic
//! matches are deferred as [`ChainEntry::Dynamic`] pairs that the executor
//! re-evaluates per call with the current arguments.
//!
//! The resolver has no state of its own; caching lives in the proxy
//! configuration.

use std::sync::Arc;

use tracing::trace;

use braid_core::advice::{Advice, Interceptor, Invocation};
use braid_core::advisor::Advisor;
use braid_core::error::InvokeResult;
use braid_core::pointcut::MethodMatcher;
use braid_core::types::{Callable, Method, ReturnValue, TypeInfo};

/// One resolved link of an interception chain.
#[derive(Clone)]
pub enum ChainEntry {
    /// Always invoked once resolved.
    Static(Arc<dyn Interceptor>),
    /// Invoked only if `matcher` accepts the *current* call arguments.
    Dynamic {
        interceptor: Arc<dyn Interceptor>,
        matcher: Arc<dyn MethodMatcher>,
    },
}

impl ChainEntry {
    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        match self {
            Self::Static(i) => i,
            Self::Dynamic { interceptor, .. } => interceptor,
        }
    }
}

impl std::fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("ChainEntry::Static"),
            Self::Dynamic { .. } => f.write_str("ChainEntry::Dynamic"),
        }
    }
}

/// Resolves the interceptor chain for `method` on `class`.
///
/// `pre_filtered` asserts the advisor list was already narrowed to this
/// class by the container, skipping class-filter checks for plain advisors.
/// A non-matching advisor contributes nothing; that is not an error.
pub fn resolve_chain(
    advisors: &[Arc<Advisor>],
    method: &Method,
    class: &TypeInfo,
    pre_filtered: bool,
) -> Vec<ChainEntry> {
    let has_introductions = advisors.iter().any(|a| match a.as_ref() {
        Advisor::Introduction(i) => i.class_filter().matches_class(class),
        _ => false,
    });

    let mut chain = Vec::with_capacity(advisors.len());
    for advisor in advisors {
        match advisor.as_ref() {
            Advisor::Pointcut { pointcut, advice } => {
                if !pre_filtered && !pointcut.class_filter().matches_class(class) {
                    trace!(method = %method, class = %class, "class filter rejected advisor");
                    continue;
                }
                let matcher = pointcut.method_matcher();
                if !matcher.matches(method, class, has_introductions) {
                    trace!(method = %method, "method matcher rejected advisor");
                    continue;
                }
                for interceptor in interceptors_for(advice) {
                    if matcher.is_dynamic() {
                        chain.push(ChainEntry::Dynamic {
                            interceptor,
                            matcher: matcher.clone(),
                        });
                    } else {
                        chain.push(ChainEntry::Static(interceptor));
                    }
                }
            }
            Advisor::Introduction(introduction) => {
                // Introductions apply to every method of their interfaces;
                // only the class filter gates them.
                if introduction.class_filter().matches_class(class) {
                    chain.push(ChainEntry::Static(Arc::new(IntroductionInterceptor {
                        dispatcher: introduction.dispatcher().clone(),
                    })));
                }
            }
            Advisor::Plain { advice } => {
                for interceptor in interceptors_for(advice) {
                    chain.push(ChainEntry::Static(interceptor));
                }
            }
        }
    }

    trace!(method = %method, class = %class, links = chain.len(), "resolved interceptor chain");
    chain
}

// =============================================================================
// Advice adapters
// =============================================================================

/// Adapts an advice unit into its interceptor form.
///
/// Around advice already is one; the other kinds are wrapped so the
/// executor deals with a single shape.
fn interceptors_for(advice: &Advice) -> Vec<Arc<dyn Interceptor>> {
    match advice {
        Advice::Around(i) => vec![i.clone()],
        Advice::Before(a) => vec![Arc::new(BeforeInterceptor(a.clone()))],
        Advice::AfterReturning(a) => vec![Arc::new(AfterReturningInterceptor(a.clone()))],
        Advice::AfterThrowing(a) => vec![Arc::new(AfterThrowingInterceptor(a.clone()))],
        Advice::After(a) => vec![Arc::new(AfterInterceptor(a.clone()))],
    }
}

struct BeforeInterceptor(Arc<dyn braid_core::advice::BeforeAdvice>);

impl Interceptor for BeforeInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
        self.0.before(invocation.method(), invocation.args())?;
        invocation.proceed()
    }
}

struct AfterReturningInterceptor(Arc<dyn braid_core::advice::AfterReturningAdvice>);

impl Interceptor for AfterReturningInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
        let result = invocation.proceed()?;
        self.0
            .after_returning(&result, invocation.method(), invocation.args())?;
        Ok(result)
    }
}

struct AfterThrowingInterceptor(Arc<dyn braid_core::advice::AfterThrowingAdvice>);

impl Interceptor for AfterThrowingInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
        match invocation.proceed() {
            Err(err) => {
                self.0.after_throwing(&err, invocation.method(), invocation.args());
                Err(err)
            }
            ok => ok,
        }
    }
}

struct AfterInterceptor(Arc<dyn braid_core::advice::AfterAdvice>);

impl Interceptor for AfterInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
        let outcome = invocation.proceed();
        self.0.after(invocation.method(), invocation.args());
        outcome
    }
}

/// The interceptor form of an introduction advisor.
///
/// Delegates methods declared by the dispatcher's interfaces to the
/// dispatcher; everything else falls through to the rest of the chain.
pub(crate) struct IntroductionInterceptor {
    pub(crate) dispatcher: Arc<dyn Callable>,
}

impl Interceptor for IntroductionInterceptor {
    fn invoke(&self, invocation: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
        let dispatcher_class = self.dispatcher.type_info();
        if dispatcher_class.declares(invocation.method()) {
            let method = invocation.method().clone();
            self.dispatcher.call(&method, invocation.args_mut())
        } else {
            invocation.proceed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordingAdvice, greeter_class, greeter_interface, greet_method};
    use braid_core::pointcut::{Pointcut, class_filter, dynamic_matcher, method_named, TrueMethodMatcher};
    use braid_core::types::ReturnKind;

    fn record_advisor(log: &RecordingAdvice, tag: &str) -> Arc<Advisor> {
        Arc::new(Advisor::pointcut(
            Pointcut::truthy(),
            Advice::Before(Arc::new(log.tagged(tag))),
        ))
    }

    #[test]
    fn chain_order_follows_declaration_order() {
        let log = RecordingAdvice::new();
        let advisors = vec![
            record_advisor(&log, "a"),
            record_advisor(&log, "b"),
            record_advisor(&log, "c"),
        ];
        let chain = resolve_chain(&advisors, &greet_method(), &greeter_class(), false);
        assert_eq!(chain.len(), 3);
        assert!(chain.iter().all(|e| matches!(e, ChainEntry::Static(_))));
    }

    #[test]
    fn class_filter_mismatch_contributes_nothing() {
        let log = RecordingAdvice::new();
        let advisors = vec![Arc::new(Advisor::pointcut(
            Pointcut::new(
                class_filter(|c| c.name() == "SomethingElse"),
                Arc::new(TrueMethodMatcher),
            ),
            Advice::Before(Arc::new(log.tagged("skipped"))),
        ))];
        let chain = resolve_chain(&advisors, &greet_method(), &greeter_class(), false);
        assert!(chain.is_empty());
    }

    #[test]
    fn pre_filtered_skips_class_checks() {
        let log = RecordingAdvice::new();
        let advisors = vec![Arc::new(Advisor::pointcut(
            Pointcut::new(
                class_filter(|c| c.name() == "SomethingElse"),
                Arc::new(TrueMethodMatcher),
            ),
            Advice::Before(Arc::new(log.tagged("kept"))),
        ))];
        let chain = resolve_chain(&advisors, &greet_method(), &greeter_class(), true);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn dynamic_matchers_become_deferred_pairs() {
        let log = RecordingAdvice::new();
        let advisors = vec![Arc::new(Advisor::pointcut(
            Pointcut::new(
                Arc::new(braid_core::pointcut::TrueClassFilter),
                dynamic_matcher(|_, _| true, |_, _| true),
            ),
            Advice::Before(Arc::new(log.tagged("dynamic"))),
        ))];
        let chain = resolve_chain(&advisors, &greet_method(), &greeter_class(), false);
        assert!(matches!(chain[0], ChainEntry::Dynamic { .. }));
    }

    #[test]
    fn method_matcher_narrows_by_method() {
        let log = RecordingAdvice::new();
        let advisors = vec![Arc::new(Advisor::pointcut(
            Pointcut::new(
                Arc::new(braid_core::pointcut::TrueClassFilter),
                method_named("tally"),
            ),
            Advice::Before(Arc::new(log.tagged("tally-only"))),
        ))];

        assert!(resolve_chain(&advisors, &greet_method(), &greeter_class(), false).is_empty());
        let tally = braid_core::types::Method::new("Greeter", "tally", 0, ReturnKind::Primitive("i64"));
        assert_eq!(resolve_chain(&advisors, &tally, &greeter_class(), false).len(), 1);
    }

    #[test]
    fn plain_advisors_apply_unconditionally() {
        let log = RecordingAdvice::new();
        let advisors = vec![Arc::new(Advisor::plain(Advice::Before(
            Arc::new(log.tagged("fallback")),
        )))];
        let chain = resolve_chain(&advisors, &greet_method(), &greeter_class(), false);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn introductions_ignore_method_matching() {
        let dispatcher = crate::testutil::StampedDispatcher::new();
        let advisor = Arc::new(Advisor::introduction(
            braid_core::advisor::IntroductionAdvisor::new(
                dispatcher,
                vec![crate::testutil::stamped_interface()],
            )
            .unwrap(),
        ));
        // Applies to greet() even though greet is not a Stamped method; the
        // interceptor itself falls through for non-introduced methods.
        let chain = resolve_chain(&[advisor], &greet_method(), &greeter_class(), false);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn resolver_ignores_unrelated_interface_class() {
        let other = braid_core::types::TypeInfo::interface("Unrelated");
        let log = RecordingAdvice::new();
        let advisors = vec![Arc::new(Advisor::pointcut(
            Pointcut::new(
                class_filter(|c| c.implements(&greeter_interface())),
                Arc::new(TrueMethodMatcher),
            ),
            Advice::Before(Arc::new(log.tagged("greeters"))),
        ))];
        assert!(resolve_chain(&advisors, &greet_method(), &other, false).is_empty());
    }
}

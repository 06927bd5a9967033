//! The invocation chain executor.
//!
//! A [`MethodInvocation`] threads one call through its resolved interceptor
//! chain to the real receiver. The execution model is a cooperative
//! continuation: each interceptor receives the invocation and calls
//! [`proceed`](braid_core::Invocation::proceed) to hand control inward —
//! possibly zero times (short-circuit), possibly several (retry/replay).
//!
//! The cursor starts before the first entry; once it has consumed the last
//! entry, `proceed` performs the terminal call on the receiver. Dynamic
//! entries are re-evaluated against the *current* argument buffer, not the
//! original call arguments — an earlier interceptor may have rewritten them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use braid_core::advice::Invocation;
use braid_core::error::{InvokeError, InvokeResult};
use braid_core::types::{ArgValue, Args, Callable, Method, ReturnValue, TypeInfo};

use crate::chain::ChainEntry;

type AttributeMap = Arc<Mutex<HashMap<String, ArgValue>>>;

/// One live proxied call.
pub struct MethodInvocation {
    proxy: std::sync::Weak<dyn Callable>,
    target: Option<Arc<dyn Callable>>,
    target_class: Arc<TypeInfo>,
    method: Method,
    args: Args,
    chain: Arc<[ChainEntry]>,
    /// Index of the last consumed chain entry; starts one before the first.
    cursor: isize,
    /// Created lazily; shared by reference across forks.
    attributes: Option<AttributeMap>,
}

impl MethodInvocation {
    pub fn new(
        proxy: std::sync::Weak<dyn Callable>,
        target: Option<Arc<dyn Callable>>,
        target_class: Arc<TypeInfo>,
        method: Method,
        args: Args,
        chain: Arc<[ChainEntry]>,
    ) -> Self {
        Self {
            proxy,
            target,
            target_class,
            method,
            args,
            chain,
            cursor: -1,
            attributes: None,
        }
    }

    /// Consumes the invocation, returning the (possibly rewritten) argument
    /// buffer so the caller's view reflects interceptor rewrites.
    pub fn into_args(self) -> Args {
        self.args
    }

    fn terminal_call(&mut self) -> InvokeResult<ReturnValue> {
        let method = self.method.clone();
        match self.target.clone() {
            Some(target) => {
                trace!(method = %method, "terminal call on receiver");
                target.call(&method, &mut self.args)
            }
            None => Err(InvokeError::NoTarget {
                method: method.to_string(),
            }),
        }
    }
}

impl Invocation for MethodInvocation {
    fn method(&self) -> &Method {
        &self.method
    }

    fn args(&self) -> &Args {
        &self.args
    }

    fn args_mut(&mut self) -> &mut Args {
        &mut self.args
    }

    fn target_class(&self) -> Arc<TypeInfo> {
        self.target_class.clone()
    }

    fn proxy(&self) -> Option<Arc<dyn Callable>> {
        self.proxy.upgrade()
    }

    fn proceed(&mut self) -> InvokeResult<ReturnValue> {
        if self.cursor == self.chain.len() as isize - 1 {
            return self.terminal_call();
        }

        self.cursor += 1;
        let entry = self.chain[self.cursor as usize].clone();
        match entry {
            ChainEntry::Dynamic {
                interceptor,
                matcher,
            } => {
                if matcher.matches_args(&self.method, self.target_class.as_ref(), &self.args) {
                    interceptor.invoke(self)
                } else {
                    // Skip-and-continue: a rejected dynamic entry is not
                    // advice execution.
                    trace!(method = %self.method, "dynamic matcher rejected current arguments");
                    self.proceed()
                }
            }
            ChainEntry::Static(interceptor) => interceptor.invoke(self),
        }
    }

    fn fork(&mut self) -> Box<dyn Invocation> {
        // Materialize the attribute map so both sides share it.
        let attributes = self
            .attributes
            .get_or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .clone();
        Box::new(MethodInvocation {
            proxy: self.proxy.clone(),
            target: self.target.clone(),
            target_class: self.target_class.clone(),
            method: self.method.clone(),
            args: self.args.clone(),
            chain: self.chain.clone(),
            cursor: self.cursor,
            attributes: Some(attributes),
        })
    }

    fn set_attribute(&mut self, key: &str, value: Option<ArgValue>) {
        let map = self
            .attributes
            .get_or_insert_with(|| Arc::new(Mutex::new(HashMap::new())));
        match value {
            Some(v) => {
                map.lock().insert(key.to_string(), v);
            }
            None => {
                map.lock().remove(key);
            }
        }
    }

    fn attribute(&self, key: &str) -> Option<ArgValue> {
        self.attributes.as_ref().and_then(|m| m.lock().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::resolve_chain;
    use crate::testutil::*;
    use braid_core::advice::{Advice, Interceptor};
    use braid_core::advisor::Advisor;
    use braid_core::pointcut::{Pointcut, TrueClassFilter, dynamic_matcher};
    use braid_core::types::value;
    use std::sync::Weak;

    fn invocation_for(
        target: Arc<dyn Callable>,
        method: Method,
        args: Args,
        advisors: &[Arc<Advisor>],
    ) -> MethodInvocation {
        let class = target.type_info();
        let chain: Arc<[ChainEntry]> = resolve_chain(advisors, &method, &class, false).into();
        MethodInvocation::new(Weak::<GreeterImpl>::new(), Some(target), class, method, args, chain)
    }

    #[test]
    fn empty_chain_reaches_terminal_call() {
        let greeter = GreeterImpl::new();
        let mut inv = invocation_for(
            greeter.clone(),
            greet_method(),
            vec![value("ada".to_string())],
            &[],
        );
        let result = inv.proceed().unwrap().unwrap();
        assert_eq!(result.downcast_ref::<String>().unwrap(), "hello ada");
        assert_eq!(greeter.calls(), 1);
    }

    #[test]
    fn terminal_call_without_target_errors() {
        let class = Arc::new(greeter_class());
        let mut inv = MethodInvocation::new(
            Weak::<GreeterImpl>::new(),
            None,
            class,
            greet_method(),
            Vec::new(),
            Vec::new().into(),
        );
        assert!(matches!(inv.proceed(), Err(InvokeError::NoTarget { .. })));
    }

    /// Rewrites arg0, then a dynamic matcher requiring `arg0 > 0` must see
    /// the rewritten value — the re-check uses current arguments.
    #[test]
    fn dynamic_recheck_sees_rewritten_arguments() {
        struct Rewriter;
        impl Interceptor for Rewriter {
            fn invoke(&self, inv: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
                inv.args_mut()[0] = value(1_i64);
                inv.proceed()
            }
        }

        let log = RecordingAdvice::new();
        let advisors = vec![
            Arc::new(Advisor::plain(Advice::Around(Arc::new(Rewriter)))),
            Arc::new(Advisor::pointcut(
                Pointcut::new(
                    Arc::new(TrueClassFilter),
                    dynamic_matcher(
                        |_, _| true,
                        |_, args| {
                            args.first()
                                .and_then(|v| v.downcast_ref::<i64>())
                                .is_some_and(|v| *v > 0)
                        },
                    ),
                ),
                Advice::Before(Arc::new(log.tagged("gated"))),
            )),
        ];

        let greeter = GreeterImpl::new();
        let mut inv = invocation_for(greeter, tally_method(), vec![value(-1_i64)], &advisors);
        inv.proceed().unwrap();
        // The gated advice ran because the rewrite happened first.
        assert_eq!(log.entries(), vec!["gated".to_string()]);
    }

    #[test]
    fn dynamic_mismatch_skips_without_running_advice() {
        let log = RecordingAdvice::new();
        let advisors = vec![Arc::new(Advisor::pointcut(
            Pointcut::new(
                Arc::new(TrueClassFilter),
                dynamic_matcher(
                    |_, _| true,
                    |_, args| {
                        args.first()
                            .and_then(|v| v.downcast_ref::<i64>())
                            .is_some_and(|v| *v > 0)
                    },
                ),
            ),
            Advice::Before(Arc::new(log.tagged("gated"))),
        ))];

        let greeter = GreeterImpl::new();
        let mut inv =
            invocation_for(greeter.clone(), tally_method(), vec![value(-1_i64)], &advisors);
        inv.proceed().unwrap();
        assert!(log.entries().is_empty());
        // The terminal call still ran.
        assert_eq!(greeter.calls(), 1);
    }

    /// An around advice that never proceeds prevents the terminal call and
    /// all later advice; its return value is what the caller observes.
    #[test]
    fn short_circuiting_around_blocks_the_rest() {
        struct ShortCircuit;
        impl Interceptor for ShortCircuit {
            fn invoke(&self, _inv: &mut dyn Invocation) -> InvokeResult<ReturnValue> {
                Ok(Some(value("intercepted".to_string())))
            }
        }

        let log = RecordingAdvice::new();
        let advisors = vec![
            Arc::new(Advisor::plain(Advice::Around(Arc::new(ShortCircuit)))),
            Arc::new(Advisor::plain(Advice::Before(Arc::new(log.tagged("later"))))),
        ];

        let greeter = GreeterImpl::new();
        let mut inv = invocation_for(
            greeter.clone(),
            greet_method(),
            vec![value("ada".to_string())],
            &advisors,
        );
        let result = inv.proceed().unwrap().unwrap();
        assert_eq!(result.downcast_ref::<String>().unwrap(), "intercepted");
        assert!(log.entries().is_empty());
        assert_eq!(greeter.calls(), 0);
    }

    #[test]
    fn errors_propagate_unchanged_through_adapters() {
        struct Observer {
            seen: Arc<Mutex<Vec<String>>>,
        }
        impl braid_core::advice::AfterThrowingAdvice for Observer {
            fn after_throwing(&self, error: &InvokeError, _m: &Method, _a: &Args) {
                self.seen.lock().push(error.to_string());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let advisors = vec![Arc::new(Advisor::plain(Advice::AfterThrowing(Arc::new(
            Observer { seen: seen.clone() },
        ))))];

        let greeter = GreeterImpl::new();
        let mut inv = invocation_for(greeter, boom_method(), Vec::new(), &advisors);
        let err = inv.proceed().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(seen.lock().as_slice(), &["boom".to_string()]);
    }

    #[test]
    fn after_advice_runs_on_both_outcomes() {
        struct Finally {
            log: Arc<Mutex<Vec<&'static str>>>,
        }
        impl braid_core::advice::AfterAdvice for Finally {
            fn after(&self, _m: &Method, _a: &Args) {
                self.log.lock().push("finally");
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let advisors = vec![Arc::new(Advisor::plain(Advice::After(Arc::new(Finally {
            log: log.clone(),
        }))))];

        let greeter = GreeterImpl::new();
        let mut ok = invocation_for(greeter.clone(), tally_method(), Vec::new(), &advisors);
        ok.proceed().unwrap();
        let mut failing = invocation_for(greeter, boom_method(), Vec::new(), &advisors);
        failing.proceed().unwrap_err();
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn fork_gets_own_args_but_shares_attributes() {
        let greeter = GreeterImpl::new();
        let mut original = invocation_for(
            greeter,
            greet_method(),
            vec![value("ada".to_string())],
            &[],
        );

        let mut replay = original.fork();
        replay.args_mut()[0] = value("grace".to_string());
        replay.set_attribute("seen", Some(value(true)));

        // Own argument buffer: the original still sees "ada".
        assert_eq!(
            original.args()[0].downcast_ref::<String>().unwrap(),
            "ada"
        );
        // Shared side channel: the original sees the replay's attribute.
        assert!(original.attribute("seen").is_some());

        // Removing via None.
        original.set_attribute("seen", None);
        assert!(replay.attribute("seen").is_none());
    }

    #[test]
    fn replay_produces_same_result() {
        let greeter = GreeterImpl::new();
        let mut original = invocation_for(
            greeter,
            greet_method(),
            vec![value("ada".to_string())],
            &[],
        );
        let mut replay = original.fork();

        let first = original.proceed().unwrap().unwrap();
        let second = replay.proceed().unwrap().unwrap();
        assert_eq!(
            first.downcast_ref::<String>(),
            second.downcast_ref::<String>()
        );
    }
}

//! # Braid Core
//!
//! Foundation types of the Braid interception engine.
//!
//! This crate defines the vocabulary the engine in `braid-aop` operates on:
//!
//! - **Call model**: runtime class/method descriptions and the type-erased
//!   receiver boundary ([`TypeInfo`], [`Method`], [`Callable`])
//! - **Advice**: the five advice capabilities and the [`Interceptor`] /
//!   [`Invocation`] boundary between advice and the chain executor
//! - **Pointcuts**: class-filter + method-matcher predicate pairs, with an
//!   explicit static-vs-dynamic distinction ([`Pointcut`])
//! - **Advisors**: pointcut/advice pairings, including interface
//!   introductions ([`Advisor`])
//! - **Receiver sources**: how/when the real callee is obtained
//!   ([`TargetSource`])
//! - **Errors**: one thiserror family per failure surface
//!
//! Advice objects, pointcut expressions, and receiver sources are produced
//! by collaborators outside this workspace (a container, an expression
//! evaluator) and handed in as the trait objects defined here.

pub mod advice;
pub mod advisor;
pub mod error;
pub mod pointcut;
pub mod target;
pub mod types;

pub use advice::{
    Advice, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice, Interceptor,
    Invocation,
};
pub use advisor::{Advisor, IntroductionAdvisor};
pub use error::{
    ConfigError, ConfigResult, InvokeError, InvokeResult, ProxyError, ProxyResult,
};
pub use pointcut::{
    ClassFilter, MethodMatcher, Pointcut, TrueClassFilter, TrueMethodMatcher, class_filter,
    dynamic_matcher, method_matcher, method_named,
};
pub use target::{EmptyTargetSource, PrototypeTargetSource, SingletonTargetSource, TargetSource};
pub use types::{
    ArgValue, Args, Callable, Method, MethodKey, MethodKind, ReturnKind, ReturnValue, TypeInfo,
    same_callable, value,
};

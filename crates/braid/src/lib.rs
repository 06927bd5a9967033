//! # Braid
//!
//! A method-interception engine: pointcuts select methods, advisors pair
//! them with advice, and dynamic proxies weave the advice around calls to a
//! real receiver.
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ Proxy ──▶ dispatch (interface-shaped / subclass table)
//!                         │
//!                         ├─ identity / introspection answers (no advice)
//!                         └─ interceptor chain ──▶ ... ──▶ receiver
//!                            (resolved per method × class, cached)
//! ```
//!
//! - **Core** ([`core`]): the dynamic call model (`TypeInfo`, `Method`,
//!   `Callable`), advice and advisor contracts, pointcuts, receiver sources.
//! - **Engine** ([`aop`]): chain resolution and caching, the recursive
//!   invocation, proxy configuration, and the two proxy shapes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use braid::prelude::*;
//!
//! let factory = ProxyFactory::with_target(receiver);
//! factory.config().add_interface(ledger_interface())?;
//! factory.config().add_advisor(Advisor::pointcut(
//!     Pointcut::new(Arc::new(TrueClassFilter), method_named("post")),
//!     Advice::Before(Arc::new(AuditAdvice::new())),
//! ))?;
//! let proxy = factory.proxy()?;
//! proxy.call(&post_method, &mut args)?;
//! ```

pub use braid_aop as aop;
pub use braid_core as core;

/// Prelude module for convenient imports.
pub mod prelude {
    // Proxy construction - main entry point
    pub use braid_aop::{Proxy, ProxyConfig, ProxyFactory, ProxyFlags, ProxyStrategy};

    // Exposure - for advice that needs call context
    pub use braid_aop::{current_invocation, current_proxy};

    // Advice and advisor contracts
    pub use braid_core::advice::{
        Advice, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice,
        Interceptor, Invocation,
    };
    pub use braid_core::advisor::{Advisor, IntroductionAdvisor};

    // Pointcuts
    pub use braid_core::pointcut::{
        ClassFilter, MethodMatcher, Pointcut, TrueClassFilter, TrueMethodMatcher, class_filter,
        dynamic_matcher, method_matcher, method_named,
    };

    // Receiver sources
    pub use braid_core::target::{
        EmptyTargetSource, PrototypeTargetSource, SingletonTargetSource, TargetSource,
    };

    // The dynamic call model
    pub use braid_core::types::{
        ArgValue, Args, Callable, Method, MethodKind, ReturnKind, ReturnValue, TypeInfo, value,
    };

    // Error families
    pub use braid_core::error::{
        ConfigError, ConfigResult, InvokeError, InvokeResult, ProxyError, ProxyResult,
    };
}

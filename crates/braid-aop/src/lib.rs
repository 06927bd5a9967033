//! # Braid AOP
//!
//! The interception engine built on the core model.
//!
//! This layer provides:
//! - Advisor chain resolution with per-method caching
//! - The recursive invocation chain (`proceed`-driven)
//! - Thread-confined exposure of the current invocation and proxy
//! - Proxy configuration (flags, interfaces, advisor list)
//! - Dual-strategy proxies: interface-shaped and subclass-shaped dispatch
//!
//! The engine layer only consumes the core contracts; receivers and advice
//! implementations live with their owners.

pub mod chain;
pub mod config;
pub mod expose;
pub mod invocation;
pub mod proxy;

#[cfg(test)]
mod testutil;

pub use chain::{ChainEntry, resolve_chain};
pub use config::{ProxyConfig, ProxyFlags};
pub use expose::{
    ExposeInvocationInterceptor, ExposedInvocation, current_invocation, current_proxy,
};
pub use invocation::MethodInvocation;
pub use proxy::{
    Proxy, ProxyFactory, ProxyStrategy, Route, advised_interface, select_strategy,
};

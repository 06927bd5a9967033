//! Interface-shaped dispatch: routing decided per call.
//!
//! The proxy presents the declared interfaces and nothing else. Identity
//! methods are answered from the configuration unless a declared interface
//! claims them for itself; introspection methods come from the configuration
//! unless the proxy is opaque; everything else takes the general advised
//! path.

use tracing::{Level, span};

use braid_core::error::InvokeResult;
use braid_core::types::{Args, Method, MethodKind, ReturnValue};

use crate::proxy::{Proxy, introspection_answer};

pub(crate) fn dispatch(
    proxy: &Proxy,
    method: &Method,
    args: &mut Args,
) -> InvokeResult<ReturnValue> {
    let span = span!(Level::DEBUG, "proxy_call", method = %method, shape = "interface");
    let _enter = span.enter();

    match method.kind() {
        MethodKind::Equality | MethodKind::HashCode
            if !proxy.config().interface_declares(method) =>
        {
            proxy.identity_answer(method, args)
        }
        MethodKind::Introspection if !proxy.config().flags().opaque => {
            introspection_answer(proxy.config(), method)
        }
        _ => proxy.advised_dispatch(method, args),
    }
}

//! Shared fixtures for the engine's tests: a small `Greeter` surface, a
//! receiver implementation, an introduction dispatcher, and a recording
//! advice for asserting execution order.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

use braid_core::advice::BeforeAdvice;
use braid_core::error::{InvokeError, InvokeResult};
use braid_core::types::{Args, Callable, Method, ReturnKind, ReturnValue, TypeInfo, value};

pub(crate) fn greeter_interface() -> Arc<TypeInfo> {
    Arc::new(
        TypeInfo::interface("Greeter")
            .with_method(Method::new("Greeter", "greet", 1, ReturnKind::object("string")))
            .with_method(Method::new("Greeter", "tally", 0, ReturnKind::Primitive("i64")))
            .with_method(Method::new("Greeter", "chain_self", 0, ReturnKind::object("Greeter")))
            .with_method(Method::new("Greeter", "boom", 0, ReturnKind::object("string"))),
    )
}

pub(crate) fn greeter_class() -> TypeInfo {
    TypeInfo::class("GreeterImpl")
        .with_interface(greeter_interface())
        .with_method(Method::finalizer("GreeterImpl"))
}

pub(crate) fn greet_method() -> Method {
    Method::new("Greeter", "greet", 1, ReturnKind::object("string"))
}

pub(crate) fn tally_method() -> Method {
    Method::new("Greeter", "tally", 0, ReturnKind::Primitive("i64"))
}

pub(crate) fn chain_self_method() -> Method {
    Method::new("Greeter", "chain_self", 0, ReturnKind::object("Greeter"))
}

pub(crate) fn boom_method() -> Method {
    Method::new("Greeter", "boom", 0, ReturnKind::object("string"))
}

/// A receiver for the `Greeter` surface. Counts every call it receives;
/// `chain_self` returns the receiver itself (for proxy-substitution tests).
pub(crate) struct GreeterImpl {
    info: Arc<TypeInfo>,
    calls: AtomicI64,
    weak: std::sync::Weak<GreeterImpl>,
}

impl GreeterImpl {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            info: Arc::new(greeter_class()),
            calls: AtomicI64::new(0),
            weak: weak.clone(),
        })
    }

    pub(crate) fn calls(&self) -> i64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Callable for GreeterImpl {
    fn type_info(&self) -> Arc<TypeInfo> {
        self.info.clone()
    }

    fn call(&self, method: &Method, args: &mut Args) -> InvokeResult<ReturnValue> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match method.name() {
            "greet" => {
                let name = args
                    .first()
                    .and_then(|v| v.downcast_ref::<String>())
                    .cloned()
                    .unwrap_or_default();
                Ok(Some(value(format!("hello {name}"))))
            }
            "tally" => Ok(Some(value(count))),
            "chain_self" => {
                let me = self.weak.upgrade().expect("receiver alive during call") as Arc<dyn Callable>;
                Ok(Some(value(me)))
            }
            "boom" => Err(InvokeError::msg("boom")),
            "finalize" => Ok(None),
            other => Err(InvokeError::UnknownMethod {
                method: other.to_string(),
                class: self.info.name().to_string(),
            }),
        }
    }
}

pub(crate) fn stamped_interface() -> Arc<TypeInfo> {
    Arc::new(
        TypeInfo::interface("Stamped")
            .with_method(Method::new("Stamped", "stamp", 0, ReturnKind::object("string"))),
    )
}

pub(crate) fn stamp_method() -> Method {
    Method::new("Stamped", "stamp", 0, ReturnKind::object("string"))
}

/// Introduction dispatcher implementing `Stamped`.
pub(crate) struct StampedDispatcher {
    info: Arc<TypeInfo>,
}

impl StampedDispatcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            info: Arc::new(TypeInfo::class("StampedDispatcher").with_interface(stamped_interface())),
        })
    }
}

impl Callable for StampedDispatcher {
    fn type_info(&self) -> Arc<TypeInfo> {
        self.info.clone()
    }

    fn call(&self, method: &Method, _args: &mut Args) -> InvokeResult<ReturnValue> {
        match method.name() {
            "stamp" => Ok(Some(value("stamped".to_string()))),
            other => Err(InvokeError::UnknownMethod {
                method: other.to_string(),
                class: self.info.name().to_string(),
            }),
        }
    }
}

/// Hands out before-advice instances that append a tag to a shared log.
#[derive(Clone)]
pub(crate) struct RecordingAdvice {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingAdvice {
    pub(crate) fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn tagged(&self, tag: &str) -> TaggedBefore {
        TaggedBefore {
            tag: tag.to_string(),
            log: self.log.clone(),
        }
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

pub(crate) struct TaggedBefore {
    tag: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl BeforeAdvice for TaggedBefore {
    fn before(&self, _method: &Method, _args: &Args) -> InvokeResult<()> {
        self.log.lock().push(self.tag.clone());
        Ok(())
    }
}

//! Advisors: the pairing of a pointcut with an advice unit.
//!
//! Three kinds, mirroring how the chain resolver treats them:
//!
//! - [`Advisor::Pointcut`] — advice gated by a [`Pointcut`].
//! - [`Advisor::Introduction`] — adds wholly new interfaces to the proxy;
//!   applies to every method of those interfaces, no method matching.
//! - [`Advisor::Plain`] — a fallback kind that applies unconditionally.

use std::any::Any;
use std::sync::Arc;

use crate::advice::Advice;
use crate::error::{ConfigError, ConfigResult};
use crate::pointcut::{ClassFilter, Pointcut, TrueClassFilter};
use crate::types::{Callable, TypeInfo};

// =============================================================================
// Introduction advisor
// =============================================================================

/// An advisor that introduces extra interfaces to the proxy.
///
/// The `dispatcher` supplies the behavior of every introduced method; its
/// own [`TypeInfo`] must implement each declared interface, which is
/// validated at construction and again when the advisor is registered.
#[derive(Clone)]
pub struct IntroductionAdvisor {
    class_filter: Arc<dyn ClassFilter>,
    dispatcher: Arc<dyn Callable>,
    interfaces: Vec<Arc<TypeInfo>>,
}

impl IntroductionAdvisor {
    /// Creates an introduction applying to every class.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotAnInterface`] if a declared type is not an
    /// interface; [`ConfigError::IntroductionMismatch`] if the dispatcher
    /// does not implement a declared interface.
    pub fn new(dispatcher: Arc<dyn Callable>, interfaces: Vec<Arc<TypeInfo>>) -> ConfigResult<Self> {
        Self::filtered(Arc::new(TrueClassFilter), dispatcher, interfaces)
    }

    /// Creates an introduction restricted to classes accepted by `class_filter`.
    pub fn filtered(
        class_filter: Arc<dyn ClassFilter>,
        dispatcher: Arc<dyn Callable>,
        interfaces: Vec<Arc<TypeInfo>>,
    ) -> ConfigResult<Self> {
        let advisor = Self {
            class_filter,
            dispatcher,
            interfaces,
        };
        advisor.validate()?;
        Ok(advisor)
    }

    /// Re-checks interface consistency.
    pub fn validate(&self) -> ConfigResult<()> {
        let dispatcher_class = self.dispatcher.type_info();
        for iface in &self.interfaces {
            if !iface.is_interface() {
                return Err(ConfigError::NotAnInterface {
                    name: iface.name().to_string(),
                });
            }
            if !dispatcher_class.implements(iface) {
                return Err(ConfigError::IntroductionMismatch {
                    dispatcher: dispatcher_class.name().to_string(),
                    interface: iface.name().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn class_filter(&self) -> &Arc<dyn ClassFilter> {
        &self.class_filter
    }

    pub fn dispatcher(&self) -> &Arc<dyn Callable> {
        &self.dispatcher
    }

    /// The interfaces this advisor adds to any proxy it is registered with.
    pub fn interfaces(&self) -> &[Arc<TypeInfo>] {
        &self.interfaces
    }
}

impl std::fmt::Debug for IntroductionAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntroductionAdvisor")
            .field(
                "interfaces",
                &self.interfaces.iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Advisor
// =============================================================================

/// One entry of a proxy configuration's ordered advisor list.
///
/// Declaration order is execution precedence: the first advisor is the
/// outermost link of the resolved interceptor chain.
#[derive(Clone)]
pub enum Advisor {
    /// Advice gated by class and method matching.
    Pointcut { pointcut: Pointcut, advice: Advice },
    /// Interface introduction; class-filtered only.
    Introduction(IntroductionAdvisor),
    /// Applies to every method unconditionally.
    Plain { advice: Advice },
}

impl Advisor {
    /// Pairs a pointcut with an advice unit.
    pub fn pointcut(pointcut: Pointcut, advice: Advice) -> Self {
        Self::Pointcut { pointcut, advice }
    }

    /// Wraps an advice unit that applies unconditionally.
    pub fn plain(advice: Advice) -> Self {
        Self::Plain { advice }
    }

    /// Wraps an introduction.
    pub fn introduction(advisor: IntroductionAdvisor) -> Self {
        Self::Introduction(advisor)
    }

    /// Equality used by proxy identity: advice implementation type plus
    /// pointcut equality — never advice instance identity.
    pub fn advises_eq(&self, other: &Advisor) -> bool {
        match (self, other) {
            (
                Self::Pointcut {
                    pointcut: p1,
                    advice: a1,
                },
                Self::Pointcut {
                    pointcut: p2,
                    advice: a2,
                },
            ) => a1.impl_type_id() == a2.impl_type_id() && p1 == p2,
            (Self::Plain { advice: a1 }, Self::Plain { advice: a2 }) => {
                a1.impl_type_id() == a2.impl_type_id()
            }
            (Self::Introduction(i1), Self::Introduction(i2)) => {
                let d1 = (i1.dispatcher.as_ref() as &dyn Any).type_id();
                let d2 = (i2.dispatcher.as_ref() as &dyn Any).type_id();
                d1 == d2
                    && i1.interfaces.len() == i2.interfaces.len()
                    && i1
                        .interfaces
                        .iter()
                        .all(|a| i2.interfaces.iter().any(|b| a.name() == b.name()))
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Advisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pointcut { pointcut, advice } => f
                .debug_struct("Advisor::Pointcut")
                .field("pointcut", pointcut)
                .field("advice", advice)
                .finish(),
            Self::Introduction(i) => f
                .debug_struct("Advisor::Introduction")
                .field(
                    "interfaces",
                    &i.interfaces.iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
                )
                .finish(),
            Self::Plain { advice } => f
                .debug_struct("Advisor::Plain")
                .field("advice", advice)
                .finish(),
        }
    }
}

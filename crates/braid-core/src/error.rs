//! Unified error types for the Braid engine.
//!
//! Three families, one per failure surface:
//!
//! - [`ConfigError`] — synchronous misuse of a proxy configuration.
//! - [`ProxyError`] — proxy construction failures.
//! - [`InvokeError`] — call-time failures. Application errors raised by
//!   advice or the receiver travel through [`InvokeError::Raised`] without
//!   wrapping, preserving plain-call transparency.

use thiserror::Error;

/// Errors reported at the point of proxy-configuration misuse.
///
/// These are never retried and never silently dropped: every mutating
/// operation validates before touching the advisor list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration is frozen; advisor mutations are rejected.
    #[error("proxy configuration is frozen")]
    Frozen,

    /// A non-interface type was declared as a proxy interface.
    #[error("'{name}' is not an interface and cannot be proxied as one")]
    NotAnInterface {
        /// The offending type name.
        name: String,
    },

    /// An introduction advisor's dispatcher does not implement an interface
    /// it declares.
    #[error("introduction dispatcher '{dispatcher}' does not implement '{interface}'")]
    IntroductionMismatch {
        /// The dispatcher's class name.
        dispatcher: String,
        /// The declared but unimplemented interface.
        interface: String,
    },

    /// Proxy creation was requested with neither advisors nor a receiver.
    #[error("cannot create proxy: no advisors and no target")]
    NothingToProxy,

    /// An advisor index was out of bounds.
    #[error("advisor index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The advisor list length at the time of the call.
        len: usize,
    },
}

/// Errors raised while constructing a proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Proxy generation failed; carries the original cause when one exists.
    #[error("proxy construction failed: {reason}")]
    Construction {
        /// Human-readable failure description.
        reason: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The underlying configuration was unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProxyError {
    /// Creates a [`ProxyError::Construction`] without an underlying cause.
    pub fn construction(reason: impl Into<String>) -> Self {
        Self::Construction {
            reason: reason.into(),
            source: None,
        }
    }
}

/// Errors surfaced by a proxied call.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// An application error raised by advice or by the terminal call.
    /// Propagates to the caller unchanged.
    #[error(transparent)]
    Raised(Box<dyn std::error::Error + Send + Sync>),

    /// Advice produced a null result for a method whose declared return type
    /// is a non-nullable primitive.
    #[error("null result for primitive return type of {method}")]
    InvalidAdviceResult {
        /// Display form of the offending method.
        method: String,
    },

    /// The terminal call was reached but no receiver was available.
    #[error("no target available for terminal call to {method}")]
    NoTarget {
        /// Display form of the method.
        method: String,
    },

    /// The method is not part of the proxied surface.
    #[error("no such method '{method}' on '{class}'")]
    UnknownMethod {
        /// Display form of the method.
        method: String,
        /// The proxied class name.
        class: String,
    },

    /// An exposure-context accessor was used outside an exposed call.
    #[error("no invocation is exposed on the current thread")]
    NotExposed,
}

impl InvokeError {
    /// Wraps an application error for pass-through propagation.
    pub fn raised(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Raised(Box::new(err))
    }

    /// Wraps a plain message as an application error.
    pub fn msg(msg: impl Into<String>) -> Self {
        #[derive(Debug, Error)]
        #[error("{0}")]
        struct Message(String);
        Self::Raised(Box::new(Message(msg.into())))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for proxy construction.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Result type for proxied calls.
pub type InvokeResult<T> = Result<T, InvokeError>;

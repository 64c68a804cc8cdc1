//! Error type for portal construction and dispatch.
//!
//! The portal originates exactly one failure class itself: a misconfigured
//! binding detected at construction. Every other error is a backend code
//! passed through verbatim inside [`PortalError::Stack`]; the portal never
//! translates, wraps into another code, or retries.

use thiserror::Error;

use crate::{ErrorCode, Operation};

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Errors surfaced by a portal or its factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    /// A binding was built without one of the nine required operations.
    ///
    /// Produced by: `BindingBuilder::build` and `Portal::create`. No handle
    /// exists afterwards and no backend operation has run.
    #[error("Binding is missing the required '{operation}' operation")]
    MissingOperation {
        /// The first absent slot, in canonical order.
        operation: Operation,
    },

    /// The bound backend reported a failure.
    ///
    /// `code` is exactly what the backend returned. The same code is recorded
    /// as the portal's last error.
    #[error("Stack '{operation}' failed: {code}")]
    Stack {
        /// The dispatched operation.
        operation: Operation,
        /// The backend's own error code.
        code: ErrorCode,
    },

    /// Factory configuration could not be parsed or is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl PortalError {
    /// The errno-domain code for this error.
    ///
    /// Configuration problems of either kind map to `EINVAL`; backend failures
    /// return the backend's code unchanged.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingOperation { .. } | Self::Configuration { .. } => {
                ErrorCode::INVALID_ARGUMENT
            }
            Self::Stack { code, .. } => *code,
        }
    }

    /// Returns `true` if the backend reported that the timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Stack { code, .. } if *code == ErrorCode::TIMED_OUT)
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

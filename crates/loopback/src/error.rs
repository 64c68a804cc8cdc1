use thiserror::Error;

/// Errors raised while configuring a loopback stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopbackError {
    /// A property was present but unusable.
    #[error("Invalid value '{value}' for property '{name}': {reason}")]
    InvalidProperty {
        /// The property name.
        name: &'static str,
        /// The rejected value as stored.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

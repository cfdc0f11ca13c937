use thiserror::Error;

/// Errors produced while building policy model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The policy text does not follow the comma-separated grammar.
    #[error("malformed policy '{text}': {reason}")]
    MalformedPolicy {
        /// The offending policy text.
        text: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An attribute label is empty or contains reserved characters.
    #[error("invalid attribute '{0}'")]
    InvalidAttribute(String),

    /// Token claims could not be encoded for signing.
    #[error("unable to encode token claims: {0}")]
    Encoding(String),
}

use abac_policy::{Attribute, AttributeSet};
use thiserror::Error;

/// Errors raised by an [`AttributeCipher`](crate::AttributeCipher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// No public key was published for an attribute the policy requires.
    #[error("no public key for attribute '{0}'")]
    MissingPublicKey(Attribute),

    /// The decryption keys do not cover the ciphertext's policy.
    #[error("missing keys for attributes {0}")]
    InsufficientAttributes(AttributeSet),

    /// Key material or ciphertext bytes are not well formed.
    #[error("malformed {0}")]
    Malformed(&'static str),

    /// Sealing the plaintext failed.
    #[error("encryption failed")]
    Seal,

    /// The ciphertext did not authenticate under the derived key.
    #[error("decryption failed")]
    Open,

    /// An attribute key could not be derived from the master seed.
    #[error("unable to derive key for attribute '{0}'")]
    KeyDerivation(Attribute),

    /// Key material could not be encoded or decoded.
    #[error("key encoding failed: {0}")]
    Encoding(String),
}

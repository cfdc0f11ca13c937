use abac_policy::Policy;
use serde::{Deserialize, Serialize};

/// Content encrypted under a policy.
///
/// The policy travels in the clear so the recipient can tell which attributes
/// it needs before trying to decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// The policy the content was encrypted under.
    pub policy: Policy,
    /// Scheme-specific key encapsulation.
    #[serde(with = "serde_bytes")]
    pub encapsulation: Vec<u8>,
    /// AEAD nonce.
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
    /// Sealed content including the authentication tag.
    #[serde(with = "serde_bytes")]
    pub sealed: Vec<u8>,
}

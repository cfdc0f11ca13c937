//! Attribute-based encryption for policy-protected content.
//!
//! Producers encrypt under a [`Policy`](abac_policy::Policy) with the
//! [`PublicParams`] published by the attribute authority. Consumers decrypt
//! with the [`AttributeKeys`] carried in their token. Both sides talk to the
//! scheme only through the [`AttributeCipher`] trait.
//!
//! [`EcdhCipher`] is the scheme shipped with this crate. Each attribute owns a
//! P-256 keypair derived from the authority's master seed, and a ciphertext
//! can only be opened by someone holding the secret key of every attribute
//! its policy requires.

mod error;
pub use error::*;

mod keys;
pub use keys::*;

mod ciphertext;
pub use ciphertext::*;

mod ecdh;
pub use ecdh::*;

use abac_policy::Policy;

/// An attribute-based encryption scheme.
pub trait AttributeCipher: Send + Sync {
    /// Encrypts `plaintext` so that only holders of every attribute in
    /// `policy` can read it.
    ///
    /// # Errors
    ///
    /// Fails if `params` lacks a public key for a required attribute.
    fn encrypt(
        &self,
        params: &PublicParams,
        policy: &Policy,
        plaintext: &[u8],
    ) -> Result<Ciphertext, CipherError>;

    /// Recovers the plaintext of `ciphertext`.
    ///
    /// # Errors
    ///
    /// Fails if `keys` does not satisfy the ciphertext's policy or the
    /// ciphertext has been altered. No partial plaintext is ever returned.
    fn decrypt(&self, ciphertext: &Ciphertext, keys: &AttributeKeys) -> Result<Vec<u8>, CipherError>;
}

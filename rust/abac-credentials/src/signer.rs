//! Ed25519 signer implementation.

use crate::{CredentialError, PublicKey, Signature};
use std::fmt;

/// An Ed25519 signing key together with its public key.
#[derive(Clone)]
pub struct Signer {
    public_key: PublicKey,
    signer: ed25519_dalek::SigningKey,
}

impl From<ed25519_dalek::SigningKey> for Signer {
    fn from(signer: ed25519_dalek::SigningKey) -> Self {
        let public_key = PublicKey::from(signer.verifying_key());
        Self { public_key, signer }
    }
}

impl Signer {
    /// Generate a new Ed25519 keypair with random bytes from `getrandom`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn generate() -> Result<Self, CredentialError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)?;
        Ok(ed25519_dalek::SigningKey::from_bytes(&seed).into())
    }

    /// Import a keypair from its 32 byte seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed has the wrong length.
    pub fn import(seed: &[u8]) -> Result<Self, CredentialError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| CredentialError::InvalidSeedLength(seed.len()))?;
        Ok(ed25519_dalek::SigningKey::from_bytes(&seed).into())
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign a message.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Signing`] if signing fails.
    pub fn sign(&self, msg: &[u8]) -> Result<Signature, CredentialError> {
        use signature::Signer as _;
        let signature = self
            .signer
            .try_sign(msg)
            .map_err(|error| CredentialError::Signing(error.to_string()))?;
        Ok(signature.into())
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a deterministic test signer from a seed.
    fn test_signer(seed: u8) -> Signer {
        Signer::import(&[seed; 32]).unwrap()
    }

    #[test]
    fn it_produces_verifiable_signatures() {
        let signer = test_signer(42);
        let msg = b"test message for signing";
        let signature = signer.sign(msg).unwrap();
        assert!(signer.public_key().verify(msg, &signature));
    }

    #[test]
    fn it_rejects_signatures_from_other_keys() {
        let alice = test_signer(1);
        let mallory = test_signer(2);
        let signature = mallory.sign(b"payload").unwrap();
        assert!(!alice.public_key().verify(b"payload", &signature));
    }

    #[test]
    fn it_rejects_tampered_messages_and_truncated_signatures() {
        let signer = test_signer(7);
        let signature = signer.sign(b"first message").unwrap();
        assert!(!signer.public_key().verify(b"second message", &signature));

        let truncated = Signature::from_bytes(&signature.as_bytes()[..32]);
        assert!(!signer.public_key().verify(b"first message", &truncated));
    }

    #[test]
    fn it_rejects_short_seeds() {
        assert!(matches!(
            Signer::import(&[0u8; 16]),
            Err(CredentialError::InvalidSeedLength(16))
        ));
    }

    #[test]
    fn it_does_not_print_the_secret_key() {
        let signer = test_signer(9);
        let rendered = format!("{signer:?}");
        assert!(rendered.starts_with("Signer { public_key: PublicKey(z"));
    }
}

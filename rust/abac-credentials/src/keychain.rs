//! In-memory store of the identities owned by a process.

use crate::{Certificate, CredentialError, Signature, Signer};
use abac_common::Name;
use std::{collections::BTreeMap, fmt};

/// A named signing identity together with its self-signed certificate.
#[derive(Clone)]
pub struct Identity {
    name: Name,
    signer: Signer,
    certificate: Certificate,
}

impl Identity {
    /// Creates an identity for `name` backed by `signer`.
    ///
    /// # Errors
    ///
    /// Fails if the certificate cannot be issued.
    pub fn new(name: Name, signer: Signer) -> Result<Self, CredentialError> {
        let certificate = Certificate::issue(name.clone(), &signer)?;
        Ok(Self {
            name,
            signer,
            certificate,
        })
    }

    /// The name this identity acts under.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The certificate to hand to peers.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Signs `msg` with this identity's key.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Signing`] if signing fails.
    pub fn sign(&self, msg: &[u8]) -> Result<Signature, CredentialError> {
        self.signer.sign(msg)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("public_key", self.signer.public_key())
            .finish_non_exhaustive()
    }
}

/// Creates and holds identities, at most one per name.
#[derive(Debug, Default)]
pub struct KeyChain {
    identities: BTreeMap<Name, Identity>,
}

impl KeyChain {
    /// An empty key chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity for `name`, generating a fresh key and
    /// certificate the first time the name is seen.
    ///
    /// # Errors
    ///
    /// Fails if key generation or certificate issuance fails.
    pub fn create_identity(&mut self, name: &Name) -> Result<Identity, CredentialError> {
        if let Some(identity) = self.identities.get(name) {
            return Ok(identity.clone());
        }
        let identity = Identity::new(name.clone(), Signer::generate()?)?;
        self.identities.insert(name.clone(), identity.clone());
        Ok(identity)
    }

    /// Looks up an existing identity.
    pub fn identity(&self, name: &Name) -> Option<&Identity> {
        self.identities.get(name)
    }

    /// Signs `msg` as `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Signing`] if signing fails.
    pub fn sign(&self, msg: &[u8], identity: &Identity) -> Result<Signature, CredentialError> {
        identity.sign(msg)
    }

    /// Checks that `certificate` is self-consistent and that it certifies the
    /// key that produced `signature` over `msg`.
    pub fn verify(certificate: &Certificate, msg: &[u8], signature: &Signature) -> bool {
        certificate.verify_self_signature() && certificate.verify(msg, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_returns_the_same_identity_for_a_name() {
        let mut keychain = KeyChain::new();
        let name = Name::parse("/consumer/alice").unwrap();
        let first = keychain.create_identity(&name).unwrap();
        let second = keychain.create_identity(&name).unwrap();

        assert_eq!(first.certificate(), second.certificate());
        assert!(keychain.identity(&name).is_some());
    }

    #[test]
    fn it_gives_distinct_names_distinct_keys() {
        let mut keychain = KeyChain::new();
        let alice = keychain
            .create_identity(&Name::parse("/alice").unwrap())
            .unwrap();
        let bob = keychain
            .create_identity(&Name::parse("/bob").unwrap())
            .unwrap();

        assert_ne!(
            alice.certificate().public_key(),
            bob.certificate().public_key()
        );
    }

    #[test]
    fn it_verifies_signatures_against_certificates() {
        let mut keychain = KeyChain::new();
        let alice = keychain
            .create_identity(&Name::parse("/alice").unwrap())
            .unwrap();
        let bob = keychain
            .create_identity(&Name::parse("/bob").unwrap())
            .unwrap();
        let signature = keychain.sign(b"request", &alice).unwrap();

        assert!(KeyChain::verify(alice.certificate(), b"request", &signature));
        assert!(!KeyChain::verify(bob.certificate(), b"request", &signature));
        assert!(!KeyChain::verify(alice.certificate(), b"other", &signature));
    }

    #[test]
    fn it_keeps_the_signing_key_out_of_debug_output() {
        let mut keychain = KeyChain::new();
        let alice = keychain
            .create_identity(&Name::parse("/alice").unwrap())
            .unwrap();
        let rendered = format!("{alice:?}");
        assert!(rendered.contains("public_key"));
        assert!(!rendered.contains("signer"));
    }
}

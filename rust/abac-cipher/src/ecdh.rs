//! Reference attribute cipher built on P-256 ECDH and ChaCha20-Poly1305.
//!
//! Encryption picks an ephemeral P-256 key and performs one Diffie-Hellman
//! exchange per attribute in the policy. The shared secrets, taken in
//! attribute order, are hashed together with the ephemeral public key into a
//! content key. The policy text is authenticated as associated data, so a
//! ciphertext cannot be relabelled with a weaker policy.
//!
//! Anyone holding the secret keys of all required attributes recomputes the
//! same secrets. Keys are not bound to a holder, so two consumers pooling
//! their attribute keys can satisfy a policy neither satisfies alone.

use crate::{AttributeCipher, AttributeKeys, CipherError, Ciphertext, PublicParams};
use abac_policy::{AttributeSet, Policy};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{RngCore, rngs::OsRng};

const CONTENT_KEY_CONTEXT: &str = "abac-cipher 2026-01 ecdh content key";
const NONCE_LEN: usize = 12;

/// ECDH based [`AttributeCipher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdhCipher;

impl EcdhCipher {
    /// Creates the cipher.
    pub fn new() -> Self {
        Self
    }
}

struct ContentKey(blake3::Hasher);

impl ContentKey {
    fn new(encapsulation: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(CONTENT_KEY_CONTEXT);
        hasher.update(encapsulation);
        Self(hasher)
    }

    fn absorb(&mut self, label: &str, shared_secret: &[u8]) {
        self.0.update(&(label.len() as u64).to_be_bytes());
        self.0.update(label.as_bytes());
        self.0.update(shared_secret);
    }

    fn finish(self) -> ChaCha20Poly1305 {
        let key = self.0.finalize();
        ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
    }
}

impl AttributeCipher for EcdhCipher {
    fn encrypt(
        &self,
        params: &PublicParams,
        policy: &Policy,
        plaintext: &[u8],
    ) -> Result<Ciphertext, CipherError> {
        let ephemeral = p256::ecdh::EphemeralSecret::random(&mut OsRng);
        let encapsulation = ephemeral
            .public_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();

        let mut content_key = ContentKey::new(&encapsulation);
        for attribute in policy.required() {
            let public_key = params
                .get(attribute)
                .ok_or_else(|| CipherError::MissingPublicKey(attribute.clone()))?;
            let shared = ephemeral.diffie_hellman(public_key.inner());
            content_key.absorb(attribute.as_str(), shared.raw_secret_bytes());
        }

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let aad = policy.to_string();
        let sealed = content_key
            .finish()
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| CipherError::Seal)?;

        Ok(Ciphertext {
            policy: policy.clone(),
            encapsulation,
            nonce: nonce.to_vec(),
            sealed,
        })
    }

    fn decrypt(&self, ciphertext: &Ciphertext, keys: &AttributeKeys) -> Result<Vec<u8>, CipherError> {
        let missing: AttributeSet = ciphertext
            .policy
            .missing(&keys.attributes())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CipherError::InsufficientAttributes(missing));
        }
        if ciphertext.nonce.len() != NONCE_LEN {
            return Err(CipherError::Malformed("nonce"));
        }
        let ephemeral = p256::PublicKey::from_sec1_bytes(&ciphertext.encapsulation)
            .map_err(|_| CipherError::Malformed("encapsulation"))?;

        let mut content_key = ContentKey::new(&ciphertext.encapsulation);
        for attribute in ciphertext.policy.required() {
            let secret = keys
                .get(attribute)
                .ok_or_else(|| CipherError::InsufficientAttributes([attribute.clone()].into_iter().collect()))?;
            let shared = p256::ecdh::diffie_hellman(
                secret.inner().to_nonzero_scalar(),
                ephemeral.as_affine(),
            );
            content_key.absorb(attribute.as_str(), shared.raw_secret_bytes());
        }

        let aad = ciphertext.policy.to_string();
        content_key
            .finish()
            .decrypt(
                Nonce::from_slice(&ciphertext.nonce),
                Payload {
                    msg: &ciphertext.sealed,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| CipherError::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthorityKeys;
    use abac_policy::Attribute;
    use testresult::TestResult;

    fn attributes(labels: &[&str]) -> AttributeSet {
        labels
            .iter()
            .map(|label| Attribute::new(*label).unwrap())
            .collect()
    }

    fn seal(authority: &AuthorityKeys, policy: &Policy, plaintext: &[u8]) -> Ciphertext {
        let params = authority.public_params(policy.required()).unwrap();
        EcdhCipher.encrypt(&params, policy, plaintext).unwrap()
    }

    #[test]
    fn it_decrypts_with_a_satisfying_key_set() -> TestResult {
        let authority = AuthorityKeys::from_seed([9; 32]);
        let policy = Policy::parse("role:doctor,ward:icu")?;
        let ciphertext = seal(&authority, &policy, b"patient record");

        let keys = authority.attribute_keys(&attributes(&["role:doctor", "ward:icu", "shift:night"]))?;
        assert_eq!(EcdhCipher.decrypt(&ciphertext, &keys)?, b"patient record");
        Ok(())
    }

    #[test]
    fn it_refuses_an_insufficient_key_set() -> TestResult {
        let authority = AuthorityKeys::from_seed([9; 32]);
        let policy = Policy::parse("role:doctor,ward:icu")?;
        let ciphertext = seal(&authority, &policy, b"patient record");

        let keys = authority.attribute_keys(&attributes(&["role:doctor"]))?;
        assert_eq!(
            EcdhCipher.decrypt(&ciphertext, &keys),
            Err(CipherError::InsufficientAttributes(attributes(&["ward:icu"])))
        );
        Ok(())
    }

    #[test]
    fn it_refuses_keys_from_another_authority() -> TestResult {
        let authority = AuthorityKeys::from_seed([9; 32]);
        let impostor = AuthorityKeys::from_seed([10; 32]);
        let policy = Policy::parse("role:doctor")?;
        let ciphertext = seal(&authority, &policy, b"patient record");

        let keys = impostor.attribute_keys(&attributes(&["role:doctor"]))?;
        assert_eq!(EcdhCipher.decrypt(&ciphertext, &keys), Err(CipherError::Open));
        Ok(())
    }

    #[test]
    fn it_detects_tampering() -> TestResult {
        let authority = AuthorityKeys::from_seed([11; 32]);
        let policy = Policy::parse("role:doctor,ward:icu")?;
        let keys = authority.attribute_keys(policy.required())?;

        let mut flipped = seal(&authority, &policy, b"patient record");
        flipped.sealed[0] ^= 0x01;
        assert_eq!(EcdhCipher.decrypt(&flipped, &keys), Err(CipherError::Open));

        // Relabelling with a weaker policy changes the associated data.
        let mut relabelled = seal(&authority, &policy, b"patient record");
        relabelled.policy = Policy::parse("role:doctor")?;
        assert_eq!(EcdhCipher.decrypt(&relabelled, &keys), Err(CipherError::Open));

        let mut truncated = seal(&authority, &policy, b"patient record");
        truncated.nonce.truncate(4);
        assert_eq!(
            EcdhCipher.decrypt(&truncated, &keys),
            Err(CipherError::Malformed("nonce"))
        );
        Ok(())
    }

    #[test]
    fn it_opens_public_content_without_keys() -> TestResult {
        let authority = AuthorityKeys::from_seed([12; 32]);
        let policy = Policy::public();
        let ciphertext = seal(&authority, &policy, b"press release");

        assert_eq!(
            EcdhCipher.decrypt(&ciphertext, &AttributeKeys::default())?,
            b"press release"
        );
        Ok(())
    }

    #[test]
    fn it_requires_public_keys_for_every_attribute() -> TestResult {
        let authority = AuthorityKeys::from_seed([13; 32]);
        let params = authority.public_params(&attributes(&["role:doctor"]))?;
        let policy = Policy::parse("role:doctor,ward:icu")?;

        assert_eq!(
            EcdhCipher.encrypt(&params, &policy, b"x"),
            Err(CipherError::MissingPublicKey(Attribute::new("ward:icu")?))
        );
        Ok(())
    }

    #[test]
    fn it_produces_fresh_ciphertext_each_time() -> TestResult {
        let authority = AuthorityKeys::from_seed([14; 32]);
        let policy = Policy::parse("role:doctor")?;
        let first = seal(&authority, &policy, b"same");
        let second = seal(&authority, &policy, b"same");

        assert_ne!(first.encapsulation, second.encapsulation);
        assert_ne!(first.sealed, second.sealed);
        Ok(())
    }
}

//! Attribute key material.
//!
//! The authority holds a single 32 byte master seed. The secret key of an
//! attribute is a P-256 scalar derived from the seed and the attribute label,
//! so keys never need to be stored and are stable for the life of the seed.

use crate::CipherError;
use abac_policy::{Attribute, AttributeSet};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::{ByteBuf, Bytes};
use std::{collections::BTreeMap, fmt};

const ATTRIBUTE_KEY_CONTEXT: &str = "abac-cipher 2026-01 attribute secret key";

/// The attribute authority's master secret.
#[derive(Clone)]
pub struct AuthorityKeys {
    seed: [u8; 32],
}

impl AuthorityKeys {
    /// A fresh master seed from the operating system RNG.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self { seed }
    }

    /// Rebuilds the authority keys from a known seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    /// The secret key for `attribute`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::KeyDerivation`] in the negligible case where the
    /// derived bytes are not a valid scalar.
    pub fn secret_key(&self, attribute: &Attribute) -> Result<AttributeSecretKey, CipherError> {
        let mut material = Vec::with_capacity(self.seed.len() + attribute.as_str().len());
        material.extend_from_slice(&self.seed);
        material.extend_from_slice(attribute.as_str().as_bytes());
        let derived = blake3::derive_key(ATTRIBUTE_KEY_CONTEXT, &material);
        p256::SecretKey::from_slice(&derived)
            .map(AttributeSecretKey)
            .map_err(|_| CipherError::KeyDerivation(attribute.clone()))
    }

    /// The public key for `attribute`.
    ///
    /// # Errors
    ///
    /// See [`AuthorityKeys::secret_key`].
    pub fn public_key(&self, attribute: &Attribute) -> Result<AttributePublicKey, CipherError> {
        Ok(self.secret_key(attribute)?.public_key())
    }

    /// Public parameters covering `attributes`.
    ///
    /// # Errors
    ///
    /// See [`AuthorityKeys::secret_key`].
    pub fn public_params(&self, attributes: &AttributeSet) -> Result<PublicParams, CipherError> {
        let mut params = PublicParams::default();
        for attribute in attributes {
            params.insert(attribute.clone(), self.public_key(attribute)?);
        }
        Ok(params)
    }

    /// Decryption keys for `attributes`.
    ///
    /// # Errors
    ///
    /// See [`AuthorityKeys::secret_key`].
    pub fn attribute_keys(&self, attributes: &AttributeSet) -> Result<AttributeKeys, CipherError> {
        let mut keys = AttributeKeys::default();
        for attribute in attributes {
            keys.insert(attribute.clone(), self.secret_key(attribute)?);
        }
        Ok(keys)
    }
}

impl fmt::Debug for AuthorityKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityKeys").finish_non_exhaustive()
    }
}

/// The public half of an attribute key, encoded as a compressed SEC1 point.
#[derive(Clone, PartialEq, Eq)]
pub struct AttributePublicKey(p256::PublicKey);

impl AttributePublicKey {
    pub(crate) fn inner(&self) -> &p256::PublicKey {
        &self.0
    }

    /// Compressed SEC1 encoding.
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Parses a SEC1 encoded point.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Malformed`] if the bytes are not a P-256 point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CipherError::Malformed("attribute public key"))
    }
}

impl fmt::Debug for AttributePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_sec1_bytes();
        write!(f, "AttributePublicKey(")?;
        for byte in bytes.iter().take(8) {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

impl Serialize for AttributePublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Bytes::new(&self.to_sec1_bytes()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttributePublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = ByteBuf::deserialize(deserializer)?;
        Self::from_sec1_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// The secret half of an attribute key.
#[derive(Clone)]
pub struct AttributeSecretKey(p256::SecretKey);

impl AttributeSecretKey {
    pub(crate) fn inner(&self) -> &p256::SecretKey {
        &self.0
    }

    /// The matching public key.
    pub fn public_key(&self) -> AttributePublicKey {
        AttributePublicKey(self.0.public_key())
    }
}

impl PartialEq for AttributeSecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for AttributeSecretKey {}

impl fmt::Debug for AttributeSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttributeSecretKey(..)")
    }
}

impl Serialize for AttributeSecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Bytes::new(self.0.to_bytes().as_slice()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttributeSecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = ByteBuf::deserialize(deserializer)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::invalid_length(bytes.len(), &"32 bytes"));
        }
        p256::SecretKey::from_slice(&bytes)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Public keys for a set of attributes, as published by the authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicParams(BTreeMap<Attribute, AttributePublicKey>);

impl PublicParams {
    /// Adds or replaces the key for `attribute`.
    pub fn insert(&mut self, attribute: Attribute, key: AttributePublicKey) {
        self.0.insert(attribute, key);
    }

    /// The key for `attribute`, if published.
    pub fn get(&self, attribute: &Attribute) -> Option<&AttributePublicKey> {
        self.0.get(attribute)
    }

    /// The attributes these parameters cover.
    pub fn attributes(&self) -> AttributeSet {
        self.0.keys().cloned().collect()
    }

    /// Whether a key is published for every attribute in `attributes`.
    pub fn covers(&self, attributes: &AttributeSet) -> bool {
        attributes.iter().all(|attribute| self.0.contains_key(attribute))
    }
}

/// Secret keys for a consumer's attributes.
///
/// Travels inside a token as opaque capability bytes, see
/// [`AttributeKeys::to_bytes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeKeys(BTreeMap<Attribute, AttributeSecretKey>);

impl AttributeKeys {
    /// Adds or replaces the key for `attribute`.
    pub fn insert(&mut self, attribute: Attribute, key: AttributeSecretKey) {
        self.0.insert(attribute, key);
    }

    /// The key for `attribute`, if held.
    pub fn get(&self, attribute: &Attribute) -> Option<&AttributeSecretKey> {
        self.0.get(attribute)
    }

    /// The attributes these keys unlock.
    pub fn attributes(&self) -> AttributeSet {
        self.0.keys().cloned().collect()
    }

    /// DAG-CBOR encoding used as a token capability.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encoding`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CipherError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|error| CipherError::Encoding(error.to_string()))
    }

    /// Decodes keys from a token capability.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encoding`] if the bytes are not attribute keys.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        serde_ipld_dagcbor::from_slice(bytes).map_err(|error| CipherError::Encoding(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute(label: &str) -> Attribute {
        Attribute::new(label).unwrap()
    }

    #[test]
    fn it_derives_stable_keys_from_the_seed() {
        let first = AuthorityKeys::from_seed([1; 32]);
        let second = AuthorityKeys::from_seed([1; 32]);
        let other = AuthorityKeys::from_seed([2; 32]);
        let doctor = attribute("role:doctor");

        assert_eq!(
            first.public_key(&doctor).unwrap(),
            second.public_key(&doctor).unwrap()
        );
        assert_ne!(
            first.public_key(&doctor).unwrap(),
            other.public_key(&doctor).unwrap()
        );
        assert_ne!(
            first.public_key(&doctor).unwrap(),
            first.public_key(&attribute("role:nurse")).unwrap()
        );
    }

    #[test]
    fn it_carries_keys_through_capability_bytes() {
        let authority = AuthorityKeys::from_seed([3; 32]);
        let attributes: AttributeSet = [attribute("role:doctor"), attribute("ward:icu")]
            .into_iter()
            .collect();
        let keys = authority.attribute_keys(&attributes).unwrap();

        let decoded = AttributeKeys::from_bytes(&keys.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, keys);
        assert_eq!(decoded.attributes(), attributes);
    }

    #[test]
    fn it_reports_coverage_of_public_params() {
        let authority = AuthorityKeys::from_seed([4; 32]);
        let doctor: AttributeSet = [attribute("role:doctor")].into_iter().collect();
        let both: AttributeSet = [attribute("role:doctor"), attribute("ward:icu")]
            .into_iter()
            .collect();
        let params = authority.public_params(&doctor).unwrap();

        assert!(params.covers(&doctor));
        assert!(!params.covers(&both));
        assert!(params.covers(&AttributeSet::new()));
    }

    #[test]
    fn it_never_prints_secret_material() {
        let authority = AuthorityKeys::from_seed([5; 32]);
        let secret = authority.secret_key(&attribute("role:doctor")).unwrap();
        assert_eq!(format!("{secret:?}"), "AttributeSecretKey(..)");
        assert_eq!(format!("{authority:?}"), "AuthorityKeys { .. }");
    }
}

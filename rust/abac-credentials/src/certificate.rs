//! Self-signed certificates binding a [`Name`] to a [`PublicKey`].
//!
//! A certificate is the public face of an [`Identity`](crate::Identity). It is
//! signed by the key it certifies, so anyone holding it can check that the
//! name and key were put together by the key's owner. Whether that owner is
//! *trusted* is left to the caller.
//!
//! On disk a certificate is the base64 text of its DAG-CBOR encoding.

use crate::{CredentialError, PublicKey, Signature, Signer};
use abac_common::{Name, Timestamp};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize)]
struct CertificateBody<'a> {
    name: &'a Name,
    public_key: &'a PublicKey,
    issued_at: Timestamp,
}

/// A self-signed binding of a name to an Ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    name: Name,
    public_key: PublicKey,
    issued_at: Timestamp,
    signature: Signature,
}

impl Certificate {
    /// Issue a certificate for `name` signed by `signer`.
    ///
    /// # Errors
    ///
    /// Fails if the body cannot be encoded or signing fails.
    pub fn issue(name: Name, signer: &Signer) -> Result<Self, CredentialError> {
        let public_key = *signer.public_key();
        let issued_at = Timestamp::now();
        let body = body_bytes(&name, &public_key, issued_at)?;
        let signature = signer.sign(&body)?;
        Ok(Self {
            name,
            public_key,
            issued_at,
            signature,
        })
    }

    /// The certified name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Alias for [`Certificate::name`]; the name is the identity.
    pub fn identity(&self) -> &Name {
        &self.name
    }

    /// The certified public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// When the certificate was issued.
    pub fn issued_at(&self) -> Timestamp {
        self.issued_at
    }

    /// Checks that the certificate was signed by the key it certifies.
    pub fn verify_self_signature(&self) -> bool {
        match body_bytes(&self.name, &self.public_key, self.issued_at) {
            Ok(body) => self.public_key.verify(&body, &self.signature),
            Err(_) => false,
        }
    }

    /// Checks that the certificate is well formed and certifies `name`.
    pub fn verify_for(&self, name: &Name) -> bool {
        &self.name == name && self.verify_self_signature()
    }

    /// Verifies `signature` over `msg` with the certified key.
    pub fn verify(&self, msg: &[u8], signature: &Signature) -> bool {
        self.public_key.verify(msg, signature)
    }

    /// Encodes the certificate as DAG-CBOR.
    ///
    /// # Errors
    ///
    /// Fails if the encoder rejects the certificate.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CredentialError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|error| CredentialError::Encoding(error.to_string()))
    }

    /// Decodes a certificate from DAG-CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Decoding`] if the bytes are not a
    /// certificate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        serde_ipld_dagcbor::from_slice(bytes)
            .map_err(|error| CredentialError::Decoding(error.to_string()))
    }

    /// The base64 text form used for certificate files.
    ///
    /// # Errors
    ///
    /// Fails if the certificate cannot be encoded.
    pub fn to_base64(&self) -> Result<String, CredentialError> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    /// Parses the base64 text form. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Decoding`] on invalid text.
    pub fn from_base64(text: &str) -> Result<Self, CredentialError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|error| CredentialError::Decoding(error.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

fn body_bytes(
    name: &Name,
    public_key: &PublicKey,
    issued_at: Timestamp,
) -> Result<Vec<u8>, CredentialError> {
    serde_ipld_dagcbor::to_vec(&CertificateBody {
        name,
        public_key,
        issued_at,
    })
    .map_err(|error| CredentialError::Encoding(error.to_string()))
}

/// Writes `certificate` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`CredentialError::Io`] if the file cannot be written.
pub fn save(certificate: &Certificate, path: impl AsRef<Path>) -> Result<(), CredentialError> {
    let path = path.as_ref();
    let io = |source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    let mut text = certificate.to_base64()?;
    text.push('\n');
    std::fs::write(path, text).map_err(io)
}

/// Reads a certificate previously written with [`save`].
///
/// The certificate is decoded but not verified.
///
/// # Errors
///
/// Returns [`CredentialError::Io`] if the file cannot be read, or
/// [`CredentialError::Decoding`] if it does not hold a certificate.
pub fn load(path: impl AsRef<Path>) -> Result<Certificate, CredentialError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Certificate::from_base64(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Name {
        Name::parse(text).unwrap()
    }

    #[test]
    fn it_verifies_a_fresh_certificate() {
        let signer = Signer::import(&[3; 32]).unwrap();
        let certificate = Certificate::issue(name("/hospital/alice"), &signer).unwrap();

        assert!(certificate.verify_self_signature());
        assert!(certificate.verify_for(&name("/hospital/alice")));
        assert!(!certificate.verify_for(&name("/hospital/bob")));
        assert_eq!(certificate.public_key(), signer.public_key());
    }

    #[test]
    fn it_detects_a_swapped_name() {
        let signer = Signer::import(&[4; 32]).unwrap();
        let mut certificate = Certificate::issue(name("/alice"), &signer).unwrap();
        certificate.name = name("/mallory");

        assert!(!certificate.verify_self_signature());
        assert!(!certificate.verify_for(&name("/mallory")));
    }

    #[test]
    fn it_detects_a_swapped_key() {
        let alice = Signer::import(&[5; 32]).unwrap();
        let mallory = Signer::import(&[6; 32]).unwrap();
        let mut certificate = Certificate::issue(name("/alice"), &alice).unwrap();
        certificate.public_key = *mallory.public_key();

        assert!(!certificate.verify_self_signature());
    }

    #[test]
    fn it_round_trips_through_base64() {
        let signer = Signer::import(&[7; 32]).unwrap();
        let certificate = Certificate::issue(name("/producer"), &signer).unwrap();
        let text = certificate.to_base64().unwrap();

        let decoded = Certificate::from_base64(&format!("  {text}\n")).unwrap();
        assert_eq!(decoded, certificate);
        assert!(decoded.verify_self_signature());
    }

    #[test]
    fn it_rejects_garbage_text() {
        assert!(matches!(
            Certificate::from_base64("not a certificate"),
            Err(CredentialError::Decoding(_))
        ));
        assert!(matches!(
            Certificate::from_base64(&STANDARD.encode(b"\x01\x02\x03")),
            Err(CredentialError::Decoding(_))
        ));
    }
}

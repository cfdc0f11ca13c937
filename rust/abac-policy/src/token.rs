use crate::{AttributeSet, PolicyError};
use abac_common::{Name, Timestamp};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// The interval during which a token is meant to be used.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    not_before: Timestamp,
    not_after: Timestamp,
}

impl ValidityWindow {
    /// A window opening at `issued_at` and lasting `validity`.
    #[must_use]
    pub fn starting_at(issued_at: Timestamp, validity: Duration) -> Self {
        Self {
            not_before: issued_at,
            not_after: issued_at.saturating_add(validity),
        }
    }

    /// Earliest time the token is valid.
    pub fn not_before(&self) -> Timestamp {
        self.not_before
    }

    /// Latest time the token is valid.
    pub fn not_after(&self) -> Timestamp {
        self.not_after
    }

    /// Whether `at` falls within the window.
    pub fn contains(&self, at: Timestamp) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// The signed portion of a [`Token`].
///
/// `capability` is the decryption material bound to `attributes`. Its
/// format belongs to the cipher in use and is opaque here.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Name of the issuing token issuer.
    pub issuer: Name,
    /// Name of the consumer the token was issued to.
    pub consumer: Name,
    /// Attributes disclosed by this token.
    pub attributes: AttributeSet,
    /// When the token is meant to be used.
    pub window: ValidityWindow,
    /// Opaque decryption material for `attributes`.
    #[serde(with = "serde_bytes")]
    pub capability: Vec<u8>,
}

impl TokenClaims {
    /// Canonical DAG-CBOR encoding of the claims, used as signing input.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Encoding`] if the claims cannot be encoded.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, PolicyError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|error| PolicyError::Encoding(error.to_string()))
    }
}

// The capability is secret key material and never appears in logs.
impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("issuer", &self.issuer)
            .field("consumer", &self.consumer)
            .field("attributes", &self.attributes)
            .field("window", &self.window)
            .field("capability", &format_args!("<{} bytes>", self.capability.len()))
            .finish()
    }
}

/// A signed capability binding a consumer identity to a set of attributes.
///
/// Tokens are created by a token issuer and handed only to the consumer they
/// name. Verifying [`Token::signature`] against the issuer's key is left to
/// the holder; this type only carries the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    claims: TokenClaims,
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,
}

impl Token {
    /// Assemble a token from its claims and the issuer's signature over
    /// [`TokenClaims::signing_bytes`].
    #[must_use]
    pub fn new(claims: TokenClaims, signature: Vec<u8>) -> Self {
        Self { claims, signature }
    }

    /// The signed claims.
    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// The issuer's signature over the claims.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The consumer this token was issued to.
    pub fn consumer(&self) -> &Name {
        &self.claims.consumer
    }

    /// The attributes this token discloses.
    pub fn attributes(&self) -> &AttributeSet {
        &self.claims.attributes
    }

    /// Whether `at` falls within the token's validity window.
    pub fn is_valid_at(&self, at: Timestamp) -> bool {
        self.claims.window.contains(at)
    }
}

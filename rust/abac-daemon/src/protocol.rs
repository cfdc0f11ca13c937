//! Messages exchanged between roles.
//!
//! Every request is a [`ServiceRequest`] and every answer a [`ServiceReply`],
//! both encoded as DAG-CBOR. Requests that assert an identity carry an
//! Ed25519 signature over a canonical tuple that includes the destination
//! name, so a signed request cannot be redirected to another role.

use crate::{AbacError, ErrorCategory};
use abac_cipher::{AttributeKeys, Ciphertext, PublicParams};
use abac_common::{Name, Timestamp};
use abac_credentials::{Certificate, Identity, Signature};
use abac_network::TransportError;
use abac_policy::{AttributeSet, Token};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// A request addressed to one of the roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRequest {
    /// Producer to authority: public keys for a policy's attributes.
    PublicParams {
        /// The attributes to publish keys for.
        attributes: AttributeSet,
    },
    /// Token issuer to authority: decryption keys for a consumer.
    AttributeKeys(AttributeKeysRequest),
    /// Consumer to token issuer: a capability token.
    Token(TokenRequest),
    /// Data owner to producer: attach a policy to a data name.
    SetPolicy(SetPolicyCommand),
    /// Consumer to producer: the content named by the request name.
    Fetch,
}

/// The answer to a [`ServiceRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceReply {
    /// Public keys for the requested attributes.
    PublicParams(PublicParams),
    /// Decryption keys for the requested attributes.
    AttributeKeys(AttributeKeys),
    /// A token and the certificate needed to verify it.
    Token {
        /// The signed token.
        token: Token,
        /// The issuer's certificate.
        issuer_certificate: Certificate,
    },
    /// The command was applied.
    Ack,
    /// Policy-encrypted content.
    Content(Ciphertext),
    /// The request failed.
    Rejected {
        /// Stable failure category.
        category: ErrorCategory,
        /// Human-readable context.
        detail: String,
    },
}

impl ServiceReply {
    /// The reply carrying `error`.
    pub fn rejected(error: AbacError) -> Self {
        ServiceReply::Rejected {
            category: error.category(),
            detail: error.detail().to_owned(),
        }
    }

    /// Turns a `Rejected` reply back into the error it carries.
    ///
    /// # Errors
    ///
    /// Returns the carried [`AbacError`] for `Rejected` replies.
    pub fn into_result(self) -> Result<Self, AbacError> {
        match self {
            ServiceReply::Rejected { category, detail } => Err(AbacError::new(category, detail)),
            reply => Ok(reply),
        }
    }
}

/// Signed request for the decryption keys of a consumer's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeKeysRequest {
    /// The requesting token issuer.
    pub issuer: Name,
    /// The consumer the keys are meant for.
    pub consumer: Name,
    /// The attributes to derive keys for.
    pub attributes: AttributeSet,
    /// When the request was made.
    pub issued_at: Timestamp,
    /// The issuer's signature over [`AttributeKeysRequest::signing_bytes`].
    pub signature: Signature,
}

impl AttributeKeysRequest {
    /// Builds a request signed by `issuer` for delivery to `destination`.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be encoded or signed.
    pub fn signed(
        issuer: &Identity,
        destination: &Name,
        consumer: Name,
        attributes: AttributeSet,
    ) -> Result<Self, AbacError> {
        let mut request = Self {
            issuer: issuer.name().clone(),
            consumer,
            attributes,
            issued_at: Timestamp::now(),
            signature: Signature::from_bytes(Vec::new()),
        };
        request.signature = sign(issuer, &request.signing_bytes(destination)?)?;
        Ok(request)
    }

    /// Canonical bytes covered by the signature.
    ///
    /// # Errors
    ///
    /// Fails if the fields cannot be encoded.
    pub fn signing_bytes(&self, destination: &Name) -> Result<Vec<u8>, AbacError> {
        encode(&(
            "attribute-keys",
            destination,
            &self.issuer,
            &self.consumer,
            &self.attributes,
            self.issued_at,
        ))
    }
}

/// Signed request for a capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// The claimed consumer identity.
    pub consumer: Name,
    /// The certificate proving the identity.
    pub certificate: Certificate,
    /// When the request was made.
    pub issued_at: Timestamp,
    /// The consumer's signature over [`TokenRequest::signing_bytes`].
    pub signature: Signature,
}

impl TokenRequest {
    /// Builds a token request signed by `consumer` for `destination`.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be encoded or signed.
    pub fn signed(consumer: &Identity, destination: &Name) -> Result<Self, AbacError> {
        let mut request = Self {
            consumer: consumer.name().clone(),
            certificate: consumer.certificate().clone(),
            issued_at: Timestamp::now(),
            signature: Signature::from_bytes(Vec::new()),
        };
        request.signature = sign(consumer, &request.signing_bytes(destination)?)?;
        Ok(request)
    }

    /// Canonical bytes covered by the signature.
    ///
    /// # Errors
    ///
    /// Fails if the fields cannot be encoded.
    pub fn signing_bytes(&self, destination: &Name) -> Result<Vec<u8>, AbacError> {
        encode(&("token", destination, &self.consumer, self.issued_at))
    }
}

/// Signed command attaching a policy to a data name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPolicyCommand {
    /// The commanding data owner.
    pub owner: Name,
    /// The data name, relative to the producer.
    pub data_name: Name,
    /// Policy text, parsed by the producer.
    pub policy: String,
    /// When the command was made.
    pub issued_at: Timestamp,
    /// The owner's signature over [`SetPolicyCommand::signing_bytes`].
    pub signature: Signature,
}

impl SetPolicyCommand {
    /// Builds a command signed by `owner` for the producer `destination`.
    ///
    /// # Errors
    ///
    /// Fails if the command cannot be encoded or signed.
    pub fn signed(
        owner: &Identity,
        destination: &Name,
        data_name: Name,
        policy: String,
    ) -> Result<Self, AbacError> {
        let mut command = Self {
            owner: owner.name().clone(),
            data_name,
            policy,
            issued_at: Timestamp::now(),
            signature: Signature::from_bytes(Vec::new()),
        };
        command.signature = sign(owner, &command.signing_bytes(destination)?)?;
        Ok(command)
    }

    /// Canonical bytes covered by the signature.
    ///
    /// # Errors
    ///
    /// Fails if the fields cannot be encoded.
    pub fn signing_bytes(&self, destination: &Name) -> Result<Vec<u8>, AbacError> {
        encode(&(
            "set-policy",
            destination,
            &self.owner,
            &self.data_name,
            &self.policy,
            self.issued_at,
        ))
    }
}

fn sign(identity: &Identity, bytes: &[u8]) -> Result<Signature, AbacError> {
    identity
        .sign(bytes)
        .map_err(|error| AbacError::new(ErrorCategory::MalformedRequest, error.to_string()))
}

/// Encodes a message as DAG-CBOR.
///
/// # Errors
///
/// Returns [`ErrorCategory::MalformedRequest`] if encoding fails.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, AbacError> {
    serde_ipld_dagcbor::to_vec(message)
        .map_err(|error| AbacError::new(ErrorCategory::MalformedRequest, error.to_string()))
}

/// Decodes a DAG-CBOR message.
///
/// # Errors
///
/// Returns [`ErrorCategory::MalformedRequest`] if the bytes are not a `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AbacError> {
    serde_ipld_dagcbor::from_slice(bytes)
        .map_err(|error| AbacError::new(ErrorCategory::MalformedRequest, error.to_string()))
}

/// Why an exchange with another role produced no usable reply.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The request never got an answer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The answer was not a reply the caller understands.
    #[error("unusable reply: {0}")]
    Garbled(String),

    /// The peer answered with a rejection.
    #[error(transparent)]
    Rejected(AbacError),
}

impl ExchangeError {
    /// Converts to an [`AbacError`], classifying a missing or unusable
    /// answer as `unreachable` and passing rejections through unchanged.
    pub fn or_unreachable(self, unreachable: ErrorCategory) -> AbacError {
        match self {
            ExchangeError::Rejected(error) => error,
            other => AbacError::new(unreachable, other.to_string()),
        }
    }

    /// Shorthand for a reply of the wrong kind.
    pub fn unexpected(reply: &ServiceReply) -> Self {
        let kind = match reply {
            ServiceReply::PublicParams(_) => "PublicParams",
            ServiceReply::AttributeKeys(_) => "AttributeKeys",
            ServiceReply::Token { .. } => "Token",
            ServiceReply::Ack => "Ack",
            ServiceReply::Content(_) => "Content",
            ServiceReply::Rejected { .. } => "Rejected",
        };
        ExchangeError::Garbled(format!("unexpected {kind} reply"))
    }
}

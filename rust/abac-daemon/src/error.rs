//! Error taxonomy shared by every role.
//!
//! Each failed operation ends in exactly one [`ErrorCategory`]. Categories
//! travel on the wire in `Rejected` replies and are what a caller inspects to
//! decide whether to retry, re-authenticate or give up.

use abac_policy::PolicyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    // Authentication
    /// The presented certificate or signature does not prove the claimed name.
    IdentityMismatch,
    /// The token issuer has no attributes or certificate for the consumer.
    UnknownConsumer,

    // Configuration and input
    /// An attribute is outside the authority's vocabulary.
    UnknownAttribute,
    /// Policy text does not follow the policy grammar.
    MalformedPolicy,
    /// A request could not be decoded or is not served by the receiver.
    MalformedRequest,

    // Producer
    /// No policy is set for the requested data name.
    NoPolicyDefined,
    /// A policy exists but no content is registered under the name.
    ContentNotFound,
    /// The producer refused a set-policy command.
    PolicyRejected,
    /// The producer cannot obtain encryption parameters.
    EncryptionUnavailable,

    // Reachability
    /// The attribute authority did not answer.
    AuthorityUnreachable,
    /// The token issuer did not answer.
    TokenIssuerUnreachable,
    /// The producer did not answer.
    ProducerUnreachable,

    // Consumer
    /// The token does not unlock the content, or the content is corrupt.
    DecryptionFailed,
}

impl ErrorCategory {
    /// The category name, e.g. `NoPolicyDefined`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::IdentityMismatch => "IdentityMismatch",
            ErrorCategory::UnknownConsumer => "UnknownConsumer",
            ErrorCategory::UnknownAttribute => "UnknownAttribute",
            ErrorCategory::MalformedPolicy => "MalformedPolicy",
            ErrorCategory::MalformedRequest => "MalformedRequest",
            ErrorCategory::NoPolicyDefined => "NoPolicyDefined",
            ErrorCategory::ContentNotFound => "ContentNotFound",
            ErrorCategory::PolicyRejected => "PolicyRejected",
            ErrorCategory::EncryptionUnavailable => "EncryptionUnavailable",
            ErrorCategory::AuthorityUnreachable => "AuthorityUnreachable",
            ErrorCategory::TokenIssuerUnreachable => "TokenIssuerUnreachable",
            ErrorCategory::ProducerUnreachable => "ProducerUnreachable",
            ErrorCategory::DecryptionFailed => "DecryptionFailed",
        }
    }

    /// Whether repeating the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::EncryptionUnavailable
                | ErrorCategory::AuthorityUnreachable
                | ErrorCategory::TokenIssuerUnreachable
                | ErrorCategory::ProducerUnreachable
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed role operation: its category plus human-readable context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category}: {detail}")]
pub struct AbacError {
    category: ErrorCategory,
    detail: String,
}

impl AbacError {
    /// Creates an error of `category`.
    pub fn new(category: ErrorCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            detail: detail.into(),
        }
    }

    /// The stable category.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Context for logs and operators.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Keeps the detail but reclassifies the error.
    #[must_use]
    pub fn recategorize(self, category: ErrorCategory) -> Self {
        Self { category, ..self }
    }
}

impl From<PolicyError> for AbacError {
    fn from(error: PolicyError) -> Self {
        let category = match error {
            PolicyError::MalformedPolicy { .. } => ErrorCategory::MalformedPolicy,
            PolicyError::InvalidAttribute(_) | PolicyError::Encoding(_) => {
                ErrorCategory::MalformedRequest
            }
        };
        Self::new(category, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_uses_screaming_case_on_the_wire() {
        let encoded = serde_ipld_dagcbor::to_vec(&ErrorCategory::NoPolicyDefined).unwrap();
        let text: String = serde_ipld_dagcbor::from_slice(&encoded).unwrap();
        assert_eq!(text, "NO_POLICY_DEFINED");
        assert_eq!(ErrorCategory::NoPolicyDefined.to_string(), "NoPolicyDefined");
    }

    #[test]
    fn it_marks_only_reachability_failures_as_retryable() {
        assert!(ErrorCategory::ProducerUnreachable.is_retryable());
        assert!(ErrorCategory::EncryptionUnavailable.is_retryable());
        assert!(!ErrorCategory::DecryptionFailed.is_retryable());
        assert!(!ErrorCategory::UnknownConsumer.is_retryable());
    }

    #[test]
    fn it_classifies_policy_errors() {
        let error: AbacError = abac_policy::Policy::parse("").unwrap_err().into();
        assert_eq!(error.category(), ErrorCategory::MalformedPolicy);

        let error = AbacError::new(ErrorCategory::MalformedPolicy, "bad")
            .recategorize(ErrorCategory::PolicyRejected);
        assert_eq!(error.to_string(), "PolicyRejected: bad");
    }
}

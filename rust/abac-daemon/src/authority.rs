//! The attribute authority and its client.
//!
//! The authority owns the attribute vocabulary and the master key material.
//! It publishes public parameters to anyone and hands out attribute secret
//! keys only to token issuers it trusts. It keeps no per-request state.

use crate::{
    AbacError, AttributeKeysRequest, ErrorCategory, ExchangeError, Registry, RoleContext, Service,
    ServiceReply, ServiceRequest,
};
use abac_cipher::{AttributeKeys, AuthorityKeys, PublicParams};
use abac_common::Name;
use abac_credentials::{Certificate, KeyChain};
use abac_policy::AttributeSet;
use async_trait::async_trait;

/// The trust root for the attribute vocabulary.
pub struct AttributeAuthority {
    context: RoleContext,
    vocabulary: AttributeSet,
    keys: AuthorityKeys,
    trusted_issuers: Registry<Name, Certificate>,
}

impl AttributeAuthority {
    /// An authority over `vocabulary` holding `keys`.
    pub fn new(context: RoleContext, vocabulary: AttributeSet, keys: AuthorityKeys) -> Self {
        Self {
            context,
            vocabulary,
            keys,
            trusted_issuers: Registry::new(),
        }
    }

    /// Allows the holder of `certificate` to request attribute keys.
    pub fn trust_issuer(&self, certificate: Certificate) {
        tracing::info!(issuer = %certificate.identity(), "trusting token issuer");
        self.trusted_issuers
            .upsert(certificate.identity().clone(), certificate);
    }

    /// The vocabulary this authority certifies.
    pub fn vocabulary(&self) -> &AttributeSet {
        &self.vocabulary
    }

    fn check_vocabulary(&self, attributes: &AttributeSet) -> Result<(), AbacError> {
        let unknown: Vec<String> = attributes
            .difference(&self.vocabulary)
            .map(ToString::to_string)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(AbacError::new(
                ErrorCategory::UnknownAttribute,
                format!("not in vocabulary: {}", unknown.join(",")),
            ))
        }
    }

    /// Public parameters for `attributes`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttribute` for attributes outside the vocabulary.
    #[tracing::instrument(skip_all, fields(authority = %self.context.name(), attributes = %attributes))]
    pub fn public_params(&self, attributes: &AttributeSet) -> Result<PublicParams, AbacError> {
        self.check_vocabulary(attributes)?;
        let params = self
            .keys
            .public_params(attributes)
            .map_err(|error| AbacError::new(ErrorCategory::EncryptionUnavailable, error.to_string()))?;
        tracing::debug!("published public parameters");
        Ok(params)
    }

    /// Attribute secret keys for a trusted issuer.
    ///
    /// # Errors
    ///
    /// Returns `IdentityMismatch` unless the request is signed by a trusted
    /// issuer, and `UnknownAttribute` for attributes outside the vocabulary.
    #[tracing::instrument(skip_all, fields(authority = %self.context.name(), issuer = %request.issuer, consumer = %request.consumer))]
    pub fn attribute_keys(&self, request: &AttributeKeysRequest) -> Result<AttributeKeys, AbacError> {
        let Some(certificate) = self.trusted_issuers.get(&request.issuer) else {
            return Err(AbacError::new(
                ErrorCategory::IdentityMismatch,
                format!("{} is not a trusted token issuer", request.issuer),
            ));
        };
        let bytes = request.signing_bytes(self.context.name())?;
        if !KeyChain::verify(&certificate, &bytes, &request.signature) {
            return Err(AbacError::new(
                ErrorCategory::IdentityMismatch,
                format!("bad signature from {}", request.issuer),
            ));
        }
        self.check_vocabulary(&request.attributes)?;
        let keys = self
            .keys
            .attribute_keys(&request.attributes)
            .map_err(|error| AbacError::new(ErrorCategory::EncryptionUnavailable, error.to_string()))?;
        tracing::debug!(count = request.attributes.len(), "issued attribute keys");
        Ok(keys)
    }
}

#[async_trait]
impl Service for AttributeAuthority {
    async fn handle(&self, _name: &Name, request: ServiceRequest) -> Result<ServiceReply, AbacError> {
        match request {
            ServiceRequest::PublicParams { attributes } => {
                self.public_params(&attributes).map(ServiceReply::PublicParams)
            }
            ServiceRequest::AttributeKeys(request) => {
                self.attribute_keys(&request).map(ServiceReply::AttributeKeys)
            }
            _ => Err(AbacError::new(
                ErrorCategory::MalformedRequest,
                "the attribute authority does not serve this request",
            )),
        }
    }
}

/// How the producer and the token issuer reach the authority.
#[derive(Clone)]
pub struct AuthorityClient {
    context: RoleContext,
    authority: Name,
}

impl AuthorityClient {
    /// A client acting as `context` towards the authority at `authority`.
    pub fn new(context: RoleContext, authority: Name) -> Self {
        Self { context, authority }
    }

    /// The authority's name.
    pub fn authority(&self) -> &Name {
        &self.authority
    }

    /// Requests public parameters for `attributes`.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityUnreachable` when no usable answer arrives, or the
    /// authority's rejection.
    pub async fn public_params(&self, attributes: &AttributeSet) -> Result<PublicParams, AbacError> {
        let request = ServiceRequest::PublicParams {
            attributes: attributes.clone(),
        };
        let params = match self.context.exchange(&self.authority, &request).await {
            Ok(ServiceReply::PublicParams(params)) => Ok(params),
            Ok(other) => Err(ExchangeError::unexpected(&other)),
            Err(error) => Err(error),
        };
        params.map_err(|error| error.or_unreachable(ErrorCategory::AuthorityUnreachable))
    }

    /// Requests secret keys for `consumer`'s `attributes`, signed as this
    /// client's role.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityUnreachable` when no usable answer arrives, or the
    /// authority's rejection.
    pub async fn attribute_keys(
        &self,
        consumer: &Name,
        attributes: &AttributeSet,
    ) -> Result<AttributeKeys, AbacError> {
        let request = ServiceRequest::AttributeKeys(AttributeKeysRequest::signed(
            self.context.identity(),
            &self.authority,
            consumer.clone(),
            attributes.clone(),
        )?);
        let keys = match self.context.exchange(&self.authority, &request).await {
            Ok(ServiceReply::AttributeKeys(keys)) => Ok(keys),
            Ok(other) => Err(ExchangeError::unexpected(&other)),
            Err(error) => Err(error),
        };
        keys.map_err(|error| error.or_unreachable(ErrorCategory::AuthorityUnreachable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abac_network::MemoryNetwork;
    use abac_policy::Attribute;
    use std::sync::Arc;

    fn attributes(labels: &[&str]) -> AttributeSet {
        labels
            .iter()
            .map(|label| Attribute::new(*label).unwrap())
            .collect()
    }

    fn authority(keychain: &mut KeyChain, network: &MemoryNetwork) -> AttributeAuthority {
        let context = RoleContext::establish(
            &Name::parse("/aaPrefix").unwrap(),
            keychain,
            Arc::new(network.clone()),
        )
        .unwrap();
        AttributeAuthority::new(
            context,
            attributes(&["role:doctor", "role:nurse"]),
            AuthorityKeys::from_seed([1; 32]),
        )
    }

    #[test]
    fn it_refuses_attributes_outside_the_vocabulary() {
        let network = MemoryNetwork::new();
        let authority = authority(&mut KeyChain::new(), &network);

        let error = authority
            .public_params(&attributes(&["role:doctor", "role:janitor"]))
            .unwrap_err();
        assert_eq!(error.category(), ErrorCategory::UnknownAttribute);
        assert!(error.detail().contains("role:janitor"));
        assert!(authority.public_params(&attributes(&["role:nurse"])).is_ok());
    }

    #[test]
    fn it_serves_attribute_keys_only_to_trusted_issuers() {
        let network = MemoryNetwork::new();
        let mut keychain = KeyChain::new();
        let authority = authority(&mut keychain, &network);
        let issuer = keychain
            .create_identity(&Name::parse("/tokenIssuerPrefix").unwrap())
            .unwrap();
        let request = AttributeKeysRequest::signed(
            &issuer,
            &Name::parse("/aaPrefix").unwrap(),
            Name::parse("/bob").unwrap(),
            attributes(&["role:doctor"]),
        )
        .unwrap();

        assert_eq!(
            authority.attribute_keys(&request).unwrap_err().category(),
            ErrorCategory::IdentityMismatch
        );

        authority.trust_issuer(issuer.certificate().clone());
        let keys = authority.attribute_keys(&request).unwrap();
        assert_eq!(keys.attributes(), attributes(&["role:doctor"]));

        let mut forged = request.clone();
        forged.attributes = attributes(&["role:doctor", "role:nurse"]);
        assert_eq!(
            authority.attribute_keys(&forged).unwrap_err().category(),
            ErrorCategory::IdentityMismatch
        );
    }
}

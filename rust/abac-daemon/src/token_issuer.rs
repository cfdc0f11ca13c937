//! The token issuer.
//!
//! Maps consumer identities to the attributes they are entitled to, and
//! turns a verified request into a signed [`Token`]. Each request moves
//! through the same steps, each one able to reject it:
//!
//! 1. [`Verified`]: the certificate and signature prove the claimed name.
//! 2. [`LookedUp`]: the name has attributes and a pinned certificate with the
//!    same key.
//! 3. Issued: the authority derives the attribute keys, which are sealed into
//!    the token as its capability.
//!
//! A rejected request leaves the issuer untouched.

use crate::{
    AbacError, AuthorityClient, ErrorCategory, IssuerSettings, Registry, RoleContext, Service,
    ServiceReply, ServiceRequest, TokenRequest,
};
use abac_common::{Name, Timestamp};
use abac_credentials::{Certificate, KeyChain};
use abac_policy::{AttributeSet, Token, TokenClaims, ValidityWindow};
use async_trait::async_trait;

/// A request whose identity claim checks out.
#[derive(Debug)]
pub struct Verified {
    consumer: Name,
    certificate: Certificate,
}

/// A verified request matched against the issuer's tables.
#[derive(Debug)]
pub struct LookedUp {
    consumer: Name,
    attributes: AttributeSet,
}

/// Issues capability tokens to configured consumers.
pub struct TokenIssuer {
    context: RoleContext,
    authority: AuthorityClient,
    settings: IssuerSettings,
    attributes: Registry<Name, AttributeSet>,
    certificates: Registry<Name, Certificate>,
}

impl TokenIssuer {
    /// An issuer with empty tables.
    pub fn new(context: RoleContext, authority: Name, settings: IssuerSettings) -> Self {
        Self {
            authority: AuthorityClient::new(context.clone(), authority),
            context,
            settings,
            attributes: Registry::new(),
            certificates: Registry::new(),
        }
    }

    /// The issuer's certificate, which consumers use to check tokens.
    pub fn certificate(&self) -> &Certificate {
        self.context.certificate()
    }

    /// Assigns `attributes` to `consumer`, replacing any earlier assignment.
    pub fn insert_attributes(&self, consumer: Name, attributes: AttributeSet) {
        tracing::debug!(%consumer, %attributes, "assigned attributes");
        if self.attributes.upsert(consumer.clone(), attributes).is_some() {
            tracing::info!(%consumer, "replaced earlier attribute assignment");
        }
    }

    /// Pins `certificate` as the only accepted key for its name.
    pub fn add_cert(&self, certificate: Certificate) {
        tracing::debug!(consumer = %certificate.identity(), "pinned certificate");
        self.certificates
            .upsert(certificate.identity().clone(), certificate);
    }

    /// Checks that `request` proves the identity it claims.
    ///
    /// # Errors
    ///
    /// Returns `IdentityMismatch` if the certificate does not certify the
    /// claimed name or the signature does not verify.
    pub fn verify(&self, request: TokenRequest) -> Result<Verified, AbacError> {
        if !request.certificate.verify_for(&request.consumer)
            || request.certificate.identity() != &request.consumer
        {
            return Err(AbacError::new(
                ErrorCategory::IdentityMismatch,
                format!("certificate does not prove {}", request.consumer),
            ));
        }
        let bytes = request.signing_bytes(self.context.name())?;
        if !KeyChain::verify(&request.certificate, &bytes, &request.signature) {
            return Err(AbacError::new(
                ErrorCategory::IdentityMismatch,
                format!("bad signature from {}", request.consumer),
            ));
        }
        Ok(Verified {
            consumer: request.consumer,
            certificate: request.certificate,
        })
    }

    /// Finds the attributes assigned to a verified consumer.
    ///
    /// # Errors
    ///
    /// Returns `UnknownConsumer` if the consumer has no attributes or no
    /// pinned certificate, and `IdentityMismatch` if the pinned key differs
    /// from the presented one.
    pub fn look_up(&self, verified: Verified) -> Result<LookedUp, AbacError> {
        let unknown = || {
            AbacError::new(
                ErrorCategory::UnknownConsumer,
                format!("{} is not configured", verified.consumer),
            )
        };
        let attributes = self.attributes.get(&verified.consumer).ok_or_else(unknown)?;
        let pinned = self.certificates.get(&verified.consumer).ok_or_else(unknown)?;
        if pinned.public_key() != verified.certificate.public_key() {
            return Err(AbacError::new(
                ErrorCategory::IdentityMismatch,
                format!("{} presented an unexpected key", verified.consumer),
            ));
        }
        Ok(LookedUp {
            consumer: verified.consumer,
            attributes,
        })
    }

    /// Builds and signs the token for a looked-up consumer. The full
    /// assigned attribute set is disclosed.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityUnreachable` or `UnknownAttribute` from the
    /// authority, or `MalformedRequest` if the token cannot be signed.
    pub async fn issue(&self, looked_up: LookedUp) -> Result<Token, AbacError> {
        let keys = self
            .authority
            .attribute_keys(&looked_up.consumer, &looked_up.attributes)
            .await?;
        let capability = keys
            .to_bytes()
            .map_err(|error| AbacError::new(ErrorCategory::MalformedRequest, error.to_string()))?;
        let claims = TokenClaims {
            issuer: self.context.name().clone(),
            consumer: looked_up.consumer,
            attributes: looked_up.attributes,
            window: ValidityWindow::starting_at(Timestamp::now(), self.settings.token_validity),
            capability,
        };
        let signature = self
            .context
            .identity()
            .sign(&claims.signing_bytes()?)
            .map_err(|error| AbacError::new(ErrorCategory::MalformedRequest, error.to_string()))?;
        Ok(Token::new(claims, signature.into_bytes()))
    }

    /// Runs a token request through every step.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify), [`look_up`](Self::look_up) and
    /// [`issue`](Self::issue).
    #[tracing::instrument(skip_all, fields(issuer = %self.context.name(), consumer = %request.consumer))]
    pub async fn handle_token_request(&self, request: TokenRequest) -> Result<Token, AbacError> {
        let verified = self.verify(request)?;
        let looked_up = self.look_up(verified)?;
        let token = self.issue(looked_up).await?;
        tracing::info!(
            attributes = %token.attributes(),
            not_after = token.claims().window.not_after().to_unix(),
            "issued token"
        );
        Ok(token)
    }
}

#[async_trait]
impl Service for TokenIssuer {
    async fn handle(&self, _name: &Name, request: ServiceRequest) -> Result<ServiceReply, AbacError> {
        match request {
            ServiceRequest::Token(request) => {
                let token = self.handle_token_request(request).await?;
                Ok(ServiceReply::Token {
                    token,
                    issuer_certificate: self.certificate().clone(),
                })
            }
            _ => Err(AbacError::new(
                ErrorCategory::MalformedRequest,
                "the token issuer does not serve this request",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abac_network::MemoryNetwork;
    use abac_policy::Attribute;
    use std::sync::Arc;

    struct Fixture {
        keychain: KeyChain,
        issuer: TokenIssuer,
    }

    fn fixture() -> Fixture {
        let mut keychain = KeyChain::new();
        let context = RoleContext::establish(
            &Name::parse("/tokenIssuerPrefix").unwrap(),
            &mut keychain,
            Arc::new(MemoryNetwork::new()),
        )
        .unwrap();
        let issuer = TokenIssuer::new(
            context,
            Name::parse("/aaPrefix").unwrap(),
            IssuerSettings::default(),
        );
        Fixture { keychain, issuer }
    }

    fn doctor() -> AttributeSet {
        [Attribute::new("role:doctor").unwrap()].into_iter().collect()
    }

    fn request_from(fixture: &mut Fixture, name: &str) -> TokenRequest {
        let identity = fixture
            .keychain
            .create_identity(&Name::parse(name).unwrap())
            .unwrap();
        TokenRequest::signed(&identity, &Name::parse("/tokenIssuerPrefix").unwrap()).unwrap()
    }

    #[test]
    fn it_rejects_a_certificate_for_another_name() {
        let mut fixture = fixture();
        let mut request = request_from(&mut fixture, "/mallory");
        request.consumer = Name::parse("/bob").unwrap();

        assert_eq!(
            fixture.issuer.verify(request).unwrap_err().category(),
            ErrorCategory::IdentityMismatch
        );
    }

    #[test]
    fn it_rejects_a_request_signed_for_another_issuer() {
        let mut fixture = fixture();
        let bob = fixture
            .keychain
            .create_identity(&Name::parse("/bob").unwrap())
            .unwrap();
        let request = TokenRequest::signed(&bob, &Name::parse("/otherIssuer").unwrap()).unwrap();

        assert_eq!(
            fixture.issuer.verify(request).unwrap_err().category(),
            ErrorCategory::IdentityMismatch
        );
    }

    #[test]
    fn it_reports_unconfigured_consumers_as_unknown() {
        let mut fixture = fixture();
        let request = request_from(&mut fixture, "/carol");
        let verified = fixture.issuer.verify(request).unwrap();

        assert_eq!(
            fixture.issuer.look_up(verified).unwrap_err().category(),
            ErrorCategory::UnknownConsumer
        );
    }

    #[test]
    fn it_requires_a_pinned_certificate() {
        let mut fixture = fixture();
        fixture
            .issuer
            .insert_attributes(Name::parse("/bob").unwrap(), doctor());
        let request = request_from(&mut fixture, "/bob");
        let verified = fixture.issuer.verify(request).unwrap();

        assert_eq!(
            fixture.issuer.look_up(verified).unwrap_err().category(),
            ErrorCategory::UnknownConsumer
        );
    }

    #[test]
    fn it_rejects_a_key_other_than_the_pinned_one() {
        let mut fixture = fixture();
        let bob = Name::parse("/bob").unwrap();
        fixture.issuer.insert_attributes(bob.clone(), doctor());

        // Another process created its own /bob identity.
        let impostor = KeyChain::new().create_identity(&bob).unwrap();
        fixture.issuer.add_cert(impostor.certificate().clone());

        let request = request_from(&mut fixture, "/bob");
        let verified = fixture.issuer.verify(request).unwrap();
        assert_eq!(
            fixture.issuer.look_up(verified).unwrap_err().category(),
            ErrorCategory::IdentityMismatch
        );
    }

    #[test]
    fn it_keeps_the_last_attribute_assignment() {
        let mut fixture = fixture();
        let bob = Name::parse("/bob").unwrap();
        let nurse: AttributeSet = [Attribute::new("role:nurse").unwrap()].into_iter().collect();
        fixture.issuer.insert_attributes(bob.clone(), doctor());
        fixture.issuer.insert_attributes(bob.clone(), nurse.clone());

        let identity = fixture.keychain.create_identity(&bob).unwrap();
        fixture.issuer.add_cert(identity.certificate().clone());
        let request = request_from(&mut fixture, "/bob");
        let verified = fixture.issuer.verify(request).unwrap();
        assert_eq!(fixture.issuer.look_up(verified).unwrap().attributes, nurse);
    }
}

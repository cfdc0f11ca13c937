//! The consumer.
//!
//! A call to [`Consumer::consume`] runs its own small state machine:
//!
//! ```text
//! Idle -> AwaitingToken -> AwaitingData -> Decrypting -> Done
//! ```
//!
//! A transport failure while awaiting the token or the data ends the call
//! with `TokenIssuerUnreachable` or `ProducerUnreachable`. Nothing is
//! retried. Calls share only the consumer's identity, so any number of them
//! may be in flight at once.

use crate::{
    AbacError, ConsumerSettings, ErrorCategory, ExchangeError, RoleContext, ServiceReply,
    ServiceRequest, TokenRequest,
};
use abac_cipher::{AttributeCipher, AttributeKeys, Ciphertext};
use abac_common::{Name, Timestamp};
use abac_credentials::{Certificate, KeyChain, Signature};
use abac_policy::Token;
use std::{fmt, sync::Arc};

/// Where a single consume call currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Not started.
    Idle,
    /// Waiting for the token issuer.
    AwaitingToken,
    /// Waiting for the producer.
    AwaitingData,
    /// Decrypting locally.
    Decrypting,
    /// Finished, successfully or not.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Stage::Idle => "idle",
            Stage::AwaitingToken => "awaiting-token",
            Stage::AwaitingData => "awaiting-data",
            Stage::Decrypting => "decrypting",
            Stage::Done => "done",
        };
        f.write_str(stage)
    }
}

/// The state of one consume call.
struct Consumption<'a> {
    data_name: &'a Name,
    stage: Stage,
}

impl<'a> Consumption<'a> {
    fn new(data_name: &'a Name) -> Self {
        Self {
            data_name,
            stage: Stage::Idle,
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::trace!(data_name = %self.data_name, from = %self.stage, to = %stage, "consume stage");
        self.stage = stage;
    }

    /// Classifies a failed exchange by the stage it happened in.
    fn exchange_failed(&self, error: ExchangeError) -> AbacError {
        let unreachable = match self.stage {
            Stage::AwaitingToken => ErrorCategory::TokenIssuerUnreachable,
            _ => ErrorCategory::ProducerUnreachable,
        };
        error.or_unreachable(unreachable)
    }
}

fn decryption_failed(detail: impl Into<String>) -> AbacError {
    AbacError::new(ErrorCategory::DecryptionFailed, detail)
}

fn identity_mismatch(detail: impl Into<String>) -> AbacError {
    AbacError::new(ErrorCategory::IdentityMismatch, detail)
}

/// Fetches and decrypts policy-protected content.
pub struct Consumer {
    context: RoleContext,
    issuer: Name,
    pinned_issuer: Option<Certificate>,
    cipher: Arc<dyn AttributeCipher>,
    settings: ConsumerSettings,
}

impl Consumer {
    /// A consumer that obtains its tokens from `issuer`.
    pub fn new(
        context: RoleContext,
        issuer: Name,
        cipher: Arc<dyn AttributeCipher>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            context,
            issuer,
            pinned_issuer: None,
            cipher,
            settings,
        }
    }

    /// Only accept tokens signed with the key in `certificate`.
    #[must_use]
    pub fn with_pinned_issuer(mut self, certificate: Certificate) -> Self {
        self.pinned_issuer = Some(certificate);
        self
    }

    /// The consumer's name.
    pub fn name(&self) -> &Name {
        self.context.name()
    }

    /// The consumer's certificate, to be handed to the token issuer.
    pub fn certificate(&self) -> &Certificate {
        self.context.certificate()
    }

    /// Obtains a token, fetches `data_name` (the full name, starting with the
    /// producer's name) and decrypts it.
    ///
    /// # Errors
    ///
    /// Returns the category of the first step that failed.
    #[tracing::instrument(skip_all, fields(consumer = %self.context.name(), %data_name))]
    pub async fn consume(&self, data_name: &Name) -> Result<Vec<u8>, AbacError> {
        let mut consumption = Consumption::new(data_name);
        let outcome = self.run(&mut consumption).await;
        consumption.enter(Stage::Done);
        match &outcome {
            Ok(plaintext) => tracing::info!(bytes = plaintext.len(), "consumed"),
            Err(error) => {
                tracing::warn!(category = %error.category(), detail = error.detail(), "consume failed")
            }
        }
        outcome
    }

    /// Like [`consume`](Self::consume), but reports through continuations.
    /// Exactly one of them is called, exactly once.
    pub async fn consume_with<S, F>(&self, data_name: &Name, on_success: S, on_failure: F)
    where
        S: FnOnce(Vec<u8>),
        F: FnOnce(AbacError),
    {
        match self.consume(data_name).await {
            Ok(plaintext) => on_success(plaintext),
            Err(error) => on_failure(error),
        }
    }

    async fn run(&self, consumption: &mut Consumption<'_>) -> Result<Vec<u8>, AbacError> {
        consumption.enter(Stage::AwaitingToken);
        let token = self
            .request_token()
            .await
            .map_err(|error| consumption.exchange_failed(error))?;

        consumption.enter(Stage::AwaitingData);
        let ciphertext = self
            .fetch(consumption.data_name)
            .await
            .map_err(|error| consumption.exchange_failed(error))?;

        consumption.enter(Stage::Decrypting);
        self.decrypt(&token, &ciphertext)
    }

    async fn request_token(&self) -> Result<Token, ExchangeError> {
        let request = TokenRequest::signed(self.context.identity(), &self.issuer)
            .map_err(ExchangeError::Rejected)?;
        match self
            .context
            .exchange(&self.issuer, &ServiceRequest::Token(request))
            .await?
        {
            ServiceReply::Token {
                token,
                issuer_certificate,
            } => self
                .check_token(&token, &issuer_certificate)
                .map(|()| token)
                .map_err(ExchangeError::Rejected),
            other => Err(ExchangeError::unexpected(&other)),
        }
    }

    fn check_token(&self, token: &Token, issuer: &Certificate) -> Result<(), AbacError> {
        if !issuer.verify_for(&self.issuer) {
            return Err(identity_mismatch(format!(
                "issuer certificate does not prove {}",
                self.issuer
            )));
        }
        if let Some(pinned) = &self.pinned_issuer {
            if pinned.public_key() != issuer.public_key() {
                return Err(identity_mismatch("issuer key differs from the pinned key"));
            }
        }
        let claims = token.claims();
        let signature = Signature::from_bytes(token.signature());
        if !KeyChain::verify(issuer, &claims.signing_bytes()?, &signature) {
            return Err(identity_mismatch("token signature does not verify"));
        }
        if &claims.issuer != issuer.identity() {
            return Err(identity_mismatch(format!(
                "token issued by {}, not {}",
                claims.issuer,
                issuer.identity()
            )));
        }
        if token.consumer() != self.context.name() {
            return Err(identity_mismatch(format!(
                "token issued to {}",
                token.consumer()
            )));
        }
        tracing::debug!(attributes = %token.attributes(), "received token");
        Ok(())
    }

    async fn fetch(&self, data_name: &Name) -> Result<Ciphertext, ExchangeError> {
        match self.context.exchange(data_name, &ServiceRequest::Fetch).await? {
            ServiceReply::Content(ciphertext) => Ok(ciphertext),
            other => Err(ExchangeError::unexpected(&other)),
        }
    }

    fn decrypt(&self, token: &Token, ciphertext: &Ciphertext) -> Result<Vec<u8>, AbacError> {
        if self.settings.enforce_token_window && !token.is_valid_at(Timestamp::now()) {
            return Err(decryption_failed("token is outside its validity window"));
        }
        if !ciphertext.policy.matches(token.attributes()) {
            let missing: Vec<String> = ciphertext
                .policy
                .missing(token.attributes())
                .map(ToString::to_string)
                .collect();
            return Err(decryption_failed(format!(
                "token lacks {}",
                missing.join(",")
            )));
        }
        let keys = AttributeKeys::from_bytes(&token.claims().capability)
            .map_err(|error| decryption_failed(error.to_string()))?;
        self.cipher
            .decrypt(ciphertext, &keys)
            .map_err(|error| decryption_failed(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abac_cipher::{AuthorityKeys, EcdhCipher};
    use abac_network::MemoryNetwork;
    use abac_policy::{Attribute, AttributeSet, Policy, TokenClaims, ValidityWindow};
    use std::time::Duration;

    fn name(text: &str) -> Name {
        Name::parse(text).unwrap()
    }

    fn consumer(settings: ConsumerSettings) -> Consumer {
        let context = RoleContext::establish(
            &name("/bob"),
            &mut KeyChain::new(),
            Arc::new(MemoryNetwork::new()),
        )
        .unwrap();
        Consumer::new(
            context,
            name("/tokenIssuerPrefix"),
            Arc::new(EcdhCipher::new()),
            settings,
        )
    }

    /// A doctor's token whose window closed in 1970, and a record only
    /// doctors may read.
    fn expired_token_and_record() -> (Token, Ciphertext) {
        let keys = AuthorityKeys::generate();
        let doctor: AttributeSet = [Attribute::new("role:doctor").unwrap()]
            .into_iter()
            .collect();
        let claims = TokenClaims {
            issuer: name("/tokenIssuerPrefix"),
            consumer: name("/bob"),
            attributes: doctor.clone(),
            window: ValidityWindow::starting_at(Timestamp::from_unix(0), Duration::from_secs(1)),
            capability: keys.attribute_keys(&doctor).unwrap().to_bytes().unwrap(),
        };
        let record = EcdhCipher::new()
            .encrypt(
                &keys.public_params(&doctor).unwrap(),
                &Policy::parse("role:doctor").unwrap(),
                b"alice: stable",
            )
            .unwrap();
        (Token::new(claims, Vec::new()), record)
    }

    #[test]
    fn it_accepts_an_expired_token_unless_the_window_is_enforced() {
        let (token, record) = expired_token_and_record();

        let lenient = consumer(ConsumerSettings::default());
        assert_eq!(
            lenient.decrypt(&token, &record).unwrap(),
            b"alice: stable".to_vec()
        );

        let strict = consumer(ConsumerSettings {
            enforce_token_window: true,
        });
        assert_eq!(
            strict.decrypt(&token, &record).unwrap_err().category(),
            ErrorCategory::DecryptionFailed
        );
    }

    #[test]
    fn it_accepts_a_current_token_when_the_window_is_enforced() {
        let (token, record) = expired_token_and_record();
        let mut claims = token.claims().clone();
        claims.window = ValidityWindow::starting_at(Timestamp::now(), Duration::from_secs(3600));
        let token = Token::new(claims, Vec::new());

        let strict = consumer(ConsumerSettings {
            enforce_token_window: true,
        });
        assert_eq!(
            strict.decrypt(&token, &record).unwrap(),
            b"alice: stable".to_vec()
        );
    }

    #[test]
    fn it_names_each_stage() {
        assert_eq!(Stage::AwaitingToken.to_string(), "awaiting-token");
        assert_eq!(Stage::Done.to_string(), "done");
    }
}

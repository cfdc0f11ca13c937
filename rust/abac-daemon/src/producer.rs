//! The producer.
//!
//! Holds the policy table and the registered content, and serves content
//! encrypted under the data name's policy. Content is never served without a
//! policy, and never in the clear.

use crate::{
    AbacError, AuthorityClient, ErrorCategory, Registry, RoleContext, Service, ServiceReply,
    ServiceRequest, SetPolicyCommand,
};
use abac_cipher::{AttributeCipher, Ciphertext, PublicParams};
use abac_common::Name;
use abac_credentials::{Certificate, KeyChain};
use abac_policy::{AttributeSet, Policy};
use async_trait::async_trait;
use std::sync::Arc;

/// Serves policy-encrypted content under its name.
pub struct Producer {
    context: RoleContext,
    authority: AuthorityClient,
    cipher: Arc<dyn AttributeCipher>,
    policies: Registry<Name, Policy>,
    content: Registry<Name, Arc<[u8]>>,
    // Keyed by the attribute set a policy requires, so every data name under
    // the same policy shares one entry.
    params: Registry<AttributeSet, PublicParams>,
    owners: Registry<Name, Certificate>,
}

impl Producer {
    /// A producer with no policies or content.
    pub fn new(context: RoleContext, authority: Name, cipher: Arc<dyn AttributeCipher>) -> Self {
        Self {
            authority: AuthorityClient::new(context.clone(), authority),
            context,
            cipher,
            policies: Registry::new(),
            content: Registry::new(),
            params: Registry::new(),
            owners: Registry::new(),
        }
    }

    /// Accepts set-policy commands signed by the holder of `certificate`.
    pub fn trust_owner(&self, certificate: Certificate) {
        tracing::info!(owner = %certificate.identity(), "trusting data owner");
        self.owners.upsert(certificate.identity().clone(), certificate);
    }

    /// Publishes `bytes` under `data_name`, relative to the producer.
    pub fn register_content(&self, data_name: Name, bytes: impl Into<Arc<[u8]>>) {
        let bytes = bytes.into();
        tracing::debug!(%data_name, bytes = bytes.len(), "registered content");
        self.content.upsert(data_name, bytes);
    }

    /// The policy in force for `data_name`.
    pub fn policy(&self, data_name: &Name) -> Option<Policy> {
        self.policies.get(data_name)
    }

    /// Sets or replaces the policy for exactly `data_name`.
    ///
    /// # Errors
    ///
    /// Returns `PolicyRejected` if `policy_text` does not parse.
    pub fn set_policy(&self, data_name: Name, policy_text: &str) -> Result<(), AbacError> {
        let policy = Policy::parse(policy_text)
            .map_err(|error| AbacError::from(error).recategorize(ErrorCategory::PolicyRejected))?;
        if policy.is_public() {
            tracing::info!(%data_name, "data marked public");
        }
        match self.policies.upsert(data_name.clone(), policy.clone()) {
            Some(previous) if previous != policy => {
                tracing::info!(%data_name, %previous, %policy, "replaced policy");
            }
            _ => tracing::info!(%data_name, %policy, "set policy"),
        }
        Ok(())
    }

    /// Applies a signed set-policy command.
    ///
    /// # Errors
    ///
    /// Returns `PolicyRejected` if the owner is not trusted, the signature
    /// does not verify, or the policy does not parse.
    #[tracing::instrument(skip_all, fields(producer = %self.context.name(), owner = %command.owner, data_name = %command.data_name))]
    pub fn handle_set_policy(&self, command: SetPolicyCommand) -> Result<(), AbacError> {
        let Some(certificate) = self.owners.get(&command.owner) else {
            return Err(AbacError::new(
                ErrorCategory::PolicyRejected,
                format!("{} may not set policy here", command.owner),
            ));
        };
        let bytes = command.signing_bytes(self.context.name())?;
        if !KeyChain::verify(&certificate, &bytes, &command.signature) {
            return Err(AbacError::new(
                ErrorCategory::PolicyRejected,
                format!("bad signature from {}", command.owner),
            ));
        }
        self.set_policy(command.data_name, &command.policy)
    }

    async fn public_params(&self, policy: &Policy) -> Result<PublicParams, AbacError> {
        if let Some(params) = self.params.get(policy.required()) {
            tracing::trace!(%policy, "using cached public parameters");
            return Ok(params);
        }
        let params = self
            .authority
            .public_params(policy.required())
            .await
            .map_err(|error| match error.category() {
                ErrorCategory::AuthorityUnreachable => {
                    error.recategorize(ErrorCategory::EncryptionUnavailable)
                }
                _ => error,
            })?;
        self.params.upsert(policy.required().clone(), params.clone());
        Ok(params)
    }

    /// Encrypts the content registered under `data_name` with its policy.
    ///
    /// # Errors
    ///
    /// In order of precedence: `NoPolicyDefined`, `ContentNotFound`, then
    /// `EncryptionUnavailable` or `UnknownAttribute` when the authority's
    /// parameters cannot be obtained.
    #[tracing::instrument(skip_all, fields(producer = %self.context.name(), %data_name))]
    pub async fn serve_content(&self, data_name: &Name) -> Result<Ciphertext, AbacError> {
        let Some(policy) = self.policies.get(data_name) else {
            return Err(AbacError::new(
                ErrorCategory::NoPolicyDefined,
                format!("no policy for {data_name}"),
            ));
        };
        let Some(content) = self.content.get(data_name) else {
            return Err(AbacError::new(
                ErrorCategory::ContentNotFound,
                format!("no content for {data_name}"),
            ));
        };
        let params = self.public_params(&policy).await?;
        let ciphertext = self
            .cipher
            .encrypt(&params, &policy, &content)
            .map_err(|error| AbacError::new(ErrorCategory::EncryptionUnavailable, error.to_string()))?;
        tracing::debug!(%policy, "served encrypted content");
        Ok(ciphertext)
    }
}

#[async_trait]
impl Service for Producer {
    async fn handle(&self, name: &Name, request: ServiceRequest) -> Result<ServiceReply, AbacError> {
        match request {
            ServiceRequest::SetPolicy(command) => {
                self.handle_set_policy(command)?;
                Ok(ServiceReply::Ack)
            }
            ServiceRequest::Fetch => {
                let data_name = name
                    .strip_prefix(self.context.name())
                    .filter(|data_name| !data_name.is_root())
                    .ok_or_else(|| {
                        AbacError::new(ErrorCategory::MalformedRequest, "fetch without a data name")
                    })?;
                self.serve_content(&data_name).await.map(ServiceReply::Content)
            }
            _ => Err(AbacError::new(
                ErrorCategory::MalformedRequest,
                "the producer does not serve this request",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abac_cipher::EcdhCipher;
    use abac_network::MemoryNetwork;

    fn name(text: &str) -> Name {
        Name::parse(text).unwrap()
    }

    fn producer(keychain: &mut KeyChain) -> Producer {
        let context = RoleContext::establish(
            &name("/hospital"),
            keychain,
            Arc::new(MemoryNetwork::new()),
        )
        .unwrap();
        Producer::new(context, name("/aaPrefix"), Arc::new(EcdhCipher::new()))
    }

    #[tokio::test]
    async fn it_refuses_names_without_a_policy_even_with_content() {
        let producer = producer(&mut KeyChain::new());
        producer.register_content(name("/records/alice"), b"chart".to_vec());

        let error = producer.serve_content(&name("/records/alice")).await.unwrap_err();
        assert_eq!(error.category(), ErrorCategory::NoPolicyDefined);
    }

    #[tokio::test]
    async fn it_reports_missing_content_before_contacting_the_authority() {
        let producer = producer(&mut KeyChain::new());
        producer.set_policy(name("/records/alice"), "role:doctor").unwrap();

        // No authority is registered, so reaching it would fail differently.
        let error = producer.serve_content(&name("/records/alice")).await.unwrap_err();
        assert_eq!(error.category(), ErrorCategory::ContentNotFound);
    }

    #[test]
    fn it_rejects_unparsable_policies() {
        let producer = producer(&mut KeyChain::new());
        let error = producer.set_policy(name("/records/alice"), "role:doctor,,").unwrap_err();
        assert_eq!(error.category(), ErrorCategory::PolicyRejected);
        assert_eq!(producer.policy(&name("/records/alice")), None);
    }

    #[test]
    fn it_keys_policies_by_exact_name() {
        let producer = producer(&mut KeyChain::new());
        producer.set_policy(name("/records"), "role:doctor").unwrap();
        assert_eq!(producer.policy(&name("/records/alice")), None);
    }

    #[test]
    fn it_only_accepts_commands_from_trusted_owners() {
        let mut keychain = KeyChain::new();
        let producer = producer(&mut keychain);
        let owner = keychain.create_identity(&name("/dataOwnerPrefix")).unwrap();
        let command = SetPolicyCommand::signed(
            &owner,
            &name("/hospital"),
            name("/records/alice"),
            "role:doctor".into(),
        )
        .unwrap();

        assert_eq!(
            producer.handle_set_policy(command.clone()).unwrap_err().category(),
            ErrorCategory::PolicyRejected
        );

        producer.trust_owner(owner.certificate().clone());
        producer.handle_set_policy(command).unwrap();
        assert_eq!(
            producer.policy(&name("/records/alice")),
            Some(Policy::parse("role:doctor").unwrap())
        );
    }
}

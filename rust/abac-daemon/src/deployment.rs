//! All five roles in one process.
//!
//! [`Deployment::start`] brings the roles up in dependency order: authority,
//! consumer and data owner identities, producer, then token issuer.
//! Certificates move between roles through files, exactly as they would
//! between separate processes. The consumer is pinned to the issuer's key
//! once the issuer exists, and the data owner's policy batch is applied last.

use crate::{
    AttributeAuthority, AttributeRecord, Bootstrap, BootstrapError, Consumer, ConsumerSettings,
    ContentRecord, DataOwner, IssuerSettings, PolicyOutcome, PolicyRecord, Producer, TokenIssuer,
    config,
};
use abac_cipher::{AttributeCipher, AuthorityKeys, EcdhCipher};
use abac_common::Name;
use abac_credentials::certificate;
use abac_network::{MemoryNetwork, NetworkSettings};
use abac_policy::AttributeSet;
use std::{path::PathBuf, sync::Arc};

/// Role names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNames {
    /// The attribute authority.
    pub authority: Name,
    /// The token issuer.
    pub issuer: Name,
    /// The producer.
    pub producer: Name,
    /// The data owner.
    pub owner: Name,
    /// The consumer.
    pub consumer: Name,
}

impl Default for RoleNames {
    fn default() -> Self {
        // Constant single-component names; parsing them cannot fail.
        let name = |text: &str| Name::parse(text).unwrap_or_default();
        Self {
            authority: name("/aaPrefix"),
            issuer: name("/tokenIssuerPrefix"),
            producer: name("/producerPrefix"),
            owner: name("/dataOwnerPrefix"),
            consumer: name("/consumerPrefix"),
        }
    }
}

/// Everything needed to start a deployment.
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlan {
    /// Role names.
    pub names: RoleNames,
    /// The authority's vocabulary.
    pub vocabulary: AttributeSet,
    /// Token issuer attribute batch.
    pub attributes: Vec<AttributeRecord>,
    /// Where the attribute batch was read from, for error reporting.
    pub attributes_source: PathBuf,
    /// Data owner policy batch.
    pub policies: Vec<PolicyRecord>,
    /// Producer content.
    pub content: Vec<ContentRecord>,
    /// Where the consumer's certificate is written.
    pub consumer_certificate: Option<PathBuf>,
    /// Where the data owner's certificate is written.
    pub owner_certificate: Option<PathBuf>,
    /// Transport tunables.
    pub network: NetworkSettings,
    /// Token issuer tunables.
    pub issuer: IssuerSettings,
    /// Consumer tunables.
    pub consumer: ConsumerSettings,
}

/// A running set of roles on one [`MemoryNetwork`].
pub struct Deployment {
    /// The shared network.
    pub network: MemoryNetwork,
    /// The attribute authority.
    pub authority: Arc<AttributeAuthority>,
    /// The token issuer.
    pub issuer: Arc<TokenIssuer>,
    /// The producer.
    pub producer: Arc<Producer>,
    /// The data owner.
    pub owner: Arc<DataOwner>,
    /// The consumer.
    pub consumer: Arc<Consumer>,
    /// Per-record results of the initial policy batch.
    pub policy_outcomes: Vec<PolicyOutcome>,
}

impl Deployment {
    /// Starts every role and applies the policy batch.
    ///
    /// # Errors
    ///
    /// Any configuration problem aborts startup. A rejected policy does not;
    /// it is reported in [`Deployment::policy_outcomes`].
    pub async fn start(plan: DeploymentPlan) -> Result<Self, BootstrapError> {
        let DeploymentPlan {
            names,
            vocabulary,
            attributes,
            attributes_source,
            policies,
            content,
            consumer_certificate,
            owner_certificate,
            network: network_settings,
            issuer: issuer_settings,
            consumer: consumer_settings,
        } = plan;

        let network = MemoryNetwork::with_settings(network_settings);
        let mut bootstrap = Bootstrap::new(Arc::new(network.clone()));
        let cipher: Arc<dyn AttributeCipher> = Arc::new(EcdhCipher::new());

        let authority = bootstrap.launch(&names.authority, |context| {
            Ok(AttributeAuthority::new(
                context,
                vocabulary,
                AuthorityKeys::generate(),
            ))
        })?;

        let consumer_context = bootstrap.context(&names.consumer)?;
        let consumer_certificate = consumer_certificate
            .unwrap_or_else(|| config::default_certificate_path(&names.consumer));
        certificate::save(consumer_context.certificate(), &consumer_certificate)?;
        tracing::info!(path = %consumer_certificate.display(), "saved consumer certificate");

        let owner_context = bootstrap.context(&names.owner)?;
        let owner_certificate =
            owner_certificate.unwrap_or_else(|| config::default_certificate_path(&names.owner));
        certificate::save(owner_context.certificate(), &owner_certificate)?;
        tracing::info!(path = %owner_certificate.display(), "saved data owner certificate");
        let owner = Arc::new(DataOwner::new(owner_context));

        let producer = bootstrap.launch(&names.producer, |context| {
            let producer = Producer::new(context, names.authority.clone(), Arc::clone(&cipher));
            producer.trust_owner(certificate::load(&owner_certificate)?);
            for record in &content {
                producer.register_content(record.data_name.clone(), config::load_content(record)?);
            }
            Ok(producer)
        })?;

        let issuer = bootstrap.launch(&names.issuer, |context| {
            let issuer = TokenIssuer::new(context, names.authority.clone(), issuer_settings);
            for record in &attributes {
                let certificate = config::load_record_certificate(&attributes_source, record)?;
                if !certificate.verify_for(&record.consumer) {
                    return Err(config::ConfigError::Invalid {
                        path: attributes_source.clone(),
                        line: record.line,
                        reason: format!("certificate does not belong to {}", record.consumer),
                    }
                    .into());
                }
                issuer.insert_attributes(record.consumer.clone(), record.attributes.clone());
                issuer.add_cert(certificate);
            }
            authority.trust_issuer(issuer.certificate().clone());
            Ok(issuer)
        })?;

        let consumer = Arc::new(
            Consumer::new(
                consumer_context,
                names.issuer.clone(),
                Arc::clone(&cipher),
                consumer_settings,
            )
            .with_pinned_issuer(issuer.certificate().clone()),
        );

        let policy_outcomes = owner.apply(&policies).await;

        Ok(Self {
            network,
            authority,
            issuer,
            producer,
            owner,
            consumer,
            policy_outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_uses_the_conventional_role_prefixes() {
        let names = RoleNames::default();
        let prefixes = [
            &names.authority,
            &names.issuer,
            &names.producer,
            &names.owner,
            &names.consumer,
        ]
        .map(ToString::to_string);

        assert_eq!(
            prefixes,
            [
                "/aaPrefix",
                "/tokenIssuerPrefix",
                "/producerPrefix",
                "/dataOwnerPrefix",
                "/consumerPrefix",
            ]
        );
        assert!(
            [&names.authority, &names.issuer, &names.producer, &names.owner, &names.consumer]
                .iter()
                .all(|name| name.len() == 1)
        );
    }
}

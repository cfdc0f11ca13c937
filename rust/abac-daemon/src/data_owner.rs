//! The data owner.

use crate::{
    AbacError, ErrorCategory, ExchangeError, PolicyRecord, RoleContext, ServiceReply,
    ServiceRequest, SetPolicyCommand,
};
use abac_common::Name;
use futures::future::join_all;

/// The result of one set-policy command from a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOutcome {
    /// The record the command was built from.
    pub record: PolicyRecord,
    /// Whether the producer accepted it.
    pub result: Result<(), AbacError>,
}

/// Sends signed set-policy commands to producers.
pub struct DataOwner {
    context: RoleContext,
}

impl DataOwner {
    /// A data owner acting as `context`.
    pub fn new(context: RoleContext) -> Self {
        Self { context }
    }

    /// Asks `producer` to protect `data_name` with `policy_text`.
    ///
    /// # Errors
    ///
    /// Returns `ProducerUnreachable` if the producer does not answer and
    /// `PolicyRejected` if it refuses the command.
    #[tracing::instrument(skip_all, fields(owner = %self.context.name(), %producer, %data_name))]
    pub async fn set_policy(
        &self,
        producer: &Name,
        data_name: &Name,
        policy_text: &str,
    ) -> Result<(), AbacError> {
        let command = SetPolicyCommand::signed(
            self.context.identity(),
            producer,
            data_name.clone(),
            policy_text.to_owned(),
        )?;
        let acknowledged = match self
            .context
            .exchange(producer, &ServiceRequest::SetPolicy(command))
            .await
        {
            Ok(ServiceReply::Ack) => Ok(()),
            Ok(other) => Err(ExchangeError::unexpected(&other)),
            Err(error) => Err(error),
        };
        acknowledged.map_err(|error| match error {
            ExchangeError::Rejected(error) => error.recategorize(ErrorCategory::PolicyRejected),
            other => other.or_unreachable(ErrorCategory::ProducerUnreachable),
        })
    }

    /// Issues every command in `batch` concurrently and reports each
    /// outcome, in batch order. A failed command does not affect the others
    /// and is not retried.
    pub async fn apply(&self, batch: &[PolicyRecord]) -> Vec<PolicyOutcome> {
        join_all(batch.iter().map(|record| async move {
            let result = self
                .set_policy(&record.producer, &record.data_name, &record.policy)
                .await;
            match &result {
                Ok(()) => tracing::info!(
                    producer = %record.producer,
                    data_name = %record.data_name,
                    policy = %record.policy,
                    "policy accepted"
                ),
                Err(error) => tracing::warn!(
                    producer = %record.producer,
                    data_name = %record.data_name,
                    category = %error.category(),
                    detail = error.detail(),
                    "policy not applied"
                ),
            }
            PolicyOutcome {
                record: record.clone(),
                result,
            }
        }))
        .await
    }
}

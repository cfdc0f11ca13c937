use crate::{
    ConfigError, ConsumerSettings, DeploymentPlan, IssuerSettings, RoleNames, config,
};
use abac_common::Name;
use abac_network::NetworkSettings;
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Parser)]
#[command(name = "abacd")]
#[command(bin_name = "abacd")]
#[command(about = "Attribute-based access control over named data", long_about = None)]
pub struct AbacCli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Host every role in this process and read `producerName,dataName`
    /// requests for the consumer from stdin.
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, default_value = "/aaPrefix")]
    pub aa_prefix: Name,

    #[arg(long, default_value = "/tokenIssuerPrefix")]
    pub token_issuer_prefix: Name,

    #[arg(long, default_value = "/producerPrefix")]
    pub producer_prefix: Name,

    #[arg(long, default_value = "/dataOwnerPrefix")]
    pub data_owner_prefix: Name,

    #[arg(long, default_value = "/consumerPrefix")]
    pub consumer_prefix: Name,

    /// Attribute authority vocabulary, one attribute per line.
    #[arg(long)]
    pub vocabulary: Option<PathBuf>,

    /// Token issuer attribute batch.
    #[arg(long)]
    pub attributes: Option<PathBuf>,

    /// Data owner policy batch.
    #[arg(long)]
    pub policies: Option<PathBuf>,

    /// Producer content batch.
    #[arg(long)]
    pub content: Option<PathBuf>,

    /// Where to save the consumer certificate [default: ./<consumer>/cert].
    #[arg(long)]
    pub consumer_cert: Option<PathBuf>,

    /// Where to save the data owner certificate [default: ./<owner>/cert].
    #[arg(long)]
    pub owner_cert: Option<PathBuf>,

    #[arg(long, default_value_t = 4000)]
    pub request_timeout_ms: u64,

    #[arg(long, default_value_t = 3600)]
    pub token_validity_secs: u64,

    /// Refuse tokens outside their validity window.
    #[arg(long)]
    pub enforce_token_window: bool,
}

impl RunArgs {
    /// Reads every configuration file named on the command line.
    pub fn into_plan(self) -> Result<DeploymentPlan, ConfigError> {
        let vocabulary = match &self.vocabulary {
            Some(path) => config::load_vocabulary(path)?,
            None => Default::default(),
        };
        let attributes = match &self.attributes {
            Some(path) => config::load_attribute_batch(path)?,
            None => Vec::new(),
        };
        let policies = match &self.policies {
            Some(path) => config::load_policy_batch(path)?,
            None => Vec::new(),
        };
        let content = match &self.content {
            Some(path) => config::load_content_batch(path)?,
            None => Vec::new(),
        };
        Ok(DeploymentPlan {
            names: RoleNames {
                authority: self.aa_prefix,
                issuer: self.token_issuer_prefix,
                producer: self.producer_prefix,
                owner: self.data_owner_prefix,
                consumer: self.consumer_prefix,
            },
            vocabulary,
            attributes,
            attributes_source: self.attributes.unwrap_or_default(),
            policies,
            content,
            consumer_certificate: self.consumer_cert,
            owner_certificate: self.owner_cert,
            network: NetworkSettings {
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            },
            issuer: IssuerSettings {
                token_validity: Duration::from_secs(self.token_validity_secs),
            },
            consumer: ConsumerSettings {
                enforce_token_window: self.enforce_token_window,
            },
        })
    }
}

/// Parses a consumer request line, `producerName,dataName`, into the full
/// data name. Returns `None` for anything else.
pub fn parse_request_line(line: &str) -> Option<Name> {
    let (producer, data_name) = line.split_once(',')?;
    let producer = Name::parse(producer.trim()).ok()?;
    let data_name = Name::parse(data_name.trim()).ok()?;
    if producer.is_root() || data_name.is_root() {
        return None;
    }
    Some(producer.append(&data_name))
}

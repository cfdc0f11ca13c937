//! The five cooperating ABAC roles.
//!
//! - [`AttributeAuthority`] owns the attribute vocabulary and key material.
//! - [`TokenIssuer`] maps consumers to attributes and issues signed tokens.
//! - [`DataOwner`] tells producers which policy protects which data.
//! - [`Producer`] serves content encrypted under its policy.
//! - [`Consumer`] obtains a token, fetches content and decrypts it.
//!
//! Roles talk only through an [`abac_network::Transport`], using the
//! messages in [`protocol`]. Every failure is reported with a stable
//! [`ErrorCategory`].
//!
//! ```text
//! DataOwner --SetPolicy--> Producer --PublicParams--> AttributeAuthority
//! Consumer  --Token------> TokenIssuer --AttributeKeys--> AttributeAuthority
//! Consumer  --Fetch------> Producer
//! ```

mod error;
pub use error::*;

pub mod protocol;
pub use protocol::{
    AttributeKeysRequest, ExchangeError, ServiceReply, ServiceRequest, SetPolicyCommand,
    TokenRequest,
};

mod registry;
pub use registry::*;

pub mod config;
pub use config::{
    AttributeRecord, ConfigError, ConsumerSettings, ContentRecord, IssuerSettings, PolicyRecord,
};

mod bootstrap;
pub use bootstrap::*;

mod authority;
pub use authority::*;

mod token_issuer;
pub use token_issuer::*;

mod producer;
pub use producer::*;

mod data_owner;
pub use data_owner::*;

mod consumer;
pub use consumer::*;

mod deployment;
pub use deployment::*;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

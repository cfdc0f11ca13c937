//! Role bootstrap shared by every role.
//!
//! A role is an identity plus a transport. [`RoleContext::establish`] creates
//! both sides of that pair, [`RoleContext::serve`] publishes a [`Service`]
//! under the role's name, and [`Bootstrap::launch`] strings the two together
//! for roles that answer requests.

use crate::{
    AbacError, ConfigError, ExchangeError, ServiceReply, ServiceRequest,
    protocol::{decode, encode},
};
use abac_common::Name;
use abac_credentials::{Certificate, CredentialError, Identity, KeyChain};
use abac_network::{Request, Responder, Response, Transport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A role could not be started.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The role identity could not be created or persisted.
    #[error("identity: {0}")]
    Credentials(#[from] CredentialError),

    /// The role's name could not be registered.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// The role's configuration is unusable.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// The role rejected its own configuration.
    #[error("role: {0}")]
    Role(#[from] AbacError),
}

/// Request handling for one role.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Handles `request`, addressed to `name`.
    ///
    /// # Errors
    ///
    /// The returned error is sent back to the caller as a rejection.
    async fn handle(&self, name: &Name, request: ServiceRequest) -> Result<ServiceReply, AbacError>;
}

/// What every role is built from: its identity and the transport to its
/// peers. Cheap to clone.
#[derive(Clone)]
pub struct RoleContext {
    identity: Arc<Identity>,
    transport: Arc<dyn Transport>,
}

impl RoleContext {
    /// Creates (or reuses) the identity for `name` in `keychain`.
    ///
    /// # Errors
    ///
    /// Fails if the identity cannot be created.
    pub fn establish(
        name: &Name,
        keychain: &mut KeyChain,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, BootstrapError> {
        let identity = keychain.create_identity(name)?;
        tracing::info!(role = %name, public_key = %identity.certificate().public_key(), "established identity");
        Ok(Self {
            identity: Arc::new(identity),
            transport,
        })
    }

    /// The role's name.
    pub fn name(&self) -> &Name {
        self.identity.name()
    }

    /// The role's identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The role's certificate.
    pub fn certificate(&self) -> &Certificate {
        self.identity.certificate()
    }

    /// Answers requests for the role's name and every name under it with
    /// `service`.
    ///
    /// # Errors
    ///
    /// Fails if another responder already owns the name.
    pub fn serve<S: Service>(&self, service: Arc<S>) -> Result<(), BootstrapError> {
        self.transport.register_responder(
            self.name().clone(),
            Arc::new(ServiceResponder {
                role: self.name().clone(),
                service,
            }),
        )?;
        Ok(())
    }

    /// Sends `request` to `destination` and returns its reply, with
    /// rejections turned into [`ExchangeError::Rejected`].
    ///
    /// # Errors
    ///
    /// See [`ExchangeError`].
    pub async fn exchange(
        &self,
        destination: &Name,
        request: &ServiceRequest,
    ) -> Result<ServiceReply, ExchangeError> {
        let payload = encode(request).map_err(ExchangeError::Rejected)?;
        let response = self.transport.send_request(destination, payload).await?;
        let reply: ServiceReply =
            decode(&response.payload).map_err(|error| ExchangeError::Garbled(error.to_string()))?;
        reply.into_result().map_err(ExchangeError::Rejected)
    }
}

struct ServiceResponder<S> {
    role: Name,
    service: Arc<S>,
}

#[async_trait]
impl<S: Service> Responder for ServiceResponder<S> {
    async fn respond(&self, request: Request) -> Response {
        let outcome = match decode::<ServiceRequest>(&request.payload) {
            Ok(message) => self.service.handle(&request.name, message).await,
            Err(error) => Err(error),
        };
        let reply = outcome.unwrap_or_else(|error| {
            tracing::warn!(role = %self.role, name = %request.name, category = %error.category(), detail = error.detail(), "request rejected");
            ServiceReply::rejected(error)
        });
        match encode(&reply) {
            Ok(payload) => Response::new(payload),
            Err(error) => {
                tracing::warn!(role = %self.role, %error, "unable to encode reply");
                Response::new(encode(&ServiceReply::rejected(error)).unwrap_or_default())
            }
        }
    }
}

/// Creates role contexts over one key chain and transport.
pub struct Bootstrap {
    keychain: KeyChain,
    transport: Arc<dyn Transport>,
}

impl Bootstrap {
    /// A bootstrap for roles sharing `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            keychain: KeyChain::new(),
            transport,
        }
    }

    /// The context for the role `name`.
    ///
    /// # Errors
    ///
    /// Fails if the identity cannot be created.
    pub fn context(&mut self, name: &Name) -> Result<RoleContext, BootstrapError> {
        RoleContext::establish(name, &mut self.keychain, Arc::clone(&self.transport))
    }

    /// Establishes `name`, builds its service from the context and the role's
    /// configuration, and serves it. Configuration is fully applied by
    /// `build` before the first request can arrive.
    ///
    /// # Errors
    ///
    /// Fails if the identity, the configuration or the registration fails.
    pub fn launch<S, F>(&mut self, name: &Name, build: F) -> Result<Arc<S>, BootstrapError>
    where
        S: Service,
        F: FnOnce(RoleContext) -> Result<S, BootstrapError>,
    {
        let context = self.context(name)?;
        let service = Arc::new(build(context.clone())?);
        context.serve(Arc::clone(&service))?;
        tracing::info!(role = %name, "serving");
        Ok(service)
    }
}

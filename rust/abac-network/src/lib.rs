//! Request/response transport between roles.
//!
//! Every role reaches every other role through a [`Transport`]: it sends a
//! payload to a [`Name`] and awaits a single [`Response`], and it registers a
//! [`Responder`] for the names it serves. Payload bytes are opaque at this
//! layer.
//!
//! [`MemoryNetwork`] is the in-process implementation used by `abacd` and the
//! test suites. The real named-data forwarder plugs in behind the same trait.

use abac_common::Name;
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

mod error;
pub use error::*;

mod memory;
pub use memory::*;

/// A request delivered to a [`Responder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The full destination name, which may extend the responder's filter.
    pub name: Name,
    /// Request body.
    pub payload: Vec<u8>,
}

/// The single answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response body.
    pub payload: Vec<u8>,
}

impl Response {
    /// Wraps a response body.
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }
}

/// Handles requests for the names under a registered filter.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produces the response for `request`. Failures are expressed in the
    /// response payload; a responder always answers.
    async fn respond(&self, request: Request) -> Response;
}

/// The sole means of cross-role communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `payload` to `destination` and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response arrives.
    async fn send_request(
        &self,
        destination: &Name,
        payload: Vec<u8>,
    ) -> Result<Response, TransportError>;

    /// Routes requests for `filter` and every name under it to `responder`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::DuplicateResponder`] if `filter` is taken.
    fn register_responder(
        &self,
        filter: Name,
        responder: Arc<dyn Responder>,
    ) -> Result<(), TransportError>;
}

/// Transport tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkSettings {
    /// How long a request may wait for its response.
    pub request_timeout: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(4),
        }
    }
}

//! In-process network hub.

use crate::{NetworkSettings, Request, Responder, Response, Transport, TransportError};
use abac_common::Name;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

struct Route {
    responder: Arc<dyn Responder>,
    delivered: AtomicUsize,
}

struct Hub {
    settings: NetworkSettings,
    routes: RwLock<BTreeMap<Name, Arc<Route>>>,
    partitioned: RwLock<BTreeSet<Name>>,
}

/// A network whose endpoints all live in the current process.
///
/// Requests go to the responder registered under the longest prefix of the
/// destination name. Each responder runs on its own task, so a slow or
/// panicking responder never stalls the caller past its timeout.
///
/// Clones share the same routing table.
#[derive(Clone)]
pub struct MemoryNetwork {
    hub: Arc<Hub>,
}

impl MemoryNetwork {
    /// A network with default settings.
    pub fn new() -> Self {
        Self::with_settings(NetworkSettings::default())
    }

    /// A network with the given settings.
    pub fn with_settings(settings: NetworkSettings) -> Self {
        Self {
            hub: Arc::new(Hub {
                settings,
                routes: RwLock::new(BTreeMap::new()),
                partitioned: RwLock::new(BTreeSet::new()),
            }),
        }
    }

    /// The settings this network was built with.
    pub fn settings(&self) -> &NetworkSettings {
        &self.hub.settings
    }

    /// Makes every name under `prefix` unreachable until [`heal`](Self::heal)
    /// is called.
    pub fn partition(&self, prefix: &Name) {
        self.hub.partitioned.write().insert(prefix.clone());
    }

    /// Undoes a previous [`partition`](Self::partition).
    pub fn heal(&self, prefix: &Name) {
        self.hub.partitioned.write().remove(prefix);
    }

    /// Removes the responder registered for exactly `filter`, returning
    /// whether there was one. Requests in flight still complete.
    pub fn withdraw(&self, filter: &Name) -> bool {
        let removed = self.hub.routes.write().remove(filter).is_some();
        if removed {
            tracing::debug!(%filter, "withdrew responder");
        }
        removed
    }

    /// Number of requests delivered to the responder registered for exactly
    /// `filter`.
    pub fn request_count(&self, filter: &Name) -> usize {
        self.hub
            .routes
            .read()
            .get(filter)
            .map(|route| route.delivered.load(Ordering::SeqCst))
            .unwrap_or_default()
    }

    fn route(&self, destination: &Name) -> Option<(Name, Arc<Route>)> {
        self.hub
            .routes
            .read()
            .iter()
            .filter(|(filter, _)| filter.is_prefix_of(destination))
            .max_by_key(|(filter, _)| filter.len())
            .map(|(filter, route)| (filter.clone(), Arc::clone(route)))
    }

    fn is_partitioned(&self, destination: &Name) -> bool {
        self.hub
            .partitioned
            .read()
            .iter()
            .any(|prefix| prefix.is_prefix_of(destination))
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn send_request(
        &self,
        destination: &Name,
        payload: Vec<u8>,
    ) -> Result<Response, TransportError> {
        let Some((filter, route)) = self.route(destination) else {
            tracing::debug!(%destination, "no route");
            return Err(TransportError::NoRoute(destination.clone()));
        };
        if self.is_partitioned(destination) {
            tracing::debug!(%destination, "destination is partitioned");
            return Err(TransportError::Unreachable(destination.clone()));
        }

        route.delivered.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(%destination, %filter, bytes = payload.len(), "delivering request");

        let request = Request {
            name: destination.clone(),
            payload,
        };
        let responder = Arc::clone(&route.responder);
        let mut task = tokio::spawn(async move { responder.respond(request).await });

        match tokio::time::timeout(self.hub.settings.request_timeout, &mut task).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => {
                tracing::warn!(%destination, %error, "responder failed");
                Err(TransportError::Unreachable(destination.clone()))
            }
            Err(_) => {
                task.abort();
                tracing::warn!(%destination, "request timed out");
                Err(TransportError::Timeout(destination.clone()))
            }
        }
    }

    fn register_responder(
        &self,
        filter: Name,
        responder: Arc<dyn Responder>,
    ) -> Result<(), TransportError> {
        let mut routes = self.hub.routes.write();
        if routes.contains_key(&filter) {
            return Err(TransportError::DuplicateResponder(filter));
        }
        tracing::debug!(%filter, "registered responder");
        routes.insert(
            filter,
            Arc::new(Route {
                responder,
                delivered: AtomicUsize::new(0),
            }),
        );
        Ok(())
    }
}

use abac_common::Name;
use thiserror::Error;

/// Why a request produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Nothing is registered for the destination.
    #[error("no route to {0}")]
    NoRoute(Name),

    /// The responder did not answer in time.
    #[error("request to {0} timed out")]
    Timeout(Name),

    /// The responder exists but cannot be reached.
    #[error("{0} is unreachable")]
    Unreachable(Name),

    /// A responder is already registered for the filter.
    #[error("a responder is already registered for {0}")]
    DuplicateResponder(Name),
}

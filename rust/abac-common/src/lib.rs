#![warn(missing_docs)]

//! Naming and time primitives used by every role crate: the hierarchical
//! [`Name`] that addresses roles and data, and the second-resolution
//! [`Timestamp`] carried in certificates, signed requests and tokens.

mod name;
pub use name::*;

mod time;
pub use time::*;

//! Attribute-based access control policy model.
//!
//! This crate holds the pure data structures every role agrees on:
//!
//! - [`Attribute`]: an opaque label from the attribute authority's vocabulary.
//! - [`AttributeSet`]: the attributes assigned to one consumer.
//! - [`Policy`]: the conjunction of attributes a data item requires.
//! - [`Token`]: a signed capability binding a consumer to its attributes.
//!
//! Nothing here performs I/O or cryptography; signing and verification of a
//! [`Token`] happen in the credential layer over [`TokenClaims::signing_bytes`].
//!
//! # Policy grammar
//!
//! A policy is written as a comma-separated list of attributes, read as a
//! conjunction:
//!
//! ```rust
//! use abac_policy::{Attribute, AttributeSet, Policy};
//!
//! let policy = Policy::parse("role:doctor, ward:cardiology").unwrap();
//! let attributes: AttributeSet = ["role:doctor", "ward:cardiology", "shift:night"]
//!     .into_iter()
//!     .map(str::parse::<Attribute>)
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert!(policy.matches(&attributes));
//! ```
//!
//! Data that anyone may read must be marked explicitly with the `*` policy;
//! an empty policy text is rejected rather than treated as public.

mod error;
pub use error::*;

mod attribute;
pub use attribute::*;

mod policy;
pub use policy::*;

mod token;
pub use token::*;

//! Identities and certificates for the ABAC roles.
//!
//! Every role owns exactly one [`Identity`]: a [`Name`], an Ed25519 signing
//! key and a self-signed [`Certificate`] binding the two. Identities are
//! created through a [`KeyChain`], which keeps them in memory for the life of
//! the process.
//!
//! Certificates are the only credential that leaves a process. They are
//! exchanged inline in protocol messages, or handed over out-of-band with
//! [`certificate::save`] and [`certificate::load`].
//!
//! [`Name`]: abac_common::Name

mod error;
pub use error::*;

mod key;
pub use key::*;

mod signer;
pub use signer::*;

pub mod certificate;
pub use certificate::Certificate;

mod keychain;
pub use keychain::*;

//! Error types for credential operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while creating, signing with or persisting
/// credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Random number generation failed while generating a key.
    #[error("RNG error: {0}")]
    Rng(#[from] getrandom::Error),

    /// The seed bytes have the wrong length (expected 32).
    #[error("expected 32 seed bytes, got {0}")]
    InvalidSeedLength(usize),

    /// The signing operation failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A certificate could not be encoded.
    #[error("unable to encode certificate: {0}")]
    Encoding(String),

    /// Stored bytes are not a certificate.
    #[error("unable to decode certificate: {0}")]
    Decoding(String),

    /// Reading or writing a certificate file failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during authentication operations.
///
/// All of these are fatal for authenticated calls: without a usable key
/// no signed request can be produced.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The private key file could not be read.
    #[error("Cannot read private key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key material is not a supported Ed25519 or RSA PEM key.
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// The signing primitive failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

//! API credential management.
//!
//! The signing key is loaded once and kept only in memory; `Debug` never
//! prints key material.

use crate::error::AuthError;
use crate::signer::{load_private_key_file, HmacSigner, PayloadSigner};
use std::sync::Arc;

/// API credentials for authenticated requests.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    signer: Arc<dyn PayloadSigner>,
}

impl ApiCredentials {
    /// Load credentials from environment variables.
    ///
    /// Looks for:
    /// - `BINANCE_API_KEY` - The API key (public)
    /// - `BINANCE_PRIVATE_KEY_PATH` - PEM file with an Ed25519 or RSA private key
    /// - `BINANCE_SECRET_KEY` - HMAC secret, used only when no key path is set
    ///
    /// # Errors
    /// Returns `AuthError::MissingEnvVar` if the API key or both key sources are
    /// missing, and a key error if the PEM file cannot be used.
    pub fn from_env() -> Result<Self, AuthError> {
        // Load .env file if present (ignores errors if file doesn't exist)
        dotenvy::dotenv().ok();

        let api_key = std::env::var("BINANCE_API_KEY")
            .map_err(|_| AuthError::MissingEnvVar("BINANCE_API_KEY".into()))?;

        if let Ok(path) = std::env::var("BINANCE_PRIVATE_KEY_PATH") {
            let signer = load_private_key_file(path)?;
            return Ok(Self::new(api_key, signer));
        }

        let secret_key = std::env::var("BINANCE_SECRET_KEY").map_err(|_| {
            AuthError::MissingEnvVar("BINANCE_PRIVATE_KEY_PATH or BINANCE_SECRET_KEY".into())
        })?;

        tracing::warn!("No private key configured, falling back to HMAC signing");
        Ok(Self::new(api_key, Arc::new(HmacSigner::new(secret_key))))
    }

    /// Create credentials from an API key and an already loaded signer.
    pub fn new(api_key: impl Into<String>, signer: Arc<dyn PayloadSigner>) -> Self {
        Self {
            api_key: api_key.into(),
            signer,
        }
    }

    /// Get the API key (public, safe to log).
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn signer(&self) -> &dyn PayloadSigner {
        self.signer.as_ref()
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("algorithm", &self.signer.algorithm())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = ApiCredentials::new("my_api_key", Arc::new(HmacSigner::new("my_secret")));
        assert_eq!(creds.api_key(), "my_api_key");
        assert_eq!(creds.signer().algorithm(), "HMAC-SHA256");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ApiCredentials::new(
            "my_api_key",
            Arc::new(HmacSigner::new("super_secret_key")),
        );
        let debug_str = format!("{:?}", creds);

        assert!(debug_str.contains("my_api_key"));
        assert!(!debug_str.contains("super_secret_key"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}

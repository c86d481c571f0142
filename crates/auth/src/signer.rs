//! Request signing for the Binance API.
//!
//! Three key types are supported:
//! - Ed25519 (PKCS#8 PEM), base64 signature
//! - RSA (PKCS#8 or PKCS#1 PEM), RSASSA-PKCS1-v1_5 with SHA-256, base64 signature
//! - HMAC-SHA256 over a shared secret, hex signature

use crate::credentials::ApiCredentials;
use crate::error::AuthError;
use crate::query::{encode_component, QueryParams};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::path::Path;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Produces a signature string for an arbitrary payload.
pub trait PayloadSigner: Send + Sync {
    /// Sign `payload` and return the textual signature (not yet url-encoded).
    fn sign(&self, payload: &[u8]) -> Result<String, AuthError>;

    /// Short algorithm name for logs.
    fn algorithm(&self) -> &'static str;
}

/// HMAC-SHA256 signer over a shared secret key.
pub struct HmacSigner {
    secret: SecretString,
}

impl HmacSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
        }
    }
}

impl PayloadSigner for HmacSigner {
    fn sign(&self, payload: &[u8]) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn algorithm(&self) -> &'static str {
        "HMAC-SHA256"
    }
}

/// Ed25519 signer.
pub struct Ed25519Signer {
    key: ed25519_dalek::SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: ed25519_dalek::SigningKey) -> Self {
        Self { key }
    }

    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.key.verifying_key()
    }
}

impl PayloadSigner for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Result<String, AuthError> {
        use ed25519_dalek::Signer;

        let signature = self
            .key
            .try_sign(payload)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(BASE64.encode(signature.to_bytes()))
    }

    fn algorithm(&self) -> &'static str {
        "Ed25519"
    }
}

/// RSA signer (PKCS#1 v1.5 padding, SHA-256 digest).
pub struct RsaSigner {
    key: rsa::pkcs1v15::SigningKey<Sha256>,
}

impl RsaSigner {
    pub fn new(key: rsa::RsaPrivateKey) -> Self {
        Self {
            key: rsa::pkcs1v15::SigningKey::<Sha256>::new(key),
        }
    }
}

impl PayloadSigner for RsaSigner {
    fn sign(&self, payload: &[u8]) -> Result<String, AuthError> {
        use rsa::signature::{SignatureEncoding, Signer};

        let signature = self
            .key
            .try_sign(payload)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(BASE64.encode(signature.to_vec()))
    }

    fn algorithm(&self) -> &'static str {
        "RSA-SHA256"
    }
}

/// Parse a PEM private key into a signer.
///
/// Tries Ed25519 PKCS#8 first, then RSA PKCS#8, then RSA PKCS#1.
pub fn load_private_key_pem(pem: &str) -> Result<Arc<dyn PayloadSigner>, AuthError> {
    if let Ok(key) =
        <ed25519_dalek::SigningKey as ed25519_dalek::pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
    {
        return Ok(Arc::new(Ed25519Signer::new(key)));
    }

    if let Ok(key) = <rsa::RsaPrivateKey as rsa::pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem) {
        return Ok(Arc::new(RsaSigner::new(key)));
    }

    if let Ok(key) = <rsa::RsaPrivateKey as rsa::pkcs1::DecodeRsaPrivateKey>::from_pkcs1_pem(pem)
    {
        return Ok(Arc::new(RsaSigner::new(key)));
    }

    Err(AuthError::InvalidKey(
        "expected an Ed25519 or RSA private key in PEM format".into(),
    ))
}

/// Read and parse a PEM private key file.
///
/// The key is read once and only kept in memory afterwards.
pub fn load_private_key_file(path: impl AsRef<Path>) -> Result<Arc<dyn PayloadSigner>, AuthError> {
    let path = path.as_ref();
    let pem = std::fs::read_to_string(path).map_err(|source| AuthError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;

    let signer = load_private_key_pem(&pem)?;
    tracing::info!(
        path = %path.display(),
        algorithm = signer.algorithm(),
        "Loaded signing key"
    );
    Ok(signer)
}

/// Request signer for authenticated Binance API calls.
pub struct RequestSigner<'a> {
    credentials: &'a ApiCredentials,
}

impl<'a> RequestSigner<'a> {
    /// Create a new request signer with the given credentials.
    pub fn new(credentials: &'a ApiCredentials) -> Self {
        Self { credentials }
    }

    /// Sign a message and return the raw (not url-encoded) signature.
    pub fn sign(&self, message: &str) -> Result<String, AuthError> {
        self.credentials.signer().sign(message.as_bytes())
    }

    /// Build a signed query string from parameters.
    ///
    /// This method:
    /// 1. Sets `timestamp` on the parameters
    /// 2. Serializes them in insertion order
    /// 3. Signs the serialized string
    /// 4. Appends the url-encoded signature as the final parameter
    pub fn signed_query(
        &self,
        mut params: QueryParams,
        timestamp_ms: i64,
    ) -> Result<String, AuthError> {
        params.set("timestamp", timestamp_ms);
        let query_string = params.to_query_string();
        let signature = self.sign(&query_string)?;

        Ok(format!(
            "{}&signature={}",
            query_string,
            encode_component(&signature)
        ))
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for RsaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaSigner")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

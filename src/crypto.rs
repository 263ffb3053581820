//! Resolution of stored secrets.
//!
//! Secrets in instance configurations are either plain text or protected
//! values of the form `{<hex>}`, where the hex payload is a 12 byte AES-GCM
//! nonce followed by the ciphertext and tag. Resolving a protected value that
//! cannot be decrypted is an activation error.

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use tracing::debug;

use crate::errors::CryptoError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Platform capability to recognise and decrypt protected secrets
pub trait SecretUnprotector: Send + Sync {
    fn is_protected(&self, value: &str) -> bool;

    fn unprotect(&self, value: &str) -> Result<String, CryptoError>;
}

/// Returns true when `value` has the shape of a protected secret
pub fn looks_protected(value: &str) -> bool {
    let Some(inner) = value
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return false;
    };

    inner.len() >= 2 * (NONCE_LEN + TAG_LEN)
        && inner.len() % 2 == 0
        && inner.bytes().all(|b| b.is_ascii_hexdigit())
}

/// AES-256-GCM implementation of [`SecretUnprotector`]
pub struct AesGcmCryptoSupport {
    cipher: Aes256Gcm,
}

impl AesGcmCryptoSupport {
    /// Creates the crypto support from a 64 character hex encoded key
    pub fn from_hex_key(key_hex: &str) -> Result<Self, CryptoError> {
        let key = hex::decode(key_hex.trim()).map_err(|e| CryptoError::InvalidKey {
            details: e.to_string(),
        })?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::InvalidKey {
            details: format!("expected 32 bytes, got {}", key.len()),
        })?;
        Ok(Self { cipher })
    }

    /// Generates a fresh random key, hex encoded
    pub fn generate_key() -> String {
        hex::encode(Aes256Gcm::generate_key(&mut OsRng))
    }

    /// Encrypts `plaintext` into its protected form
    pub fn protect(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(format!("{{{}}}", hex::encode(blob)))
    }
}

impl SecretUnprotector for AesGcmCryptoSupport {
    fn is_protected(&self, value: &str) -> bool {
        looks_protected(value)
    }

    fn unprotect(&self, value: &str) -> Result<String, CryptoError> {
        let inner = value
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| CryptoError::Malformed {
                details: "missing braces".to_string(),
            })?;
        let blob = hex::decode(inner).map_err(|e| CryptoError::Malformed {
            details: e.to_string(),
        })?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Malformed {
                details: format!("{} bytes is too short", blob.len()),
            });
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Used when no secret key is configured: plain values pass, protected ones fail
pub struct NoKeyCryptoSupport;

impl SecretUnprotector for NoKeyCryptoSupport {
    fn is_protected(&self, value: &str) -> bool {
        looks_protected(value)
    }

    fn unprotect(&self, _value: &str) -> Result<String, CryptoError> {
        Err(CryptoError::MissingKey)
    }
}

/// Resolves stored secrets to plain text
#[derive(Clone)]
pub struct CredentialResolver {
    unprotector: Arc<dyn SecretUnprotector>,
}

impl CredentialResolver {
    pub fn new(unprotector: Arc<dyn SecretUnprotector>) -> Self {
        Self { unprotector }
    }

    /// Resolver that only accepts plain text secrets
    pub fn plaintext() -> Self {
        Self::new(Arc::new(NoKeyCryptoSupport))
    }

    pub fn resolve(&self, value: &str) -> Result<String, CryptoError> {
        if self.unprotector.is_protected(value) {
            debug!("Unprotecting stored secret");
            self.unprotector.unprotect(value)
        } else {
            Ok(value.to_string())
        }
    }

    pub fn resolve_optional(&self, value: Option<&str>) -> Result<Option<String>, CryptoError> {
        value.map(|v| self.resolve(v)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypto() -> AesGcmCryptoSupport {
        AesGcmCryptoSupport::from_hex_key(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn test_protect_then_resolve() {
        let crypto = crypto();
        let protected = crypto.protect("s3cr3t pass").unwrap();
        assert!(looks_protected(&protected));

        let resolver = CredentialResolver::new(Arc::new(crypto));
        assert_eq!(resolver.resolve(&protected).unwrap(), "s3cr3t pass");
    }

    #[test]
    fn test_plain_values_pass_through() {
        let resolver = CredentialResolver::new(Arc::new(crypto()));
        assert_eq!(resolver.resolve("plain").unwrap(), "plain");
        // braces alone do not make a value protected
        assert_eq!(resolver.resolve("{abc}").unwrap(), "{abc}");
        assert_eq!(resolver.resolve_optional(None).unwrap(), None);
    }

    #[test]
    fn test_wrong_key_fails() {
        let protected = crypto().protect("value").unwrap();
        let other = AesGcmCryptoSupport::from_hex_key(&"cd".repeat(32)).unwrap();
        let resolver = CredentialResolver::new(Arc::new(other));
        assert!(matches!(
            resolver.resolve(&protected),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_protected_value_without_key_fails() {
        let protected = crypto().protect("value").unwrap();
        let resolver = CredentialResolver::plaintext();
        assert!(matches!(resolver.resolve(&protected), Err(CryptoError::MissingKey)));
        assert_eq!(resolver.resolve("plain").unwrap(), "plain");
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(
            AesGcmCryptoSupport::from_hex_key("abcd"),
            Err(CryptoError::InvalidKey { .. })
        ));
        assert!(AesGcmCryptoSupport::from_hex_key(&AesGcmCryptoSupport::generate_key()).is_ok());
    }
}

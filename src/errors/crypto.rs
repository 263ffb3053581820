use thiserror::Error;

use super::{ClassifiedError, ErrorSeverity};

/// Errors raised while protecting or unprotecting stored secrets
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Value is protected but no secret key is configured")]
    MissingKey,

    #[error("Invalid secret key: {details}")]
    InvalidKey { details: String },

    #[error("Protected value is malformed: {details}")]
    Malformed { details: String },

    #[error("Protected value could not be decrypted")]
    DecryptionFailed,

    #[error("Value could not be encrypted")]
    EncryptionFailed,
}

impl ClassifiedError for CryptoError {
    fn error_code(&self) -> &'static str {
        match self {
            CryptoError::MissingKey => "CRYPTO_MISSING_KEY",
            CryptoError::InvalidKey { .. } => "CRYPTO_INVALID_KEY",
            CryptoError::Malformed { .. } => "CRYPTO_MALFORMED",
            CryptoError::DecryptionFailed => "CRYPTO_DECRYPTION_FAILED",
            CryptoError::EncryptionFailed => "CRYPTO_ENCRYPTION_FAILED",
        }
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }
}

use std::path::PathBuf;

use thiserror::Error;

use super::{ClassifiedError, CryptoError, ErrorSeverity};

/// Errors that block activation of an instance configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Failed to activate client. Some of mandatory fields are blank: \
         instanceId [{instance_id:?}], endpoint [{endpoint:?}], assetDownloadEndpoint [{asset_download_endpoint:?}]"
    )]
    MissingMandatoryFields {
        instance_id: Option<String>,
        endpoint: Option<String>,
        asset_download_endpoint: Option<String>,
    },

    #[error("Invalid value for '{field}': {details}")]
    InvalidValue { field: &'static str, details: String },

    #[error("Cannot resolve secret '{field}' of instance '{instance_id}': {source}")]
    Secret {
        instance_id: String,
        field: &'static str,
        #[source]
        source: CryptoError,
    },

    #[error("Failed to build HTTP client for instance '{instance_id}': {source}")]
    ClientBuild {
        instance_id: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClassifiedError for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::MissingMandatoryFields { .. } => "CONFIG_MISSING_FIELDS",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::Secret { .. } => "CONFIG_SECRET",
            ConfigError::ClientBuild { .. } => "CONFIG_CLIENT_BUILD",
        }
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }
}

/// Errors while loading client TLS material.
///
/// These never block activation: the client factory logs them and falls back
/// to the default TLS context.
#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("Cannot read keystore {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Keystore type '{keystore_type}' is not supported (use PKCS12 or PEM)")]
    UnsupportedType { keystore_type: String },

    #[error("Keystore {path} contains no {missing}")]
    Incomplete { path: PathBuf, missing: &'static str },

    #[error("Cannot parse keystore {path}: {details}")]
    Unreadable { path: PathBuf, details: String },

    #[error("Cannot derive key material from {path}: {source}")]
    KeyMaterial {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
}

impl ClassifiedError for KeystoreError {
    fn error_code(&self) -> &'static str {
        match self {
            KeystoreError::Read { .. } => "KEYSTORE_READ",
            KeystoreError::UnsupportedType { .. } => "KEYSTORE_UNSUPPORTED_TYPE",
            KeystoreError::Incomplete { .. } => "KEYSTORE_INCOMPLETE",
            KeystoreError::Unreadable { .. } => "KEYSTORE_UNREADABLE",
            KeystoreError::KeyMaterial { .. } => "KEYSTORE_KEY_MATERIAL",
        }
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Degraded
    }
}

use reqwest::StatusCode;
use thiserror::Error;

use super::{ClassifiedError, ErrorSeverity};

/// Errors that abort a single delivery.
///
/// A delete answered with 404 is not an error and never shows up here; a
/// publish without payload is reported through the delivery result instead.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("No client registered for instance '{instance_id}'")]
    UnknownInstance { instance_id: String },

    #[error("Can not create endpoint URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Delivery path '{path}' is rejected: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Can not create asset data for '{path}': {source}")]
    InvalidPayload {
        path: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("HTTP method {method} is not supported by the client")]
    UnsupportedMethod { method: &'static str },

    #[error("{operation} {url} failed: {source}")]
    Transport {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} {url} returned HTTP {status}")]
    UnexpectedStatus {
        operation: &'static str,
        url: String,
        status: StatusCode,
    },
}

impl DeliveryError {
    /// HTTP status reported by the remote share, if the failure came from one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryError::UnexpectedStatus { status, .. } => Some(*status),
            DeliveryError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl ClassifiedError for DeliveryError {
    fn error_code(&self) -> &'static str {
        match self {
            DeliveryError::UnknownInstance { .. } => "DELIVERY_UNKNOWN_INSTANCE",
            DeliveryError::InvalidUri { .. } | DeliveryError::InvalidPath { .. } => {
                "DELIVERY_URI_CONSTRUCTION"
            }
            DeliveryError::InvalidPayload { .. } => "DELIVERY_INVALID_PAYLOAD",
            DeliveryError::UnsupportedMethod { .. } => "DELIVERY_UNSUPPORTED_METHOD",
            DeliveryError::Transport { .. } => "DELIVERY_TRANSPORT",
            DeliveryError::UnexpectedStatus { .. } => "DELIVERY_REMOTE_STATUS",
        }
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }
}

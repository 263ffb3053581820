pub mod crypto;
pub mod delivery;
pub mod instance;

pub use crypto::CryptoError;
pub use delivery::DeliveryError;
pub use instance::{ConfigError, KeystoreError};

/// How far an error reaches.
///
/// `Fatal` errors abort the owning operation (instance activation or a single
/// delivery) and are surfaced to the caller. `Degraded` errors are logged and
/// the operation continues with a weaker fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Fatal,
    Degraded,
}

/// Common trait for the error types of this crate
pub trait ClassifiedError: std::error::Error + Send + Sync + 'static {
    /// Stable machine readable code, used in CLI output and logs
    fn error_code(&self) -> &'static str;

    /// Classification consumed by the activation and delivery paths
    fn severity(&self) -> ErrorSeverity;

    fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }
}

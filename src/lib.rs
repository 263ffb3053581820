pub mod config;
pub mod connection;
pub mod crypto;
pub mod errors;
pub mod models;
pub mod services;

pub use connection::{ClientHandle, ClientRegistry, InstanceConfig};
pub use crypto::CredentialResolver;
pub use errors::{ClassifiedError, ConfigError, DeliveryError, ErrorSeverity};
pub use models::{ActionType, DeliveryRecord, DeliveryResult, Payload};
pub use services::webdav::WebDavTransport;
pub use services::TransportHandler;

// Instance clients: configuration, HTTP client construction and the registry

pub mod client_factory;
pub mod instance;
pub mod keystore;
pub mod registry;

pub use client_factory::{ClientTls, SecureClientFactory};
pub use instance::{ClientHandle, InstanceConfig, Scheme, TlsProtocol};
pub use registry::{ClientRegistry, DWRE_SCHEME};

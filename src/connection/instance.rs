use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::tls::Version;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto::CredentialResolver;
use crate::errors::ConfigError;

use super::client_factory::{ClientTls, SecureClientFactory};

pub const DEFAULT_TLS_PROTOCOL: &str = "TLSv1.2";
pub const DEFAULT_KEYSTORE_TYPE: &str = "JKS";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            Scheme::Http => "http://",
            Scheme::Https => "https://",
        }
    }
}

/// The single TLS protocol version a client negotiates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProtocol {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsProtocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "TLSv1" | "TLSv1.0" => Some(TlsProtocol::Tls10),
            "TLSv1.1" => Some(TlsProtocol::Tls11),
            "TLSv1.2" => Some(TlsProtocol::Tls12),
            "TLSv1.3" => Some(TlsProtocol::Tls13),
            _ => None,
        }
    }

    pub fn version(&self) -> Version {
        match self {
            TlsProtocol::Tls10 => Version::TLS_1_0,
            TlsProtocol::Tls11 => Version::TLS_1_1,
            TlsProtocol::Tls12 => Version::TLS_1_2,
            TlsProtocol::Tls13 => Version::TLS_1_3,
        }
    }
}

fn default_tls_protocol() -> String {
    DEFAULT_TLS_PROTOCOL.to_string()
}

fn default_keystore_type() -> String {
    DEFAULT_KEYSTORE_TYPE.to_string()
}

/// Connection settings of one commerce instance.
///
/// Mandatory fields deserialize to empty strings when absent so that
/// [`InstanceConfig::validate`] can report all of them at once. The dotted
/// aliases accept property files exported from older deployments.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    #[serde(default, alias = "instance.id")]
    pub instance_id: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub asset_download_endpoint: String,
    #[serde(default)]
    pub scheme: Scheme,
    #[serde(default, alias = "timeout.socket")]
    pub socket_timeout_ms: u64,
    #[serde(default, alias = "connection.socket")]
    pub connect_timeout_ms: u64,
    #[serde(default, alias = "interface")]
    pub bind_interface: Option<String>,
    #[serde(default = "default_tls_protocol", alias = "ssl")]
    pub tls_protocol: String,
    #[serde(default = "default_keystore_type", alias = "keystore.type")]
    pub keystore_type: String,
    #[serde(default, alias = "keystore.path")]
    pub keystore_path: Option<PathBuf>,
    #[serde(default, alias = "keystore.password")]
    pub keystore_password: Option<String>,
    #[serde(default, alias = "key.password")]
    pub key_password: Option<String>,
    #[serde(default, alias = "webdav.endpoint")]
    pub webdav_endpoint: Option<String>,
    #[serde(default, alias = "webdav.user")]
    pub webdav_user: Option<String>,
    #[serde(default, alias = "webdav.password")]
    pub webdav_password: Option<String>,
}

impl std::fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("InstanceConfig")
            .field("instance_id", &self.instance_id)
            .field("endpoint", &self.endpoint)
            .field("asset_download_endpoint", &self.asset_download_endpoint)
            .field("scheme", &self.scheme)
            .field("socket_timeout_ms", &self.socket_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("bind_interface", &self.bind_interface)
            .field("tls_protocol", &self.tls_protocol)
            .field("keystore_type", &self.keystore_type)
            .field("keystore_path", &self.keystore_path)
            .field("keystore_password", &redact(&self.keystore_password))
            .field("key_password", &redact(&self.key_password))
            .field("webdav_endpoint", &self.webdav_endpoint)
            .field("webdav_user", &self.webdav_user)
            .field("webdav_password", &redact(&self.webdav_password))
            .finish()
    }
}

/// Client certificate settings, present only when the whole group is configured
#[derive(Debug, Clone, Copy)]
pub struct KeystoreSettings<'a> {
    pub keystore_type: &'a str,
    pub path: &'a std::path::Path,
    pub store_password: &'a str,
    pub key_password: &'a str,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl InstanceConfig {
    pub fn new(
        instance_id: impl Into<String>,
        endpoint: impl Into<String>,
        asset_download_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            endpoint: endpoint.into(),
            asset_download_endpoint: asset_download_endpoint.into(),
            tls_protocol: default_tls_protocol(),
            keystore_type: default_keystore_type(),
            ..Default::default()
        }
    }

    /// Validates mandatory fields and value formats
    pub fn validate(&self) -> Result<(), ConfigError> {
        let blank = |v: &str| v.trim().is_empty();
        if blank(&self.instance_id) || blank(&self.endpoint) || blank(&self.asset_download_endpoint) {
            let keep = |v: &str| (!blank(v)).then(|| v.to_string());
            return Err(ConfigError::MissingMandatoryFields {
                instance_id: keep(&self.instance_id),
                endpoint: keep(&self.endpoint),
                asset_download_endpoint: keep(&self.asset_download_endpoint),
            });
        }

        if self.endpoint.contains("://") {
            return Err(ConfigError::InvalidValue {
                field: "endpoint",
                details: "expected a hostname without scheme".to_string(),
            });
        }

        if !blank(&self.tls_protocol) && TlsProtocol::parse(&self.tls_protocol).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "tlsProtocol",
                details: format!("unknown protocol '{}'", self.tls_protocol),
            });
        }

        Ok(())
    }

    /// Configured TLS protocol, blank falls back to TLSv1.2
    pub fn tls_protocol(&self) -> TlsProtocol {
        TlsProtocol::parse(&self.tls_protocol).unwrap_or(TlsProtocol::Tls12)
    }

    pub fn keystore_type(&self) -> &str {
        let t = self.keystore_type.trim();
        if t.is_empty() {
            DEFAULT_KEYSTORE_TYPE
        } else {
            t
        }
    }

    /// Mutual TLS settings, when path and both passwords are all present
    pub fn keystore(&self) -> Option<KeystoreSettings<'_>> {
        let path = self.keystore_path.as_deref().filter(|p| !p.as_os_str().is_empty());
        let store_password = non_blank(&self.keystore_password);
        let key_password = non_blank(&self.key_password);

        match (path, store_password, key_password) {
            (Some(path), Some(store_password), Some(key_password)) => Some(KeystoreSettings {
                keystore_type: self.keystore_type(),
                path,
                store_password,
                key_password,
            }),
            (None, None, None) => None,
            _ => {
                warn!(
                    "Incomplete keystore settings for instance {}, using plain TLS",
                    self.instance_id
                );
                None
            }
        }
    }

    pub fn bind_interface(&self) -> Option<&str> {
        non_blank(&self.bind_interface)
    }

    pub fn webdav_endpoint(&self) -> &str {
        non_blank(&self.webdav_endpoint).unwrap_or(&self.endpoint)
    }
}

/// Runtime client of one activated instance.
///
/// Holds the resolved configuration (secrets in plain text) and the pooled
/// HTTP client shared by every delivery to the instance.
#[derive(Debug)]
pub struct ClientHandle {
    config: InstanceConfig,
    client: Client,
    client_tls: ClientTls,
    open_sessions: Arc<AtomicUsize>,
}

impl ClientHandle {
    /// Validates `config`, resolves its secrets and builds the HTTP client
    pub fn activate(
        mut config: InstanceConfig,
        credentials: &CredentialResolver,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let secret = |field: &'static str, value: Option<&str>| {
            credentials
                .resolve_optional(value)
                .map_err(|source| ConfigError::Secret {
                    instance_id: config.instance_id.clone(),
                    field,
                    source,
                })
        };
        let webdav_password = secret("webdavPassword", config.webdav_password.as_deref())?;
        let keystore_password = secret("keystorePassword", config.keystore_password.as_deref())?;
        let key_password = secret("keyPassword", config.key_password.as_deref())?;
        config.webdav_password = webdav_password;
        config.keystore_password = keystore_password;
        config.key_password = key_password;

        let (client, client_tls) =
            SecureClientFactory::build_with_tls(&config).map_err(|source| ConfigError::ClientBuild {
                instance_id: config.instance_id.clone(),
                source,
            })?;

        debug!("activating client for instance {}", config.instance_id);
        info!("✅ Activated instance {} ({})", config.instance_id, config.endpoint);

        Ok(Self {
            config,
            client,
            client_tls,
            open_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn scheme(&self) -> Scheme {
        self.config.scheme
    }

    /// WebDAV host, the override when configured, the instance endpoint otherwise
    pub fn webdav_endpoint(&self) -> &str {
        self.config.webdav_endpoint()
    }

    pub fn webdav_user(&self) -> Option<&str> {
        non_blank(&self.config.webdav_user)
    }

    pub fn webdav_password(&self) -> Option<&str> {
        self.config.webdav_password.as_deref()
    }

    pub fn asset_download_endpoint(&self) -> &str {
        &self.config.asset_download_endpoint
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// The pooled client; clones share the same connection pool
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Whether the pooled client presents the keystore identity
    pub fn client_tls(&self) -> ClientTls {
        self.client_tls
    }

    /// Builds a new client with its own pool from the same network policy
    pub fn build_http_client(&self) -> Result<Client, ConfigError> {
        SecureClientFactory::build(&self.config).map_err(|source| ConfigError::ClientBuild {
            instance_id: self.config.instance_id.clone(),
            source,
        })
    }

    /// Number of transport sessions currently open on this handle
    pub fn active_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub(crate) fn session_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open_sessions)
    }
}

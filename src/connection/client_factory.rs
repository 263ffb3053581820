use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, error, warn};

use super::instance::{InstanceConfig, TlsProtocol};
use super::keystore::{load_client_material, ClientTlsMaterial, TlsBackend};

/// TLS context a client ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTls {
    /// System trust, no client certificate
    Default,
    /// Keystore identity presented, keystore certificates trusted next to the system roots
    ClientCertificate,
}

/// Builds HTTP clients from the network policy of one instance.
///
/// `http` URLs use plain sockets, `https` URLs a TLS context pinned to the
/// configured protocol version. Proxies come from the system environment
/// (`HTTPS_PROXY`, `NO_PROXY`, ...). Every call returns an independent client
/// with its own connection pool.
pub struct SecureClientFactory;

impl SecureClientFactory {
    pub fn build(config: &InstanceConfig) -> Result<Client, reqwest::Error> {
        Self::build_with_tls(config).map(|(client, _)| client)
    }

    /// Builds the client and reports whether the keystore made it in.
    /// Keystore failures degrade to the default TLS context.
    pub fn build_with_tls(config: &InstanceConfig) -> Result<(Client, ClientTls), reqwest::Error> {
        debug!("Create new HttpClient for instance {}", config.instance_id);

        if let Some(material) = Self::client_material(config) {
            let mut builder = Self::builder(config).identity(material.identity);
            for certificate in material.trusted_certificates {
                builder = builder.add_root_certificate(certificate);
            }

            match builder.build() {
                Ok(client) => return Ok((client, ClientTls::ClientCertificate)),
                Err(e) => Self::degraded(config, &e),
            }
        }

        Self::builder(config).build().map(|client| (client, ClientTls::Default))
    }

    /// TLS 1.3 is only available through rustls
    pub fn backend_for(protocol: TlsProtocol) -> TlsBackend {
        match protocol {
            TlsProtocol::Tls13 => TlsBackend::Rustls,
            _ => TlsBackend::Native,
        }
    }

    fn client_material(config: &InstanceConfig) -> Option<ClientTlsMaterial> {
        let settings = config.keystore()?;
        match load_client_material(&settings, Self::backend_for(config.tls_protocol())) {
            Ok(material) => Some(material),
            Err(e) => {
                Self::degraded(config, &e);
                None
            }
        }
    }

    fn degraded(config: &InstanceConfig, cause: &dyn std::fmt::Display) {
        error!("Cannot set custom ssl config for instance {}: {}", config.instance_id, cause);
        warn!(
            "⚠️ Instance {} continues with the default TLS context, client certificate disabled",
            config.instance_id
        );
    }

    fn builder(config: &InstanceConfig) -> ClientBuilder {
        let protocol = config.tls_protocol();

        let mut builder = match Self::backend_for(protocol) {
            TlsBackend::Native => Client::builder().use_native_tls(),
            TlsBackend::Rustls => Client::builder().use_rustls_tls(),
        }
        .min_tls_version(protocol.version())
        .max_tls_version(protocol.version())
        .redirect(Policy::default());

        if config.connect_timeout_ms > 0 {
            debug!("* Connect Timeout: {}", config.connect_timeout_ms);
            builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
        }

        if config.socket_timeout_ms > 0 {
            debug!("* Socket Timeout: {}", config.socket_timeout_ms);
            builder = builder.read_timeout(Duration::from_millis(config.socket_timeout_ms));
        }

        if let Some(local) = config.bind_interface().and_then(resolve_local_address) {
            debug!("* Local Address: {}", local);
            builder = builder.local_address(local);
        }

        builder
    }
}

/// Resolves a configured interface name or address; failures only get logged
pub fn resolve_local_address(interface: &str) -> Option<IpAddr> {
    if let Ok(ip) = interface.parse::<IpAddr>() {
        return Some(ip);
    }

    match (interface, 0).to_socket_addrs() {
        Ok(mut addrs) => {
            let resolved = addrs.next().map(|addr| addr.ip());
            if resolved.is_none() {
                debug!("Cannot set local address to {}: no address found", interface);
            }
            resolved
        }
        Err(e) => {
            debug!("Cannot set local address to {}: {}", interface, e);
            None
        }
    }
}

use std::io::Write;
use std::sync::Arc;

use dwre_transport::config::parse_instances;
use dwre_transport::connection::{ClientHandle, ClientRegistry, ClientTls, InstanceConfig};
use p12_keystore::{KeyStore, KeyStoreEntry, PrivateKeyChain};
use rcgen::{CertificateParams, KeyPair};
use dwre_transport::crypto::{AesGcmCryptoSupport, CredentialResolver};
use dwre_transport::errors::ErrorSeverity;
use dwre_transport::{ClassifiedError, ConfigError};

fn dw1() -> InstanceConfig {
    InstanceConfig::new("dw1", "dw1.example.net", "/on/demandware.static/-/Sites-Library")
}

fn resolver() -> (AesGcmCryptoSupport, CredentialResolver) {
    let key = AesGcmCryptoSupport::generate_key();
    let crypto = AesGcmCryptoSupport::from_hex_key(&key).unwrap();
    let resolver = CredentialResolver::new(Arc::new(AesGcmCryptoSupport::from_hex_key(&key).unwrap()));
    (crypto, resolver)
}

#[test]
fn test_activation_resolves_protected_credentials() {
    let (crypto, resolver) = resolver();
    let mut config = dw1();
    config.webdav_user = Some("admin".to_string());
    config.webdav_password = Some(crypto.protect("s3cret").unwrap());

    let handle = ClientHandle::activate(config, &resolver).unwrap();

    assert_eq!(handle.instance_id(), "dw1");
    assert_eq!(handle.webdav_user(), Some("admin"));
    assert_eq!(handle.webdav_password(), Some("s3cret"));
    assert_eq!(handle.webdav_endpoint(), "dw1.example.net");
    assert_eq!(handle.active_sessions(), 0);
}

#[test]
fn test_plaintext_credentials_pass_through() {
    let (_, resolver) = resolver();
    let mut config = dw1();
    config.webdav_password = Some("plain".to_string());

    let handle = ClientHandle::activate(config, &resolver).unwrap();
    assert_eq!(handle.webdav_password(), Some("plain"));
}

#[test]
fn test_undecryptable_secret_blocks_activation() {
    let (other, _) = resolver();
    let (_, resolver) = resolver();
    let mut config = dw1();
    config.webdav_password = Some(other.protect("s3cret").unwrap());

    let err = ClientHandle::activate(config, &resolver).unwrap_err();
    assert!(matches!(err, ConfigError::Secret { field: "webdavPassword", .. }));
    assert_eq!(err.severity(), ErrorSeverity::Fatal);
}

#[test]
fn test_protected_secret_without_key_blocks_activation() {
    let (crypto, _) = resolver();
    let mut config = dw1();
    config.keystore_password = Some(crypto.protect("store").unwrap());

    let err = ClientHandle::activate(config, &CredentialResolver::plaintext()).unwrap_err();
    assert!(matches!(err, ConfigError::Secret { field: "keystorePassword", .. }));
}

#[test]
fn test_missing_mandatory_fields() {
    let err = ClientHandle::activate(
        InstanceConfig::new("dw1", "", "/x"),
        &CredentialResolver::plaintext(),
    )
    .unwrap_err();

    match err {
        ConfigError::MissingMandatoryFields {
            instance_id,
            endpoint,
            asset_download_endpoint,
        } => {
            assert_eq!(instance_id.as_deref(), Some("dw1"));
            assert_eq!(endpoint, None);
            assert_eq!(asset_download_endpoint.as_deref(), Some("/x"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_unreadable_keystore_degrades_to_default_tls() {
    let mut config = dw1();
    config.keystore_type = "PKCS12".to_string();
    config.keystore_path = Some("/nonexistent/keystore.p12".into());
    config.keystore_password = Some("changeit".to_string());
    config.key_password = Some("changeit".to_string());

    let handle = ClientHandle::activate(config, &CredentialResolver::plaintext()).unwrap();
    assert_eq!(handle.client_tls(), ClientTls::Default);
    assert!(handle.build_http_client().is_ok());
}

#[test]
fn test_jks_keystore_degrades_to_default_tls() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0xFE, 0xED, 0xFE, 0xED, 0x00, 0x00, 0x00, 0x02]).unwrap();

    let mut config = dw1();
    config.keystore_path = Some(file.path().to_path_buf());
    config.keystore_password = Some("changeit".to_string());
    config.key_password = Some("changeit".to_string());

    assert_eq!(config.keystore_type(), "JKS");
    let handle = ClientHandle::activate(config, &CredentialResolver::plaintext()).unwrap();
    assert_eq!(handle.client_tls(), ClientTls::Default);
}

/// Self-signed client certificate packed into a PKCS#12 bundle
fn pkcs12_keystore(password: &str) -> tempfile::NamedTempFile {
    let key = KeyPair::generate().unwrap();
    let cert = CertificateParams::new(vec!["dw1.example.net".to_string()])
        .unwrap()
        .self_signed(&key)
        .unwrap();

    let chain = PrivateKeyChain::new(
        key.serialize_der(),
        b"dw1",
        vec![p12_keystore::Certificate::from_der(cert.der()).unwrap()],
    );
    let mut keystore = KeyStore::new();
    keystore.add_entry("dw1", KeyStoreEntry::PrivateKeyChain(chain));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&keystore.writer(password).write().unwrap()).unwrap();
    file
}

#[test]
fn test_protected_keystore_passwords_enable_client_certificate() {
    let (crypto, resolver) = resolver();
    let file = pkcs12_keystore("changeit");

    let mut config = dw1();
    config.keystore_type = "PKCS12".to_string();
    config.keystore_path = Some(file.path().to_path_buf());
    config.keystore_password = Some(crypto.protect("changeit").unwrap());
    config.key_password = Some(crypto.protect("changeit").unwrap());

    let handle = ClientHandle::activate(config, &resolver).unwrap();
    assert_eq!(handle.client_tls(), ClientTls::ClientCertificate);
    assert_eq!(handle.config().keystore_password.as_deref(), Some("changeit"));
}

#[test]
fn test_each_tls_protocol_builds_a_client() {
    for protocol in ["TLSv1", "TLSv1.1", "TLSv1.2", "TLSv1.3"] {
        let mut config = dw1();
        config.tls_protocol = protocol.to_string();
        config.socket_timeout_ms = 30_000;
        config.connect_timeout_ms = 5_000;
        assert!(
            ClientHandle::activate(config, &CredentialResolver::plaintext()).is_ok(),
            "{} should build",
            protocol
        );
    }
}

#[test]
fn test_unknown_bind_interface_is_ignored() {
    let mut config = dw1();
    config.bind_interface = Some("no-such-interface.invalid".to_string());
    assert!(ClientHandle::activate(config, &CredentialResolver::plaintext()).is_ok());
}

#[test]
fn test_registry_from_instances_file() {
    let instances = parse_instances(
        r#"[
            { "instanceId": "dw1", "endpoint": "dw1.example.net",
              "assetDownloadEndpoint": "/on/demandware.static/-/Sites-Library" },
            { "instanceId": "dw2", "endpoint": "dw2.example.net",
              "assetDownloadEndpoint": "/on/demandware.static/-/Sites-Library",
              "webdavEndpoint": "dav.dw2.example.net" },
            { "instanceId": "broken", "endpoint": "", "assetDownloadEndpoint": "/x" }
        ]"#,
    )
    .unwrap();

    let (registry, failures) = ClientRegistry::activate_all(instances, &CredentialResolver::plaintext());

    assert_eq!(registry.instance_ids(), vec!["dw1".to_string(), "dw2".to_string()]);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error_code(), "CONFIG_MISSING_FIELDS");
    assert_eq!(
        registry.lookup_transport_uri("demandware://dw2").unwrap().webdav_endpoint(),
        "dav.dw2.example.net"
    );
}

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::connection::InstanceConfig;
use crate::crypto::{AesGcmCryptoSupport, CredentialResolver};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone)]
pub struct Config {
    pub instances_file: PathBuf,
    pub secret_key: Option<String>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("instances_file", &self.instances_file)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            instances_file: env::var("INSTANCES_FILE")
                .unwrap_or_else(|_| "./instances.json".to_string())
                .into(),
            secret_key: env::var("SECRET_KEY").ok().filter(|k| !k.trim().is_empty()),
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }

    /// Resolver decrypting with `SECRET_KEY`, plain text only when unset
    pub fn credential_resolver(&self) -> Result<CredentialResolver> {
        match &self.secret_key {
            Some(key) => {
                let crypto = AesGcmCryptoSupport::from_hex_key(key).context("SECRET_KEY is invalid")?;
                Ok(CredentialResolver::new(Arc::new(crypto)))
            }
            None => Ok(CredentialResolver::plaintext()),
        }
    }

    /// Reads the instance configurations, a JSON array
    pub fn load_instances(&self) -> Result<Vec<InstanceConfig>> {
        let raw = std::fs::read_to_string(&self.instances_file)
            .with_context(|| format!("Cannot read {}", self.instances_file.display()))?;
        parse_instances(&raw)
            .with_context(|| format!("Invalid instance configuration in {}", self.instances_file.display()))
    }
}

pub fn parse_instances(raw: &str) -> Result<Vec<InstanceConfig>> {
    Ok(serde_json::from_str(raw)?)
}

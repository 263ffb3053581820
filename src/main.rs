use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::sync::Arc;
use tracing::{error, info, warn};

use dwre_transport::{
    config::{Config, LogFormat},
    crypto::AesGcmCryptoSupport,
    ClassifiedError, ClientRegistry, DeliveryRecord, TransportHandler, WebDavTransport,
};

fn init_tracing(format: &LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(env_filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }
}

fn cli() -> Command {
    Command::new("dwre-transport")
        .about("Deliver static assets to commerce instances over WebDAV")
        .subcommand_required(true)
        .subcommand(
            Command::new("deliver")
                .about("Run one delivery record against an instance")
                .arg(
                    Arg::new("instance")
                        .help("Instance id or demandware://<instanceId> transport URI")
                        .long("instance")
                        .short('i')
                        .required(true),
                )
                .arg(
                    Arg::new("record")
                        .help("Path of the JSON delivery record")
                        .long("record")
                        .short('r')
                        .value_name("FILE")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("protect")
                .about("Print the protected form of a secret for the instance configuration")
                .arg(Arg::new("secret").required(true).index(1)),
        )
        .subcommand(Command::new("generate-key").about("Print a new random SECRET_KEY"))
        .subcommand(Command::new("instances").about("Activate all configured instances and list them"))
}

/// Composition root: activates the configured instances into a registry
fn build_registry(config: &Config) -> Result<ClientRegistry> {
    let credentials = config.credential_resolver()?;
    let instances = config.load_instances()?;
    info!("Activating {} instance configuration(s)", instances.len());

    let (registry, failures) = ClientRegistry::activate_all(instances, &credentials);
    for failure in &failures {
        warn!("Instance not available [{}]: {}", failure.error_code(), failure);
    }
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("deliver", args)) => {
            let instance = args.get_one::<String>("instance").context("missing --instance")?;
            let record_path = args.get_one::<String>("record").context("missing --record")?;

            let raw = std::fs::read_to_string(record_path)
                .with_context(|| format!("Cannot read delivery record {}", record_path))?;
            let record: DeliveryRecord =
                serde_json::from_str(&raw).context("Invalid delivery record")?;

            let transport = WebDavTransport::new(Arc::new(build_registry(&config)?));
            match transport.deliver(instance, &record).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    if !result.is_success() {
                        std::process::exit(2);
                    }
                }
                Err(e) => {
                    error!("Delivery failed [{}]: {}", e.error_code(), e);
                    println!(
                        "{}",
                        serde_json::json!({
                            "outcome": "failed",
                            "code": e.error_code(),
                            "error": e.to_string(),
                        })
                    );
                    std::process::exit(1);
                }
            }
        }
        Some(("protect", args)) => {
            let secret = args.get_one::<String>("secret").context("missing secret")?;
            let key = config
                .secret_key
                .as_deref()
                .context("SECRET_KEY must be set to protect secrets")?;
            let crypto = AesGcmCryptoSupport::from_hex_key(key)?;
            println!("{}", crypto.protect(secret)?);
        }
        Some(("generate-key", _)) => {
            println!("{}", AesGcmCryptoSupport::generate_key());
        }
        Some(("instances", _)) => {
            let registry = build_registry(&config)?;
            for id in registry.instance_ids() {
                if let Some(handle) = registry.lookup(&id) {
                    println!(
                        "{}\t{}\twebdav={}\tassets={}\ttls={:?}",
                        id,
                        handle.endpoint(),
                        handle.webdav_endpoint(),
                        handle.asset_download_endpoint(),
                        handle.client_tls()
                    );
                }
            }
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

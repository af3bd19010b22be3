//! Server configuration, resolved once at startup and immutable after.
//!
//! Precedence: defaults, then the JSON config file, then command-line
//! flags, then environment variables. Environment overrides are
//! presence-based: an exported variable wins even when it carries the zero
//! value (so `RESTORE=false` really disables restoring).

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Configuration {
    pub server_address: String,
    pub store_interval: u64,
    pub file_storage_path: String,
    pub restore: bool,
    pub database_dsn: String,
    pub key: String,
    pub crypto_key: String,
    pub trusted_subnet: String,
    pub grpc_enabled: bool,
    pub grpc_port: u16,
}

impl Configuration {
    fn defaults() -> Self {
        Self {
            server_address: "localhost:8080".to_string(),
            store_interval: 300,
            file_storage_path: "/tmp/metrics-db.json".to_string(),
            restore: true,
            database_dsn: String::new(),
            key: String::new(),
            crypto_key: String::new(),
            trusted_subnet: String::new(),
            grpc_enabled: false,
            grpc_port: 50051,
        }
    }
}

#[derive(Debug, Default, Parser)]
#[command(name = "pulsemon-server", about = "Metrics collection server", version)]
struct Cli {
    /// Address to listen on (host:port)
    #[arg(short = 'a', long = "address")]
    server_address: Option<String>,

    /// Seconds between file snapshots; 0 flushes synchronously on every write
    #[arg(short = 'i', long = "store-interval")]
    store_interval: Option<u64>,

    /// Path of the metrics persistence file (empty disables persistence)
    #[arg(short = 'f', long = "file-storage-path")]
    file_storage_path: Option<String>,

    /// Restore metrics from the persistence file on startup
    #[arg(short = 'r', long = "restore", num_args = 0..=1, default_missing_value = "true")]
    restore: Option<bool>,

    /// Database DSN; a non-empty value selects the database backend
    #[arg(short = 'd', long = "database-dsn")]
    database_dsn: Option<String>,

    /// Shared secret for integrity tags (empty disables verification)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Path to the server's RSA private key in PEM (empty disables decryption)
    #[arg(long = "crypto-key")]
    crypto_key: Option<String>,

    /// Trusted subnet in CIDR form (empty disables the allowlist)
    #[arg(short = 't', long = "trusted-subnet")]
    trusted_subnet: Option<String>,

    /// Serve gRPC instead of HTTP
    #[arg(short = 'g', long = "grpc-enabled", num_args = 0..=1, default_missing_value = "true")]
    grpc_enabled: Option<bool>,

    /// gRPC port to listen on
    #[arg(short = 'p', long = "grpc-port")]
    grpc_port: Option<u16>,

    /// Path to a JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server_address: Option<String>,
    store_interval: Option<u64>,
    file_storage_path: Option<String>,
    restore: Option<bool>,
    database_dsn: Option<String>,
    key: Option<String>,
    crypto_key: Option<String>,
    trusted_subnet: Option<String>,
    grpc_enabled: Option<bool>,
    grpc_port: Option<u16>,
}

pub fn load() -> Result<Configuration> {
    resolve(Cli::parse(), |name| std::env::var(name).ok())
}

fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Result<Configuration> {
    let mut config = Configuration::defaults();

    let config_path = env("CONFIG").or_else(|| cli.config.clone());
    if let Some(path) = config_path.filter(|p| !p.is_empty()) {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read configuration file {path}"))?;
        let file: FileConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse configuration file {path}"))?;
        apply_file(&mut config, file);
    }

    apply_cli(&mut config, cli);
    apply_env(&mut config, &env);

    Ok(config)
}

fn apply_file(config: &mut Configuration, file: FileConfig) {
    if let Some(value) = file.server_address {
        config.server_address = value;
    }
    if let Some(value) = file.store_interval {
        config.store_interval = value;
    }
    if let Some(value) = file.file_storage_path {
        config.file_storage_path = value;
    }
    if let Some(value) = file.restore {
        config.restore = value;
    }
    if let Some(value) = file.database_dsn {
        config.database_dsn = value;
    }
    if let Some(value) = file.key {
        config.key = value;
    }
    if let Some(value) = file.crypto_key {
        config.crypto_key = value;
    }
    if let Some(value) = file.trusted_subnet {
        config.trusted_subnet = value;
    }
    if let Some(value) = file.grpc_enabled {
        config.grpc_enabled = value;
    }
    if let Some(value) = file.grpc_port {
        config.grpc_port = value;
    }
}

fn apply_cli(config: &mut Configuration, cli: Cli) {
    if let Some(value) = cli.server_address {
        config.server_address = value;
    }
    if let Some(value) = cli.store_interval {
        config.store_interval = value;
    }
    if let Some(value) = cli.file_storage_path {
        config.file_storage_path = value;
    }
    if let Some(value) = cli.restore {
        config.restore = value;
    }
    if let Some(value) = cli.database_dsn {
        config.database_dsn = value;
    }
    if let Some(value) = cli.key {
        config.key = value;
    }
    if let Some(value) = cli.crypto_key {
        config.crypto_key = value;
    }
    if let Some(value) = cli.trusted_subnet {
        config.trusted_subnet = value;
    }
    if let Some(value) = cli.grpc_enabled {
        config.grpc_enabled = value;
    }
    if let Some(value) = cli.grpc_port {
        config.grpc_port = value;
    }
}

fn apply_env(config: &mut Configuration, env: &impl Fn(&str) -> Option<String>) {
    if let Some(value) = env("ADDRESS") {
        config.server_address = value;
    }
    if let Some(value) = env("STORE_INTERVAL").and_then(|v| parse_env("STORE_INTERVAL", &v)) {
        config.store_interval = value;
    }
    if let Some(value) = env("FILE_STORAGE_PATH") {
        config.file_storage_path = value;
    }
    if let Some(value) = env("RESTORE").and_then(|v| parse_env("RESTORE", &v)) {
        config.restore = value;
    }
    if let Some(value) = env("DATABASE_DSN") {
        config.database_dsn = value;
    }
    if let Some(value) = env("KEY") {
        config.key = value;
    }
    if let Some(value) = env("CRYPTO_KEY") {
        config.crypto_key = value;
    }
    if let Some(value) = env("TRUSTED_SUBNET") {
        config.trusted_subnet = value;
    }
    if let Some(value) = env("GRPC_ENABLED").and_then(|v| parse_env("GRPC_ENABLED", &v)) {
        config.grpc_enabled = value;
    }
    if let Some(value) = env("GRPC_PORT").and_then(|v| parse_env("GRPC_PORT", &v)) {
        config.grpc_port = value;
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, value = raw, "ignoring unparseable environment override");
            None
        }
    }
}

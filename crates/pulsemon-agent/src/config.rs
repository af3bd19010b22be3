//! Agent configuration, resolved once at startup and immutable after.
//!
//! Precedence: defaults, then the JSON config file, then command-line
//! flags, then environment variables. Environment overrides are
//! presence-based: an exported variable wins even when it carries the zero
//! value.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Configuration {
    pub server_address: String,
    pub report_interval: u64,
    pub poll_interval: u64,
    pub rate_limit: usize,
    pub key: String,
    pub crypto_key: String,
    pub grpc_enabled: bool,
}

impl Configuration {
    fn defaults() -> Self {
        Self {
            server_address: "localhost:8080".to_string(),
            report_interval: 10,
            poll_interval: 2,
            rate_limit: 1,
            key: String::new(),
            crypto_key: String::new(),
            grpc_enabled: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server_address.is_empty() {
            bail!("server address must not be empty");
        }
        if self.report_interval == 0 {
            bail!("report interval must be greater than zero");
        }
        if self.poll_interval == 0 {
            bail!("poll interval must be greater than zero");
        }
        if self.rate_limit == 0 {
            bail!("rate limit must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Parser)]
#[command(name = "pulsemon-agent", about = "Host metrics collection agent", version)]
struct Cli {
    /// Address of the metrics server (host:port)
    #[arg(short = 'a', long = "address")]
    server_address: Option<String>,

    /// Seconds between reports to the server
    #[arg(short = 'r', long = "report-interval")]
    report_interval: Option<u64>,

    /// Seconds between metric polls
    #[arg(short = 'p', long = "poll-interval")]
    poll_interval: Option<u64>,

    /// Shared secret for integrity tags (empty disables tagging)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Number of concurrent send workers
    #[arg(short = 'l', long = "rate-limit")]
    rate_limit: Option<usize>,

    /// Path to the server's RSA public key in PEM (empty disables encryption)
    #[arg(long = "crypto-key")]
    crypto_key: Option<String>,

    /// Ship metrics over gRPC instead of HTTP
    #[arg(short = 'g', long = "grpc-enabled", num_args = 0..=1, default_missing_value = "true")]
    grpc_enabled: Option<bool>,

    /// Path to a JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server_address: Option<String>,
    report_interval: Option<u64>,
    poll_interval: Option<u64>,
    rate_limit: Option<usize>,
    key: Option<String>,
    crypto_key: Option<String>,
    grpc_enabled: Option<bool>,
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

    config.validate()?;
    Ok(config)
}

fn apply_file(config: &mut Configuration, file: FileConfig) {
    if let Some(value) = file.server_address {
        config.server_address = value;
    }
    if let Some(value) = file.report_interval {
        config.report_interval = value;
    }
    if let Some(value) = file.poll_interval {
        config.poll_interval = value;
    }
    if let Some(value) = file.rate_limit {
        config.rate_limit = value;
    }
    if let Some(value) = file.key {
        config.key = value;
    }
    if let Some(value) = file.crypto_key {
        config.crypto_key = value;
    }
    if let Some(value) = file.grpc_enabled {
        config.grpc_enabled = value;
    }
}

fn apply_cli(config: &mut Configuration, cli: Cli) {
    if let Some(value) = cli.server_address {
        config.server_address = value;
    }
    if let Some(value) = cli.report_interval {
        config.report_interval = value;
    }
    if let Some(value) = cli.poll_interval {
        config.poll_interval = value;
    }
    if let Some(value) = cli.key {
        config.key = value;
    }
    if let Some(value) = cli.rate_limit {
        config.rate_limit = value;
    }
    if let Some(value) = cli.crypto_key {
        config.crypto_key = value;
    }
    if let Some(value) = cli.grpc_enabled {
        config.grpc_enabled = value;
    }
}

fn apply_env(config: &mut Configuration, env: &impl Fn(&str) -> Option<String>) {
    if let Some(value) = env("ADDRESS") {
        config.server_address = value;
    }
    if let Some(value) = env("REPORT_INTERVAL").and_then(|v| parse_env("REPORT_INTERVAL", &v)) {
        config.report_interval = value;
    }
    if let Some(value) = env("POLL_INTERVAL").and_then(|v| parse_env("POLL_INTERVAL", &v)) {
        config.poll_interval = value;
    }
    if let Some(value) = env("KEY") {
        config.key = value;
    }
    if let Some(value) = env("RATE_LIMIT").and_then(|v| parse_env("RATE_LIMIT", &v)) {
        config.rate_limit = value;
    }
    if let Some(value) = env("CRYPTO_KEY") {
        config.crypto_key = value;
    }
    if let Some(value) = env("GRPC_ENABLED").and_then(|v| parse_env("GRPC_ENABLED", &v)) {
        config.grpc_enabled = value;
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = resolve(Cli::default(), no_env).unwrap();
        assert_eq!(config.server_address, "localhost:8080");
        assert_eq!(config.report_interval, 10);
        assert_eq!(config.poll_interval, 2);
        assert_eq!(config.rate_limit, 1);
        assert!(!config.grpc_enabled);
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server_address":"from-file:1","report_interval":30,"rate_limit":4}}"#
        )
        .unwrap();

        let cli = Cli {
            server_address: Some("from-flag:2".to_string()),
            config: Some(file.path().to_string_lossy().into_owned()),
            ..Cli::default()
        };
        let config = resolve(cli, no_env).unwrap();
        assert_eq!(config.server_address, "from-flag:2");
        assert_eq!(config.report_interval, 30);
        assert_eq!(config.rate_limit, 4);
    }

    #[test]
    fn environment_overrides_flags() {
        let cli = Cli {
            server_address: Some("from-flag:2".to_string()),
            report_interval: Some(60),
            ..Cli::default()
        };
        let env = env_from(&[("ADDRESS", "from-env:3"), ("REPORT_INTERVAL", "5")]);
        let config = resolve(cli, env).unwrap();
        assert_eq!(config.server_address, "from-env:3");
        assert_eq!(config.report_interval, 5);
    }

    #[test]
    fn present_env_wins_even_with_zero_value() {
        // An exported GRPC_ENABLED=false must override a -g flag.
        let cli = Cli {
            grpc_enabled: Some(true),
            key: Some("flag-secret".to_string()),
            ..Cli::default()
        };
        let env = env_from(&[("GRPC_ENABLED", "false"), ("KEY", "")]);
        let config = resolve(cli, env).unwrap();
        assert!(!config.grpc_enabled);
        assert!(config.key.is_empty());
    }

    #[test]
    fn unparseable_env_value_is_ignored() {
        let env = env_from(&[("REPORT_INTERVAL", "soon")]);
        let config = resolve(Cli::default(), env).unwrap();
        assert_eq!(config.report_interval, 10);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let cli = Cli {
            poll_interval: Some(0),
            ..Cli::default()
        };
        assert!(resolve(cli, no_env).is_err());

        let cli = Cli {
            rate_limit: Some(0),
            ..Cli::default()
        };
        assert!(resolve(cli, no_env).is_err());
    }
}

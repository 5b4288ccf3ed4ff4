//! Figment-based configuration loading.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments
//! 2. Config file (TOML)
//! 3. Environment variables (`TALLY_` prefix, e.g. `TALLY_NETWORK__PORT`)
//! 4. Defaults

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    thread,
};

use chrono::TimeDelta;
use eyre::{Result, WrapErr};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tally_node_core::{
    constants::{
        DEFAULT_FARM_THREADS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_STRENGTH, DEFAULT_THREADS,
        DEFAULT_TIMEOUT_SECS, FARM_LIFETIME_HOURS,
    },
    validate::{self, ConfigError},
};
use tally_score::{FarmConfig, Invoice, Verifier};

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub http: HttpConfig,
    pub score: ScoreConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub bind: IpAddr,
    pub alias: Option<String>,
    pub invoice: String,
    pub standalone: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            alias: None,
            invoice: Invoice::DEFAULT.to_string(),
            standalone: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// 0 means one per CPU.
    pub threads: usize,
    /// Seconds.
    pub timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub strength: u8,
    pub farm_threads: usize,
    pub ignore_weakness: bool,
    pub min_value: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            farm_threads: DEFAULT_FARM_THREADS,
            ignore_weakness: false,
            min_value: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Keep wallets in memory instead of the data directory.
    pub memory: bool,
}

impl NodeConfig {
    /// Load configuration from defaults, environment and config file, then
    /// apply `overrides` (usually the CLI arguments).
    pub fn load(config_path: Option<&Path>, overrides: &impl Serialize) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(NodeConfig::default()))
            .merge(Env::prefixed("TALLY_").split("__"));

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        figment
            .merge(Serialized::defaults(overrides))
            .extract()
            .wrap_err("Failed to load configuration")
    }

    /// Startup checks; any error aborts before the listener binds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::validate_strength(self.score.strength)?;
        validate::validate_host(&self.network.host)?;
        validate::validate_invoice(&self.network.invoice)?;
        if let Some(alias) = &self.network.alias {
            validate::validate_alias(alias)?;
        }
        Ok(())
    }

    /// The configured alias, or `host:port`.
    pub fn alias(&self) -> String {
        self.network
            .alias
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.network.host, self.network.port))
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.network.bind, self.network.port)
    }

    /// Runtime worker threads, with 0 resolved to the CPU count.
    pub fn threads(&self) -> usize {
        resolve_threads(self.http.threads)
    }

    pub fn farm_config(&self) -> FarmConfig {
        FarmConfig {
            host: self.network.host.clone(),
            port: self.network.port,
            invoice: self.network.invoice.clone(),
            strength: self.score.strength,
            threads: resolve_threads(self.score.farm_threads),
            lifetime: TimeDelta::hours(FARM_LIFETIME_HOURS),
            max_value: None,
        }
    }

    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.score.strength)
            .with_min_value(self.score.min_value)
            .with_ignore_weakness(self.score.ignore_weakness)
    }
}

fn resolve_threads(threads: usize) -> usize {
    if threads == 0 {
        thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::NodeArgs;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.network.port, 4096);
        assert_eq!(config.network.host, "127.0.0.1");
        assert_eq!(config.alias(), "127.0.0.1:4096");
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:4096");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
[network]
port = 5000
alias = "filenode"

[score]
strength = 3
"#,
        )
        .unwrap();

        let config = NodeConfig::load(Some(&config_path), &NodeArgs::default().overrides()).unwrap();
        assert_eq!(config.network.port, 5000);
        assert_eq!(config.alias(), "filenode");
        assert_eq!(config.score.strength, 3);
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[network]\nport = 5000\nhost = \"file.example\"\n").unwrap();

        let mut args = NodeArgs::default();
        args.network.port = Some(6000);
        args.network.standalone = true;
        args.storage.memory = true;

        let config = NodeConfig::load(Some(&config_path), &args.overrides()).unwrap();
        assert_eq!(config.network.port, 6000);
        assert_eq!(config.network.host, "file.example");
        assert!(config.network.standalone);
        assert!(config.storage.memory);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = NodeConfig::load(Some(&config_path), &NodeArgs::default().overrides()).unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = NodeConfig::default();
        config.network.alias = Some("tomlnode".to_string());
        let text = toml::to_string(&config).unwrap();
        let back: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validation() {
        let mut config = NodeConfig::default();
        config.network.alias = Some("x".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Alias(_))));

        let mut config = NodeConfig::default();
        config.score.strength = 0;
        assert_eq!(config.validate(), Err(ConfigError::Strength(0)));

        let mut config = NodeConfig::default();
        config.score.strength = 65;
        assert_eq!(config.validate(), Err(ConfigError::Strength(65)));

        let mut config = NodeConfig::default();
        config.network.invoice = "bad".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invoice(_))));
    }

    #[test]
    fn test_zero_threads_means_cpus() {
        let mut config = NodeConfig::default();
        config.http.threads = 0;
        assert!(config.threads() >= 1);
        assert_eq!(config.farm_config().threads, DEFAULT_FARM_THREADS);
    }
}

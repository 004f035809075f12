use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use metrix_common::retry::RetryPolicy;
use metrix_common::ticker::MAX_PERIOD;
use metrix_storage::{BackendChoice, DatabaseOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line flags. Each flag also reads its environment variable and
/// overrides the config file.
#[derive(Parser, Debug, Default)]
#[command(
    name = "metrix-server",
    version,
    about = "Collects metrics over HTTP and persists snapshots"
)]
pub struct Cli {
    /// TOML config file
    #[arg(short = 'c', long, env = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, `host:port`
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    /// Seconds between snapshots; 0 disables periodic snapshots
    #[arg(short = 'i', long, env = "STORE_INTERVAL")]
    pub store_interval: Option<u64>,

    /// Snapshot file path
    #[arg(short = 'f', long, env = "FILE_STORAGE_PATH")]
    pub file_storage_path: Option<String>,

    /// Database connection string; takes precedence over the snapshot file
    #[arg(short = 'd', long, env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,

    /// Load the last snapshot at startup
    #[arg(short = 'r', long, env = "RESTORE", action = ArgAction::Set)]
    pub restore: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_store_interval")]
    pub store_interval_secs: u64,
    #[serde(default)]
    pub file_storage_path: Option<String>,
    #[serde(default)]
    pub database_dsn: Option<String>,
    #[serde(default = "default_restore")]
    pub restore: bool,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Retry and timeout tuning for the database backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_address() -> String {
    "localhost:8080".to_string()
}

fn default_store_interval() -> u64 {
    300
}

fn default_restore() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_call_timeout_secs() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            store_interval_secs: default_store_interval(),
            file_storage_path: None,
            database_dsn: None,
            restore: default_restore(),
            database: DatabaseConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// File (if any), then flags and environment, then validation.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(address) = &cli.address {
            config.address = address.clone();
        }
        if let Some(secs) = cli.store_interval {
            config.store_interval_secs = secs;
        }
        if let Some(path) = &cli.file_storage_path {
            config.file_storage_path = Some(path.clone());
        }
        if let Some(dsn) = &cli.database_dsn {
            config.database_dsn = Some(dsn.clone());
        }
        if let Some(restore) = cli.restore {
            config.restore = restore;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            bail!("address must not be empty");
        }
        if self.store_interval_secs > MAX_PERIOD.as_secs() {
            bail!(
                "store interval must be at most {} seconds",
                MAX_PERIOD.as_secs()
            );
        }
        if self.database.max_attempts == 0 {
            bail!("database.max_attempts must be at least 1");
        }
        if self.database.call_timeout_secs == 0 {
            bail!("database.call_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn backend_choice(&self) -> BackendChoice {
        BackendChoice::select(
            self.file_storage_path.as_deref(),
            self.database_dsn.as_deref(),
        )
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            retry: RetryPolicy::new(
                self.database.max_attempts,
                Duration::from_millis(self.database.base_delay_ms),
                Duration::from_millis(self.database.max_delay_ms),
            ),
            call_timeout: Duration::from_secs(self.database.call_timeout_secs),
        }
    }

    pub fn store_interval(&self) -> Duration {
        Duration::from_secs(self.store_interval_secs)
    }
}

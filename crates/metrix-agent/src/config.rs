use anyhow::{bail, Result};
use clap::Parser;
use metrix_common::ticker::MAX_PERIOD;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line flags. Every flag can also be given through its environment
/// variable and overrides the matching value from the config file.
#[derive(Parser, Debug, Default)]
#[command(
    name = "metrix-agent",
    version,
    about = "Collects runtime metrics and reports them to a metrix server"
)]
pub struct Cli {
    /// TOML config file
    #[arg(short = 'c', long, env = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Server address, `host:port` or a full URL
    #[arg(short = 'a', long, env = "ADDRESS")]
    pub address: Option<String>,

    /// Seconds between metric polls
    #[arg(short = 'p', long, env = "POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Seconds between reports to the server
    #[arg(short = 'r', long, env = "REPORT_INTERVAL")]
    pub report_interval: Option<u64>,

    /// Maximum concurrent submissions
    #[arg(short = 'l', long, env = "RATE_LIMIT")]
    pub rate_limit: Option<usize>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT")]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_address() -> String {
    "localhost:8080".to_string()
}

fn default_poll_interval() -> u64 {
    2
}

fn default_report_interval() -> u64 {
    10
}

fn default_rate_limit() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            poll_interval_secs: default_poll_interval(),
            report_interval_secs: default_report_interval(),
            rate_limit: default_rate_limit(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AgentConfig {
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
        if let Some(secs) = cli.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = cli.report_interval {
            config.report_interval_secs = secs;
        }
        if let Some(limit) = cli.rate_limit {
            config.rate_limit = limit;
        }
        if let Some(secs) = cli.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            bail!("address must not be empty");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll interval must be at least 1 second");
        }
        if self.report_interval_secs == 0 {
            bail!("report interval must be at least 1 second");
        }
        let max = MAX_PERIOD.as_secs();
        if self.poll_interval_secs > max || self.report_interval_secs > max {
            bail!("poll and report intervals must be at most {max} seconds");
        }
        if self.rate_limit == 0 {
            bail!("rate limit must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request timeout must be at least 1 second");
        }
        Ok(())
    }

    /// Ingest URL for single JSON updates.
    pub fn update_endpoint(&self) -> String {
        let addr = self.address.trim().trim_end_matches('/');
        if addr.contains("://") {
            format!("{addr}/update/")
        } else {
            format!("http://{addr}/update/")
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = AgentConfig::from_cli(&Cli::default()).unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.update_endpoint(), "http://localhost:8080/update/");
        assert_eq!(config.rate_limit, 4);
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "address = \"metrics.internal:9000\"\nrate_limit = 8\npoll_interval_secs = 1"
        )
        .unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            rate_limit: Some(2),
            ..Default::default()
        };
        let config = AgentConfig::from_cli(&cli).unwrap();
        assert_eq!(config.address, "metrics.internal:9000");
        assert_eq!(config.rate_limit, 2);
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.report_interval_secs, 10);
    }

    #[test]
    fn zero_values_are_rejected() {
        for cli in [
            Cli { rate_limit: Some(0), ..Default::default() },
            Cli { poll_interval: Some(0), ..Default::default() },
            Cli { report_interval: Some(0), ..Default::default() },
        ] {
            assert!(AgentConfig::from_cli(&cli).is_err());
        }
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        for cli in [
            Cli {
                poll_interval: Some(u64::MAX),
                ..Default::default()
            },
            Cli {
                report_interval: Some(MAX_PERIOD.as_secs() + 1),
                ..Default::default()
            },
        ] {
            assert!(AgentConfig::from_cli(&cli).is_err());
        }
    }

    #[test]
    fn full_url_address_is_kept() {
        let config = AgentConfig {
            address: "https://collector.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.update_endpoint(), "https://collector.example.com/update/");
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::try_parse_from([
            "metrix-agent",
            "-a",
            "host:1",
            "-p",
            "3",
            "-r",
            "7",
            "-l",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.address.as_deref(), Some("host:1"));
        assert_eq!(cli.poll_interval, Some(3));
        assert_eq!(cli.report_interval, Some(7));
        assert_eq!(cli.rate_limit, Some(5));
    }
}

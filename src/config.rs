//! Configuration management for the crawler.
//!
//! Supports loading from environment variables and an optional TOML file;
//! environment variables always win over file settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL of the contract API (Etherscan-style module/action endpoint)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Network name, used as the dataset subdirectory
    #[serde(default = "default_network")]
    pub network: String,

    /// Path to the credential pool file, one API key per line
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Retry policy for the API client
    #[serde(default)]
    pub retry: RetryConfig,

    /// Output directory paths
    #[serde(default)]
    pub paths: PathConfig,

    /// Debt scanner settings
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum API calls per second, shared by all crawl workers
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
        }
    }
}

/// Retry policy for transient API failures.
///
/// `max_attempts: None` reproduces the retry-until-success behavior the
/// crawler was built around; setting a cap bounds the livelock risk when
/// every credential in the pool is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per call; `None` retries indefinitely
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Base delay for exponential backoff (ms)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling (ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Root of the versioned-contract dataset
    #[serde(default = "default_dataset_root")]
    pub dataset_root: PathBuf,

    /// Root of the exported debt data (evolution series, comment lists)
    #[serde(default = "default_debt_root")]
    pub debt_root: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            dataset_root: default_dataset_root(),
            debt_root: default_debt_root(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Emit at most one DebtComment per comment instead of one per keyword
    #[serde(default)]
    pub collapse_duplicates: bool,

    /// Attach the following function header to each debt comment
    #[serde(default)]
    pub with_context: bool,
}

// Default value functions
fn default_api_url() -> String {
    "https://api.etherscan.io/api".to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("etherscan-keys.txt")
}

fn default_rps() -> u32 {
    5 // Etherscan free-tier allowance
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    120_000
}

fn default_dataset_root() -> PathBuf {
    PathBuf::from("versioned-smart-contracts")
}

fn default_debt_root() -> PathBuf {
    PathBuf::from("debt_data")
}

impl CrawlerConfig {
    /// Load configuration from environment variables only.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self {
            api_url: default_api_url(),
            network: default_network(),
            credentials_file: default_credentials_file(),
            rate_limits: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            paths: PathConfig::default(),
            scan: ScanConfig::default(),
        };
        config.apply_env();

        Ok(config)
    }

    /// Load from a TOML config file with environment overrides.
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = ::toml::from_str(&contents)?;
        config.apply_env();

        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ETHERSCAN_API_URL") {
            self.api_url = url;
        }
        if let Ok(network) = std::env::var("ETHERSCAN_NETWORK") {
            self.network = network;
        }
        if let Ok(path) = std::env::var("ETHERSCAN_KEY_FILE") {
            self.credentials_file = PathBuf::from(path);
        }
    }

    /// Read the credential pool: one key per line, blank lines and `#`
    /// comments ignored. A single `ETHERSCAN_API_KEY` environment variable
    /// is appended to the pool when set, so a pool file is not required for
    /// one-key runs.
    pub fn load_credentials(&self) -> Vec<String> {
        let mut keys: Vec<String> = match std::fs::read_to_string(&self.credentials_file) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        };

        if let Ok(key) = std::env::var("ETHERSCAN_API_KEY") {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }

        keys
    }

    /// Dataset directory for the configured network.
    pub fn network_root(&self) -> PathBuf {
        self.paths.dataset_root.join(&self.network)
    }

    /// Ensure all output directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(self.network_root())?;
        std::fs::create_dir_all(&self.paths.debt_root)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: CrawlerConfig = ::toml::from_str("").unwrap();
        assert_eq!(config.network, "mainnet");
        assert_eq!(config.rate_limits.requests_per_second, 5);
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert!(!config.scan.collapse_duplicates);
    }

    #[test]
    fn test_file_overrides() {
        let toml = r#"
            network = "sepolia"

            [rate_limits]
            requests_per_second = 2

            [retry]
            max_attempts = 10
        "#;
        let config: CrawlerConfig = ::toml::from_str(toml).unwrap();
        assert_eq!(config.network, "sepolia");
        assert_eq!(config.rate_limits.requests_per_second, 2);
        assert_eq!(config.retry.max_attempts, Some(10));
        assert_eq!(config.retry.max_delay_ms, 120_000);
    }

    #[test]
    fn test_network_root() {
        let config: CrawlerConfig = ::toml::from_str("").unwrap();
        assert_eq!(
            config.network_root(),
            PathBuf::from("versioned-smart-contracts/mainnet")
        );
    }
}

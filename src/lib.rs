//! Smart-Contract Debt Lineage Library
//!
//! Crawls the redeployment history of verified smart contracts through an
//! Etherscan-style API and mines technical-debt comments out of every
//! version's source.
//!
//! # Pipeline Stages
//!
//! 1. **Lineage Resolution** ([`fetch_lineage`]): walks a deployer's full
//!    transaction history and keeps the verified, name-equivalent
//!    redeployments of the seed contract, persisting each version to disk
//! 2. **Source Normalization** ([`fetch_source`]): flattens flat and
//!    JSON-bundled multi-file sources into one text blob per contract
//! 3. **Debt Scanning** ([`scan_debt`]): extracts comments and matches them
//!    against the debt-marker vocabulary
//! 4. **Export** ([`export`], [`debt_evolution`]): per-version comment lists
//!    and per-contract debt-count series
//!
//! # Dataset Layout
//!
//! - `<dataset>/<network>/<name>/<address>_<name>_V<version>.sol`: one file
//!   per accepted lineage version
//! - `<dataset>/<network>/<name>/manifest.json`: resume cursor per contract
//! - `<debt>/evolution/<name>.csv`, `<debt>/comments/<name>/<version>.csv`
//!
//! # Example
//!
//! ```no_run
//! use eth_debt_lineage::config::CrawlerConfig;
//! use eth_debt_lineage::etherscan::EtherscanClient;
//! use eth_debt_lineage::fetch_lineage::LineageResolver;
//! use eth_debt_lineage::throttle::{CredentialRotator, RateBudget};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CrawlerConfig::load()?;
//!     let budget = Arc::new(RateBudget::new(config.rate_limits.requests_per_second));
//!     let credentials = Arc::new(CredentialRotator::new(config.load_credentials()));
//!     let client = Arc::new(EtherscanClient::new(
//!         config.api_url.clone(),
//!         budget,
//!         credentials,
//!         config.retry.clone(),
//!     ));
//!     let resolver = LineageResolver::new(client, config.network_root());
//!     let lineage = resolver.resolve("0x180012500db77132f3da5d00de0e96ef614697e5").await?;
//!     println!("found {} versions", lineage.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod debt_evolution;
pub mod ethereum;
pub mod etherscan;
pub mod export;
pub mod fetch_lineage;
pub mod fetch_source;
pub mod scan_debt;
pub mod schemas;
pub mod throttle;

// Re-export commonly used types
pub use config::CrawlerConfig;
pub use etherscan::{ApiError, ContractApi, EtherscanClient};
pub use fetch_lineage::LineageResolver;
pub use scan_debt::DebtScanner;
pub use schemas::{ContractProperties, DebtComment, Lineage, LineageEntry, Transaction};

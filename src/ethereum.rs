//! Ethereum address validation for crawl seeds.
//!
//! Seed addresses arrive from the CLI or a seeds file; everything is
//! normalized to a validated, lowercased form before it reaches the API,
//! since Etherscan compares addresses case-insensitively but the dataset
//! layout needs one canonical spelling per contract.

use alloy_primitives::Address;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Regex pattern for Ethereum addresses (case-insensitive)
static ETH_ADDRESS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)0x[a-fA-F0-9]{40}").expect("Invalid regex pattern"));

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("Invalid address format: {0}")]
    InvalidFormat(String),

    #[error("Address too short or long: {0}")]
    InvalidLength(String),
}

/// A parsed Ethereum address used as a crawl seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeedAddress(Address);

impl SeedAddress {
    /// Parse and validate an address string; a missing `0x` prefix is
    /// tolerated.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();

        let normalized = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            trimmed.to_string()
        } else {
            format!("0x{}", trimmed)
        };

        if normalized.len() != 42 {
            return Err(AddressError::InvalidLength(input.to_string()));
        }

        let address: Address = normalized
            .parse()
            .map_err(|_| AddressError::InvalidFormat(input.to_string()))?;

        Ok(Self(address))
    }

    /// Lowercased hex form used for API parameters and dataset file names.
    pub fn to_lowercase(&self) -> String {
        format!("{:#x}", self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl std::fmt::Display for SeedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase())
    }
}

/// Extract every address-shaped token from a seeds file, validated and
/// deduplicated, zero address dropped. Order of first appearance is kept so
/// a curated seeds file crawls in its written order.
pub fn seeds_from_text(text: &str) -> Vec<SeedAddress> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();

    for m in ETH_ADDRESS_PATTERN.find_iter(text) {
        if let Ok(seed) = SeedAddress::parse(m.as_str()) {
            if !seed.is_zero() && seen.insert(seed.to_lowercase()) {
                result.push(seed);
            }
        }
    }

    result
}

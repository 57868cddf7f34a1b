//! Data schemas for the debt-lineage crawler.
//!
//! All wire and dataset shapes are defined here as Rust structs with serde
//! support. This module is the canonical schema definition for the crawler:
//! API rows mirror the Etherscan response fields verbatim (string-typed),
//! dataset shapes describe what the crawler persists on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version for tracking dataset layout changes
pub const SCHEMA_VERSION: &str = "1.0.0";

// ============================================================================
// PART A: API Row Schemas (Etherscan wire shapes)
// ============================================================================

/// A single row of the `account/txlist` result.
///
/// Every field arrives as a decimal or hex string; fields absent from a row
/// decode as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub nonce: String,
    pub block_hash: String,
    pub transaction_index: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas: String,
    pub gas_price: String,
    pub input: String,
    pub contract_address: String,
    pub cumulative_gas_used: String,
    pub confirmations: String,
}

impl Transaction {
    /// A transaction is a contract creation iff the API filled in the
    /// created contract's address.
    pub fn is_creation(&self) -> bool {
        !self.contract_address.is_empty()
    }

    /// The address this transaction points at: `to` for calls, the created
    /// contract address for creations. `None` when both are empty (invalid
    /// row, skipped by the resolver).
    pub fn target(&self) -> Option<&str> {
        if !self.to.is_empty() {
            Some(&self.to)
        } else if !self.contract_address.is_empty() {
            Some(&self.contract_address)
        } else {
            None
        }
    }

    /// Block number parsed from its decimal string form.
    pub fn block_number(&self) -> Option<u64> {
        self.block_number.parse().ok()
    }
}

/// A single row of the `contract/getsourcecode` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContractProperties {
    pub source_code: String,
    #[serde(rename = "ABI")]
    pub abi: String,
    pub contract_name: String,
    pub compiler_version: String,
    pub optimization_used: String,
    pub runs: String,
    #[serde(rename = "ConstructorArguments")]
    pub constructor_args: String,
    #[serde(rename = "EVMVersion")]
    pub evm_version: String,
    pub library: String,
    pub license_type: String,
    pub proxy: String,
    pub implementation: String,
}

impl ContractProperties {
    /// Etherscan reports unverified contracts as a row with empty source.
    pub fn is_verified(&self) -> bool {
        !self.source_code.is_empty()
    }

    /// Name equivalence is exact, case-sensitive string equality.
    pub fn is_name_equivalent(&self, contract_name: &str) -> bool {
        self.contract_name == contract_name
    }
}

// ============================================================================
// PART B: Lineage Schema
// ============================================================================

/// One accepted redeployment within a contract family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineageEntry {
    /// Address of the redeployed contract (lowercased)
    pub address: String,

    /// Version index within the family, strictly increasing, no gaps
    pub version: u32,

    /// Block number of the creation/redeployment transaction
    pub block_number: u64,
}

/// Ordered redeployment history of one contract family by one deployer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub contract_name: String,
    pub deployer: String,
    pub entries: Vec<LineageEntry>,
}

impl Lineage {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// PART C: Debt Comment Schema
// ============================================================================

/// A source comment carrying a technical-debt marker.
///
/// A comment containing several distinct vocabulary keywords produces one
/// `DebtComment` per keyword unless the scanner is configured to collapse
/// duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DebtComment {
    /// Comment text as written, including the comment delimiters
    pub raw: String,

    /// Lowercased form the vocabulary was matched against
    pub text: String,

    /// The vocabulary keyword this emission is attributed to
    pub keyword: String,

    /// Header of the next function after the comment, when context capture
    /// is enabled
    pub context: Option<String>,
}

// ============================================================================
// PART D: Version Manifest (resumable runs)
// ============================================================================

/// Name of the per-contract manifest file inside the dataset directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Per-contract record of versions already crawled to disk.
///
/// The resolver reads `next_version` to continue an interrupted run and
/// rewrites the manifest after each accepted candidate, so the dataset does
/// not depend on filename parsing to stay resumable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    pub schema_version: String,
    pub contract_name: String,
    pub deployer: String,
    pub next_version: u32,
    pub entries: Vec<LineageEntry>,
    pub updated_at: DateTime<Utc>,
}

impl VersionManifest {
    pub fn new(contract_name: &str, deployer: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            contract_name: contract_name.to_string(),
            deployer: deployer.to_string(),
            next_version: 0,
            entries: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Record an accepted candidate and advance the version cursor.
    pub fn record(&mut self, entry: LineageEntry) {
        self.next_version = entry.version + 1;
        self.entries.push(entry);
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Dataset file naming
// ============================================================================

/// File name for one persisted lineage version:
/// `<address>_<contractName>_V<version>.sol`.
pub fn version_file_name(address: &str, contract_name: &str, version: u32) -> String {
    format!("{}_{}_V{}.sol", address, contract_name, version)
}

/// Parse the version index back out of a dataset file name.
///
/// Accepts `<address>_<name>_V<version>.sol`; contract names may themselves
/// contain underscores, so only the final segment is inspected. Returns
/// `None` for names that do not follow the layout.
pub fn parse_version_file_name(file_name: &str) -> Option<u32> {
    let stem = file_name.strip_suffix(".sol")?;
    if stem.split('_').count() < 3 {
        return None;
    }
    let (_, last) = stem.rsplit_once('_')?;
    last.strip_prefix('V')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_target() {
        let call = Transaction {
            to: "0xabc".into(),
            ..Default::default()
        };
        assert_eq!(call.target(), Some("0xabc"));
        assert!(!call.is_creation());

        let creation = Transaction {
            contract_address: "0xdef".into(),
            ..Default::default()
        };
        assert_eq!(creation.target(), Some("0xdef"));
        assert!(creation.is_creation());

        let invalid = Transaction::default();
        assert_eq!(invalid.target(), None);
    }

    #[test]
    fn test_transaction_decode() {
        let json = r#"{
            "blockNumber": "4730207",
            "timeStamp": "1513764793",
            "hash": "0xabc123",
            "from": "0xaa",
            "to": "",
            "contractAddress": "0xbb",
            "input": "0x60806040"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.block_number(), Some(4730207));
        assert!(tx.is_creation());
        assert_eq!(tx.target(), Some("0xbb"));
    }

    #[test]
    fn test_contract_properties_decode() {
        let json = r#"{
            "SourceCode": "contract A {}",
            "ABI": "[]",
            "ContractName": "A",
            "CompilerVersion": "v0.8.19+commit.7dd6d404",
            "Proxy": "0",
            "Implementation": ""
        }"#;
        let props: ContractProperties = serde_json::from_str(json).unwrap();
        assert!(props.is_verified());
        assert!(props.is_name_equivalent("A"));
        assert!(!props.is_name_equivalent("a"));
        assert_eq!(props.abi, "[]");
    }

    #[test]
    fn test_version_file_name_round_trip() {
        let name = version_file_name("0xabc", "Token", 7);
        assert_eq!(name, "0xabc_Token_V7.sol");
        assert_eq!(parse_version_file_name(&name), Some(7));
    }

    #[test]
    fn test_parse_version_underscored_name() {
        assert_eq!(parse_version_file_name("0xabc_My_Token_V12.sol"), Some(12));
    }

    #[test]
    fn test_parse_version_rejects_malformed() {
        assert_eq!(parse_version_file_name("Token_V1.sol"), None);
        assert_eq!(parse_version_file_name("0xabc_Token_V1.txt"), None);
        assert_eq!(parse_version_file_name("0xabc_Token_1.sol"), None);
        assert_eq!(parse_version_file_name("readme.sol"), None);
    }

    #[test]
    fn test_manifest_record_advances_cursor() {
        let mut manifest = VersionManifest::new("Token", "0xdeployer");
        manifest.record(LineageEntry {
            address: "0xabc".into(),
            version: 0,
            block_number: 100,
        });
        manifest.record(LineageEntry {
            address: "0xdef".into(),
            version: 1,
            block_number: 200,
        });
        assert_eq!(manifest.next_version, 2);
        assert_eq!(manifest.entries.len(), 2);
    }
}

//! Verified-source fetching and normalization.
//!
//! Etherscan serves verified sources in two shapes: a flat single-file
//! source, or a standard-JSON-input bundle wrapped in doubled braces
//! (`{{"language": …, "sources": {path: {content}}}}`). Normalization
//! flattens either shape into one text blob per contract so the debt
//! scanner sees every file of a multi-source deployment.

use crate::etherscan::{ApiError, ContractApi};
use crate::schemas::ContractProperties;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("contract source is not verified")]
    Unverified,

    #[error("malformed multi-file source bundle: {0}")]
    MalformedBundle(#[from] serde_json::Error),
}

/// Standard-JSON-input bundle as published by the compiler.
///
/// Sources are keyed by path; a `BTreeMap` keeps concatenation order
/// deterministic (sorted by path) no matter how the JSON orders its keys.
#[derive(Debug, Deserialize)]
struct SourceBundle {
    #[serde(default)]
    #[allow(dead_code)]
    language: String,
    #[serde(default)]
    sources: BTreeMap<String, BundleFile>,
}

#[derive(Debug, Deserialize)]
struct BundleFile {
    #[serde(default)]
    content: String,
}

/// Flatten a raw `SourceCode` payload into a single text blob.
///
/// A `{{…}}` wrapper is stripped to recover the bundle JSON and must then
/// parse; a bare `{…}` payload is treated as a bundle only when it parses
/// with a non-empty source map. Anything else is a flat single-file source
/// taken verbatim. Bundle files are concatenated in path order, each
/// followed by a newline.
pub fn normalize_source(source_code: &str) -> Result<String, SourceError> {
    let trimmed = source_code.trim();

    if let Some(inner) = strip_double_braces(trimmed) {
        let bundle: SourceBundle = serde_json::from_str(inner)?;
        return Ok(concat_bundle(&bundle));
    }

    if trimmed.starts_with('{') {
        if let Ok(bundle) = serde_json::from_str::<SourceBundle>(trimmed) {
            if !bundle.sources.is_empty() {
                return Ok(concat_bundle(&bundle));
            }
        }
    }

    Ok(source_code.to_string())
}

/// `{{…}}` → `{…}`, or `None` when the payload is not double-braced.
fn strip_double_braces(trimmed: &str) -> Option<&str> {
    if trimmed.starts_with("{{") && trimmed.ends_with("}}") && trimmed.len() >= 4 {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

fn concat_bundle(bundle: &SourceBundle) -> String {
    let mut text = String::new();
    for (path, file) in &bundle.sources {
        debug!("bundle file: {} ({} bytes)", path, file.content.len());
        text.push_str(&file.content);
        text.push('\n');
    }
    text
}

/// Fetches a contract's verified source and hands back the flattened text.
pub struct SourceFetcher<A: ContractApi> {
    api: Arc<A>,
}

impl<A: ContractApi> SourceFetcher<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Fetch and flatten one contract's source.
    ///
    /// Returns the reported contract name alongside the normalized text;
    /// an unverified contract (present but with empty source) is an error
    /// so callers can tell it apart from a missing contract.
    pub async fn fetch_normalized(&self, address: &str) -> Result<(String, String), SourceError> {
        let properties = self.api.contract_properties(address).await?;
        let (name, text) = normalize_properties(&properties)?;
        Ok((name.to_string(), text))
    }
}

/// Normalization over already-fetched properties, shared with the resolver
/// so candidate filtering does not fetch twice.
pub fn normalize_properties(properties: &ContractProperties) -> Result<(&str, String), SourceError> {
    if !properties.is_verified() {
        return Err(SourceError::Unverified);
    }
    let text = normalize_source(&properties.source_code)?;
    Ok((properties.contract_name.as_str(), text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_source_is_verbatim() {
        let source = "pragma solidity ^0.8.0;\ncontract A {}";
        assert_eq!(normalize_source(source).unwrap(), source);
    }

    #[test]
    fn test_bundle_sorted_by_path() {
        // Key order in the JSON is reversed relative to path order; output
        // must not depend on it.
        let source = r#"{{"language":"Solidity","sources":{"B.sol":{"content":"bb"},"A.sol":{"content":"aa"}}}}"#;
        assert_eq!(normalize_source(source).unwrap(), "aa\nbb\n");
    }

    #[test]
    fn test_single_braced_bundle() {
        let source = r#"{"language":"Solidity","sources":{"only.sol":{"content":"contract C {}"}}}"#;
        assert_eq!(normalize_source(source).unwrap(), "contract C {}\n");
    }

    #[test]
    fn test_braced_non_bundle_is_flat() {
        // Parses as JSON but has no sources map: flat source, verbatim.
        let source = r#"{"not": "a bundle"}"#;
        assert_eq!(normalize_source(source).unwrap(), source);
    }

    #[test]
    fn test_malformed_double_braced_bundle_errors() {
        let source = "{{\"sources\": not json}}";
        assert!(matches!(
            normalize_source(source),
            Err(SourceError::MalformedBundle(_))
        ));
    }

    #[test]
    fn test_unverified_properties_error() {
        let properties = ContractProperties::default();
        assert!(matches!(
            normalize_properties(&properties),
            Err(SourceError::Unverified)
        ));
    }

    struct OneContract(ContractProperties);

    #[async_trait::async_trait]
    impl ContractApi for OneContract {
        async fn contract_properties(
            &self,
            _address: &str,
        ) -> Result<ContractProperties, ApiError> {
            Ok(self.0.clone())
        }

        async fn deployer_address(&self, _address: &str) -> Result<String, ApiError> {
            Err(ApiError::NoDeployer)
        }

        async fn transactions_page(
            &self,
            _address: &str,
            _start_block: u64,
        ) -> Result<Vec<crate::schemas::Transaction>, ApiError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_fetch_normalized_flattens_bundle() {
        let properties = ContractProperties {
            contract_name: "Vault".to_string(),
            source_code:
                r#"{{"language":"Solidity","sources":{"b.sol":{"content":"B"},"a.sol":{"content":"A"}}}}"#
                    .to_string(),
            ..Default::default()
        };
        let fetcher = SourceFetcher::new(Arc::new(OneContract(properties)));

        let (name, text) = fetcher.fetch_normalized("0xabc").await.unwrap();
        assert_eq!(name, "Vault");
        assert_eq!(text, "A\nB\n");
    }
}

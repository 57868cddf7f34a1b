//! Contract lineage resolution.
//!
//! Given a seed contract, reconstructs the ordered history of redeployments
//! by the same deployer: find the deployer, page through its complete
//! transaction history, and keep every destination that is a verified
//! contract with the seed's exact name. Accepted candidates are assigned
//! strictly increasing version indices in transaction order and persisted
//! to the dataset before the lineage is returned, so an interrupted crawl
//! can resume where it stopped.

use crate::etherscan::{ApiError, ContractApi, PAGE_SIZE};
use crate::fetch_source::normalize_properties;
use crate::schemas::{
    parse_version_file_name, version_file_name, Lineage, LineageEntry, Transaction,
    VersionManifest, MANIFEST_FILE,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LineageError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves one seed address into a version lineage.
pub struct LineageResolver<A> {
    api: Arc<A>,
    network_root: PathBuf,
}

impl<A: ContractApi> LineageResolver<A> {
    /// `network_root` is the dataset directory for one network, e.g.
    /// `versioned-smart-contracts/mainnet`.
    pub fn new(api: Arc<A>, network_root: impl Into<PathBuf>) -> Self {
        Self {
            api,
            network_root: network_root.into(),
        }
    }

    /// Resolve the full lineage for `seed`.
    ///
    /// Terminal API failures (unverified seed, missing deployer, an API
    /// error while fetching a candidate) abort the resolution; versions
    /// already persisted stay on disk and a later run resumes after them.
    pub async fn resolve(&self, seed: &str) -> Result<Lineage, LineageError> {
        let seed_properties = self.api.contract_properties(seed).await?;
        if !seed_properties.is_verified() {
            return Err(ApiError::NoContractSource.into());
        }
        let contract_name = seed_properties.contract_name.clone();

        let deployer = self.api.deployer_address(seed).await?;
        info!(
            "resolving lineage of {} ({}) deployed by {}",
            seed, contract_name, deployer
        );

        let transactions = self.collect_transactions(&deployer).await?;
        info!(
            "deployer {} has {} transactions on record",
            deployer,
            transactions.len()
        );

        let contract_dir = self.network_root.join(&contract_name);
        std::fs::create_dir_all(&contract_dir)?;
        let manifest_path = contract_dir.join(MANIFEST_FILE);
        let mut manifest = load_or_scan(&contract_dir, &contract_name, &deployer);
        if manifest.next_version > 0 {
            info!(
                "{} versions of {} already on disk, continuing at V{}",
                manifest.next_version, contract_name, manifest.next_version
            );
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut entries: Vec<LineageEntry> = Vec::new();
        let mut writes: Vec<JoinHandle<()>> = Vec::new();

        for tx in &transactions {
            let Some(target) = tx.target() else {
                debug!("transaction {} has no destination, skipping", tx.hash);
                continue;
            };
            let target = target.to_lowercase();
            let from = tx.from.to_lowercase();

            // A pair already fully inside the wallet's own contract network
            // was counted the first time around.
            if visited.contains(&target) && visited.contains(&from) {
                continue;
            }
            if !visited.insert(target.clone()) {
                continue;
            }

            let properties = match self.api.contract_properties(&target).await {
                Ok(properties) => properties,
                Err(ApiError::NoContractSource) => continue,
                Err(e) => return Err(e.into()),
            };
            if !properties.is_verified() || !properties.is_name_equivalent(&contract_name) {
                continue;
            }

            let text = match normalize_properties(&properties) {
                Ok((_, text)) => text,
                Err(e) => {
                    warn!("skipping candidate {}: {}", target, e);
                    continue;
                }
            };

            let version = manifest.next_version;
            let block_number = tx.block_number().unwrap_or_else(|| {
                debug!("unparseable block number on {}, recording 0", tx.hash);
                0
            });

            let file = contract_dir.join(version_file_name(&target, &contract_name, version));
            writes.push(tokio::spawn(async move {
                if let Err(e) = std::fs::write(&file, &text) {
                    warn!("failed to persist {:?}: {}", file, e);
                }
            }));

            let entry = LineageEntry {
                address: target.clone(),
                version,
                block_number,
            };
            manifest.record(entry.clone());
            if let Err(e) = manifest.save(&manifest_path) {
                warn!("failed to update manifest {:?}: {}", manifest_path, e);
            }
            info!("accepted {} as {} V{}", target, contract_name, version);
            entries.push(entry);
        }

        for handle in writes {
            if let Err(e) = handle.await {
                warn!("persist task failed: {}", e);
            }
        }

        Ok(Lineage {
            contract_name,
            deployer,
            entries,
        })
    }

    /// Page through an address's complete transaction history.
    ///
    /// The API caps every call at [`PAGE_SIZE`] rows; a full page means
    /// more history remains, so the cursor advances to one block past the
    /// page's last row and the call repeats. A short page ends the walk.
    pub async fn collect_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<Transaction>, LineageError> {
        let mut transactions: Vec<Transaction> = Vec::new();
        let mut start_block: u64 = 0;

        loop {
            let page = self.api.transactions_page(address, start_block).await?;
            let page_len = page.len();
            let last_block = page.last().and_then(Transaction::block_number);
            transactions.extend(page);

            if page_len < PAGE_SIZE {
                break;
            }
            match last_block {
                Some(block) => {
                    debug!(
                        "full page for {} ending at block {}, continuing from {}",
                        address,
                        block,
                        block + 1
                    );
                    start_block = block + 1;
                }
                None => {
                    warn!(
                        "full page for {} ends without a parseable block number, stopping",
                        address
                    );
                    break;
                }
            }
        }

        Ok(transactions)
    }
}

/// Load the contract's manifest, falling back to the version suffixes of
/// files already on disk for datasets that predate the manifest.
fn load_or_scan(dir: &Path, contract_name: &str, deployer: &str) -> VersionManifest {
    let path = dir.join(MANIFEST_FILE);
    if path.exists() {
        match VersionManifest::load(&path) {
            Ok(manifest) => return manifest,
            Err(e) => warn!("corrupt manifest {:?}, rescanning file names: {}", path, e),
        }
    }

    let mut manifest = VersionManifest::new(contract_name, deployer);
    if let Ok(read) = std::fs::read_dir(dir) {
        let highest = read
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let name = entry.file_name();
                parse_version_file_name(name.to_str()?)
            })
            .max();
        if let Some(highest) = highest {
            manifest.next_version = highest + 1;
        }
    }
    manifest
}

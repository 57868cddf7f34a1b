//! Debt evolution over an on-disk contract dataset.
//!
//! Walks the versioned dataset produced by the resolver, scans every
//! version of every contract in version order, and hands the results to
//! the exporter: one comment list per version, one debt-count series per
//! contract. Files whose names do not follow the dataset layout are logged
//! and skipped; a contract that fails entirely does not stop the walk.

use crate::export::LineageExporter;
use crate::scan_debt::DebtScanner;
use crate::schemas::{parse_version_file_name, VersionManifest, MANIFEST_FILE};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Analyze every contract directory under one network root.
///
/// Returns the number of contracts analyzed. Directories are visited in
/// sorted order so repeated runs export in the same sequence.
pub fn analyze_dataset(
    network_root: &Path,
    scanner: &DebtScanner,
    exporter: &dyn LineageExporter,
) -> Result<usize, EvolutionError> {
    let mut contract_dirs: Vec<PathBuf> = std::fs::read_dir(network_root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    contract_dirs.sort();

    let mut analyzed = 0;
    for dir in &contract_dirs {
        match analyze_contract_dir(dir, scanner, exporter) {
            Ok(series) => {
                info!(
                    "analyzed {:?}: {} versions, {} debt comments total",
                    dir.file_name().unwrap_or_default(),
                    series.len(),
                    series.iter().sum::<usize>()
                );
                analyzed += 1;
            }
            Err(e) => warn!("skipping contract directory {:?}: {}", dir, e),
        }
    }

    Ok(analyzed)
}

/// Analyze one contract's version files, oldest version first.
///
/// Returns the per-version debt counts that were exported.
pub fn analyze_contract_dir(
    dir: &Path,
    scanner: &DebtScanner,
    exporter: &dyn LineageExporter,
) -> Result<Vec<usize>, EvolutionError> {
    let contract_name = dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown")
        .to_string();

    let mut versions: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name == MANIFEST_FILE {
            continue;
        }
        match parse_version_file_name(name) {
            Some(version) => versions.push((version, entry.path())),
            None => warn!("file {:?} does not match the dataset layout, skipping", name),
        }
    }
    versions.sort_by_key(|(version, _)| *version);

    let mut series = Vec::with_capacity(versions.len());
    for (version, path) in &versions {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                warn!("cannot read {:?}: {}, skipping version", path, e);
                continue;
            }
        };

        let comments = scanner.scan(&source);
        let texts: Vec<String> = comments.iter().map(|c| c.text.clone()).collect();
        if let Err(e) = exporter.export_comments(&contract_name, *version, &texts) {
            warn!("comment export failed for {} V{}: {}", contract_name, version, e);
        }
        series.push(comments.len());
    }

    let deployer = VersionManifest::load(&dir.join(MANIFEST_FILE))
        .map(|manifest| manifest.deployer)
        .unwrap_or_else(|_| "unknown".to_string());
    if let Err(e) = exporter.export_debt_evolution(&deployer, &contract_name, &series) {
        warn!("evolution export failed for {}: {}", contract_name, e);
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExporter {
        evolutions: Mutex<Vec<(String, String, Vec<usize>)>>,
        comments: Mutex<Vec<(String, u32, Vec<String>)>>,
    }

    impl LineageExporter for RecordingExporter {
        fn export_debt_evolution(
            &self,
            deployer_id: &str,
            contract_name: &str,
            per_version_debt: &[usize],
        ) -> Result<(), ExportError> {
            self.evolutions.lock().unwrap().push((
                deployer_id.to_string(),
                contract_name.to_string(),
                per_version_debt.to_vec(),
            ));
            Ok(())
        }

        fn export_comments(
            &self,
            contract_name: &str,
            version: u32,
            comments: &[String],
        ) -> Result<(), ExportError> {
            self.comments.lock().unwrap().push((
                contract_name.to_string(),
                version,
                comments.to_vec(),
            ));
            Ok(())
        }
    }

    #[test]
    fn test_versions_scanned_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let contract_dir = dir.path().join("Token");
        std::fs::create_dir_all(&contract_dir).unwrap();

        // Written out of order on purpose; V1 has two debt comments, V0 one,
        // V2 none.
        std::fs::write(
            contract_dir.join("0xbbb_Token_V1.sol"),
            "// hack workaround\ncontract Token {}",
        )
        .unwrap();
        std::fs::write(
            contract_dir.join("0xaaa_Token_V0.sol"),
            "// legacy path\ncontract Token {}",
        )
        .unwrap();
        std::fs::write(contract_dir.join("0xccc_Token_V2.sol"), "contract Token {}").unwrap();
        std::fs::write(contract_dir.join("notes.txt.sol"), "not a version file").unwrap();

        let exporter = RecordingExporter::default();
        let series =
            analyze_contract_dir(&contract_dir, &DebtScanner::new(), &exporter).unwrap();

        assert_eq!(series, vec![1, 2, 0]);

        let comments = exporter.comments.lock().unwrap();
        let versions: Vec<u32> = comments.iter().map(|(_, v, _)| *v).collect();
        assert_eq!(versions, vec![0, 1, 2]);

        let evolutions = exporter.evolutions.lock().unwrap();
        assert_eq!(evolutions.len(), 1);
        assert_eq!(evolutions[0].0, "unknown"); // no manifest written
        assert_eq!(evolutions[0].1, "Token");
        assert_eq!(evolutions[0].2, vec![1, 2, 0]);
    }

    #[test]
    fn test_deployer_read_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let contract_dir = dir.path().join("Token");
        std::fs::create_dir_all(&contract_dir).unwrap();
        std::fs::write(contract_dir.join("0xaaa_Token_V0.sol"), "contract Token {}").unwrap();

        let manifest = VersionManifest::new("Token", "0xdeployer");
        manifest.save(&contract_dir.join(MANIFEST_FILE)).unwrap();

        let exporter = RecordingExporter::default();
        analyze_contract_dir(&contract_dir, &DebtScanner::new(), &exporter).unwrap();

        let evolutions = exporter.evolutions.lock().unwrap();
        assert_eq!(evolutions[0].0, "0xdeployer");
    }

    #[test]
    fn test_dataset_walk_counts_contracts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Alpha", "Beta"] {
            let contract_dir = dir.path().join(name);
            std::fs::create_dir_all(&contract_dir).unwrap();
            std::fs::write(
                contract_dir.join(format!("0xaaa_{}_V0.sol", name)),
                "// temporary\ncontract X {}",
            )
            .unwrap();
        }

        let exporter = RecordingExporter::default();
        let analyzed =
            analyze_dataset(dir.path(), &DebtScanner::new(), &exporter).unwrap();

        assert_eq!(analyzed, 2);
        let evolutions = exporter.evolutions.lock().unwrap();
        let names: Vec<&str> = evolutions.iter().map(|(_, n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }
}

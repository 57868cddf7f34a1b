//! Debt export boundary.
//!
//! The crawler core only produces data; how it lands on disk (or anywhere
//! else) belongs to the exporter implementation behind [`LineageExporter`].
//! The bundled [`CsvExporter`] writes one evolution series per contract and
//! one comment list per version. Each version gets its own file, so exports
//! for different versions can run concurrently without contending.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Persistence boundary for mined debt data.
pub trait LineageExporter: Send + Sync {
    /// Persist the per-version debt counts of one contract family.
    fn export_debt_evolution(
        &self,
        deployer_id: &str,
        contract_name: &str,
        per_version_debt: &[usize],
    ) -> Result<(), ExportError>;

    /// Persist the debt comments found in one version's source.
    fn export_comments(
        &self,
        contract_name: &str,
        version: u32,
        comments: &[String],
    ) -> Result<(), ExportError>;
}

/// CSV exporter rooted at the configured debt-data directory.
///
/// Layout:
/// - `<root>/evolution/<contractName>.csv`: deployer, contract, version, count
/// - `<root>/comments/<contractName>/<version>.csv`: one comment per row
pub struct CsvExporter {
    debt_root: PathBuf,
}

impl CsvExporter {
    pub fn new(debt_root: impl Into<PathBuf>) -> Self {
        Self {
            debt_root: debt_root.into(),
        }
    }

    fn evolution_path(&self, contract_name: &str) -> PathBuf {
        self.debt_root
            .join("evolution")
            .join(format!("{}.csv", contract_name))
    }

    fn comments_path(&self, contract_name: &str, version: u32) -> PathBuf {
        self.debt_root
            .join("comments")
            .join(contract_name)
            .join(format!("{}.csv", version))
    }
}

fn ensure_parent(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl LineageExporter for CsvExporter {
    fn export_debt_evolution(
        &self,
        deployer_id: &str,
        contract_name: &str,
        per_version_debt: &[usize],
    ) -> Result<(), ExportError> {
        let path = self.evolution_path(contract_name);
        ensure_parent(&path)?;

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["deployer", "contract_name", "version", "debt_count"])?;
        for (version, count) in per_version_debt.iter().enumerate() {
            let version = version.to_string();
            let count = count.to_string();
            writer.write_record([deployer_id, contract_name, version.as_str(), count.as_str()])?;
        }
        writer.flush()?;

        info!(
            "exported debt evolution for {} ({} versions) to {:?}",
            contract_name,
            per_version_debt.len(),
            path
        );
        Ok(())
    }

    fn export_comments(
        &self,
        contract_name: &str,
        version: u32,
        comments: &[String],
    ) -> Result<(), ExportError> {
        let path = self.comments_path(contract_name, version);
        ensure_parent(&path)?;

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["comment"])?;
        for comment in comments {
            writer.write_record([comment])?;
        }
        writer.flush()?;

        info!(
            "exported {} comments for {} V{} to {:?}",
            comments.len(),
            contract_name,
            version,
            path
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evolution_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());

        exporter
            .export_debt_evolution("0xdeployer", "Token", &[3, 0, 7])
            .unwrap();

        let written =
            std::fs::read_to_string(dir.path().join("evolution").join("Token.csv")).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("deployer,contract_name,version,debt_count"));
        assert_eq!(lines.next(), Some("0xdeployer,Token,0,3"));
        assert_eq!(lines.next(), Some("0xdeployer,Token,1,0"));
        assert_eq!(lines.next(), Some("0xdeployer,Token,2,7"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_comments_csv_per_version() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());

        exporter
            .export_comments("Token", 1, &["// todo: later".to_string()])
            .unwrap();
        exporter.export_comments("Token", 2, &[]).unwrap();

        let v1 = dir.path().join("comments").join("Token").join("1.csv");
        let v2 = dir.path().join("comments").join("Token").join("2.csv");
        assert!(v1.exists());
        assert!(v2.exists());

        let written = std::fs::read_to_string(v1).unwrap();
        assert!(written.contains("// todo: later"));
    }
}

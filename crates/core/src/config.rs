use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::document::ReimbursementStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for where documents are stored and how names are built.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root under which the status folders live.
    pub invoices_root: PathBuf,
    pub reimbursed_dir: String,
    pub pending_dir: String,
    /// Stem component used when no document number was found.
    pub number_placeholder: String,
    /// Stem component used when neither amount nor tax was found.
    pub amount_placeholder: String,
    /// Re-read and re-extract the document text when its status toggles,
    /// instead of reusing the persisted record.
    pub rederive_on_toggle: bool,
    /// Save the extracted text as `<stored copy>.txt` next to each copy.
    pub keep_text_sidecar: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            invoices_root: PathBuf::from("invoices"),
            reimbursed_dir: "已报销".to_string(),
            pending_dir: "未报销".to_string(),
            number_placeholder: "未知编号".to_string(),
            amount_placeholder: "未知金额".to_string(),
            rederive_on_toggle: true,
            keep_text_sidecar: true,
        }
    }
}

impl AppConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn folder_for(&self, status: ReimbursementStatus) -> PathBuf {
        match status {
            ReimbursementStatus::Reimbursed => self.invoices_root.join(&self.reimbursed_dir),
            ReimbursementStatus::NotReimbursed => self.invoices_root.join(&self.pending_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.rederive_on_toggle);
        assert!(cfg.keep_text_sidecar);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let cfg = AppConfig::from_toml(
            r#"
            invoices_root = "/data/invoices"
            rederive_on_toggle = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.invoices_root, PathBuf::from("/data/invoices"));
        assert!(!cfg.rederive_on_toggle);
        assert_eq!(cfg.pending_dir, "未报销");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            AppConfig::from_toml("rederive_on_toggle = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn folder_selected_by_status_only() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.folder_for(ReimbursementStatus::Reimbursed),
            PathBuf::from("invoices/已报销")
        );
        assert_eq!(
            cfg.folder_for(ReimbursementStatus::NotReimbursed),
            PathBuf::from("invoices/未报销")
        );
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fapiao.toml");
        std::fs::write(&path, "pending_dir = \"todo\"\n").unwrap();
        let cfg = AppConfig::from_file(&path).unwrap();
        assert_eq!(cfg.pending_dir, "todo");
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let err = AppConfig::from_file(Path::new("/nonexistent/fapiao.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

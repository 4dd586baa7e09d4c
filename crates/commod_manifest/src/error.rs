use camino::Utf8PathBuf;
use thiserror::Error;

use crate::schema::ValidationReport;

pub type Result<T> = std::result::Result<T, ManifestError>;

/// Errors raised while reading or constructing a mod manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Manifest couldn't be read as a map")]
    NotAMap,

    #[error("Broken manifest for content '{name}': {reason}")]
    BrokenManifest { name: String, reason: String },

    #[error("Incorrect default option '{default}' for '{option}' in content manifest")]
    InvalidDefaultOption { option: String, default: String },

    #[error("Manifest for '{name}' failed validation ({} problem(s))", .report.diagnostics().len())]
    ValidationFailed {
        name: String,
        report: ValidationReport,
    },

    #[error("No manifest.yaml found in archive {0}")]
    ManifestNotFound(Utf8PathBuf),
}

//! Mod manifests: the typed records, the schema validator guarding their
//! construction, and lookup of manifests inside zip archives.

pub mod archive;
pub mod error;
mod manifest;
pub mod schema;

pub use archive::{read_zip_manifest, ArchiveListing, ZipManifest, MANIFEST_FILE_NAME};
pub use error::{ManifestError, Result};
pub use manifest::*;
pub use schema::{validate_manifest, DataCheck, Diagnostic, ValidationReport};

//! Reading mods that are still packed in a zip archive.

use crate::error::{ManifestError, Result};
use camino::Utf8Path;
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

pub const MANIFEST_FILE_NAME: &str = "manifest.yaml";

/// The entry names of an archive, with the mod root located inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveListing {
    entries: BTreeSet<String>,
    root: String,
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/")
}

impl ArchiveListing {
    pub fn new<I, S>(entries: I, root: impl AsRef<str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries.into_iter().map(|e| normalize(e.as_ref())).collect(),
            root: normalize(root.as_ref()).trim_matches('/').to_string(),
        }
    }

    pub fn from_zip<R: Read + Seek>(archive: &ZipArchive<R>, root: impl AsRef<str>) -> Self {
        Self::new(archive.file_names(), root)
    }

    /// Path of the mod root inside the archive; empty when it is the archive root.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Whether a directory `relative` to the mod root exists in the archive.
    ///
    /// Archives don't always store directory entries, so any entry below
    /// the directory counts.
    pub fn has_dir(&self, relative: &str) -> bool {
        let relative = normalize(relative);
        let relative = relative.trim_matches('/');
        let prefix = if self.root.is_empty() {
            format!("{relative}/")
        } else {
            format!("{}/{relative}/", self.root)
        };
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|entry| entry.starts_with(&prefix))
    }
}

/// A manifest located inside an archive.
#[derive(Debug, Clone)]
pub struct ZipManifest {
    pub value: Value,
    /// Directory inside the archive holding `manifest.yaml`.
    pub root_path: String,
    pub listing: ArchiveListing,
}

impl ZipManifest {
    /// Finds the shallowest `manifest.yaml` in the archive and parses it.
    ///
    /// Returns `Ok(None)` if the archive holds no manifest.
    pub fn read<R: Read + Seek>(reader: R) -> Result<Option<Self>> {
        let mut archive = ZipArchive::new(reader)?;

        let manifest_entry = archive
            .file_names()
            .filter(|name| {
                normalize(name)
                    .rsplit('/')
                    .next()
                    .is_some_and(|file| file == MANIFEST_FILE_NAME)
            })
            .min_by_key(|name| (name.matches(['/', '\\']).count(), name.len()))
            .map(str::to_string);
        let Some(manifest_entry) = manifest_entry else {
            return Ok(None);
        };

        let root_path = normalize(&manifest_entry)
            .rsplit_once('/')
            .map(|(root, _)| root.to_string())
            .unwrap_or_default();

        let mut contents = String::new();
        archive
            .by_name(&manifest_entry)?
            .read_to_string(&mut contents)?;
        let value: Value = serde_yaml::from_str(&contents)?;

        let listing = ArchiveListing::from_zip(&archive, &root_path);
        tracing::debug!(
            "Found manifest at '{}' among {} archive entries",
            manifest_entry,
            archive.len()
        );

        Ok(Some(Self {
            value,
            root_path,
            listing,
        }))
    }
}

/// Reads the manifest of a zipped mod.
pub fn read_zip_manifest(archive_path: &Utf8Path) -> Result<ZipManifest> {
    let file = File::open(archive_path)?;
    ZipManifest::read(BufReader::new(file))?
        .ok_or_else(|| ManifestError::ManifestNotFound(archive_path.to_path_buf()))
}

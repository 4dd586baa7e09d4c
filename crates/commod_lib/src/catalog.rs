//! Discovery and validation of the mods available in a distribution folder.
//!
//! Mods live under `<distribution>/mods`, either unpacked (a folder holding a
//! `manifest.yaml`, up to three levels deep) or as `.zip` archives next to
//! them. The pre-mod layout kept the community remaster in
//! `<distribution>/remaster`, which is still picked up.
//!
//! Manifests are cached by an xxh3 digest of the file, and for unpacked mods
//! of the folder layout next to it, so that a refresh only revalidates what
//! changed. Validation of new or changed manifests runs in
//! parallel; a broken manifest is recorded as a loading error and never stops
//! the others from loading.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use commod_manifest::{load_zip_manifest, DataCheck, ModManifest, MANIFEST_FILE_NAME};
use rayon::prelude::*;
use serde_yaml::Value;
use std::collections::BTreeMap;
use walkdir::WalkDir;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// How deep below `mods` a manifest is looked for.
pub const MANIFEST_SEARCH_DEPTH: usize = 3;

/// A manifest that failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingError {
    pub path: Utf8PathBuf,
    pub message: String,
}

/// A validated mod and where it came from.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Manifest file, or the archive for packed mods.
    pub path: Utf8PathBuf,
    /// Cache key of the manifest and the folders it was validated against.
    pub digest: u64,
    pub manifest: ModManifest,
}

/// Outcome counts of one [`ModCatalog::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub loaded: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Manifest and archive paths found in a distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    pub manifests: Vec<Utf8PathBuf>,
    pub archives: Vec<Utf8PathBuf>,
}

impl Discovered {
    fn is_empty(&self) -> bool {
        self.manifests.is_empty() && self.archives.is_empty()
    }

    fn all(&self) -> impl Iterator<Item = (&Utf8PathBuf, bool)> {
        self.manifests
            .iter()
            .map(|p| (p, false))
            .chain(self.archives.iter().map(|p| (p, true)))
    }
}

fn child_dirs(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    WalkDir::new(dir.as_std_path())
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .collect()
}

/// Finds manifests in the subfolders of `dir`.
///
/// Every top-level mod folder is searched; below the top level only the
/// first manifest found in a folder is kept.
fn find_manifests(dir: &Utf8Path, levels: usize, top_level: bool) -> Vec<Utf8PathBuf> {
    let mut found = Vec::new();
    for child in child_dirs(dir) {
        let manifest = child.join(MANIFEST_FILE_NAME);
        if manifest.is_file() {
            found.push(manifest);
            if !top_level {
                break;
            }
        } else if levels > 1 {
            found.extend(find_manifests(&child, levels - 1, false));
        }
    }
    found
}

/// Digest of an unpacked manifest together with the folders up to two
/// levels below its mod root, the ones data-presence checks look at.
fn unpacked_digest(manifest_path: &Utf8Path, bytes: &[u8]) -> u64 {
    let mod_root = manifest_path.parent().unwrap_or(Utf8Path::new("."));
    let mut hasher = Xxh3::new();
    hasher.update(bytes);

    let folders = WalkDir::new(mod_root.as_std_path())
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir());
    for entry in folders {
        if let Ok(relative) = entry.path().strip_prefix(mod_root.as_std_path()) {
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update(b"\0");
        }
    }
    hasher.digest()
}

fn load_unpacked(path: &Utf8Path, bytes: &[u8]) -> std::result::Result<ModManifest, String> {
    let value: Value = serde_yaml::from_slice(bytes).map_err(|e| e.to_string())?;
    if value.is_null() {
        return Err("mod manifest is empty".to_string());
    }
    let mod_root = path.parent().unwrap_or(Utf8Path::new("."));
    ModManifest::from_validated_value(&value, mod_root, DataCheck::Directory(mod_root))
        .map_err(|e| e.to_string())
}

/// The validated mods of one distribution folder.
#[derive(Debug, Clone)]
pub struct ModCatalog {
    distribution_dir: Utf8PathBuf,
    entries: BTreeMap<Utf8PathBuf, CatalogEntry>,
    digests: BTreeMap<Utf8PathBuf, u64>,
    failures: BTreeMap<Utf8PathBuf, String>,
}

impl ModCatalog {
    pub fn new(distribution_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            distribution_dir: distribution_dir.into(),
            entries: BTreeMap::new(),
            digests: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    pub fn distribution_dir(&self) -> &Utf8Path {
        &self.distribution_dir
    }

    pub fn mods_dir(&self) -> Utf8PathBuf {
        self.distribution_dir.join("mods")
    }

    /// Lists the manifests and archives currently in the distribution.
    pub fn discover(&self) -> Discovered {
        let mut discovered = Discovered::default();

        let legacy_remaster = self.distribution_dir.join("remaster").join(MANIFEST_FILE_NAME);
        if legacy_remaster.is_file() {
            discovered.manifests.push(legacy_remaster);
        }

        let mods_dir = self.mods_dir();
        discovered
            .manifests
            .extend(find_manifests(&mods_dir, MANIFEST_SEARCH_DEPTH, true));

        discovered.archives = WalkDir::new(mods_dir.as_std_path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
            .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")))
            .collect();

        discovered
    }

    /// Rescans the distribution, loading new and changed manifests.
    ///
    /// Fails only when there is nothing to scan: a missing `mods` folder
    /// (an empty one is created) or a distribution without any manifest.
    pub fn refresh(&mut self) -> Result<RefreshSummary> {
        let mods_dir = self.mods_dir();
        if !mods_dir.is_dir() {
            std::fs::create_dir_all(&mods_dir)?;
            return Err(Error::ModsDirMissing(mods_dir));
        }

        let discovered = self.discover();
        if discovered.is_empty() {
            return Err(Error::NoModsFound(mods_dir));
        }

        let mut summary = RefreshSummary::default();
        let mut pending = Vec::new();

        for (path, archived) in discovered.all() {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.record_failure(path, e.to_string());
                    continue;
                }
            };
            let digest = if archived {
                xxh3_64(&bytes)
            } else {
                unpacked_digest(path, &bytes)
            };
            if self.digests.get(path) == Some(&digest) {
                summary.unchanged += 1;
                continue;
            }
            pending.push((path.clone(), archived, bytes, digest));
        }

        tracing::debug!("Validating {} new or changed mod manifests", pending.len());
        let results: Vec<_> = pending
            .into_par_iter()
            .map(|(path, archived, bytes, digest)| {
                tracing::info!("Loading {}", path);
                let result = if archived {
                    load_zip_manifest(&path, true).map_err(|e| e.to_string())
                } else {
                    load_unpacked(&path, &bytes)
                };
                (path, digest, result)
            })
            .collect();

        for (path, digest, result) in results {
            self.digests.insert(path.clone(), digest);
            match result {
                Ok(manifest) => {
                    self.failures.remove(&path);
                    self.entries.insert(
                        path.clone(),
                        CatalogEntry {
                            path,
                            digest,
                            manifest,
                        },
                    );
                    summary.loaded += 1;
                }
                Err(message) => {
                    self.entries.remove(&path);
                    self.record_failure(&path, message);
                }
            }
        }

        let present: Vec<&Utf8PathBuf> = discovered.all().map(|(path, _)| path).collect();
        let vanished: Vec<Utf8PathBuf> = self
            .digests
            .keys()
            .filter(|path| !present.contains(path))
            .cloned()
            .collect();
        for path in vanished {
            tracing::debug!("Removed missing {} from rotation", path);
            self.digests.remove(&path);
            self.failures.remove(&path);
            if self.entries.remove(&path).is_some() {
                summary.removed += 1;
            }
        }

        summary.failed = self.failures.len();
        if summary.failed > 0 {
            tracing::error!("Errors occurred when loading mods: {} manifest(s) failed", summary.failed);
        }
        Ok(summary)
    }

    fn record_failure(&mut self, path: &Utf8Path, message: String) {
        tracing::warn!("Couldn't load mod manifest {}: {}", path, message);
        self.failures.insert(path.to_path_buf(), message);
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn manifests(&self) -> impl Iterator<Item = &ModManifest> {
        self.entries.values().map(|entry| &entry.manifest)
    }

    /// Finds a mod by its manifest `name`.
    pub fn get(&self, name: &str) -> Option<&ModManifest> {
        self.manifests().find(|manifest| manifest.name == name)
    }

    pub fn errors(&self) -> Vec<LoadingError> {
        self.failures
            .iter()
            .map(|(path, message)| LoadingError {
                path: path.clone(),
                message: message.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

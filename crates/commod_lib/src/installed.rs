//! Bookkeeping of what is installed on a game copy.
//!
//! The record lives in `data/mod_manifest.yaml` inside the game directory and
//! maps each installed content name to its version and the choices it was
//! installed with:
//!
//! ```yaml
//! community_patch:
//!   base: yes
//!   version: "1.14"
//!   build: 8c3a1f2
//!   language: eng
//!   installment: exmachina
//!   gameplay: yes
//!   hd_ui: skip
//! ```
//!
//! A record with any entry lacking `base` or `version` is rejected as a whole.

use crate::error::{Error, Result};
use crate::settings::Choice;
use camino::{Utf8Path, Utf8PathBuf};
use commod_game::INSTALLED_MANIFEST_PATH;
use commod_manifest::{ModManifest, COMMUNITY_PATCH, COMMUNITY_REMASTER, DEFAULT_INSTALLMENT};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Language recorded for content installed without one.
pub const LANGUAGE_NOT_SPECIFIED: &str = "not_specified";

const RESERVED_KEYS: [&str; 6] = [
    "base",
    "version",
    "build",
    "language",
    "installment",
    "display_name",
];

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn choice_from_value(value: &Value) -> Option<Choice> {
    match value {
        Value::Bool(true) => Some(Choice::Yes),
        Value::Bool(false) => Some(Choice::Skip),
        other => scalar_string(other).map(|s| Choice::parse(&s)),
    }
}

/// One installed content entry.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledContent {
    pub base: Choice,
    pub version: String,
    pub build: Option<String>,
    pub language: Option<String>,
    pub installment: Option<String>,
    pub display_name: Option<String>,
    /// Choice per option, keyed by option name.
    pub options: BTreeMap<String, Choice>,
}

impl InstalledContent {
    pub fn new(base: Choice, version: impl Into<String>) -> Self {
        Self {
            base,
            version: version.into(),
            build: None,
            language: None,
            installment: None,
            display_name: None,
            options: BTreeMap::new(),
        }
    }

    /// Builds the entry from its stored map.
    ///
    /// Fails if `base` or `version` is missing or null.
    pub fn from_mapping(map: &Mapping) -> std::result::Result<Self, String> {
        let field = |key: &str| map.get(key).filter(|v| !v.is_null());

        let base = field("base")
            .and_then(choice_from_value)
            .ok_or_else(|| "entry has no 'base'".to_string())?;
        let version = field("version")
            .and_then(scalar_string)
            .ok_or_else(|| "entry has no 'version'".to_string())?;

        let mut content = Self::new(base, version);
        content.build = field("build").and_then(scalar_string);
        content.language = field("language").and_then(scalar_string);
        content.installment = field("installment").and_then(scalar_string);
        content.display_name = field("display_name").and_then(scalar_string);

        for (key, value) in map {
            let Some(key) = key.as_str() else {
                continue;
            };
            if RESERVED_KEYS.contains(&key) || value.is_null() {
                continue;
            }
            match choice_from_value(value) {
                Some(choice) => {
                    content.options.insert(key.to_string(), choice);
                }
                None => tracing::debug!("Ignoring non-scalar value of installed option '{}'", key),
            }
        }

        Ok(content)
    }

    /// The stored map, holding exactly the fields that are set.
    pub fn to_mapping(&self) -> Mapping {
        let mut map = Mapping::new();
        map.insert("base".into(), self.base.as_str().into());
        map.insert("version".into(), self.version.as_str().into());
        let optional = [
            ("build", &self.build),
            ("language", &self.language),
            ("installment", &self.installment),
            ("display_name", &self.display_name),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.into(), value.as_str().into());
            }
        }
        for (name, choice) in &self.options {
            map.insert(name.as_str().into(), choice.as_str().into());
        }
        map
    }

    /// Whether the option is recorded for this content, skipped or not.
    pub fn has_option(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    /// Names of the options that were not skipped, sorted.
    pub fn installed_options(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|(_, choice)| !choice.is_skip())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(LANGUAGE_NOT_SPECIFIED)
    }

    pub fn installment(&self) -> &str {
        self.installment.as_deref().unwrap_or(DEFAULT_INSTALLMENT)
    }

    fn fill_load_defaults(&mut self) {
        self.language
            .get_or_insert_with(|| LANGUAGE_NOT_SPECIFIED.to_string());
        self.installment
            .get_or_insert_with(|| DEFAULT_INSTALLMENT.to_string());
    }
}

/// Everything installed on one game copy, keyed by content name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstalledRecord {
    entries: BTreeMap<String, InstalledContent>,
}

impl InstalledRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&InstalledContent> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, content: InstalledContent) {
        self.entries.insert(name.into(), content);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InstalledContent)> {
        self.entries.iter().map(|(name, content)| (name.as_str(), content))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_community_remaster(&self) -> bool {
        self.contains(COMMUNITY_REMASTER)
    }

    /// Right-biased union: entries of `new_entries` replace prior ones whole.
    pub fn merge(&self, new_entries: &InstalledRecord) -> InstalledRecord {
        let mut merged = self.clone();
        for (name, content) in &new_entries.entries {
            merged.entries.insert(name.clone(), content.clone());
        }
        merged
    }

    /// Whether anything beyond the community patch or remaster is installed.
    pub fn is_modded(&self) -> bool {
        if self.has_community_remaster() {
            self.len() > 2
        } else if self.contains(COMMUNITY_PATCH) {
            self.len() > 1
        } else {
            false
        }
    }

    /// Builds the record from the stored YAML document.
    ///
    /// An empty document is an empty record. Load-time defaults are applied
    /// to `language` and `installment`.
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => map,
            _ => return Err("installed manifest is not a map".to_string()),
        };

        let mut entries = BTreeMap::new();
        for (name, entry) in map {
            let name = scalar_string(name).ok_or_else(|| "content name is not a string".to_string())?;
            let entry = entry
                .as_mapping()
                .ok_or_else(|| format!("entry '{name}' is not a map"))?;
            let mut content =
                InstalledContent::from_mapping(entry).map_err(|reason| format!("'{name}': {reason}"))?;
            content.fill_load_defaults();
            entries.insert(name, content);
        }

        Ok(Self { entries })
    }

    pub fn to_value(&self) -> Value {
        let map: Mapping = self
            .entries
            .iter()
            .map(|(name, content)| (Value::from(name.as_str()), Value::Mapping(content.to_mapping())))
            .collect();
        Value::Mapping(map)
    }

    /// Human readable lines per installed content, keyed by content name.
    ///
    /// The community patch is hidden when the remaster is installed, since the
    /// remaster includes it. `known` manifests supply display names for
    /// entries that didn't record one.
    pub fn descriptions(&self, known: &[ModManifest]) -> BTreeMap<String, String> {
        let mut descriptions = BTreeMap::new();

        for (name, content) in &self.entries {
            let display_name = match name.as_str() {
                COMMUNITY_PATCH if self.has_community_remaster() => continue,
                COMMUNITY_PATCH => "Community Patch".to_string(),
                COMMUNITY_REMASTER => "Community Remaster".to_string(),
                _ => content
                    .display_name
                    .clone()
                    .or_else(|| {
                        known
                            .iter()
                            .find(|m| &m.name == name && m.version == content.version)
                            .map(|m| m.display_name.clone())
                    })
                    .unwrap_or_else(|| name.clone()),
            };

            let mut description = format!("{} (version {})", display_name, content.version);
            if let Some(build) = &content.build {
                description.push_str(&format!(" [{build}]"));
            }

            let installed = content.installed_options();
            if !installed.is_empty() {
                description.push_str(&format!("\nOptional content: {}", installed.join(", ")));
            } else if !content.options.is_empty() {
                description.push_str("\n* base version");
            }

            descriptions.insert(name.clone(), description);
        }

        descriptions
    }
}

/// Reads and writes the installed-content record of one game copy.
///
/// The engine doesn't lock the file: installs on the same game copy must be
/// serialized by the caller.
#[derive(Debug, Clone)]
pub struct InstalledManifestStore {
    path: Utf8PathBuf,
}

impl InstalledManifestStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the fixed location inside a game directory.
    pub fn for_game(game_root: &Utf8Path) -> Self {
        Self::new(game_root.join(INSTALLED_MANIFEST_PATH))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the record, rejecting it whole if any entry is invalid.
    pub fn load(&self) -> Result<InstalledRecord> {
        let invalid = |reason: String| Error::InvalidExistingManifest {
            path: self.path.clone(),
            reason,
        };

        let contents = std::fs::read_to_string(&self.path)?;
        let value: Value = serde_yaml::from_str(&contents).map_err(|e| invalid(e.to_string()))?;
        let record = InstalledRecord::from_value(&value).map_err(invalid)?;

        tracing::debug!("Loaded {} installed content entries from {}", record.len(), self.path);
        Ok(record)
    }

    /// Right-biased union of two records.
    pub fn merge(existing: &InstalledRecord, new_entries: &InstalledRecord) -> InstalledRecord {
        existing.merge(new_entries)
    }

    /// Writes the record through a temporary file renamed into place.
    pub fn persist(&self, record: &InstalledRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_yaml::to_string(&record.to_value())?;
        let temp_path = self.path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, contents)?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            if let Err(cleanup) = std::fs::remove_file(&temp_path) {
                tracing::warn!("Couldn't remove {}: {}", temp_path, cleanup);
            }
            return Err(e.into());
        }

        tracing::info!("Saved installed content manifest to {}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str) -> InstalledRecord {
        InstalledRecord::from_value(&serde_yaml::from_str(source).unwrap()).unwrap()
    }

    fn store() -> (tempfile::TempDir, InstalledManifestStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, InstalledManifestStore::for_game(&root))
    }

    #[test]
    fn test_load_applies_defaults() {
        let record = record("community_patch:\n  base: yes\n  version: 1.14\n  gameplay: yes\n");
        let compatch = record.get(COMMUNITY_PATCH).unwrap();
        assert_eq!(compatch.version, "1.14");
        assert_eq!(compatch.language.as_deref(), Some(LANGUAGE_NOT_SPECIFIED));
        assert_eq!(compatch.installment.as_deref(), Some("exmachina"));
        assert_eq!(compatch.options.get("gameplay"), Some(&Choice::Yes));
    }

    #[test]
    fn test_entry_without_version_rejects_whole_record() {
        let source = "community_patch:\n  base: yes\n  version: '1.14'\nsome_mod:\n  base: yes\n";
        let value = serde_yaml::from_str(source).unwrap();
        assert!(InstalledRecord::from_value(&value).is_err());
    }

    #[test]
    fn test_store_load_rejects_invalid_record() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "some_mod:\n  version: '1.0'\n").unwrap();
        assert!(matches!(store.load(), Err(Error::InvalidExistingManifest { .. })));
    }

    #[test]
    fn test_merge_replaces_whole_entries() {
        let existing = record(
            "community_patch:\n  base: yes\n  version: '1.13'\n  gameplay: yes\nother:\n  base: yes\n  version: '2'\n",
        );
        let new_entries = record("community_patch:\n  base: yes\n  version: '1.14'\n");

        let merged = InstalledManifestStore::merge(&existing, &new_entries);
        let compatch = merged.get(COMMUNITY_PATCH).unwrap();
        assert_eq!(compatch.version, "1.14");
        assert!(!compatch.has_option("gameplay"));
        assert!(merged.contains("other"));
    }

    #[test]
    fn test_persist_writes_exactly_what_is_given() {
        let (_dir, store) = store();
        let mut content = InstalledContent::new(Choice::Yes, "1.0");
        content.options.insert("opt1".to_string(), Choice::Setting("b".to_string()));
        let mut record = InstalledRecord::new();
        record.insert("my_mod", content);

        store.persist(&record).unwrap();
        let written = std::fs::read_to_string(store.path()).unwrap();
        assert!(!written.contains("language"));
        assert!(!store.path().with_extension("yaml.tmp").exists());

        let loaded = store.load().unwrap();
        let entry = loaded.get("my_mod").unwrap();
        assert_eq!(entry.options.get("opt1"), Some(&Choice::Setting("b".to_string())));
        assert_eq!(entry.language(), LANGUAGE_NOT_SPECIFIED);
    }

    #[test]
    fn test_failed_persist_leaves_no_temp_file() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().join("blocker")).unwrap();

        let mut record = InstalledRecord::new();
        record.insert("my_mod", InstalledContent::new(Choice::Yes, "1.0"));

        assert!(matches!(store.persist(&record), Err(Error::Io(_))));
        assert!(!store.path().with_extension("yaml.tmp").exists());
    }

    #[test]
    fn test_is_modded() {
        assert!(!record("community_patch:\n  base: yes\n  version: '1.14'\n").is_modded());
        assert!(record(
            "community_patch:\n  base: yes\n  version: '1.14'\nmy_mod:\n  base: yes\n  version: '1'\n"
        )
        .is_modded());
        assert!(!record(
            "community_patch:\n  base: yes\n  version: '1.14'\ncommunity_remaster:\n  base: yes\n  version: '1.14'\n"
        )
        .is_modded());
        assert!(!InstalledRecord::new().is_modded());
    }

    #[test]
    fn test_descriptions_hide_patch_under_remaster() {
        let record = record(
            "community_patch:\n  base: yes\n  version: '1.14'\ncommunity_remaster:\n  base: yes\n  version: '1.14'\n  build: abc1234\n  hd_ui: skip\nmy_mod:\n  base: yes\n  version: '1'\n  display_name: My Mod\n  extra: yes\n",
        );
        let descriptions = record.descriptions(&[]);
        assert!(!descriptions.contains_key(COMMUNITY_PATCH));
        assert_eq!(
            descriptions[COMMUNITY_REMASTER],
            "Community Remaster (version 1.14) [abc1234]\n* base version"
        );
        assert_eq!(descriptions["my_mod"], "My Mod (version 1)\nOptional content: extra");
    }
}

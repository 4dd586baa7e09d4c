use crate::archive::read_zip_manifest;
use crate::error::{ManifestError, Result};
use crate::schema::{parse_bool_like, validate_manifest, DataCheck};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

pub const COMMUNITY_PATCH: &str = "community_patch";
pub const COMMUNITY_REMASTER: &str = "community_remaster";
pub const DEFAULT_PATCHER_VERSION_REQUIREMENT: &str = "1.10";
pub const DEFAULT_INSTALLMENT: &str = "exmachina";

/// Length commit hashes are shortened to.
const BUILD_LENGTH: usize = 7;

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn de_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a scalar value, found {value:?}")))
}

fn de_scalar_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    let Some(values) = Option::<Vec<Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    values
        .iter()
        .map(|value| {
            scalar_to_string(value)
                .ok_or_else(|| D::Error::custom(format!("expected a scalar value, found {value:?}")))
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(Some)
}

fn de_opt_bool_like<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<bool>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        Value::String(s) => parse_bool_like(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected 'true' or 'false', found '{s}'"))),
        other => Err(D::Error::custom(format!("expected a boolean, found {other:?}"))),
    }
}

fn de_bool_like<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(de_opt_bool_like(deserializer)?.unwrap_or(false))
}

/// Treats an explicit `null` the same as an absent key.
fn de_null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_patcher_version_requirement() -> String {
    DEFAULT_PATCHER_VERSION_REQUIREMENT.to_string()
}

fn default_installment() -> String {
    DEFAULT_INSTALLMENT.to_string()
}

/// A prerequisite or incompatibility declared by a mod.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContentRequirement {
    /// Name of the required (or conflicting) content.
    pub name: String,

    /// Accepted versions; any version matches when absent.
    #[serde(default, deserialize_with = "de_scalar_list", skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<String>>,

    /// Options of the named content that must be installed as well.
    #[serde(default, deserialize_with = "de_scalar_list", skip_serializing_if = "Option::is_none")]
    pub optional_content: Option<Vec<String>>,
}

/// Engine parameters applied by the configurable patcher.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PatcherOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skins_in_shop: Option<i64>,

    #[serde(default, deserialize_with = "de_opt_bool_like", skip_serializing_if = "Option::is_none")]
    pub blast_damage_friendly_fire: Option<bool>,
}

impl PatcherOptions {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overrides every parameter that `other` sets.
    pub fn apply(&mut self, other: &PatcherOptions) {
        if other.gravity.is_some() {
            self.gravity = other.gravity;
        }
        if other.skins_in_shop.is_some() {
            self.skins_in_shop = other.skins_in_shop;
        }
        if other.blast_damage_friendly_fire.is_some() {
            self.blast_damage_friendly_fire = other.blast_damage_friendly_fire;
        }
    }
}

/// A sub-choice of an optional content entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstallSetting {
    pub name: String,
    pub description: String,
}

/// An optional part of a mod the user may include or skip.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptionalContent {
    pub name: String,
    pub display_name: String,
    pub description: String,

    /// Setting picked by a full install; always one of `install_settings`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_option: Option<String>,

    #[serde(default, deserialize_with = "de_null_default", skip_serializing_if = "Vec::is_empty")]
    pub install_settings: Vec<InstallSetting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patcher_options: Option<PatcherOptions>,

    #[serde(default, deserialize_with = "de_bool_like")]
    pub no_base_content: bool,
}

impl OptionalContent {
    pub fn has_settings(&self) -> bool {
        !self.install_settings.is_empty()
    }

    pub fn setting(&self, name: &str) -> Option<&InstallSetting> {
        self.install_settings.iter().find(|s| s.name == name)
    }
}

/// A mod manifest, built from YAML that already passed schema validation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModManifest {
    /// Stable identifier of the mod.
    pub name: String,
    pub display_name: String,
    pub description: String,

    /// Opaque version string; numbers in YAML are stringified.
    #[serde(deserialize_with = "de_scalar")]
    pub version: String,

    /// Short commit hash of the build.
    #[serde(deserialize_with = "de_scalar")]
    pub build: String,

    pub authors: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default = "default_installment")]
    pub installment: String,

    #[serde(default, deserialize_with = "de_null_default")]
    pub prerequisites: Vec<ContentRequirement>,

    #[serde(default, deserialize_with = "de_null_default", skip_serializing_if = "Vec::is_empty")]
    pub incompatible: Vec<ContentRequirement>,

    #[serde(default = "default_patcher_version_requirement", deserialize_with = "de_scalar")]
    pub patcher_version_requirement: String,

    /// Mod-level parameters with every option's overrides applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patcher_options: Option<PatcherOptions>,

    #[serde(default, deserialize_with = "de_null_default", skip_serializing_if = "Vec::is_empty")]
    pub optional_content: Vec<OptionalContent>,

    #[serde(default, deserialize_with = "de_bool_like")]
    pub no_base_content: bool,

    /// Whether options may be changed on reinstall.
    #[serde(default)]
    pub safe_reinstall_options: bool,

    /// Directory holding the manifest and the mod payload.
    #[serde(skip)]
    pub mod_root: Utf8PathBuf,

    /// Archive the manifest was read from, if the mod is still packed.
    #[serde(skip)]
    pub archive: Option<Utf8PathBuf>,
}

fn manifest_name(value: &Value) -> String {
    value
        .get("name")
        .and_then(scalar_to_string)
        .unwrap_or_else(|| "<unnamed>".to_string())
}

impl ModManifest {
    /// Builds the typed manifest from an untyped YAML value.
    ///
    /// Fails on input the schema validator would reject, and on
    /// `default_option` values that don't name one of the option's settings.
    pub fn from_value(value: &Value, mod_root: impl Into<Utf8PathBuf>) -> Result<Self> {
        if !value.is_mapping() {
            return Err(ManifestError::NotAMap);
        }

        let mut manifest: ModManifest =
            serde_yaml::from_value(value.clone()).map_err(|e| ManifestError::BrokenManifest {
                name: manifest_name(value),
                reason: e.to_string(),
            })?;
        manifest.mod_root = mod_root.into();

        if let Some((index, _)) = manifest.build.char_indices().nth(BUILD_LENGTH) {
            manifest.build.truncate(index);
        }

        for option in &manifest.optional_content {
            if let Some(default) = &option.default_option {
                if option.setting(default).is_none() {
                    tracing::error!(
                        "Incorrect default option '{}' for '{}' in content manifest",
                        default,
                        option.name
                    );
                    return Err(ManifestError::InvalidDefaultOption {
                        option: option.name.clone(),
                        default: default.clone(),
                    });
                }
            }
        }

        let overrides: Vec<PatcherOptions> = manifest
            .optional_content
            .iter()
            .filter_map(|option| option.patcher_options.clone())
            .collect();
        if !overrides.is_empty() {
            let merged = manifest.patcher_options.get_or_insert_with(PatcherOptions::default);
            for option_overrides in &overrides {
                merged.apply(option_overrides);
            }
        }

        Ok(manifest)
    }

    /// Validates `value` first and only constructs it if no problem was found.
    pub fn from_validated_value(
        value: &Value,
        mod_root: impl Into<Utf8PathBuf>,
        data: DataCheck<'_>,
    ) -> Result<Self> {
        let report = validate_manifest(value, data);
        if !report.is_valid() {
            return Err(ManifestError::ValidationFailed {
                name: manifest_name(value),
                report,
            });
        }
        Self::from_value(value, mod_root)
    }

    pub fn option(&self, name: &str) -> Option<&OptionalContent> {
        self.optional_content.iter().find(|o| o.name == name)
    }

    pub fn is_community_patch(&self) -> bool {
        self.name == COMMUNITY_PATCH
    }

    pub fn is_community_remaster(&self) -> bool {
        self.name == COMMUNITY_REMASTER
    }

    /// Whether a patcher of `patcher_version` can install this mod.
    ///
    /// Versions compare as decimal numbers; unparsable versions never match.
    pub fn compatible_with_patcher(&self, patcher_version: &str) -> bool {
        let (Ok(required), Ok(available)) = (
            self.patcher_version_requirement.trim().parse::<f64>(),
            patcher_version.trim().parse::<f64>(),
        ) else {
            return false;
        };
        is_close(required, available) || available > required
    }

    pub fn compatible_with_installment(&self, installment: &str) -> bool {
        self.installment.eq_ignore_ascii_case(installment)
    }
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

/// Loads, validates and builds the manifest at `path`.
///
/// The mod root is the directory holding the manifest. With `check_data`
/// the payload folders are required to exist next to it.
pub fn load_manifest_file(path: &Utf8Path, check_data: bool) -> Result<ModManifest> {
    let mod_root = path.parent().unwrap_or(Utf8Path::new("."));
    let contents = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&contents)?;

    let data = if check_data {
        DataCheck::Directory(mod_root)
    } else {
        DataCheck::Skip
    };
    let manifest = ModManifest::from_validated_value(&value, mod_root, data)?;
    tracing::info!("Loaded manifest for '{}' from {}", manifest.display_name, path);
    Ok(manifest)
}

/// Loads the manifest of a mod that is still packed in a zip archive.
///
/// The mod root points where the archive's mod folder lands when extracted
/// next to the archive.
pub fn load_zip_manifest(archive_path: &Utf8Path, check_data: bool) -> Result<ModManifest> {
    let zipped = read_zip_manifest(archive_path)?;
    let data = if check_data {
        DataCheck::Archive(&zipped.listing)
    } else {
        DataCheck::Skip
    };

    let extract_dir = archive_path.parent().unwrap_or(Utf8Path::new("."));
    let mod_root = if zipped.root_path.is_empty() {
        extract_dir.to_path_buf()
    } else {
        extract_dir.join(&zipped.root_path)
    };

    let mut manifest = ModManifest::from_validated_value(&zipped.value, mod_root, data)?;
    manifest.archive = Some(archive_path.to_path_buf());
    tracing::info!(
        "Loaded manifest for '{}' from archive {}",
        manifest.display_name,
        archive_path
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: sample_mod
display_name: Sample Mod
version: 1.2
build: "0123456789abcdef"
description: A sample
authors: Someone
prerequisites:
  - name: community_patch
    versions: [1.14, "=1.13"]
    optional_content: [gameplay]
patcher_version_requirement: "1.12"
patcher_options:
  gravity: -9.8
  skins_in_shop: 8
optional_content:
  - name: opt1
    display_name: Option One
    description: First option
    default_option: a
    install_settings:
      - name: a
        description: Setting A
      - name: b
        description: Setting B
  - name: opt2
    display_name: Option Two
    description: Second option
    patcher_options:
      skins_in_shop: 16
"#;

    fn sample() -> ModManifest {
        let value: Value = serde_yaml::from_str(SAMPLE).unwrap();
        ModManifest::from_validated_value(&value, "mods/sample_mod", DataCheck::Skip).unwrap()
    }

    #[test]
    fn test_construct_from_valid_manifest() {
        let manifest = sample();
        assert_eq!(manifest.version, "1.2");
        assert_eq!(manifest.build, "0123456");
        assert_eq!(manifest.patcher_version_requirement, "1.12");
        assert_eq!(manifest.installment, "exmachina");
        assert_eq!(manifest.mod_root, Utf8PathBuf::from("mods/sample_mod"));
        assert_eq!(
            manifest.prerequisites[0].versions,
            Some(vec!["1.14".to_string(), "=1.13".to_string()])
        );
        assert_eq!(manifest.optional_content.len(), 2);
        assert_eq!(manifest.option("opt1").unwrap().default_option.as_deref(), Some("a"));
    }

    #[test]
    fn test_option_patcher_options_override_mod_level() {
        let options = sample().patcher_options.unwrap();
        assert_eq!(options.gravity, Some(-9.8));
        assert_eq!(options.skins_in_shop, Some(16));
        assert_eq!(options.blast_damage_friendly_fire, None);
    }

    #[test]
    fn test_invalid_default_option_fails_construction() {
        let source = SAMPLE.replace("default_option: a", "default_option: c");
        let value: Value = serde_yaml::from_str(&source).unwrap();
        assert!(matches!(
            ModManifest::from_value(&value, "mods/sample_mod"),
            Err(ManifestError::InvalidDefaultOption { .. })
        ));
    }

    #[test]
    fn test_broken_no_base_content() {
        let source = format!("{SAMPLE}no_base_content: perhaps\n");
        let value: Value = serde_yaml::from_str(&source).unwrap();
        assert!(matches!(
            ModManifest::from_value(&value, "mods/sample_mod"),
            Err(ManifestError::BrokenManifest { .. })
        ));
    }

    #[test]
    fn test_no_base_content_string() {
        let source = format!("{SAMPLE}no_base_content: \"TRUE\"\n");
        let value: Value = serde_yaml::from_str(&source).unwrap();
        assert!(ModManifest::from_value(&value, ".").unwrap().no_base_content);
    }

    #[test]
    fn test_validation_failure_carries_report() {
        let source = SAMPLE.replace("authors: Someone\n", "");
        let value: Value = serde_yaml::from_str(&source).unwrap();
        match ModManifest::from_validated_value(&value, ".", DataCheck::Skip) {
            Err(ManifestError::ValidationFailed { name, report }) => {
                assert_eq!(name, "sample_mod");
                assert!(!report.is_valid());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_compatible_with_patcher() {
        let manifest = sample();
        assert!(manifest.compatible_with_patcher("1.12"));
        assert!(manifest.compatible_with_patcher("1.13"));
        assert!(!manifest.compatible_with_patcher("1.11"));
        assert!(!manifest.compatible_with_patcher("not a number"));
    }

    #[test]
    fn test_compatible_with_installment() {
        let manifest = sample();
        assert!(manifest.compatible_with_installment("exmachina"));
        assert!(!manifest.compatible_with_installment("m113"));
    }

    #[test]
    fn test_load_manifest_file_checks_data() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let path = root.join("manifest.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        assert!(matches!(
            load_manifest_file(&path, true),
            Err(ManifestError::ValidationFailed { .. })
        ));

        for folder in ["data", "opt1/a", "opt1/b", "opt2"] {
            std::fs::create_dir_all(root.join(folder)).unwrap();
        }
        let manifest = load_manifest_file(&path, true).unwrap();
        assert_eq!(manifest.mod_root, root);
    }
}

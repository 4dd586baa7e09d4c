//! Per-install choices for a mod's base content and its options.

use commod_manifest::{ModManifest, OptionalContent};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

/// What to install for the base content or one option.
///
/// Stored as a plain string: `yes`, `skip`, or the name of a setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Choice {
    Yes,
    Skip,
    /// A named sub-setting of an option with `install_settings`.
    Setting(String),
}

impl Choice {
    pub fn as_str(&self) -> &str {
        match self {
            Choice::Yes => "yes",
            Choice::Skip => "skip",
            Choice::Setting(name) => name,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Choice::Skip)
    }

    /// Parses a stored choice; `no` is accepted as a spelling of `skip`.
    pub fn parse(s: &str) -> Self {
        match s {
            "yes" => Choice::Yes,
            "skip" | "no" => Choice::Skip,
            other => Choice::Setting(other.to_string()),
        }
    }
}

impl From<&str> for Choice {
    fn from(s: &str) -> Self {
        Choice::parse(s)
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Choice {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Choice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // YAML 1.1 writers may have stored `yes`/`no` as booleans.
        match Value::deserialize(deserializer)? {
            Value::Bool(true) => Ok(Choice::Yes),
            Value::Bool(false) => Ok(Choice::Skip),
            Value::String(s) => Ok(Choice::parse(&s)),
            Value::Number(n) => Ok(Choice::Setting(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected an install choice, found {other:?}"
            ))),
        }
    }
}

/// Choices for one install run of a mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSettings {
    pub base: Choice,
    /// Keyed by option name.
    pub options: BTreeMap<String, Choice>,
}

impl InstallSettings {
    pub fn new(base: Choice) -> Self {
        Self {
            base,
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, choice: Choice) -> Self {
        self.options.insert(name.into(), choice);
        self
    }

    pub fn option(&self, name: &str) -> Option<&Choice> {
        self.options.get(name)
    }

    /// Base plus every option: the shortcut for unattended installs.
    ///
    /// Options take their `default_option`, or `yes` when none is declared.
    pub fn full(manifest: &ModManifest) -> Self {
        let options = manifest
            .optional_content
            .iter()
            .map(|option| {
                let choice = option
                    .default_option
                    .as_deref()
                    .map_or(Choice::Yes, |default| Choice::Setting(default.to_string()));
                (option.name.clone(), choice)
            })
            .collect();
        Self {
            base: Choice::Yes,
            options,
        }
    }
}

/// Shortcut for [`InstallSettings::full`].
pub fn full_install_settings(manifest: &ModManifest) -> InstallSettings {
    InstallSettings::full(manifest)
}

/// Whether the user has to pick options themselves.
///
/// True when some option offers settings without declaring a default.
pub fn needs_custom_install(manifest: &ModManifest) -> bool {
    manifest
        .optional_content
        .iter()
        .any(|option| option.has_settings() && option.default_option.is_none())
}

/// The choices the user can make for `option`, in presentation order.
pub fn available_choices(option: &OptionalContent) -> Vec<Choice> {
    if option.has_settings() {
        option
            .install_settings
            .iter()
            .map(|setting| Choice::Setting(setting.name.clone()))
            .chain(std::iter::once(Choice::Skip))
            .collect()
    } else {
        vec![Choice::Yes, Choice::Skip]
    }
}

/// Locks a reinstall to the choices recorded for the previous install.
///
/// Returns `None` when the mod allows changing options on reinstall.
/// Options the previous install didn't record are skipped.
pub fn forced_reinstall_settings(
    manifest: &ModManifest,
    previous: &crate::InstalledContent,
) -> Option<InstallSettings> {
    if manifest.safe_reinstall_options {
        return None;
    }

    let options = manifest
        .optional_content
        .iter()
        .map(|option| {
            let choice = previous
                .options
                .get(&option.name)
                .cloned()
                .unwrap_or(Choice::Skip);
            (option.name.clone(), choice)
        })
        .collect();

    Some(InstallSettings {
        base: previous.base.clone(),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InstalledContent;

    fn manifest(source: &str) -> ModManifest {
        let value: Value = serde_yaml::from_str(source).unwrap();
        ModManifest::from_value(&value, "mods/test").unwrap()
    }

    const WITH_OPTIONS: &str = r#"
name: test_mod
display_name: Test Mod
version: "1.0"
build: abc
description: d
authors: a
prerequisites: []
patcher_version_requirement: "1.10"
optional_content:
  - name: opt1
    display_name: Opt 1
    description: first
    default_option: a
    install_settings:
      - name: a
        description: A
      - name: b
        description: B
  - name: opt2
    display_name: Opt 2
    description: second
"#;

    #[test]
    fn test_choice_parsing() {
        assert_eq!(Choice::parse("yes"), Choice::Yes);
        assert_eq!(Choice::parse("skip"), Choice::Skip);
        assert_eq!(Choice::parse("no"), Choice::Skip);
        assert_eq!(Choice::parse("hd"), Choice::Setting("hd".to_string()));
    }

    #[test]
    fn test_choice_yaml_round_trip() {
        let choices: Vec<Choice> = serde_yaml::from_str("[yes, skip, hd, true, false]").unwrap();
        assert_eq!(
            choices,
            vec![
                Choice::Yes,
                Choice::Skip,
                Choice::Setting("hd".to_string()),
                Choice::Yes,
                Choice::Skip
            ]
        );
        let written = serde_yaml::to_string(&Choice::Setting("hd".to_string())).unwrap();
        assert_eq!(written.trim(), "hd");
    }

    #[test]
    fn test_full_install_uses_defaults() {
        let settings = full_install_settings(&manifest(WITH_OPTIONS));
        assert_eq!(settings.base, Choice::Yes);
        assert_eq!(settings.option("opt1"), Some(&Choice::Setting("a".to_string())));
        assert_eq!(settings.option("opt2"), Some(&Choice::Yes));
    }

    #[test]
    fn test_needs_custom_install() {
        assert!(!needs_custom_install(&manifest(WITH_OPTIONS)));
        let source = WITH_OPTIONS.replace("    default_option: a\n", "");
        assert!(needs_custom_install(&manifest(&source)));
    }

    #[test]
    fn test_available_choices() {
        let manifest = manifest(WITH_OPTIONS);
        let opt1 = available_choices(manifest.option("opt1").unwrap());
        assert_eq!(
            opt1,
            vec![
                Choice::Setting("a".to_string()),
                Choice::Setting("b".to_string()),
                Choice::Skip
            ]
        );
        let opt2 = available_choices(manifest.option("opt2").unwrap());
        assert_eq!(opt2, vec![Choice::Yes, Choice::Skip]);
    }

    #[test]
    fn test_forced_reinstall_settings() {
        let mut manifest = manifest(WITH_OPTIONS);
        let previous = InstalledContent {
            options: BTreeMap::from([("opt1".to_string(), Choice::Setting("b".to_string()))]),
            ..InstalledContent::new(Choice::Yes, "1.0")
        };

        let forced = forced_reinstall_settings(&manifest, &previous).unwrap();
        assert_eq!(forced.option("opt1"), Some(&Choice::Setting("b".to_string())));
        assert_eq!(forced.option("opt2"), Some(&Choice::Skip));

        manifest.safe_reinstall_options = true;
        assert!(forced_reinstall_settings(&manifest, &previous).is_none());
    }
}

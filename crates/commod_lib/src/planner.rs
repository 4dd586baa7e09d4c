//! Turning install choices into the ordered list of folders to copy.
//!
//! The order is significant: folders are copied one after another into the
//! game's `data` directory, so a later folder overwrites files of an earlier
//! one. The base content always comes first, then options in the order the
//! manifest declares them.

use crate::error::{Error, Result};
use crate::settings::{Choice, InstallSettings};
use camino::{Utf8Path, Utf8PathBuf};
use commod_manifest::ModManifest;

/// Which part of the mod a copy root belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    Base,
    Option(String),
    Setting { option: String, setting: String },
}

/// One folder whose contents get copied into the game's `data` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRoot {
    pub path: Utf8PathBuf,
    pub source: PlanSource,
}

/// Ordered copy roots for one install of one mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub content: String,
    pub roots: Vec<CopyRoot>,
}

impl InstallPlan {
    pub fn paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.roots.iter().map(|root| root.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

fn broken(manifest: &ModManifest, reason: String) -> Error {
    Error::InvalidInstallSettings {
        content: manifest.name.clone(),
        reason,
    }
}

/// Checks that `settings` covers exactly the mod's options with valid choices.
pub fn validate_settings(manifest: &ModManifest, settings: &InstallSettings) -> Result<()> {
    if let Choice::Setting(setting) = &settings.base {
        return Err(broken(
            manifest,
            format!("base can only be 'yes' or 'skip', found '{setting}'"),
        ));
    }

    for option in &manifest.optional_content {
        let Some(choice) = settings.option(&option.name) else {
            return Err(broken(manifest, format!("no choice for option '{}'", option.name)));
        };
        if let Choice::Setting(setting) = choice {
            if option.setting(setting).is_none() {
                return Err(broken(
                    manifest,
                    format!("option '{}' has no setting '{}'", option.name, setting),
                ));
            }
        }
    }

    if let Some(unknown) = settings
        .options
        .keys()
        .find(|name| manifest.option(name).is_none())
    {
        return Err(broken(manifest, format!("unknown option '{unknown}'")));
    }

    Ok(())
}

/// Computes the copy roots for installing `manifest` with `settings`.
///
/// `yes` on an option copies `<option>/data`; a named setting copies
/// `<option>/data` and then `<option>/<setting>` on top of it. Content
/// declaring `no_base_content` has no `data` folder to copy.
pub fn plan_install(manifest: &ModManifest, settings: &InstallSettings) -> Result<InstallPlan> {
    validate_settings(manifest, settings)?;

    let root = &manifest.mod_root;
    let mut roots = Vec::new();

    if settings.base == Choice::Yes && !manifest.no_base_content {
        roots.push(CopyRoot {
            path: root.join("data"),
            source: PlanSource::Base,
        });
    }

    for option in &manifest.optional_content {
        let option_root = root.join(&option.name);
        let choice = settings.option(&option.name);
        let selected = matches!(choice, Some(Choice::Yes | Choice::Setting(_)));
        if selected && !option.no_base_content {
            roots.push(CopyRoot {
                path: option_root.join("data"),
                source: PlanSource::Option(option.name.clone()),
            });
        }
        if let Some(Choice::Setting(setting)) = choice {
            roots.push(CopyRoot {
                path: option_root.join(setting),
                source: PlanSource::Setting {
                    option: option.name.clone(),
                    setting: setting.clone(),
                },
            });
        }
    }

    if roots.is_empty() {
        return Err(Error::NothingToInstall(manifest.name.clone()));
    }

    tracing::debug!("Planned {} copy roots for '{}'", roots.len(), manifest.name);
    Ok(InstallPlan {
        content: manifest.name.clone(),
        roots,
    })
}

/// Human readable summary of what `settings` installs.
pub fn describe(manifest: &ModManifest, settings: &InstallSettings) -> Vec<String> {
    let mut descriptions = Vec::new();

    if settings.base == Choice::Yes {
        descriptions.push(format!("\n{}\n{}", manifest.display_name, manifest.description));
    }

    let chosen: Vec<_> = manifest
        .optional_content
        .iter()
        .filter_map(|option| match settings.option(&option.name) {
            Some(choice) if !choice.is_skip() => Some((option, choice)),
            _ => None,
        })
        .collect();

    if !chosen.is_empty() {
        descriptions.push("Including options:".to_string());
    }

    for (option, choice) in chosen {
        let mut description = format!("* {}\n{}", option.display_name, option.description);
        if let Choice::Setting(name) = choice {
            if let Some(setting) = option.setting(name) {
                description.push_str(&format!("\t** Install setting: {}", setting.description));
            }
        }
        descriptions.push(description);
    }

    descriptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::full_install_settings;
    use serde_yaml::Value;

    const MANIFEST: &str = r#"
name: test_mod
display_name: Test Mod
version: "1.0"
build: abc
description: Base description
authors: a
prerequisites: []
patcher_version_requirement: "1.10"
optional_content:
  - name: opt1
    display_name: Option One
    description: First
    default_option: a
    install_settings:
      - name: a
        description: Setting A
      - name: b
        description: Setting B
  - name: opt2
    display_name: Option Two
    description: Second
"#;

    fn manifest(source: &str) -> ModManifest {
        let value: Value = serde_yaml::from_str(source).unwrap();
        ModManifest::from_value(&value, "mods/test_mod").unwrap()
    }

    fn paths(plan: &InstallPlan) -> Vec<String> {
        plan.paths().map(|p| p.as_str().replace('\\', "/")).collect()
    }

    #[test]
    fn test_full_install_settings_use_defaults() {
        let settings = full_install_settings(&manifest(MANIFEST));
        assert_eq!(settings.base, Choice::Yes);
        assert_eq!(settings.option("opt1"), Some(&Choice::Setting("a".to_string())));
    }

    #[test]
    fn test_skipped_option_adds_nothing() {
        let settings = InstallSettings::new(Choice::Yes)
            .with_option("opt1", Choice::Skip)
            .with_option("opt2", Choice::Skip);
        let plan = plan_install(&manifest(MANIFEST), &settings).unwrap();
        assert_eq!(paths(&plan), vec!["mods/test_mod/data"]);
    }

    #[test]
    fn test_setting_layers_over_option_data() {
        let settings = InstallSettings::new(Choice::Yes)
            .with_option("opt1", Choice::Setting("b".to_string()))
            .with_option("opt2", Choice::Yes);
        let plan = plan_install(&manifest(MANIFEST), &settings).unwrap();
        assert_eq!(
            paths(&plan),
            vec![
                "mods/test_mod/data",
                "mods/test_mod/opt1/data",
                "mods/test_mod/opt1/b",
                "mods/test_mod/opt2/data",
            ]
        );
        assert_eq!(
            plan.roots[2].source,
            PlanSource::Setting {
                option: "opt1".to_string(),
                setting: "b".to_string()
            }
        );
    }

    #[test]
    fn test_skipped_base() {
        let settings = InstallSettings::new(Choice::Skip)
            .with_option("opt1", Choice::Skip)
            .with_option("opt2", Choice::Yes);
        let plan = plan_install(&manifest(MANIFEST), &settings).unwrap();
        assert_eq!(paths(&plan), vec!["mods/test_mod/opt2/data"]);
    }

    #[test]
    fn test_missing_option_choice_fails() {
        let settings = InstallSettings::new(Choice::Yes).with_option("opt1", Choice::Skip);
        assert!(matches!(
            plan_install(&manifest(MANIFEST), &settings),
            Err(Error::InvalidInstallSettings { .. })
        ));
    }

    #[test]
    fn test_unknown_option_or_setting_fails() {
        let unknown_option = InstallSettings::new(Choice::Yes)
            .with_option("opt1", Choice::Skip)
            .with_option("opt2", Choice::Skip)
            .with_option("opt3", Choice::Yes);
        assert!(plan_install(&manifest(MANIFEST), &unknown_option).is_err());

        let unknown_setting = InstallSettings::new(Choice::Yes)
            .with_option("opt1", Choice::Setting("c".to_string()))
            .with_option("opt2", Choice::Skip);
        assert!(plan_install(&manifest(MANIFEST), &unknown_setting).is_err());
    }

    #[test]
    fn test_nothing_to_install() {
        let source = format!("{MANIFEST}no_base_content: true\n");
        let settings = InstallSettings::new(Choice::Skip)
            .with_option("opt1", Choice::Skip)
            .with_option("opt2", Choice::Skip);
        assert!(matches!(
            plan_install(&manifest(&source), &settings),
            Err(Error::NothingToInstall(_))
        ));
    }

    #[test]
    fn test_no_base_content_plans_no_data_roots() {
        let source = format!("{MANIFEST}no_base_content: true\n").replace(
            "    description: First\n",
            "    description: First\n    no_base_content: true\n",
        );
        let settings = InstallSettings::new(Choice::Yes)
            .with_option("opt1", Choice::Setting("a".to_string()))
            .with_option("opt2", Choice::Yes);
        let plan = plan_install(&manifest(&source), &settings).unwrap();
        assert_eq!(
            paths(&plan),
            vec!["mods/test_mod/opt1/a", "mods/test_mod/opt2/data"]
        );
    }

    #[test]
    fn test_describe() {
        let settings = InstallSettings::new(Choice::Yes)
            .with_option("opt1", Choice::Setting("b".to_string()))
            .with_option("opt2", Choice::Skip);
        let lines = describe(&manifest(MANIFEST), &settings);
        assert_eq!(
            lines,
            vec![
                "\nTest Mod\nBase description".to_string(),
                "Including options:".to_string(),
                "* Option One\nFirst\t** Install setting: Setting B".to_string(),
            ]
        );
    }

    #[test]
    fn test_describe_everything_skipped() {
        let settings = InstallSettings::new(Choice::Yes)
            .with_option("opt1", Choice::Skip)
            .with_option("opt2", Choice::Skip);
        assert_eq!(describe(&manifest(MANIFEST), &settings).len(), 1);
    }
}

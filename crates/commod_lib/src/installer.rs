//! Installing one mod onto a probed game copy.
//!
//! [`Installer::install`] runs the whole pipeline:
//!
//! 1. Gate on game installment, patcher version and reinstall rules.
//! 2. Check prerequisites and incompatibilities against the installed record.
//! 3. Plan the copy roots from the install settings.
//! 4. Copy them into the game's `data` folder through the [`FileCopier`].
//! 5. Patch the executable (community patch / remaster) or apply the mod's
//!    engine parameters through the [`BinaryPatcher`].
//! 6. Merge the new entry into the installed record and persist it.
//!
//! There is no staging step: an interrupted copy leaves the game copy without
//! a record of the partial install. A failure to persist the record after a
//! successful copy is reported as a warning, not an error.

use crate::copier::{CopyProgress, CopySummary, FileCopier, FsFileCopier};
use crate::error::{Error, Result};
use crate::game_copy::GameCopy;
use crate::installed::{InstalledContent, InstalledRecord};
use crate::patcher::{BinaryPatcher, PatchFlavor, PatchRequest};
use crate::planner::{describe, plan_install, InstallPlan};
use crate::resolver::{assess_reinstall, check_requirements};
use crate::settings::InstallSettings;
use commod_manifest::{ModManifest, PatcherOptions, COMMUNITY_PATCH};
use std::sync::Arc;

/// Patcher version this engine reports to `patcher_version_requirement`.
pub const PATCHER_VERSION: &str = "2.1";

/// Resolution passed to the patcher when the caller doesn't set one.
pub const DEFAULT_MONITOR_RESOLUTION: (u32, u32) = (1920, 1080);

type ProgressCallback = Arc<dyn Fn(CopyProgress<'_>) + Send + Sync>;
type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Result of a completed install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub plan: InstallPlan,
    pub copied: CopySummary,
    /// Change descriptions reported by the patcher.
    pub patch_changes: Vec<String>,
    /// Human readable summary of what was installed.
    pub descriptions: Vec<String>,
    /// Problems that didn't stop the install, e.g. a record that couldn't be saved.
    pub warnings: Vec<String>,
}

/// Installs mods onto game copies.
///
/// Create one with [`new`](Self::new), optionally attach a patcher and
/// callbacks, then call [`install`](Self::install) per mod. Installs on the
/// same game copy must not run concurrently.
pub struct Installer {
    copier: Box<dyn FileCopier>,
    patcher: Option<Box<dyn BinaryPatcher>>,
    progress_callback: Option<ProgressCallback>,
    status_callback: Option<StatusCallback>,
    monitor_resolution: (u32, u32),
    patcher_version: String,
}

impl Default for Installer {
    fn default() -> Self {
        Self::new(Box::new(FsFileCopier))
    }
}

impl Installer {
    pub fn new(copier: Box<dyn FileCopier>) -> Self {
        Self {
            copier,
            patcher: None,
            progress_callback: None,
            status_callback: None,
            monitor_resolution: DEFAULT_MONITOR_RESOLUTION,
            patcher_version: PATCHER_VERSION.to_string(),
        }
    }

    pub fn with_patcher(mut self, patcher: Box<dyn BinaryPatcher>) -> Self {
        self.patcher = Some(patcher);
        self
    }

    /// Register a per-file copy progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(CopyProgress<'_>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Register a callback receiving status lines.
    pub fn with_status<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.status_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_monitor_resolution(mut self, resolution: (u32, u32)) -> Self {
        self.monitor_resolution = resolution;
        self
    }

    pub fn with_patcher_version(mut self, version: impl Into<String>) -> Self {
        self.patcher_version = version.into();
        self
    }

    fn status(&self, text: &str) {
        tracing::info!("{}", text);
        if let Some(callback) = &self.status_callback {
            callback(text);
        }
    }

    /// Refuses installs that can't succeed, before anything is touched.
    fn check_installable(
        &self,
        game: &GameCopy,
        manifest: &ModManifest,
        settings: &InstallSettings,
    ) -> Result<()> {
        if let Some(archive) = &manifest.archive {
            if !manifest.mod_root.is_dir() {
                return Err(Error::PackedMod {
                    name: manifest.name.clone(),
                    archive: archive.clone(),
                });
            }
        }

        if !manifest.compatible_with_installment(game.installment.as_str()) {
            return Err(Error::IncompatibleMod {
                name: manifest.name.clone(),
                reason: format!(
                    "mod is made for '{}', game copy is '{}'",
                    manifest.installment, game.installment
                ),
            });
        }

        if !manifest.compatible_with_patcher(&self.patcher_version) {
            return Err(Error::IncompatibleMod {
                name: manifest.name.clone(),
                reason: format!(
                    "mod needs patcher version {}, this is {}",
                    manifest.patcher_version_requirement, self.patcher_version
                ),
            });
        }

        if needs_exe_patch(manifest) && self.patcher.is_none() {
            return Err(Error::Patcher(format!(
                "'{}' patches the executable but no binary patcher is configured",
                manifest.name
            )));
        }

        let report = check_requirements(manifest, &game.installed);
        if !report.ok {
            return Err(Error::RequirementsNotMet {
                name: manifest.name.clone(),
                messages: report.messages,
            });
        }

        if let Some(reinstall) = assess_reinstall(manifest, &game.installed) {
            if !reinstall.can_reinstall {
                return Err(Error::ReinstallNotPossible {
                    name: manifest.name.clone(),
                    reason: reinstall.warning.unwrap_or_default(),
                });
            }
            if let Some(locked) = reinstall.locked_settings {
                if &locked != settings {
                    return Err(Error::InvalidInstallSettings {
                        content: manifest.name.clone(),
                        reason: "options are locked to the previous install".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn patch(&self, game: &GameCopy, manifest: &ModManifest) -> Result<(Vec<String>, Vec<String>)> {
        let mut warnings = Vec::new();
        let default_options = PatcherOptions::default();
        let options = manifest.patcher_options.as_ref().unwrap_or(&default_options);

        let Some(patcher) = &self.patcher else {
            if !options.is_empty() {
                warnings.push(format!(
                    "No binary patcher configured, engine parameters of '{}' were not applied",
                    manifest.name
                ));
            }
            return Ok((Vec::new(), warnings));
        };

        let changes = if needs_exe_patch(manifest) {
            let flavor = if manifest.is_community_remaster() {
                PatchFlavor::Remaster
            } else {
                PatchFlavor::Patch
            };
            self.status("Patching the game executable");
            patcher.patch_exe(&PatchRequest {
                target_exe: &game.exe_path,
                flavor,
                build: &manifest.build,
                monitor_resolution: self.monitor_resolution,
                options,
                under_windows: cfg!(windows),
            })?
        } else if !options.is_empty() {
            self.status("Applying engine parameters");
            patcher.apply_configurables(&game.root, options)?
        } else {
            Vec::new()
        };

        Ok((changes, warnings))
    }

    /// Installs `manifest` with `settings` onto `game`.
    ///
    /// On success `game.installed` holds the merged record, whether or not
    /// it could be saved.
    pub fn install(
        &self,
        game: &mut GameCopy,
        manifest: &ModManifest,
        settings: &InstallSettings,
    ) -> Result<InstallOutcome> {
        self.check_installable(game, manifest, settings)?;
        let plan = plan_install(manifest, settings)?;

        tracing::info!(
            "Installing '{}' {} onto {}",
            manifest.display_name,
            manifest.version,
            game.root
        );

        let progress: &dyn Fn(CopyProgress<'_>) = match &self.progress_callback {
            Some(callback) => callback.as_ref(),
            None => &ignore_progress,
        };
        let status = |text: &str| self.status(text);
        let copied = self.copier.copy_plan(&plan, &game.data_path, progress, &status)?;

        let (patch_changes, mut warnings) = self.patch(game, manifest)?;
        if needs_exe_patch(manifest) {
            game.patched = true;
        }

        let new_entries = record_entries(manifest, settings);
        let merged = game.installed.merge(&new_entries);
        if let Err(e) = game.store().persist(&merged) {
            tracing::warn!("Couldn't save installed content manifest: {}", e);
            warnings.push(format!("Couldn't save installed content manifest: {e}"));
        }
        game.installed = merged;

        Ok(InstallOutcome {
            descriptions: describe(manifest, settings),
            plan,
            copied,
            patch_changes,
            warnings,
        })
    }
}

fn ignore_progress(_: CopyProgress<'_>) {}

/// Whether installing this content patches the game executable.
fn needs_exe_patch(manifest: &ModManifest) -> bool {
    manifest.is_community_patch() || manifest.is_community_remaster()
}

/// Installed-record entries describing this install.
///
/// The remaster includes the community patch, so installing it records the
/// patch as well.
fn record_entries(manifest: &ModManifest, settings: &InstallSettings) -> InstalledRecord {
    let mut content = InstalledContent::new(settings.base.clone(), manifest.version.clone());
    content.build = Some(manifest.build.clone());
    content.language = manifest.language.clone();
    content.installment = Some(manifest.installment.clone());
    content.display_name = Some(manifest.display_name.clone());
    content.options = settings.options.clone();

    let mut record = InstalledRecord::new();
    if manifest.is_community_remaster() {
        let mut patch = InstalledContent::new(settings.base.clone(), manifest.version.clone());
        patch.build = content.build.clone();
        patch.language = content.language.clone();
        patch.installment = content.installment.clone();
        record.insert(COMMUNITY_PATCH, patch);
    }
    record.insert(manifest.name.clone(), content);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_copy::tests::{make_game_copy, CLEAN, COMPATCH_114};
    use crate::settings::{full_install_settings, Choice};
    use camino::{Utf8Path, Utf8PathBuf};
    use commod_manifest::{load_manifest_file, COMMUNITY_REMASTER};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPatcher {
        calls: Mutex<Vec<String>>,
    }

    impl BinaryPatcher for RecordingPatcher {
        fn patch_exe(&self, request: &PatchRequest<'_>) -> Result<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("exe:{}:{}", request.flavor, request.build));
            Ok(vec![format!("Patched {}", request.target_exe)])
        }

        fn apply_configurables(&self, _game_root: &Utf8Path, options: &PatcherOptions) -> Result<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("config:{:?}", options.skins_in_shop));
            Ok(vec!["Applied engine parameters".to_string()])
        }
    }

    struct Workspace {
        _dir: tempfile::TempDir,
        game_root: Utf8PathBuf,
        mods: Utf8PathBuf,
    }

    fn workspace(signature: &[u8]) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let game_root = root.join("game");
        std::fs::create_dir_all(&game_root).unwrap();
        make_game_copy(&game_root, signature);
        Workspace {
            _dir: dir,
            game_root,
            mods: root.join("mods"),
        }
    }

    fn write_mod(ws: &Workspace, name: &str, extra: &str) -> ModManifest {
        let root = ws.mods.join(name);
        std::fs::create_dir_all(root.join("data/models")).unwrap();
        std::fs::write(root.join("data/models").join(format!("{name}.mdl")), name).unwrap();
        std::fs::write(
            root.join("manifest.yaml"),
            format!(
                "name: {name}\ndisplay_name: Mod {name}\nversion: '1.14'\nbuild: abcdef0123\ndescription: d\nauthors: a\npatcher_version_requirement: '1.10'\n{extra}"
            ),
        )
        .unwrap();
        load_manifest_file(&root.join("manifest.yaml"), true).unwrap()
    }

    #[test]
    fn test_install_community_patch_then_mod() {
        let ws = workspace(CLEAN);
        let mut game = GameCopy::probe(&ws.game_root).unwrap();

        let compatch = write_mod(&ws, COMMUNITY_PATCH, "prerequisites: []\n");
        let patcher = Box::new(RecordingPatcher::default());
        let installer = Installer::default().with_patcher(patcher);

        let outcome = installer
            .install(&mut game, &compatch, &full_install_settings(&compatch))
            .unwrap();
        assert_eq!(outcome.copied.files, 1);
        assert_eq!(outcome.patch_changes.len(), 1);
        assert!(outcome.warnings.is_empty());
        assert!(game.patched);
        assert!(ws.game_root.join("data/models/community_patch.mdl").is_file());

        let stored = game.store().load().unwrap();
        let entry = stored.get(COMMUNITY_PATCH).unwrap();
        assert_eq!(entry.version, "1.14");
        assert_eq!(entry.build.as_deref(), Some("abcdef0"));

        let my_mod = write_mod(
            &ws,
            "my_mod",
            "prerequisites:\n  - name: community_patch\n    versions: ['1.14']\npatcher_options:\n  skins_in_shop: 16\n",
        );
        let outcome = installer
            .install(&mut game, &my_mod, &full_install_settings(&my_mod))
            .unwrap();
        assert_eq!(outcome.patch_changes, vec!["Applied engine parameters".to_string()]);
        assert!(game.is_modded());
        assert!(game.store().load().unwrap().contains("my_mod"));
    }

    #[test]
    fn test_requirements_block_install() {
        let ws = workspace(CLEAN);
        let mut game = GameCopy::probe(&ws.game_root).unwrap();
        let my_mod = write_mod(&ws, "my_mod", "prerequisites:\n  - name: community_patch\n");

        let result = Installer::default().install(&mut game, &my_mod, &full_install_settings(&my_mod));
        match result {
            Err(Error::RequirementsNotMet { messages, .. }) => {
                assert_eq!(
                    messages[0],
                    "Required mod not found: community_patch - for mod: Mod my_mod"
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!ws.game_root.join("data/models/my_mod.mdl").exists());
    }

    #[test]
    fn test_exe_patch_requires_patcher() {
        let ws = workspace(CLEAN);
        let mut game = GameCopy::probe(&ws.game_root).unwrap();
        let compatch = write_mod(&ws, COMMUNITY_PATCH, "prerequisites: []\n");
        assert!(matches!(
            Installer::default().install(&mut game, &compatch, &full_install_settings(&compatch)),
            Err(Error::Patcher(_))
        ));
    }

    #[test]
    fn test_remaster_records_patch_too() {
        let ws = workspace(CLEAN);
        let mut game = GameCopy::probe(&ws.game_root).unwrap();
        let remaster = write_mod(&ws, COMMUNITY_REMASTER, "prerequisites: []\n");

        let patcher = Box::new(RecordingPatcher::default());
        Installer::default()
            .with_patcher(patcher)
            .install(&mut game, &remaster, &full_install_settings(&remaster))
            .unwrap();

        assert!(game.installed.contains(COMMUNITY_PATCH));
        assert!(game.installed.contains(COMMUNITY_REMASTER));
    }

    #[test]
    fn test_persist_failure_is_a_warning() {
        let ws = workspace(COMPATCH_114);
        std::fs::write(
            ws.game_root.join("data/mod_manifest.yaml"),
            "community_patch:\n  base: yes\n  version: '1.14'\n",
        )
        .unwrap();
        let mut game = GameCopy::probe(&ws.game_root).unwrap();

        std::fs::remove_file(ws.game_root.join("data/mod_manifest.yaml")).unwrap();
        std::fs::create_dir_all(ws.game_root.join("data/mod_manifest.yaml/blocked")).unwrap();

        let my_mod = write_mod(&ws, "my_mod", "prerequisites:\n  - name: community_patch\n");
        let outcome = Installer::default()
            .install(&mut game, &my_mod, &full_install_settings(&my_mod))
            .unwrap();

        assert_eq!(outcome.warnings.len(), 1);
        assert!(game.installed.contains("my_mod"));
        assert!(ws.game_root.join("data/models/my_mod.mdl").is_file());
    }

    #[test]
    fn test_locked_reinstall_options() {
        let ws = workspace(COMPATCH_114);
        std::fs::write(
            ws.game_root.join("data/mod_manifest.yaml"),
            "community_patch:\n  base: yes\n  version: '1.14'\nmy_mod:\n  base: yes\n  version: '1.14'\n  extra: skip\n",
        )
        .unwrap();
        let mut game = GameCopy::probe(&ws.game_root).unwrap();

        std::fs::create_dir_all(ws.mods.join("my_mod/extra/data")).unwrap();
        let my_mod = write_mod(
            &ws,
            "my_mod",
            "prerequisites: []\noptional_content:\n  - name: extra\n    display_name: Extra\n    description: e\n",
        );

        let switched = InstallSettings::new(Choice::Yes).with_option("extra", Choice::Yes);
        assert!(matches!(
            Installer::default().install(&mut game, &my_mod, &switched),
            Err(Error::InvalidInstallSettings { .. })
        ));

        let same = InstallSettings::new(Choice::Yes).with_option("extra", Choice::Skip);
        assert!(Installer::default().install(&mut game, &my_mod, &same).is_ok());
    }
}

//! Probing a game directory into a [`GameCopy`].

use crate::error::{Error, Result};
use crate::installed::{InstalledManifestStore, InstalledRecord};
use camino::{Utf8Path, Utf8PathBuf};
use commod_game::{
    find_game_exe, is_exe_running, probe_exe_version, validate_game_dir, ExeVersion,
    GameInstallment,
};
use commod_manifest::ModManifest;
use std::collections::BTreeMap;

/// A game copy that passed every probe check.
#[derive(Debug, Clone)]
pub struct GameCopy {
    pub root: Utf8PathBuf,
    pub data_path: Utf8PathBuf,
    pub exe_path: Utf8PathBuf,
    pub exe_version: ExeVersion,
    pub installment: GameInstallment,
    /// Whether the executable carries the community patch or remaster.
    pub patched: bool,
    pub installed: InstalledRecord,
}

impl GameCopy {
    /// Inspects `root` and loads what is installed on it.
    ///
    /// The checks run in order and the first failing one is returned:
    /// directory layout, executable presence, executable lock (the game is
    /// running), executable support, then consistency between the executable
    /// and the installed-content record.
    pub fn probe(root: &Utf8Path) -> Result<Self> {
        validate_game_dir(root)?;

        let exe_path = find_game_exe(root)
            .ok_or_else(|| commod_game::Error::ExeNotFound(root.to_path_buf()))?;

        let Some(exe_version) = probe_exe_version(&exe_path)? else {
            if is_exe_running(&exe_path) {
                tracing::info!("Game is running from {}", exe_path);
            } else {
                tracing::warn!("{} is locked, but no game process runs from it", exe_path);
            }
            return Err(commod_game::Error::ExeIsRunning(exe_path).into());
        };

        if !exe_version.is_compatch_compatible() {
            return Err(commod_game::Error::ExeNotSupported(exe_version.to_string()).into());
        }

        let patched = exe_version.is_patched();
        let store = InstalledManifestStore::for_game(root);

        let installed = if store.exists() {
            if !patched {
                return Err(Error::HasManifestButUnpatched(store.path().to_path_buf()));
            }
            match store.load() {
                Ok(record) => record,
                Err(Error::InvalidExistingManifest { path, reason }) => {
                    return Err(Error::InvalidExistingManifest { path, reason })
                }
                Err(other) => {
                    return Err(Error::InvalidExistingManifest {
                        path: store.path().to_path_buf(),
                        reason: other.to_string(),
                    })
                }
            }
        } else if patched {
            return Err(Error::PatchedButDoesntHaveManifest(root.to_path_buf()));
        } else {
            InstalledRecord::new()
        };

        tracing::info!(
            "Probed game copy {}: '{}', {} installed content entries",
            root,
            exe_version,
            installed.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            data_path: root.join("data"),
            installment: exe_version.installment(),
            exe_path,
            exe_version,
            patched,
            installed,
        })
    }

    pub fn store(&self) -> InstalledManifestStore {
        InstalledManifestStore::for_game(&self.root)
    }

    /// Whether anything beyond the community patch or remaster is installed.
    pub fn is_modded(&self) -> bool {
        self.installed.is_modded()
    }

    /// Label for lists of game copies, e.g. `[ComRem 1.13] D:/Games/ExMachina`.
    pub fn display_name(&self) -> String {
        format!("[{}] {}", self.exe_version.short_label(), self.root)
    }

    pub fn installed_descriptions(&self, known: &[ModManifest]) -> BTreeMap<String, String> {
        self.installed.descriptions(known)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use commod_game::{REQUIRED_PATHS, VERSION_BYTES_102_NOCD, WINDOW_SIZE};
    use std::fs;

    /// Writes a minimal game copy whose executable carries `signature` in the
    /// main version window.
    pub(crate) fn make_game_copy(root: &Utf8Path, signature: &[u8]) {
        let mut exe = vec![0u8; VERSION_BYTES_102_NOCD as usize + WINDOW_SIZE];
        let start = VERSION_BYTES_102_NOCD as usize;
        exe[start..start + signature.len()].copy_from_slice(signature);
        fs::write(root.join("hta.exe"), exe).unwrap();

        for rel in REQUIRED_PATHS {
            let path = root.join(rel);
            if rel.contains('.') {
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, b"").unwrap();
            } else {
                fs::create_dir_all(path).unwrap();
            }
        }
    }

    pub(crate) const CLEAN: &[u8] = b"\0\0\0\0\0\0\0\x001.02";
    pub(crate) const COMPATCH_114: &[u8] = b"1.14";

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_probe_clean_copy() {
        let (_dir, root) = temp_root();
        make_game_copy(&root, CLEAN);

        let game = GameCopy::probe(&root).unwrap();
        assert_eq!(game.exe_version, ExeVersion::Clean102);
        assert_eq!(game.installment, GameInstallment::ExMachina);
        assert!(!game.patched);
        assert!(game.installed.is_empty());
        assert!(!game.is_modded());
    }

    #[test]
    fn test_probe_wrong_path() {
        let (_dir, root) = temp_root();
        assert!(matches!(
            GameCopy::probe(&root.join("missing")),
            Err(Error::Game(commod_game::Error::WrongGameDirectoryPath(_)))
        ));
    }

    #[test]
    fn test_probe_unsupported_exe() {
        let (_dir, root) = temp_root();
        make_game_copy(&root, b"");
        assert!(matches!(
            GameCopy::probe(&root),
            Err(Error::Game(commod_game::Error::ExeNotSupported(_)))
        ));
    }

    #[test]
    fn test_probe_patched_without_manifest() {
        let (_dir, root) = temp_root();
        make_game_copy(&root, COMPATCH_114);
        assert!(matches!(
            GameCopy::probe(&root),
            Err(Error::PatchedButDoesntHaveManifest(_))
        ));
    }

    #[test]
    fn test_probe_unpatched_with_manifest() {
        let (_dir, root) = temp_root();
        make_game_copy(&root, CLEAN);
        fs::write(
            root.join("data/mod_manifest.yaml"),
            "community_patch:\n  base: yes\n  version: '1.14'\n",
        )
        .unwrap();
        assert!(matches!(
            GameCopy::probe(&root),
            Err(Error::HasManifestButUnpatched(_))
        ));
    }

    #[test]
    fn test_probe_patched_with_invalid_manifest() {
        let (_dir, root) = temp_root();
        make_game_copy(&root, COMPATCH_114);
        fs::write(
            root.join("data/mod_manifest.yaml"),
            "community_patch:\n  base: yes\n",
        )
        .unwrap();
        assert!(matches!(
            GameCopy::probe(&root),
            Err(Error::InvalidExistingManifest { .. })
        ));
    }

    #[test]
    fn test_probe_patched_copy() {
        let (_dir, root) = temp_root();
        make_game_copy(&root, COMPATCH_114);
        fs::write(
            root.join("data/mod_manifest.yaml"),
            "community_patch:\n  base: yes\n  version: '1.14'\nmy_mod:\n  base: yes\n  version: '1.0'\n",
        )
        .unwrap();

        let game = GameCopy::probe(&root).unwrap();
        assert_eq!(game.exe_version, ExeVersion::ComPatch { minor: 14 });
        assert!(game.patched);
        assert!(game.is_modded());
        assert_eq!(game.display_name(), format!("[ComPatch 1.14] {root}"));
    }
}

//! Game directory structure checks and executable lookup.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::ffi::OsStr;
use sysinfo::System;

/// Executable names a game copy may use, in lookup order.
pub const KNOWN_EXE_NAMES: [&str; 4] = ["hta.exe", "game.exe", "start.exe", "ExMachina.exe"];

/// Paths (relative to the game root) every game copy must contain.
pub const REQUIRED_PATHS: [&str; 14] = [
    "dxrender9.dll",
    "data",
    "data/effects",
    "data/gamedata",
    "data/if",
    "data/maps",
    "data/models",
    "data/music",
    "data/scripts",
    "data/shaders",
    "data/sounds",
    "data/textures",
    "data/weather.xml",
    "data/config.cfg",
];

/// Relative path of the installed-content record inside a game copy.
pub const INSTALLED_MANIFEST_PATH: &str = "data/mod_manifest.yaml";

/// Returns the first known executable present in `game_root`.
pub fn find_game_exe(game_root: &Utf8Path) -> Option<Utf8PathBuf> {
    KNOWN_EXE_NAMES
        .iter()
        .map(|name| game_root.join(name))
        .find(|path| path.exists())
}

/// Checks that `game_root` has the basic layout of a game copy.
///
/// Fails with [`Error::InvalidGameDirectory`] naming the first missing path;
/// if no executable exists the missing path reported is `hta.exe`.
pub fn validate_game_dir(game_root: &Utf8Path) -> Result<()> {
    if !game_root.is_dir() {
        return Err(Error::WrongGameDirectoryPath(game_root.to_path_buf()));
    }

    if find_game_exe(game_root).is_none() {
        return Err(Error::InvalidGameDirectory {
            missing: game_root.join(KNOWN_EXE_NAMES[0]),
        });
    }

    if let Some(missing) = REQUIRED_PATHS
        .iter()
        .map(|rel| game_root.join(rel))
        .find(|path| !path.exists())
    {
        return Err(Error::InvalidGameDirectory { missing });
    }

    Ok(())
}

/// Whether `game_root` passes [`validate_game_dir`].
pub fn is_valid_game_dir(game_root: &Utf8Path) -> bool {
    validate_game_dir(game_root).is_ok()
}

/// Lists the executables of currently running game processes.
///
/// Used to explain a locked executable to the user; a process whose
/// executable path can't be read is skipped.
pub fn running_game_exes() -> Vec<Utf8PathBuf> {
    let system = System::new_all();

    KNOWN_EXE_NAMES
        .iter()
        .flat_map(|name| system.processes_by_exact_name(OsStr::new(name)))
        .filter_map(|process| {
            process
                .exe()
                .and_then(|p| Utf8PathBuf::from_path_buf(p.to_path_buf()).ok())
        })
        .collect()
}

/// Whether the executable at `exe_path` belongs to a running process.
pub fn is_exe_running(exe_path: &Utf8Path) -> bool {
    running_game_exes().iter().any(|p| p == exe_path)
}

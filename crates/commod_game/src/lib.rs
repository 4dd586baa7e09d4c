//! Game copy identification for ComMod.
//!
//! This crate answers two questions about a directory the user points at:
//! does it look like a copy of the game, and which build of the executable
//! does it carry. Both the `commod` CLI and the install engine in
//! `commod_lib` build on it.

pub mod error;
mod exe_signature;
mod game_dir;

pub use error::{Error, Result};
pub use exe_signature::{
    classify, probe_exe_version, ExeVersion, GameInstallment, SignatureWindows,
    SIGNATURE_OFFSETS, VERSION_BYTES_100_STAR, VERSION_BYTES_102_NOCD, VERSION_BYTES_102_STAR,
    VERSION_BYTES_103_NOCD, VERSION_BYTES_103_STAR, VERSION_BYTES_DEM_LNCH, WINDOW_SIZE,
};
pub use game_dir::{
    find_game_exe, is_exe_running, is_valid_game_dir, running_game_exes, validate_game_dir,
    INSTALLED_MANIFEST_PATH, KNOWN_EXE_NAMES, REQUIRED_PATHS,
};

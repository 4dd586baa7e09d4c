//! Error types for game copy identification.
//!
//! Every structural problem with a game directory is reported as its own
//! variant carrying the offending path, so callers can tell the user exactly
//! what to fix. An unrecognised executable is *not* an error: see
//! [`ExeVersion::Unknown`](crate::ExeVersion::Unknown).

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while inspecting a game copy.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed while reading the executable or directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The given path is not a directory at all.
    #[error("Not a game directory: {0}")]
    WrongGameDirectoryPath(Utf8PathBuf),

    /// The directory exists but is missing a file or folder every game copy has.
    #[error("Invalid game directory, missing: {missing}")]
    InvalidGameDirectory { missing: Utf8PathBuf },

    /// None of the known executable names exist in the game directory.
    #[error("Game executable not found in {0}")]
    ExeNotFound(Utf8PathBuf),

    /// The executable is exclusively locked, most likely because the game is running.
    #[error("Game executable is currently running: {0}")]
    ExeIsRunning(Utf8PathBuf),

    /// The executable was identified but cannot be patched or modded.
    #[error("Unsupported game executable version: {0}")]
    ExeNotSupported(String),
}

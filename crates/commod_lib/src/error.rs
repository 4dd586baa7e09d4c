//! Error types for the install engine.
//!
//! Compatibility verdicts are not errors: they are returned as
//! [`CompatibilityReport`](crate::CompatibilityReport) values. Everything here
//! is a fault the caller has to handle or show to the user.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing a game copy or installing content.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Structural problem with the game copy.
    #[error(transparent)]
    Game(#[from] commod_game::Error),

    /// A mod manifest couldn't be read or constructed.
    #[error(transparent)]
    Manifest(#[from] commod_manifest::ManifestError),

    /// The installed-content record is unreadable or has an entry without
    /// `base` or `version`. The whole record is rejected.
    #[error("Installed content manifest is invalid: {path}: {reason}")]
    InvalidExistingManifest { path: Utf8PathBuf, reason: String },

    /// The installed-content record exists but the executable isn't patched.
    #[error("Game copy has an installed content manifest but its executable isn't patched: {0}")]
    HasManifestButUnpatched(Utf8PathBuf),

    /// The executable is patched but nothing records what was installed.
    #[error("Game copy is patched but doesn't have an installed content manifest: {0}")]
    PatchedButDoesntHaveManifest(Utf8PathBuf),

    /// Install settings don't fit the manifest; a caller bug, not user input.
    #[error("Install settings for '{content}' are broken: {reason}")]
    InvalidInstallSettings { content: String, reason: String },

    /// A no-base-content mod was asked to install without any option.
    #[error("Nothing to install for '{0}': the mod has no base content and no option was chosen")]
    NothingToInstall(String),

    /// The requirement check failed, install was not attempted.
    #[error("Requirements not met for '{name}'")]
    RequirementsNotMet { name: String, messages: Vec<String> },

    /// The mod targets another game installment or a newer patcher.
    #[error("Mod '{name}' can't be installed on this game copy: {reason}")]
    IncompatibleMod { name: String, reason: String },

    /// The mod is installed in a version that can't be replaced in place.
    #[error("Mod '{name}' can't be reinstalled: {reason}")]
    ReinstallNotPossible { name: String, reason: String },

    /// The mod is still packed and must be extracted before installing.
    #[error("Mod '{name}' is still packed in {archive}")]
    PackedMod { name: String, archive: Utf8PathBuf },

    /// The distribution has no `mods` folder; an empty one was created.
    #[error("Mods folder is missing, created an empty one: {0}")]
    ModsDirMissing(Utf8PathBuf),

    /// The distribution holds no mod manifests at all.
    #[error("No mods found in {0}")]
    NoModsFound(Utf8PathBuf),

    /// The binary patcher collaborator failed.
    #[error("Patcher error: {0}")]
    Patcher(String),
}

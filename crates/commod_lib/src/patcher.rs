//! The binary patcher collaborator.
//!
//! Patching the executable and the game's configurable engine parameters is
//! done by an external component. The engine only decides when to call it and
//! with what; the patcher reports back human readable change descriptions.

use crate::error::Result;
use camino::Utf8Path;
use commod_manifest::PatcherOptions;
use std::fmt;

/// Which flavour of the community executable patch to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFlavor {
    Patch,
    Remaster,
}

impl PatchFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchFlavor::Patch => "patch",
            PatchFlavor::Remaster => "remaster",
        }
    }
}

impl fmt::Display for PatchFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the patcher needs to patch one executable.
#[derive(Debug, Clone)]
pub struct PatchRequest<'a> {
    pub target_exe: &'a Utf8Path,
    pub flavor: PatchFlavor,
    /// Build id of the patch or remaster being installed.
    pub build: &'a str,
    pub monitor_resolution: (u32, u32),
    pub options: &'a PatcherOptions,
    pub under_windows: bool,
}

/// Applies binary patches to a game copy.
///
/// Implementations must be [`Send`] and [`Sync`] so an installer can be moved
/// to a worker thread.
pub trait BinaryPatcher: Send + Sync {
    /// Patches the game executable, returning the changes made.
    fn patch_exe(&self, request: &PatchRequest<'_>) -> Result<Vec<String>>;

    /// Applies a mod's engine parameters to an already patched game copy.
    fn apply_configurables(&self, game_root: &Utf8Path, options: &PatcherOptions) -> Result<Vec<String>>;
}

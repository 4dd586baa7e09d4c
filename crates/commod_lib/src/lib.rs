//! The ComMod install engine.
//!
//! Given a probed [`GameCopy`] and a [`ModManifest`] from the
//! [`ModCatalog`], this crate decides whether the mod can go onto that copy
//! ([`check_requirements`], [`assess_reinstall`]), turns the user's
//! [`InstallSettings`] into an [`InstallPlan`], and runs the install through
//! the [`Installer`], which keeps the copy's installed-content record up to
//! date.
//!
//! Copying files and patching the executable sit behind the [`FileCopier`]
//! and [`BinaryPatcher`] traits.

pub mod catalog;
pub mod copier;
pub mod error;
pub mod game_copy;
pub mod installed;
pub mod installer;
pub mod patcher;
pub mod planner;
pub mod resolver;
pub mod settings;

pub use catalog::{CatalogEntry, Discovered, LoadingError, ModCatalog, RefreshSummary};
pub use copier::{CopyProgress, CopySummary, FileCopier, FsFileCopier};
pub use error::{Error, Result};
pub use game_copy::GameCopy;
pub use installed::{InstalledContent, InstalledManifestStore, InstalledRecord};
pub use installer::{InstallOutcome, Installer, PATCHER_VERSION};
pub use patcher::{BinaryPatcher, PatchFlavor, PatchRequest};
pub use planner::{describe, plan_install, validate_settings, CopyRoot, InstallPlan, PlanSource};
pub use resolver::{
    assess_reinstall, check_requirements, CompatibilityReport, ReinstallAssessment,
    RequirementStatus,
};
pub use settings::{Choice, InstallSettings};

pub use commod_game::{ExeVersion, GameInstallment};
pub use commod_manifest::ModManifest;

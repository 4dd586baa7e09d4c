//! Requirement and incompatibility checks of a candidate mod against what is
//! already installed on a game copy.
//!
//! The verdict is a value, never an error. Every prerequisite and every
//! incompatibility is evaluated even after a failure so the user sees all
//! problems at once.

use crate::installed::{InstalledContent, InstalledRecord};
use crate::settings::{forced_reinstall_settings, InstallSettings};
use commod_manifest::{ContentRequirement, ModManifest, COMMUNITY_PATCH};

/// Hint appended to the messages of any failed check.
pub const NEW_VERSION_HINT: &str = "Check for a new version of the mod";

/// How a list of accepted versions is phrased to the user.
///
/// Purely presentational: matching is always set membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStyle {
    /// Every version is pinned with `=`.
    Strict,
    /// Some version carries a `>` or `<` bound.
    Range,
    Loose,
}

impl VersionStyle {
    pub fn of(versions: &[String]) -> Self {
        if !versions.is_empty() && versions.iter().all(|v| v.starts_with('=')) {
            VersionStyle::Strict
        } else if versions.iter().any(|v| v.starts_with(['>', '<'])) {
            VersionStyle::Range
        } else {
            VersionStyle::Loose
        }
    }

    pub fn render(self, versions: &[String]) -> String {
        match self {
            VersionStyle::Strict => {
                let stripped: Vec<&str> = versions
                    .iter()
                    .map(|v| v.trim_start_matches('='))
                    .collect();
                match stripped.split_last() {
                    Some((last, rest)) if rest.len() > 1 => {
                        format!("{} or {}", rest.join(", "), last)
                    }
                    _ => stripped.join(" or "),
                }
            }
            VersionStyle::Range => versions.join(", but "),
            VersionStyle::Loose => versions.join(" and "),
        }
    }
}

/// Renders `versions` in the style they were declared in.
pub fn render_versions(versions: &[String]) -> String {
    VersionStyle::of(versions).render(versions)
}

fn normalize_version(version: &str) -> &str {
    version.trim().trim_start_matches('=').trim()
}

/// Whether `installed` is one of `versions`; a leading `=` is ignored.
pub fn version_matches(versions: &[String], installed: &str) -> bool {
    let installed = normalize_version(installed);
    versions.iter().any(|v| normalize_version(v) == installed)
}

/// Outcome for one declared requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementStatus {
    pub requirement: ContentRequirement,
    pub ok: bool,
    pub messages: Vec<String>,
}

/// Full verdict of [`check_requirements`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityReport {
    pub ok: bool,
    /// Every failure message in evaluation order, plus [`NEW_VERSION_HINT`]
    /// when anything failed.
    pub messages: Vec<String>,
    pub requirements: Vec<RequirementStatus>,
    pub incompatibilities: Vec<RequirementStatus>,
}

fn check_prerequisite(
    candidate: &ModManifest,
    requirement: &ContentRequirement,
    installed: &InstalledRecord,
) -> RequirementStatus {
    let mut messages = Vec::new();

    if requirement.name == COMMUNITY_PATCH
        && installed.has_community_remaster()
        && !candidate.is_community_remaster()
    {
        messages.push(format!(
            "ComPatch mod incompatible with ComRemaster: {}",
            candidate.display_name
        ));
    }

    let Some(entry) = installed.get(&requirement.name) else {
        messages.push(format!(
            "Required mod not found: {} - for mod: {}",
            requirement.name, candidate.display_name
        ));
        return RequirementStatus {
            requirement: requirement.clone(),
            ok: false,
            messages,
        };
    };

    if let Some(versions) = &requirement.versions {
        tracing::debug!(
            "Version needed: {} - version available: {}",
            render_versions(versions),
            entry.version
        );
        if !version_matches(versions, &entry.version) {
            messages.push(format!("Version requirement not met: {}", requirement.name));
            messages.push(format!(
                "Version needed: {} - version available: {}",
                render_versions(versions),
                entry.version
            ));
        }
    }

    if let Some(options) = &requirement.optional_content {
        for option in options {
            if entry.has_option(option) {
                tracing::debug!("Content validated: {} - for mod: {}", option, requirement.name);
            } else {
                messages.push(format!(
                    "Content requirement not met: '{}' for mod: '{}'",
                    option, requirement.name
                ));
            }
        }
    }

    RequirementStatus {
        requirement: requirement.clone(),
        ok: messages.is_empty(),
        messages,
    }
}

fn check_incompatibility(
    candidate: &ModManifest,
    requirement: &ContentRequirement,
    installed: &InstalledRecord,
) -> RequirementStatus {
    let conflicting = installed.get(&requirement.name).filter(|entry| {
        let version_hit = requirement
            .versions
            .as_ref()
            .map_or(true, |versions| version_matches(versions, &entry.version));
        let options_hit = requirement
            .optional_content
            .as_ref()
            .map_or(true, |options| options.iter().all(|o| entry.has_option(o)));
        version_hit && options_hit
    });

    let messages = match conflicting {
        Some(entry) => vec![format!(
            "Incompatible content installed: {} (version {}) - for mod: {}",
            requirement.name, entry.version, candidate.display_name
        )],
        None => Vec::new(),
    };

    RequirementStatus {
        requirement: requirement.clone(),
        ok: messages.is_empty(),
        messages,
    }
}

/// Checks `candidate` against the content installed on a game copy.
///
/// The boolean verdict doesn't depend on the order requirements are
/// declared in; only the message order does.
pub fn check_requirements(candidate: &ModManifest, installed: &InstalledRecord) -> CompatibilityReport {
    let requirements: Vec<RequirementStatus> = candidate
        .prerequisites
        .iter()
        .map(|requirement| check_prerequisite(candidate, requirement, installed))
        .collect();
    let incompatibilities: Vec<RequirementStatus> = candidate
        .incompatible
        .iter()
        .map(|requirement| check_incompatibility(candidate, requirement, installed))
        .collect();

    let mut messages: Vec<String> = requirements
        .iter()
        .chain(&incompatibilities)
        .flat_map(|status| status.messages.iter().cloned())
        .collect();
    let ok = requirements.iter().chain(&incompatibilities).all(|s| s.ok);
    if !ok {
        messages.push(NEW_VERSION_HINT.to_string());
    }

    tracing::debug!(
        "Requirements for '{}': {}",
        candidate.name,
        if ok { "met" } else { "not met" }
    );

    CompatibilityReport {
        ok,
        messages,
        requirements,
        incompatibilities,
    }
}

/// What reinstalling an already installed mod would mean.
#[derive(Debug, Clone, PartialEq)]
pub struct ReinstallAssessment {
    pub previous: InstalledContent,
    pub can_reinstall: bool,
    /// Settings the reinstall is locked to, when options can't change.
    pub locked_settings: Option<InstallSettings>,
    pub warning: Option<String>,
}

/// Assesses a reinstall of `candidate`; `None` if it isn't installed yet.
///
/// Reinstalling the same version is always possible. Moving to another
/// version in place is only possible for mods declaring
/// `safe_reinstall_options`; the others need a clean game copy.
pub fn assess_reinstall(candidate: &ModManifest, installed: &InstalledRecord) -> Option<ReinstallAssessment> {
    let previous = installed.get(&candidate.name)?.clone();

    let same_version = normalize_version(&previous.version) == normalize_version(&candidate.version);
    let can_reinstall = same_version || candidate.safe_reinstall_options;
    let locked_settings = forced_reinstall_settings(candidate, &previous);

    let warning = if !can_reinstall {
        Some(format!(
            "Version {} of '{}' is installed, version {} can only be installed on a clean game copy",
            previous.version, candidate.display_name, candidate.version
        ))
    } else if locked_settings.is_some() && !candidate.optional_content.is_empty() {
        Some(format!(
            "Options of '{}' can't be changed on reinstall",
            candidate.display_name
        ))
    } else {
        None
    };

    Some(ReinstallAssessment {
        previous,
        can_reinstall,
        locked_settings,
        warning,
    })
}

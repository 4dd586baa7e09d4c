//! Copying planned folders into a game copy.

use crate::error::Result;
use crate::planner::{InstallPlan, PlanSource};
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

/// Progress of a running copy, reported once per file.
#[derive(Debug, Clone, Copy)]
pub struct CopyProgress<'a> {
    /// 1-based index of the file being copied.
    pub current: usize,
    pub total: usize,
    /// Path of the file relative to its copy root.
    pub name: &'a str,
    pub size: u64,
}

/// Totals of a finished copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub files: usize,
    pub bytes: u64,
}

/// Copies the folders of an [`InstallPlan`] into a target directory.
///
/// Roots are copied in plan order; a later root overwrites files of an
/// earlier one. Reporting frequency is up to the caller's callbacks.
pub trait FileCopier: Send + Sync {
    fn copy_plan(
        &self,
        plan: &InstallPlan,
        target: &Utf8Path,
        progress: &dyn Fn(CopyProgress<'_>),
        status: &dyn Fn(&str),
    ) -> Result<CopySummary>;
}

/// [`FileCopier`] working on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileCopier;

struct PendingFile {
    source: Utf8PathBuf,
    relative: Utf8PathBuf,
    size: u64,
}

fn collect_files(root: &Utf8Path) -> Result<Vec<PendingFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root.as_std_path()).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(source) = Utf8PathBuf::from_path_buf(entry.path().to_path_buf()) else {
            tracing::warn!("Skipping non UTF-8 path: {}", entry.path().display());
            continue;
        };
        let Ok(relative) = source.strip_prefix(root).map(Utf8Path::to_path_buf) else {
            continue;
        };
        let size = entry.metadata().map_err(std::io::Error::from)?.len();
        files.push(PendingFile {
            source,
            relative,
            size,
        });
    }
    Ok(files)
}

impl FileCopier for FsFileCopier {
    fn copy_plan(
        &self,
        plan: &InstallPlan,
        target: &Utf8Path,
        progress: &dyn Fn(CopyProgress<'_>),
        status: &dyn Fn(&str),
    ) -> Result<CopySummary> {
        let mut batches = Vec::with_capacity(plan.len());
        for root in &plan.roots {
            if !root.path.is_dir() {
                tracing::debug!("Copy root {} doesn't exist, nothing to copy", root.path);
                continue;
            }
            batches.push((root, collect_files(&root.path)?));
        }

        let total: usize = batches.iter().map(|(_, files)| files.len()).sum();
        let mut summary = CopySummary::default();

        for (root, files) in batches {
            match root.source {
                PlanSource::Base => status("Copying base files, please wait"),
                _ => status("Copying options, please wait"),
            }

            for file in files {
                let destination = target.join(&file.relative);
                if let Some(parent) = destination.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&file.source, &destination)?;

                summary.files += 1;
                summary.bytes += file.size;
                progress(CopyProgress {
                    current: summary.files,
                    total,
                    name: file.relative.as_str(),
                    size: file.size,
                });
            }
        }

        tracing::info!(
            "Copied {} files ({} bytes) for '{}' into {}",
            summary.files,
            summary.bytes,
            plan.content,
            target
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CopyRoot;
    use std::sync::Mutex;

    fn write(path: &Utf8Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_later_roots_overwrite_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mod_root = root.join("mod");
        let target = root.join("game/data");

        write(&mod_root.join("data/models/car.mdl"), "base");
        write(&mod_root.join("data/readme.txt"), "base readme");
        write(&mod_root.join("opt/data/models/car.mdl"), "option");

        let plan = InstallPlan {
            content: "mod".to_string(),
            roots: vec![
                CopyRoot {
                    path: mod_root.join("data"),
                    source: PlanSource::Base,
                },
                CopyRoot {
                    path: mod_root.join("opt/data"),
                    source: PlanSource::Option("opt".to_string()),
                },
                CopyRoot {
                    path: mod_root.join("opt/missing"),
                    source: PlanSource::Option("missing".to_string()),
                },
            ],
        };

        let seen = Mutex::new(Vec::new());
        let statuses = Mutex::new(Vec::new());
        let summary = FsFileCopier
            .copy_plan(
                &plan,
                &target,
                &|p| seen.lock().unwrap().push((p.current, p.total, p.name.to_string())),
                &|s| statuses.lock().unwrap().push(s.to_string()),
            )
            .unwrap();

        assert_eq!(summary.files, 3);
        assert_eq!(
            std::fs::read_to_string(target.join("models/car.mdl")).unwrap(),
            "option"
        );
        assert_eq!(
            std::fs::read_to_string(target.join("readme.txt")).unwrap(),
            "base readme"
        );

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].0, 3);
        assert!(seen.iter().all(|(_, total, _)| *total == 3));
        assert_eq!(statuses.into_inner().unwrap().len(), 2);
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::backup::{move_tree, snapshot, BackupLock};
use super::rewrite::{rewrite_file, RewriteOutcome};
use crate::analysis::compute_valid_intervals;
use crate::config::PruneConfig;
use crate::error::Error;
use crate::scanner::walk::{is_hidden, is_safe_experiment_name, sorted_subdirs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Not in the data root any more.
    Missing,
    Moved,
    /// A backup of the same name already exists; nothing was moved.
    BackupConflict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneDetails {
    pub segments: usize,
    pub backup_created: bool,
    pub files_rewritten: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneOutcome {
    Missing,
    /// No valid interval left at execution time, so the experiment was removed instead.
    Degraded(RemoveOutcome),
    Pruned(PruneDetails),
}

/// Applies Remove and Prune actions to one dataset, backing up into `backup_root`.
pub struct Pruner<'a> {
    data_root: &'a Path,
    backup_root: &'a Path,
    config: &'a PruneConfig,
}

impl<'a> Pruner<'a> {
    pub fn new(data_root: &'a Path, backup_root: &'a Path, config: &'a PruneConfig) -> Self {
        Self {
            data_root,
            backup_root,
            config,
        }
    }

    fn experiment_path(&self, name: &str) -> Result<PathBuf, Error> {
        if !is_safe_experiment_name(name) {
            return Err(Error::InvalidExperimentName(name.to_string()));
        }
        Ok(self.data_root.join(name))
    }

    /// Move the experiment into the backup root.
    pub fn remove(&self, name: &str) -> Result<RemoveOutcome, Error> {
        let src = self.experiment_path(name)?;
        if !src.exists() {
            return Ok(RemoveOutcome::Missing);
        }
        let _lock = BackupLock::acquire(self.backup_root, name)?;
        self.remove_locked(name, &src)
    }

    fn remove_locked(&self, name: &str, src: &Path) -> Result<RemoveOutcome, Error> {
        info!("[MOVE] {} -> backup", name);
        if self.backup_root.join(name).exists() {
            warn!("{} already exists in backup, skipping move", name);
            return Ok(RemoveOutcome::BackupConflict);
        }
        move_tree(src, self.backup_root, name)?;
        Ok(RemoveOutcome::Moved)
    }

    /// Trim every delimited file of the experiment to its currently valid
    /// intervals, after making sure an untouched copy sits in the backup root.
    pub fn prune(&self, name: &str) -> Result<PruneOutcome, Error> {
        let src = self.experiment_path(name)?;
        if !src.exists() {
            return Ok(PruneOutcome::Missing);
        }
        let _lock = BackupLock::acquire(self.backup_root, name)?;
        info!("[PRUNE] {}", name);

        // An existing backup is the untouched original; intervals come from it.
        let backup = self.backup_root.join(name);
        let intervals = if backup.is_dir() {
            debug!("{}: recomputing intervals from backup", name);
            compute_valid_intervals(&backup, self.config)
        } else {
            compute_valid_intervals(&src, self.config)
        };
        if intervals.is_empty() {
            warn!(
                "{}: no valid segments left, moving to backup instead of pruning",
                name
            );
            return Ok(PruneOutcome::Degraded(self.remove_locked(name, &src)?));
        }

        let mut details = PruneDetails {
            segments: intervals.len(),
            ..PruneDetails::default()
        };

        details.backup_created = snapshot(&src, self.backup_root, name)?;
        if details.backup_created {
            debug!("{}: original backed up", name);
        } else {
            debug!("{}: backup already exists, pruning main copy", name);
        }

        info!("{}: applying prune ({} segments)", name, intervals.len());
        for file in data_files(&src)? {
            match rewrite_file(&file, &intervals) {
                Ok(RewriteOutcome::Rewritten { kept, dropped }) => {
                    details.files_rewritten += 1;
                    details.rows_kept += kept;
                    details.rows_dropped += dropped;
                }
                Ok(skipped) => {
                    debug!("{} left untouched: {:?}", file.display(), skipped);
                    details.files_skipped += 1;
                }
                Err(e) => {
                    warn!("Error pruning {}: {}", file.display(), e);
                    details.files_failed += 1;
                }
            }
        }

        Ok(PruneOutcome::Pruned(details))
    }
}

/// `.csv` files directly inside each visible subdirectory of an experiment.
fn data_files(experiment: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for (_, node) in sorted_subdirs(experiment)? {
        let mut node_files: Vec<PathBuf> = fs::read_dir(&node)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                !is_hidden(&name) && name.ends_with(".csv")
            })
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        node_files.sort();
        files.extend(node_files);
    }
    Ok(files)
}

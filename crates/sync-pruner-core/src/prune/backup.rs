use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Error;

/// Exclusive claim on one experiment name inside the backup root.
///
/// Taken by creating `.<name>.lock`; `create_dir` is atomic, so two runs
/// can never both hold it. Released on drop.
#[derive(Debug)]
pub struct BackupLock {
    path: PathBuf,
}

impl BackupLock {
    pub fn acquire(backup_root: &Path, name: &str) -> Result<Self, Error> {
        let path = backup_root.join(format!(".{}.lock", name));
        match fs::create_dir(&path) {
            Ok(()) => Ok(Self { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(Error::BackupLocked(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir(&self.path) {
            warn!("Could not release lock {}: {}", self.path.display(), e);
        }
    }
}

/// A half-built backup. Removed on drop unless committed, so an interrupted
/// copy never shows up as an authoritative snapshot.
struct Staging {
    path: PathBuf,
    committed: bool,
}

impl Staging {
    fn new(backup_root: &Path, name: &str) -> io::Result<Self> {
        let path = backup_root.join(format!(".{}.staging", name));
        if path.exists() {
            debug!("Discarding stale staging dir {}", path.display());
            fs::remove_dir_all(&path)?;
        }
        Ok(Self {
            path,
            committed: false,
        })
    }

    fn commit(mut self, dst: &Path) -> io::Result<()> {
        fs::rename(&self.path, dst)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if !self.committed && self.path.exists() {
            if let Err(e) = fs::remove_dir_all(&self.path) {
                warn!("Could not clean staging dir {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Recursively copy `src` to `dst`, which must not exist yet. Returns the
/// number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut files = 0u64;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}

/// Copy `src` to `<backup_root>/<name>` unless a backup already exists.
/// Returns whether a new backup was written.
pub fn snapshot(src: &Path, backup_root: &Path, name: &str) -> Result<bool, Error> {
    let dst = backup_root.join(name);
    if dst.exists() {
        return Ok(false);
    }

    let staging = Staging::new(backup_root, name)?;
    let files = copy_tree(src, &staging.path)?;
    staging.commit(&dst)?;
    debug!("Backed up {} files of {} to {}", files, name, dst.display());
    Ok(true)
}

/// Move `src` to `<backup_root>/<name>`. Falls back to copy-then-delete when a
/// plain rename is impossible, e.g. across filesystems. The caller checks that
/// the destination is free.
pub fn move_tree(src: &Path, backup_root: &Path, name: &str) -> Result<(), Error> {
    let dst = backup_root.join(name);
    match fs::rename(src, &dst) {
        Ok(()) => return Ok(()),
        Err(e) => debug!("rename {} failed ({}), copying instead", src.display(), e),
    }

    let staging = Staging::new(backup_root, name)?;
    copy_tree(src, &staging.path)?;
    staging.commit(&dst)?;
    fs::remove_dir_all(src)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_tree(root: &Path) {
        fs::create_dir_all(root.join("node-data")).unwrap();
        fs::write(root.join("node-data/cpu-load.csv"), "timestamp\n1\n").unwrap();
        fs::write(root.join("notes.txt"), "hello").unwrap();
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let first = BackupLock::acquire(dir.path(), "exp").unwrap();
        assert!(matches!(
            BackupLock::acquire(dir.path(), "exp"),
            Err(Error::BackupLocked(_))
        ));
        drop(first);
        assert!(BackupLock::acquire(dir.path(), "exp").is_ok());
        assert!(!dir.path().join(".exp.lock").exists());
    }

    #[test]
    fn test_copy_tree() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        make_tree(src.path());

        let target = dst.path().join("copy");
        let files = copy_tree(src.path(), &target).unwrap();
        assert_eq!(files, 2);
        assert_eq!(
            fs::read_to_string(target.join("node-data/cpu-load.csv")).unwrap(),
            "timestamp\n1\n"
        );
    }

    #[test]
    fn test_snapshot_only_once() {
        let data = tempdir().unwrap();
        let backup = tempdir().unwrap();
        let src = data.path().join("exp");
        make_tree(&src);

        assert!(snapshot(&src, backup.path(), "exp").unwrap());
        fs::write(src.join("notes.txt"), "changed").unwrap();
        assert!(!snapshot(&src, backup.path(), "exp").unwrap());

        assert_eq!(
            fs::read_to_string(backup.path().join("exp/notes.txt")).unwrap(),
            "hello"
        );
        assert!(!backup.path().join(".exp.staging").exists());
    }

    #[test]
    fn test_snapshot_discards_stale_staging() {
        let data = tempdir().unwrap();
        let backup = tempdir().unwrap();
        let src = data.path().join("exp");
        make_tree(&src);
        fs::create_dir_all(backup.path().join(".exp.staging/leftover")).unwrap();

        assert!(snapshot(&src, backup.path(), "exp").unwrap());
        assert!(!backup.path().join("exp/leftover").exists());
        assert!(backup.path().join("exp/notes.txt").exists());
    }

    #[test]
    fn test_move_tree() {
        let data = tempdir().unwrap();
        let backup = tempdir().unwrap();
        let src = data.path().join("exp");
        make_tree(&src);

        move_tree(&src, backup.path(), "exp").unwrap();
        assert!(!src.exists());
        assert!(backup.path().join("exp/node-data/cpu-load.csv").exists());
    }
}

use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const NODE_DIR_SUFFIX: &str = "-data";
pub const EMPTY_SIGNATURE: &str = "<Empty>";

/// A top-level experiment folder under the dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDir {
    pub name: String,
    pub path: PathBuf,
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// `router-data` -> `router`; anything else is returned unchanged.
pub fn normalize_node_name(dir_name: &str) -> &str {
    dir_name.strip_suffix(NODE_DIR_SUFFIX).unwrap_or(dir_name)
}

/// Non-hidden subdirectories of `dir`, sorted by name so processing order
/// never depends on the filesystem.
pub fn sorted_subdirs(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            subdirs.push((name, path));
        }
    }
    subdirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(subdirs)
}

/// Experiment folders under `root`, skipping hidden and ignored names.
pub fn list_experiments(root: &Path, ignore: &[Pattern]) -> io::Result<Vec<ExperimentDir>> {
    let experiments = sorted_subdirs(root)?
        .into_iter()
        .filter(|(name, _)| !ignore.iter().any(|p| p.matches(name)))
        .map(|(name, path)| ExperimentDir { name, path })
        .collect();
    Ok(experiments)
}

/// Sorted, deduplicated node names of an experiment. Unreadable or empty
/// experiments get the `<Empty>` sentinel.
pub fn topology_signature(experiment: &Path) -> Vec<String> {
    let mut nodes: Vec<String> = match sorted_subdirs(experiment) {
        Ok(subdirs) => subdirs
            .iter()
            .map(|(name, _)| normalize_node_name(name).to_string())
            .collect(),
        Err(e) => {
            warn!("Could not list {}: {}", experiment.display(), e);
            Vec::new()
        }
    };
    nodes.sort();
    nodes.dedup();

    if nodes.is_empty() {
        vec![EMPTY_SIGNATURE.to_string()]
    } else {
        nodes
    }
}

/// Experiment names end up joined onto the data and backup roots, so they
/// must be a single plain path component.
pub fn is_safe_experiment_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_node_name() {
        assert_eq!(normalize_node_name("router-data"), "router");
        assert_eq!(normalize_node_name("client"), "client");
        assert_eq!(normalize_node_name("-data"), "");
    }

    #[test]
    fn test_sorted_subdirs_skips_hidden_and_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join("file.txt"), "x").unwrap();

        let names: Vec<String> = sorted_subdirs(dir.path())
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_list_experiments_honours_ignore() {
        let dir = tempdir().unwrap();
        for name in ["exp_1", "tools", "backup", "tmp_x", "exp_2"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let ignore = vec![
            Pattern::new("tools").unwrap(),
            Pattern::new("backup").unwrap(),
            Pattern::new("tmp_*").unwrap(),
        ];
        let names: Vec<String> = list_experiments(dir.path(), &ignore)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["exp_1", "exp_2"]);
    }

    #[test]
    fn test_topology_signature() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("router-data")).unwrap();
        fs::create_dir(dir.path().join("client-data")).unwrap();
        fs::create_dir(dir.path().join("client")).unwrap();
        assert_eq!(topology_signature(dir.path()), vec!["client", "router"]);
    }

    #[test]
    fn test_topology_signature_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(topology_signature(dir.path()), vec![EMPTY_SIGNATURE]);
    }

    #[test]
    fn test_safe_experiment_name() {
        assert!(is_safe_experiment_name("abc_def"));
        assert!(is_safe_experiment_name("abc-def"));
        assert!(!is_safe_experiment_name(".."));
        assert!(!is_safe_experiment_name("a/b"));
        assert!(!is_safe_experiment_name(""));
    }
}

use glob::Pattern;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

use super::experiment::Status;
use crate::config::PruneConfig;
use crate::scanner::list_experiments;
use crate::scanner::walk::{normalize_node_name, sorted_subdirs};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub clean: usize,
    pub pruned: usize,
    pub removed: usize,
}

impl StatusCounts {
    pub(crate) fn add(&mut self, status: Status) {
        match status {
            Status::Clean => self.clean += 1,
            Status::Pruned => self.pruned += 1,
            Status::Removed => self.removed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.clean + self.pruned + self.removed
    }

    pub fn surviving(&self) -> usize {
        self.clean + self.pruned
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeforeAfter {
    pub before: usize,
    pub after: usize,
}

/// Before/after picture of a pruning run, rebuilt from the data and backup
/// roots: data only means Clean, both means Pruned, backup only means Removed.
#[derive(Debug, Clone, Default)]
pub struct ImpactReport {
    pub counts: StatusCounts,
    pub nodes_before: BTreeSet<String>,
    pub nodes_after: BTreeSet<String>,
    pub projects: BTreeMap<String, StatusCounts>,
    pub families: BTreeMap<String, StatusCounts>,
    pub topologies: BTreeMap<Vec<String>, BeforeAfter>,
}

impl ImpactReport {
    pub fn projects_after(&self) -> usize {
        self.projects.values().filter(|c| c.surviving() > 0).count()
    }

    pub fn families_after(&self) -> usize {
        self.families.values().filter(|c| c.surviving() > 0).count()
    }

    pub fn topologies_after(&self) -> usize {
        self.topologies.values().filter(|t| t.after > 0).count()
    }

    /// Breakdown rows sorted by total, largest first.
    pub fn ranked(map: &BTreeMap<String, StatusCounts>) -> Vec<(&String, &StatusCounts)> {
        let mut rows: Vec<_> = map.iter().collect();
        rows.sort_by(|a, b| b.1.total().cmp(&a.1.total()));
        rows
    }

    pub fn ranked_topologies(&self) -> Vec<(&Vec<String>, &BeforeAfter)> {
        let mut rows: Vec<_> = self.topologies.iter().collect();
        rows.sort_by(|a, b| b.1.before.cmp(&a.1.before));
        rows
    }
}

/// Project = last `_`-separated part of an experiment folder name.
pub fn project_name(experiment: &str) -> &str {
    match experiment.rsplit_once('_') {
        Some((_, project)) => project,
        None => "unknown",
    }
}

/// Family = last two `_`-separated parts.
pub fn family_name(experiment: &str) -> String {
    let parts: Vec<&str> = experiment.split('_').collect();
    if parts.len() >= 2 {
        format!("{}_{}", parts[parts.len() - 2], parts[parts.len() - 1])
    } else {
        experiment.to_string()
    }
}

fn node_names(experiment: &Path, ignore: &[Pattern]) -> BTreeSet<String> {
    match sorted_subdirs(experiment) {
        Ok(subdirs) => subdirs
            .iter()
            .filter(|(name, _)| !ignore.iter().any(|p| p.matches(name)))
            .map(|(name, _)| normalize_node_name(name).to_string())
            .collect(),
        Err(e) => {
            warn!("Could not list {}: {}", experiment.display(), e);
            BTreeSet::new()
        }
    }
}

fn scan_root(root: &Path, ignore: &[Pattern]) -> BTreeMap<String, BTreeSet<String>> {
    if !root.is_dir() {
        return BTreeMap::new();
    }
    match list_experiments(root, ignore) {
        Ok(experiments) => experiments
            .into_iter()
            .map(|e| {
                let nodes = node_names(&e.path, ignore);
                (e.name, nodes)
            })
            .collect(),
        Err(e) => {
            warn!("Error accessing {}: {}", root.display(), e);
            BTreeMap::new()
        }
    }
}

pub fn compare(data_root: &Path, backup_root: &Path, config: &PruneConfig) -> ImpactReport {
    let ignore = config.ignore_patterns();
    let data = scan_root(data_root, &ignore);
    let backup = scan_root(backup_root, &ignore);

    let names: BTreeSet<&String> = data.keys().chain(backup.keys()).collect();
    info!("Analyzing {} total unique experiments", names.len());

    let mut report = ImpactReport::default();
    for name in names {
        let (status, nodes) = match (data.get(name), backup.get(name)) {
            (Some(nodes), None) => (Status::Clean, nodes),
            (Some(nodes), Some(_)) => (Status::Pruned, nodes),
            (None, Some(nodes)) => (Status::Removed, nodes),
            (None, None) => continue,
        };

        report.counts.add(status);
        report
            .projects
            .entry(project_name(name).to_string())
            .or_default()
            .add(status);
        report
            .families
            .entry(family_name(name))
            .or_default()
            .add(status);

        report.nodes_before.extend(nodes.iter().cloned());
        if nodes.is_empty() {
            continue;
        }
        let signature: Vec<String> = nodes.iter().cloned().collect();
        let topology = report.topologies.entry(signature).or_default();
        topology.before += 1;
        if status != Status::Removed {
            topology.after += 1;
            report.nodes_after.extend(nodes.iter().cloned());
        }
    }

    report
}

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use super::experiment::{ExperimentRecord, Status};
use crate::config::PruneConfig;
use crate::scanner::{list_experiments, topology_signature};

/// Experiments sharing the same node composition.
#[derive(Debug, Clone)]
pub struct TopologyGroup {
    pub signature: Vec<String>,
    pub experiments: Vec<ExperimentRecord>,
}

impl TopologyGroup {
    pub fn count(&self, status: Status) -> usize {
        self.experiments
            .iter()
            .filter(|e| e.status() == status)
            .count()
    }

    pub fn total(&self) -> usize {
        self.experiments.len()
    }
}

/// Experiment names sharing a node composition, without classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyListing {
    pub signature: Vec<String>,
    pub experiments: Vec<String>,
}

/// Largest groups first, ties broken by signature.
fn order_groups<T>(groups: BTreeMap<Vec<String>, Vec<T>>) -> Vec<(Vec<String>, Vec<T>)> {
    let mut ordered: Vec<_> = groups.into_iter().collect();
    // stable sort keeps BTreeMap's signature order for equal sizes
    ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    ordered
}

/// Group classified experiments by signature. Within a group experiments are
/// ordered Clean, Pruned, Removed, then by name.
pub fn group_by_topology(records: Vec<ExperimentRecord>) -> Vec<TopologyGroup> {
    let mut groups: BTreeMap<Vec<String>, Vec<ExperimentRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.signature.clone())
            .or_default()
            .push(record);
    }

    order_groups(groups)
        .into_iter()
        .map(|(signature, mut experiments)| {
            experiments.sort_by(|a, b| (a.status(), &a.name).cmp(&(b.status(), &b.name)));
            TopologyGroup {
                signature,
                experiments,
            }
        })
        .collect()
}

/// Group every experiment under `root` by node composition only.
pub fn list_topologies(root: &Path, config: &PruneConfig) -> io::Result<Vec<TopologyListing>> {
    let mut groups: BTreeMap<Vec<String>, Vec<String>> = BTreeMap::new();
    for experiment in list_experiments(root, &config.ignore_patterns())? {
        groups
            .entry(topology_signature(&experiment.path))
            .or_default()
            .push(experiment.name);
    }

    Ok(order_groups(groups)
        .into_iter()
        .map(|(signature, experiments)| TopologyListing {
            signature,
            experiments,
        })
        .collect())
}

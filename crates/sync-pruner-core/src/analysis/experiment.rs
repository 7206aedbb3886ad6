use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use super::node::{is_node_dir, node_record, NodeInvalid, NodeRecord};
use crate::config::{format_seconds, PruneConfig};
use crate::scanner::walk::{sorted_subdirs, topology_signature};
use crate::timeline::{filter_by_min_duration, intersect_all, Timeline};

/// Outcome of classifying one experiment. Ordering is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    Clean,
    Pruned,
    Removed,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Clean => "Clean",
            Status::Pruned => "Pruned",
            Status::Removed => "Removed",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Status::Clean => "🟢",
            Status::Pruned => "🟡",
            Status::Removed => "🔴",
        }
    }

    pub fn from_label(label: &str) -> Option<Status> {
        match label {
            "Clean" => Some(Status::Clean),
            "Pruned" => Some(Status::Pruned),
            "Removed" => Some(Status::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The rule that decided an experiment's status.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Unreadable(String),
    NoNodes,
    InvalidNode { node: String, cause: NodeInvalid },
    ZeroOverlap,
    AllBelowMinimum { discarded: usize, min_duration: f64 },
    ShortSegmentsDiscarded { discarded: usize },
    SplitSegments { segments: usize },
    Continuous { min_duration: f64 },
}

impl Reason {
    pub fn status(&self) -> Status {
        match self {
            Reason::Unreadable(_)
            | Reason::NoNodes
            | Reason::InvalidNode { .. }
            | Reason::ZeroOverlap
            | Reason::AllBelowMinimum { .. } => Status::Removed,
            Reason::ShortSegmentsDiscarded { .. } | Reason::SplitSegments { .. } => {
                Status::Pruned
            }
            Reason::Continuous { .. } => Status::Clean,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Unreadable(err) => write!(f, "Cannot access folder: {}", err),
            Reason::NoNodes => write!(f, "No valid node folders found"),
            Reason::InvalidNode { node, cause } => write!(f, "Node '{}' {}", node, cause),
            Reason::ZeroOverlap => write!(f, "Nodes have ZERO overlapping synchronization"),
            Reason::AllBelowMinimum {
                discarded,
                min_duration,
            } => write!(
                f,
                "All global overlaps < {} (Discarded {})",
                format_seconds(*min_duration),
                discarded
            ),
            Reason::ShortSegmentsDiscarded { discarded } => write!(
                f,
                "Discard {} short segments from Global Timeline",
                discarded
            ),
            Reason::SplitSegments { segments } => {
                write!(f, "Split into {} segments (Global Sync Gap)", segments)
            }
            Reason::Continuous { min_duration } => write!(
                f,
                "Continuous Global Sync >= {}",
                format_seconds(*min_duration)
            ),
        }
    }
}

/// Everything the classifier learned about one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    pub name: String,
    pub signature: Vec<String>,
    /// Nodes examined, in directory order, up to and including the first invalid one.
    pub nodes: Vec<NodeRecord>,
    pub global_timeline: Timeline,
    pub final_timeline: Timeline,
    pub discarded: usize,
    pub reason: Reason,
}

impl ExperimentRecord {
    pub fn status(&self) -> Status {
        self.reason.status()
    }
}

/// Validate node directories in sorted order, stopping at the first invalid node.
fn scan_nodes(dir: &Path, config: &PruneConfig) -> Result<Vec<NodeRecord>, (Vec<NodeRecord>, Reason)> {
    let subdirs = sorted_subdirs(dir).map_err(|e| (Vec::new(), Reason::Unreadable(e.to_string())))?;

    let mut nodes = Vec::new();
    for (dir_name, path) in subdirs {
        if !is_node_dir(&path, &config.required_files) {
            debug!("{} holds no required files, not a node", path.display());
            continue;
        }
        let record = node_record(&dir_name, &path, config);
        if let Err(cause) = &record.validity {
            let reason = Reason::InvalidNode {
                node: dir_name,
                cause: cause.clone(),
            };
            nodes.push(record);
            return Err((nodes, reason));
        }
        nodes.push(record);
    }

    if nodes.is_empty() {
        return Err((nodes, Reason::NoNodes));
    }
    Ok(nodes)
}

fn node_timelines(nodes: &[NodeRecord]) -> Vec<Timeline> {
    nodes
        .iter()
        .filter_map(|n| n.validity.as_ref().ok().cloned())
        .collect()
}

/// Classify one experiment directory.
///
/// Rules apply in this order and the first that fires wins:
/// 1. unreadable folder, no node folders, or an invalid node -> Removed
/// 2. empty intersection of node timelines -> Removed
/// 3. nothing survives the minimum-duration filter -> Removed
/// 4. short segments discarded -> Pruned
/// 5. several segments survive -> Pruned
/// 6. otherwise -> Clean
pub fn classify_experiment(name: &str, dir: &Path, config: &PruneConfig) -> ExperimentRecord {
    let mut record = ExperimentRecord {
        name: name.to_string(),
        signature: topology_signature(dir),
        nodes: Vec::new(),
        global_timeline: Timeline::new(),
        final_timeline: Timeline::new(),
        discarded: 0,
        reason: Reason::NoNodes,
    };

    let nodes = match scan_nodes(dir, config) {
        Ok(nodes) => nodes,
        Err((nodes, reason)) => {
            record.nodes = nodes;
            record.reason = reason;
            return record;
        }
    };

    record.global_timeline = intersect_all(&node_timelines(&nodes));
    record.nodes = nodes;
    if record.global_timeline.is_empty() {
        record.reason = Reason::ZeroOverlap;
        return record;
    }

    record.final_timeline = filter_by_min_duration(&record.global_timeline, config.min_duration);
    record.discarded = record.global_timeline.len() - record.final_timeline.len();

    record.reason = if record.final_timeline.is_empty() {
        Reason::AllBelowMinimum {
            discarded: record.discarded,
            min_duration: config.min_duration,
        }
    } else if record.discarded > 0 {
        Reason::ShortSegmentsDiscarded {
            discarded: record.discarded,
        }
    } else if record.final_timeline.len() > 1 {
        Reason::SplitSegments {
            segments: record.final_timeline.len(),
        }
    } else {
        Reason::Continuous {
            min_duration: config.min_duration,
        }
    };

    record
}

/// The intervals a prune would keep, recomputed from what is on disk now.
/// Empty whenever the experiment would classify as Removed.
pub fn compute_valid_intervals(dir: &Path, config: &PruneConfig) -> Timeline {
    let nodes = match scan_nodes(dir, config) {
        Ok(nodes) => nodes,
        Err((_, reason)) => {
            debug!("{}: no valid intervals ({})", dir.display(), reason);
            return Timeline::new();
        }
    };
    let global = intersect_all(&node_timelines(&nodes));
    filter_by_min_duration(&global, config.min_duration)
}

use std::path::Path;
use thiserror::Error;
use tracing::trace;

use crate::config::PruneConfig;
use crate::scanner::read_timestamps;
use crate::scanner::walk::normalize_node_name;
use crate::timeline::{build_timeline, intersect_all, Timeline};

/// Why a node cannot contribute a timeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeInvalid {
    #[error("missing required file {file}")]
    Missing { file: String },

    #[error("incomplete/unparseable data in {file}")]
    Unparseable { file: String },

    #[error("local files mismatch")]
    LocalMismatch,
}

/// One node directory and what validation made of it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub dir_name: String,
    pub name: String,
    pub validity: Result<Timeline, NodeInvalid>,
}

impl NodeRecord {
    pub fn is_valid(&self) -> bool {
        self.validity.is_ok()
    }
}

/// A directory counts as a node only if it holds at least one required file.
pub fn is_node_dir(dir: &Path, required_files: &[String]) -> bool {
    required_files.iter().any(|f| dir.join(f).is_file())
}

/// Coverage of a single capture file.
pub fn file_timeline(path: &Path, gap_threshold: f64) -> Timeline {
    build_timeline(&read_timestamps(path), gap_threshold)
}

/// Intersect the timelines of every required file in `dir`.
///
/// Files are checked in configured order and the first missing or empty one
/// decides the failure.
pub fn validate_node(dir: &Path, config: &PruneConfig) -> Result<Timeline, NodeInvalid> {
    let mut timelines = Vec::with_capacity(config.required_files.len());

    for file in &config.required_files {
        let path = dir.join(file);
        if !path.is_file() {
            return Err(NodeInvalid::Missing { file: file.clone() });
        }
        let timeline = file_timeline(&path, config.gap_threshold);
        if timeline.is_empty() {
            return Err(NodeInvalid::Unparseable { file: file.clone() });
        }
        trace!("{}: {} segments", path.display(), timeline.len());
        timelines.push(timeline);
    }

    let valid = intersect_all(&timelines);
    if valid.is_empty() {
        return Err(NodeInvalid::LocalMismatch);
    }
    Ok(valid)
}

pub fn node_record(dir_name: &str, dir: &Path, config: &PruneConfig) -> NodeRecord {
    NodeRecord {
        dir_name: dir_name.to_string(),
        name: normalize_node_name(dir_name).to_string(),
        validity: validate_node(dir, config),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::analysis::{ImpactReport, Status, StatusCounts, TopologyGroup, TopologyListing};
use crate::config::{format_seconds, PruneConfig};
use crate::error::Error;

const RULE: &str = "============================================================";
const SEPARATOR: &str = "------------------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Structured form of a scan report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,
    pub data_root: String,
    pub gap_threshold: f64,
    pub min_duration: f64,
    pub experiments: Vec<JsonEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEntry {
    pub name: String,
    pub signature: Vec<String>,
    pub status: Status,
    pub reason: String,
    pub segments: usize,
    pub discarded: usize,
}

pub fn render(
    format: ReportFormat,
    groups: &[TopologyGroup],
    data_root: &Path,
    config: &PruneConfig,
) -> Result<String, Error> {
    match format {
        ReportFormat::Text => Ok(render_text(groups, data_root, config)),
        ReportFormat::Json => render_json(groups, data_root, config),
    }
}

/// Human-readable report. Each experiment line has the form
/// `  - <name>, <glyph> <Status> (<reason>)`, which is what the prune phase reads back.
pub fn render_text(groups: &[TopologyGroup], data_root: &Path, config: &PruneConfig) -> String {
    TextReport {
        groups,
        data_root,
        config,
    }
    .to_string()
}

struct TextReport<'a> {
    groups: &'a [TopologyGroup],
    data_root: &'a Path,
    config: &'a PruneConfig,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scanning directory: {}", self.data_root.display())?;
        writeln!(
            f,
            "Logic: Auto-Detect JSON/CSV -> Intersect({}) -> Intersect(Nodes)",
            self.config.required_files.join(", ")
        )?;
        writeln!(
            f,
            "Config: gap threshold {}, minimum duration {}",
            format_seconds(self.config.gap_threshold),
            format_seconds(self.config.min_duration)
        )?;
        writeln!(f, "{}", SEPARATOR)?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "TOTAL UNIQUE TOPOLOGIES: {}", self.groups.len())?;
        writeln!(f, "{}", RULE)?;

        for (i, group) in self.groups.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "TOPOLOGY GROUP #{}", i + 1)?;
            writeln!(f, "Nodes: [{}]", group.signature.join(", "))?;
            writeln!(
                f,
                "Stats: {} Clean | {} Pruned | {} Removed (Total {})",
                group.count(Status::Clean),
                group.count(Status::Pruned),
                group.count(Status::Removed),
                group.total()
            )?;
            writeln!(f, "Experiments:")?;
            for exp in &group.experiments {
                let status = exp.status();
                writeln!(
                    f,
                    "  - {}, {} {} ({})",
                    exp.name,
                    status.glyph(),
                    status.label(),
                    exp.reason
                )?;
            }
            writeln!(f, "{}", SEPARATOR)?;
        }
        Ok(())
    }
}

pub fn json_report(groups: &[TopologyGroup], data_root: &Path, config: &PruneConfig) -> JsonReport {
    let experiments = groups
        .iter()
        .flat_map(|g| g.experiments.iter())
        .map(|exp| JsonEntry {
            name: exp.name.clone(),
            signature: exp.signature.clone(),
            status: exp.status(),
            reason: exp.reason.to_string(),
            segments: exp.final_timeline.len(),
            discarded: exp.discarded,
        })
        .collect();

    JsonReport {
        generated_at: Utc::now(),
        data_root: data_root.to_string_lossy().into_owned(),
        gap_threshold: config.gap_threshold,
        min_duration: config.min_duration,
        experiments,
    }
}

pub fn render_json(
    groups: &[TopologyGroup],
    data_root: &Path,
    config: &PruneConfig,
) -> Result<String, Error> {
    let mut body = serde_json::to_string_pretty(&json_report(groups, data_root, config))?;
    body.push('\n');
    Ok(body)
}

/// Plain topology listing without health information.
pub fn render_topologies(listing: &[TopologyListing]) -> String {
    TopologyReport(listing).to_string()
}

struct TopologyReport<'a>(&'a [TopologyListing]);

impl fmt::Display for TopologyReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "TOTAL UNIQUE TOPOLOGIES FOUND: {}", self.0.len())?;
        writeln!(f, "{}", RULE)?;

        for (i, group) in self.0.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "TOPOLOGY GROUP #{}", i + 1)?;
            writeln!(f, "Node Composition ({} nodes):", group.signature.len())?;
            writeln!(f, "  [{}]", group.signature.join(", "))?;
            writeln!(f)?;
            writeln!(f, "Experiment Count: {}", group.experiments.len())?;
            writeln!(f, "Experiment Names:")?;
            for name in &group.experiments {
                writeln!(f, "  - {}", name)?;
            }
            writeln!(f, "{}", SEPARATOR)?;
        }
        Ok(())
    }
}

/// Before/after tables for `compare`.
pub fn render_impact(impact: &ImpactReport) -> String {
    ImpactTables(impact).to_string()
}

struct ImpactTables<'a>(&'a ImpactReport);

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{}", RULE)?;
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", RULE)
}

impl ImpactTables<'_> {
    fn totals(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = &self.0.counts;
        section(f, "GLOBAL EXPERIMENT STATS")?;
        writeln!(
            f,
            "{:<25} | {:<10} | {:<10} | {:<10}",
            "Metric", "Before", "After", "Delta"
        )?;
        writeln!(f, "{}", SEPARATOR)?;
        writeln!(
            f,
            "{:<25} | {:<10} | {:<10} | -{}",
            "Total Experiments",
            counts.total(),
            counts.surviving(),
            counts.removed
        )?;
        writeln!(f, "{}", SEPARATOR)?;
        writeln!(f, "  {} Clean (Untouched): {}", Status::Clean.glyph(), counts.clean)?;
        writeln!(f, "  {} Pruned (Modified): {}", Status::Pruned.glyph(), counts.pruned)?;
        writeln!(f, "  {} Removed (Moved): {}", Status::Removed.glyph(), counts.removed)
    }

    fn components(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let impact = self.0;
        section(f, "UNIQUE COMPONENT STATS")?;
        writeln!(
            f,
            "{:<25} | {:<15} | {:<15} | Loss",
            "Component", "Unique Before", "Unique After"
        )?;
        writeln!(f, "{}", SEPARATOR)?;
        let rows = [
            ("Nodes", impact.nodes_before.len(), impact.nodes_after.len()),
            ("Projects", impact.projects.len(), impact.projects_after()),
            ("Families", impact.families.len(), impact.families_after()),
            ("Topologies", impact.topologies.len(), impact.topologies_after()),
        ];
        for (label, before, after) in rows {
            writeln!(
                f,
                "{:<25} | {:<15} | {:<15} | -{}",
                label,
                before,
                after,
                before.saturating_sub(after)
            )?;
        }
        Ok(())
    }

    fn breakdown(
        f: &mut fmt::Formatter<'_>,
        title: &str,
        rows: Vec<(&String, &StatusCounts)>,
    ) -> fmt::Result {
        section(f, &format!("{} DETAILED BREAKDOWN", title))?;
        writeln!(
            f,
            "{:<35} | {:<6} | {:<6} | {:<6} | {:<8}",
            "Name", "Total", "Clean", "Pruned", "Removed"
        )?;
        writeln!(f, "{}", SEPARATOR)?;
        for (name, c) in rows {
            writeln!(
                f,
                "{:<35} | {:<6} | {:<6} | {:<6} | {:<8}",
                name,
                c.total(),
                c.clean,
                c.pruned,
                c.removed
            )?;
        }
        Ok(())
    }

    fn topologies(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "TOPOLOGY DETAILED BREAKDOWN")?;
        writeln!(
            f,
            "{:<50} | {:<8} | {:<8} | Status",
            "Topology Nodes", "Before", "After"
        )?;
        writeln!(f, "{}", SEPARATOR)?;
        for (signature, t) in self.0.ranked_topologies() {
            let flag = if t.after == 0 {
                format!("{} FULLY REMOVED", Status::Removed.glyph())
            } else if t.after < t.before {
                format!("{} PARTIALLY REMOVED", Status::Pruned.glyph())
            } else {
                String::new()
            };
            let nodes = format!("[{}]", signature.join(", "));
            writeln!(f, "{:<50} | {:<8} | {:<8} | {}", nodes, t.before, t.after, flag)?;
        }
        writeln!(f, "{}", RULE)
    }
}

impl fmt::Display for ImpactTables<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.totals(f)?;
        writeln!(f)?;
        self.components(f)?;
        writeln!(f)?;
        Self::breakdown(f, "PROJECT", ImpactReport::ranked(&self.0.projects))?;
        writeln!(f)?;
        Self::breakdown(f, "FAMILY", ImpactReport::ranked(&self.0.families))?;
        writeln!(f)?;
        self.topologies(f)
    }
}

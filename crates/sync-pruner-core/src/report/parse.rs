use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::render::JsonReport;
use crate::analysis::Status;
use crate::error::Error;

lazy_static::lazy_static! {
    // Names are word characters only; a hyphenated name never matches.
    static ref ENTRY_LINE: Regex =
        Regex::new(r"^\s*-\s*(\w+),\s*(?:[^\w\s]+\s*)?(Removed|Pruned|Clean)\b")
            .expect("entry pattern is valid");
}

/// What the prune phase should do. Anything not listed is left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPlan {
    pub to_remove: BTreeSet<String>,
    pub to_prune: BTreeSet<String>,
}

impl ActionPlan {
    /// Record one report entry. A name seen as Removed is never pruned.
    pub fn insert(&mut self, name: &str, status: Status) {
        match status {
            Status::Removed => {
                self.to_prune.remove(name);
                self.to_remove.insert(name.to_string());
            }
            Status::Pruned => {
                if !self.to_remove.contains(name) {
                    self.to_prune.insert(name.to_string());
                }
            }
            Status::Clean => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_prune.is_empty()
    }
}

/// Parse an entry line into `(name, status)`.
pub fn parse_entry_line(line: &str) -> Option<(&str, Status)> {
    let caps = ENTRY_LINE.captures(line)?;
    let name = caps.get(1)?.as_str();
    let status = Status::from_label(caps.get(2)?.as_str())?;
    Some((name, status))
}

fn looks_like_entry(line: &str) -> bool {
    line.trim_start().starts_with('-')
        && ["Removed", "Pruned", "Clean"]
            .iter()
            .any(|word| line.contains(word))
}

pub fn parse_text_report(text: &str) -> ActionPlan {
    let mut plan = ActionPlan::default();
    let mut unmatched = 0usize;

    for line in text.lines() {
        match parse_entry_line(line) {
            Some((name, status)) => plan.insert(name, status),
            None if looks_like_entry(line) => {
                debug!("Unmatched report line: {}", line);
                unmatched += 1;
            }
            None => {}
        }
    }

    if unmatched > 0 {
        warn!(
            "{} report lines look like experiment entries but were not understood \
             (names may only contain letters, digits and underscores)",
            unmatched
        );
    }
    plan
}

pub fn parse_json_report(text: &str) -> Result<ActionPlan, Error> {
    let report: JsonReport = serde_json::from_str(text)?;
    let mut plan = ActionPlan::default();
    for entry in &report.experiments {
        plan.insert(&entry.name, entry.status);
    }
    Ok(plan)
}

/// Text or JSON, decided by the first non-whitespace character.
pub fn parse_report(text: &str) -> Result<ActionPlan, Error> {
    if text.trim_start().starts_with('{') {
        parse_json_report(text)
    } else {
        Ok(parse_text_report(text))
    }
}

/// Read and parse a report file. Failing to read it is fatal for the run.
pub fn load_report(path: &Path) -> Result<ActionPlan, Error> {
    let text = fs::read_to_string(path).map_err(|source| Error::Report {
        path: path.to_path_buf(),
        source,
    })?;
    parse_report(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_line_with_glyphs() {
        assert_eq!(
            parse_entry_line("  - foo_bar, 🔴 Removed (Node 'x' local files mismatch)"),
            Some(("foo_bar", Status::Removed))
        );
        assert_eq!(
            parse_entry_line("- baz_qux, 🟡 Pruned (...)"),
            Some(("baz_qux", Status::Pruned))
        );
        assert_eq!(
            parse_entry_line("- abc123, 🟢 Clean (ok)"),
            Some(("abc123", Status::Clean))
        );
    }

    #[test]
    fn test_parse_entry_line_without_glyph() {
        assert_eq!(
            parse_entry_line("- plain_name, Removed (x)"),
            Some(("plain_name", Status::Removed))
        );
    }

    #[test]
    fn test_parse_entry_line_rejects_hyphenated_names() {
        assert_eq!(parse_entry_line("- foo-bar, 🔴 Removed (x)"), None);
    }

    #[test]
    fn test_parse_entry_line_ignores_other_lines() {
        assert_eq!(parse_entry_line("Stats: 1 Clean | 0 Pruned | 0 Removed"), None);
        assert_eq!(parse_entry_line("------------------------------"), None);
        assert_eq!(parse_entry_line("  - exp, 🔴 Deleted (x)"), None);
    }

    #[test]
    fn test_report_round_trip() {
        let report = "\
TOPOLOGY GROUP #1
Nodes: [a, b]
Experiments:
  - foo_bar, 🔴 Removed (Nodes have ZERO overlapping synchronization)
  - baz_qux, 🟡 Pruned (Split into 2 segments (Global Sync Gap))
  - keep_me, 🟢 Clean (Continuous Global Sync >= 30min)
------------------------------------------------------------
";
        let plan = parse_report(report).unwrap();
        assert_eq!(plan.to_remove, BTreeSet::from(["foo_bar".to_string()]));
        assert_eq!(plan.to_prune, BTreeSet::from(["baz_qux".to_string()]));
    }

    #[test]
    fn test_remove_wins_over_prune() {
        let plan = parse_text_report("- a_b, 🟡 Pruned (x)\n- a_b, 🔴 Removed (y)\n- c_d, 🔴 Removed (y)\n- c_d, 🟡 Pruned (x)\n");
        assert!(plan.to_prune.is_empty());
        assert_eq!(plan.to_remove.len(), 2);
    }

    #[test]
    fn test_parse_json_report() {
        let json = r#"{
            "generated_at": "2024-01-01T00:00:00Z",
            "data_root": "/data",
            "gap_threshold": 15.0,
            "min_duration": 1800.0,
            "experiments": [
                {"name": "gone-1", "signature": ["a"], "status": "Removed", "reason": "x", "segments": 0, "discarded": 0},
                {"name": "trim_1", "signature": ["a"], "status": "Pruned", "reason": "y", "segments": 2, "discarded": 0},
                {"name": "ok_1", "signature": ["a"], "status": "Clean", "reason": "z", "segments": 1, "discarded": 0}
            ]
        }"#;
        let plan = parse_report(json).unwrap();
        assert_eq!(plan.to_remove, BTreeSet::from(["gone-1".to_string()]));
        assert_eq!(plan.to_prune, BTreeSet::from(["trim_1".to_string()]));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            parse_report("{ not json"),
            Err(Error::ReportJson(_))
        ));
    }

    #[test]
    fn test_load_missing_report_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_report(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, Error::Report { .. }));
    }
}

use config::{Config, ConfigError, Environment, File as ConfigFile};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::error;

use crate::error::Error;

pub const DEFAULT_GAP_THRESHOLD: f64 = 15.0;
pub const DEFAULT_MIN_DURATION: f64 = 30.0 * 60.0;

/// Thresholds and folder rules shared by the scan and prune phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Largest gap (seconds) between consecutive samples that still counts as continuous.
    pub gap_threshold: f64,
    /// Shortest global segment (seconds) worth keeping.
    pub min_duration: f64,
    /// Files every node directory must carry.
    pub required_files: Vec<String>,
    /// Glob patterns matched against top-level folder names.
    pub ignore_folders: Vec<String>,
    /// Size of the rayon pool; 0 lets rayon decide.
    pub worker_threads: usize,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            min_duration: DEFAULT_MIN_DURATION,
            required_files: vec![
                "cpu-load.csv".to_string(),
                "proc-cpu.csv".to_string(),
                "proc-mem.csv".to_string(),
            ],
            ignore_folders: vec![
                "tools".to_string(),
                "errorfolder".to_string(),
                ".git".to_string(),
                ".DS_Store".to_string(),
                "archive".to_string(),
                "backup".to_string(),
            ],
            worker_threads: 0,
        }
    }
}

impl PruneConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.gap_threshold.is_finite() || self.gap_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "gap_threshold must be a non-negative number, got {}",
                self.gap_threshold
            )));
        }
        if !self.min_duration.is_finite() || self.min_duration < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "min_duration must be a non-negative number, got {}",
                self.min_duration
            )));
        }
        if self.required_files.is_empty() {
            return Err(Error::InvalidConfig(
                "required_files must name at least one file".to_string(),
            ));
        }
        if let Some(bad) = self
            .required_files
            .iter()
            .find(|f| f.is_empty() || f.contains('/') || f.contains('\\'))
        {
            return Err(Error::InvalidConfig(format!(
                "required file '{}' must be a plain file name",
                bad
            )));
        }
        Ok(())
    }

    /// Compiled ignore patterns. Invalid globs are logged and dropped.
    pub fn ignore_patterns(&self) -> Vec<Pattern> {
        self.ignore_folders
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid ignore pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect()
    }
}

/// Load configuration from `Config.*` in the working directory (or `path` when
/// given), then `SYNC_PRUNER_*` environment variables.
pub fn load_configuration(path: Option<&Path>) -> Result<PruneConfig, ConfigError> {
    let file_source = match path {
        Some(p) => ConfigFile::from(p).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };
    let builder = Config::builder()
        .add_source(file_source)
        .add_source(Environment::with_prefix("SYNC_PRUNER"))
        .build()?;
    builder.try_deserialize::<PruneConfig>()
}

/// Render seconds the way the report phrases durations: `30min`, `90s`.
pub fn format_seconds(secs: f64) -> String {
    if secs >= 60.0 && secs % 60.0 == 0.0 {
        format!("{}min", secs / 60.0)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PruneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gap_threshold, 15.0);
        assert_eq!(config.min_duration, 1800.0);
        assert_eq!(config.required_files.len(), 3);
    }

    #[test]
    fn test_validate_rejects_negative_gap() {
        let config = PruneConfig {
            gap_threshold: -1.0,
            ..PruneConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_empty_required_files() {
        let config = PruneConfig {
            required_files: vec![],
            ..PruneConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nested_required_file() {
        let config = PruneConfig {
            required_files: vec!["sub/cpu.csv".to_string()],
            ..PruneConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ignore_patterns_match_globs() {
        let config = PruneConfig {
            ignore_folders: vec!["tools".to_string(), "tmp_*".to_string()],
            ..PruneConfig::default()
        };
        let patterns = config.ignore_patterns();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.iter().any(|p| p.matches("tmp_old")));
        assert!(patterns.iter().any(|p| p.matches("tools")));
        assert!(!patterns.iter().any(|p| p.matches("exp_1")));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1800.0), "30min");
        assert_eq!(format_seconds(90.0), "90s");
        assert_eq!(format_seconds(15.5), "15.5s");
    }

    #[test]
    fn test_load_configuration_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prune.toml");
        std::fs::write(&path, "gap_threshold = 5.0\nmin_duration = 60.0\n").unwrap();

        let config = load_configuration(Some(&path)).unwrap();
        assert_eq!(config.gap_threshold, 5.0);
        assert_eq!(config.min_duration, 60.0);
        // untouched keys keep their defaults
        assert_eq!(config.required_files, PruneConfig::default().required_files);
    }
}

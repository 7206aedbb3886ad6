use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use sync_pruner_core::report::ReportFormat;
use sync_pruner_core::PruneConfig;

#[derive(Debug, Parser)]
#[command(name = "sync-pruner")]
#[command(about = "Classify and prune multi-node telemetry experiments", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Settings that win over the config file and environment.
#[derive(Debug, Args)]
pub struct Overrides {
    /// Config file to load instead of ./Config.*
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Largest sample gap (seconds) still counted as continuous
    #[arg(long, global = true, value_name = "SECS")]
    pub gap_threshold: Option<f64>,

    /// Shortest global segment (seconds) worth keeping
    #[arg(long, global = true, value_name = "SECS")]
    pub min_duration: Option<f64>,

    /// Worker threads (0 = one per core)
    #[arg(long, global = true, value_name = "N")]
    pub jobs: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut PruneConfig) {
        if let Some(gap) = self.gap_threshold {
            config.gap_threshold = gap;
        }
        if let Some(min) = self.min_duration {
            config.min_duration = min;
        }
        if let Some(jobs) = self.jobs {
            config.worker_threads = jobs;
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify every experiment and write a report (read-only)
    Scan {
        data_dir: PathBuf,
        /// Write the report here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "text")]
        format: FormatArg,
    },
    /// Apply a report: move Removed experiments to backup, trim Pruned ones
    Prune {
        data_dir: PathBuf,
        backup_dir: PathBuf,
        report: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List node compositions without checking data health
    Topology { data_dir: PathBuf },
    /// Summarize what a prune run changed
    Compare {
        data_dir: PathBuf,
        backup_dir: PathBuf,
    },
    /// Print configuration values
    PrintConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_scan_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "sync-pruner",
            "scan",
            "/data",
            "--format",
            "json",
            "--min-duration",
            "600",
        ])
        .unwrap();

        let mut config = PruneConfig::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.min_duration, 600.0);
        assert_eq!(config.gap_threshold, 15.0);

        match cli.command {
            Some(Commands::Scan {
                data_dir, format, output,
            }) => {
                assert_eq!(data_dir, PathBuf::from("/data"));
                assert!(matches!(format, FormatArg::Json));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_prune_requires_three_paths() {
        assert!(Cli::try_parse_from(["sync-pruner", "prune", "/data", "/backup"]).is_err());
        let cli =
            Cli::try_parse_from(["sync-pruner", "prune", "/data", "/backup", "r.txt", "-y"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Prune { yes: true, .. })));
    }
}

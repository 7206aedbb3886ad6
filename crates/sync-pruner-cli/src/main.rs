mod commands;
mod logging;
mod progress;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, Overrides};
use dotenv::dotenv;
use progress::CliReporter;
use sync_pruner_core::analysis::{compare, list_topologies};
use sync_pruner_core::config::{format_seconds, load_configuration};
use sync_pruner_core::report::{load_report, render_impact, render_topologies, ReportFormat};
use sync_pruner_core::{PruneConfig, PruneEngine, ScanEngine};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match resolve_config(&args.overrides) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Some(Commands::Scan {
            data_dir,
            output,
            format,
        }) => run_scan(&config, &data_dir, output.as_deref(), format.into()),
        Some(Commands::Prune {
            data_dir,
            backup_dir,
            report,
            yes,
        }) => run_prune(&config, &data_dir, &backup_dir, &report, yes),
        Some(Commands::Topology { data_dir }) => run_topology(&config, &data_dir),
        Some(Commands::Compare {
            data_dir,
            backup_dir,
        }) => run_compare(&config, &data_dir, &backup_dir),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(overrides: &Overrides) -> Result<PruneConfig> {
    let mut config = load_configuration(overrides.config.as_deref())?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn run_scan(
    config: &PruneConfig,
    data_dir: &Path,
    output: Option<&Path>,
    format: ReportFormat,
) -> Result<()> {
    let engine = ScanEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine.scan(data_dir, &reporter)?;
    let report = result.render(format, config)?;

    match output {
        Some(path) => {
            fs::write(path, &report)
                .with_context(|| format!("Cannot write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => {
            io::stdout().write_all(report.as_bytes())?;
        }
    }

    info!(
        "{} clean, {} pruned, {} removed across {} topologies in {}",
        format!("{}", result.counts.clean).green(),
        format!("{}", result.counts.pruned).yellow(),
        format!("{}", result.counts.removed).red(),
        result.groups.len(),
        format!("{:.2}s", result.scan_duration.as_secs_f64()).green(),
    );

    Ok(())
}

fn run_prune(
    config: &PruneConfig,
    data_dir: &Path,
    backup_dir: &Path,
    report: &Path,
    yes: bool,
) -> Result<()> {
    let plan = load_report(report)?;
    if plan.is_empty() {
        info!("Report lists nothing to remove or prune");
        return Ok(());
    }

    info!(
        "Using gap threshold {} and minimum duration {}",
        format_seconds(config.gap_threshold),
        format_seconds(config.min_duration)
    );
    println!(
        "About to move {} experiments to {} and prune {} in place.",
        format!("{}", plan.to_remove.len()).red(),
        backup_dir.display(),
        format!("{}", plan.to_prune.len()).yellow(),
    );
    if !yes && !prompt_confirm("Proceed?", Some(false))? {
        info!("Aborted, nothing was changed");
        return Ok(());
    }

    let engine = PruneEngine::new(config.clone(), data_dir, backup_dir);
    let reporter = CliReporter::new();
    let summary = engine.execute(&plan, &reporter)?;

    println!();
    info!(
        "Moved {}, pruned {} ({} degraded to removal), {} already gone, {} backup conflicts",
        format!("{}", summary.moved).red(),
        format!("{}", summary.pruned).yellow(),
        summary.degraded,
        summary.missing,
        summary.backup_conflicts,
    );
    info!(
        "Files: {} rewritten, {} skipped, {} failed; rows: {} kept, {} dropped",
        format!("{}", summary.files_rewritten).cyan(),
        summary.files_skipped,
        summary.files_failed,
        summary.rows_kept,
        summary.rows_dropped,
    );

    for (name, message) in &summary.errors {
        warn!("{}: {}", name, message);
    }
    if !summary.errors.is_empty() {
        bail!("{} experiments could not be processed", summary.errors.len());
    }
    Ok(())
}

fn run_topology(config: &PruneConfig, data_dir: &Path) -> Result<()> {
    let listing = list_topologies(data_dir, config)
        .with_context(|| format!("Cannot list {}", data_dir.display()))?;
    print!("{}", render_topologies(&listing));
    Ok(())
}

fn run_compare(config: &PruneConfig, data_dir: &Path, backup_dir: &Path) -> Result<()> {
    let impact = compare(data_dir, backup_dir, config);
    if impact.counts.total() == 0 {
        warn!("No experiments found. Check your paths or ignore list.");
        return Ok(());
    }
    print!("{}", render_impact(&impact));
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}

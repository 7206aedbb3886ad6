use rayon::prelude::*;
use rayon::ThreadPool;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analysis::impact::StatusCounts;
use crate::analysis::{classify_experiment, group_by_topology, ExperimentRecord, TopologyGroup};
use crate::config::PruneConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::prune::{PruneOutcome, Pruner, RemoveOutcome};
use crate::report::{render, ActionPlan, ReportFormat};
use crate::scanner::list_experiments;

fn build_pool(worker_threads: usize) -> Result<ThreadPool, Error> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads)
        .build()
        .map_err(|e| Error::Other(format!("Could not start worker pool: {}", e)))
}

/// Read-only classification of every experiment under a dataset root.
pub struct ScanEngine {
    config: PruneConfig,
}

#[derive(Debug)]
pub struct ScanResult {
    pub data_root: PathBuf,
    pub groups: Vec<TopologyGroup>,
    pub counts: StatusCounts,
    pub scan_duration: Duration,
}

impl ScanResult {
    pub fn experiments(&self) -> impl Iterator<Item = &ExperimentRecord> {
        self.groups.iter().flat_map(|g| g.experiments.iter())
    }

    pub fn render(&self, format: ReportFormat, config: &PruneConfig) -> Result<String, Error> {
        render(format, &self.groups, &self.data_root, config)
    }
}

impl ScanEngine {
    pub fn new(config: PruneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PruneConfig {
        &self.config
    }

    /// Classify every experiment in `data_root`. Experiments are independent,
    /// so they are spread over the worker pool; results are re-sorted by name.
    pub fn scan(
        &self,
        data_root: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanResult, Error> {
        self.config.validate()?;
        if !data_root.is_dir() {
            return Err(Error::MissingDirectory(data_root.to_path_buf()));
        }

        info!("Scanning directory: {}", data_root.display());
        let scan_start = Instant::now();

        let experiments = list_experiments(data_root, &self.config.ignore_patterns())?;
        reporter.on_scan_start(experiments.len());

        let pool = build_pool(self.config.worker_threads)?;
        let mut records: Vec<ExperimentRecord> = pool.install(|| {
            experiments
                .par_iter()
                .map(|exp| {
                    let record = classify_experiment(&exp.name, &exp.path, &self.config);
                    debug!("{}: {} ({})", record.name, record.status(), record.reason);
                    reporter.on_experiment_classified(&record.name, record.status());
                    record
                })
                .collect()
        });
        records.sort_by(|a, b| a.name.cmp(&b.name));

        let mut counts = StatusCounts::default();
        for record in &records {
            counts.add(record.status());
        }

        let scan_duration = scan_start.elapsed();
        reporter.on_scan_complete(records.len(), scan_duration.as_secs_f64());
        info!(
            "Classified {} experiments in {:.2}s: {} clean, {} pruned, {} removed",
            records.len(),
            scan_duration.as_secs_f64(),
            counts.clean,
            counts.pruned,
            counts.removed
        );

        Ok(ScanResult {
            data_root: data_root.to_path_buf(),
            groups: group_by_topology(records),
            counts,
            scan_duration,
        })
    }
}

/// Totals for one prune run.
#[derive(Debug, Default)]
pub struct ExecutionSummary {
    pub moved: usize,
    pub backup_conflicts: usize,
    pub missing: usize,
    pub pruned: usize,
    pub degraded: usize,
    pub files_rewritten: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
    /// Experiments that failed outright, with the error message.
    pub errors: Vec<(String, String)>,
    pub duration: Duration,
}

impl ExecutionSummary {
    fn record_remove(&mut self, outcome: RemoveOutcome) {
        match outcome {
            RemoveOutcome::Missing => self.missing += 1,
            RemoveOutcome::Moved => self.moved += 1,
            RemoveOutcome::BackupConflict => self.backup_conflicts += 1,
        }
    }

    fn record_prune(&mut self, outcome: PruneOutcome) {
        match outcome {
            PruneOutcome::Missing => self.missing += 1,
            PruneOutcome::Degraded(remove) => {
                self.degraded += 1;
                self.record_remove(remove);
            }
            PruneOutcome::Pruned(details) => {
                self.pruned += 1;
                self.files_rewritten += details.files_rewritten;
                self.files_skipped += details.files_skipped;
                self.files_failed += details.files_failed;
                self.rows_kept += details.rows_kept;
                self.rows_dropped += details.rows_dropped;
            }
        }
    }
}

/// Destructive phase: applies an [`ActionPlan`] to the dataset.
pub struct PruneEngine {
    config: PruneConfig,
    data_root: PathBuf,
    backup_root: PathBuf,
}

impl PruneEngine {
    pub fn new(config: PruneConfig, data_root: &Path, backup_root: &Path) -> Self {
        Self {
            config,
            data_root: data_root.to_path_buf(),
            backup_root: backup_root.to_path_buf(),
        }
    }

    fn prepare_roots(&self) -> Result<(), Error> {
        if !self.data_root.is_dir() {
            return Err(Error::MissingDirectory(self.data_root.clone()));
        }
        fs::create_dir_all(&self.backup_root)?;
        if fs::canonicalize(&self.data_root)? == fs::canonicalize(&self.backup_root)? {
            return Err(Error::InvalidConfig(
                "backup directory must differ from the data directory".to_string(),
            ));
        }
        Ok(())
    }

    /// Removals run first, then prunes. A failing experiment is logged and
    /// counted; the run carries on with the rest.
    pub fn execute(
        &self,
        plan: &ActionPlan,
        reporter: &dyn ProgressReporter,
    ) -> Result<ExecutionSummary, Error> {
        self.config.validate()?;
        self.prepare_roots()?;

        let start = Instant::now();
        reporter.on_execute_start(plan.to_remove.len(), plan.to_prune.len());
        info!(
            "Found {} experiments to REMOVE, {} to PRUNE",
            plan.to_remove.len(),
            plan.to_prune.len()
        );

        let pruner = Pruner::new(&self.data_root, &self.backup_root, &self.config);
        let pool = build_pool(self.config.worker_threads)?;
        let mut summary = ExecutionSummary::default();

        if !plan.to_remove.is_empty() {
            info!("Processing removals");
            let results: Vec<(&String, Result<RemoveOutcome, Error>)> = pool.install(|| {
                plan.to_remove
                    .par_iter()
                    .map(|name| {
                        let result = pruner.remove(name);
                        reporter.on_experiment_executed(name);
                        (name, result)
                    })
                    .collect()
            });
            for (name, result) in results {
                match result {
                    Ok(outcome) => summary.record_remove(outcome),
                    Err(e) => {
                        warn!("Could not remove {}: {}", name, e);
                        summary.errors.push((name.clone(), e.to_string()));
                    }
                }
            }
        }

        if !plan.to_prune.is_empty() {
            info!("Processing pruning");
            let results: Vec<(&String, Result<PruneOutcome, Error>)> = pool.install(|| {
                plan.to_prune
                    .par_iter()
                    .map(|name| {
                        let result = pruner.prune(name);
                        reporter.on_experiment_executed(name);
                        (name, result)
                    })
                    .collect()
            });
            for (name, result) in results {
                match result {
                    Ok(outcome) => summary.record_prune(outcome),
                    Err(e) => {
                        warn!("Could not prune {}: {}", name, e);
                        summary.errors.push((name.clone(), e.to_string()));
                    }
                }
            }
        }

        summary.duration = start.elapsed();
        reporter.on_execute_complete(summary.duration.as_secs_f64());
        info!("Execution complete in {:.2}s", summary.duration.as_secs_f64());
        Ok(summary)
    }
}

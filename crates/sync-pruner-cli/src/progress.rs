use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use sync_pruner_core::analysis::Status;
use sync_pruner_core::ProgressReporter;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Scan phase: bar over experiments (count known after listing)
/// - Execute phase: bar over removals plus prunes
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, total: usize, label: &str) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(&format!(
                "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {{msg}}",
                label
            ))
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars(TICKS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn advance(&self, msg: String) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.set_message(msg);
            pb.inc(1);
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, total_experiments: usize) {
        self.start_bar(total_experiments, "Classifying");
    }

    fn on_experiment_classified(&self, name: &str, status: Status) {
        self.advance(format!("{} {}", status.glyph(), name));
    }

    fn on_scan_complete(&self, total_experiments: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} experiments in {:.2}s",
            total_experiments, duration_secs
        );
    }

    fn on_execute_start(&self, to_remove: usize, to_prune: usize) {
        self.start_bar(to_remove + to_prune, "Applying");
    }

    fn on_experiment_executed(&self, name: &str) {
        self.advance(name.to_string());
    }

    fn on_execute_complete(&self, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Execution complete in {:.2}s",
            duration_secs
        );
    }
}

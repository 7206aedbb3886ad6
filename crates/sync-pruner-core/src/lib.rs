pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod progress;
pub mod prune;
pub mod report;
pub mod scanner;
pub mod timeline;

pub use config::PruneConfig;
pub use engine::{ExecutionSummary, PruneEngine, ScanEngine, ScanResult};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use timeline::{Interval, Timeline};

pub mod backup;
pub mod executor;
pub mod rewrite;

pub use executor::{PruneDetails, PruneOutcome, Pruner, RemoveOutcome};
pub use rewrite::{rewrite_file, RewriteOutcome};

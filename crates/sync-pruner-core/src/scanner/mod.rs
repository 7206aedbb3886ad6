pub mod reader;
pub mod walk;

pub use reader::{detect_format, read_timestamps, FileFormat};
pub use walk::{list_experiments, topology_signature, ExperimentDir};

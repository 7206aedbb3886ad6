pub mod experiment;
pub mod impact;
pub mod node;
pub mod topology;

pub use experiment::{classify_experiment, compute_valid_intervals, ExperimentRecord, Reason, Status};
pub use node::{validate_node, NodeInvalid, NodeRecord};
pub use topology::{group_by_topology, list_topologies, TopologyGroup, TopologyListing};
pub use impact::{compare, BeforeAfter, ImpactReport, StatusCounts};

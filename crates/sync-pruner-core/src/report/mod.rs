pub mod parse;
pub mod render;

pub use parse::{load_report, parse_report, ActionPlan};
pub use render::{render, render_impact, render_text, render_topologies, JsonReport, ReportFormat};

pub mod graph;
pub mod report;

pub use graph::{walk_script, GraphSummary};
pub use report::{analyze_collection, analyze_script, ScriptReport};

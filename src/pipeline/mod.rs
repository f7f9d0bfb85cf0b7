//! Pipeline entry points for monitor operations.
//!
//! - `run_catalog`: Download the catalog and list matching products
//! - `run_monitor`: Probe every match, diff against state, write state and feed

pub mod diff;
pub mod monitor;
pub mod render;

pub use diff::{DiffResult, calculate_diff};
pub use monitor::{ProbeFailure, RunReport, monitor_catalog, run_catalog, run_monitor};
pub use render::{Channel, DATE_UNAVAILABLE, FeedRenderer};

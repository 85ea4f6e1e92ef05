//! Dashboard report assembly and rendering.

pub mod dashboard;
pub mod generator;

pub use dashboard::{build_dashboard, ReportSettings};
pub use generator::*;

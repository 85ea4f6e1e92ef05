//! Analysis modules.
//!
//! Grouped aggregation, time bucketing, segmentation, KPIs and
//! column profiling over an [`OrderTable`](crate::models::OrderTable).

pub mod aggregator;
pub mod kpi;
pub mod profile;
pub mod segments;

pub use aggregator::*;
pub use kpi::*;
pub use profile::*;
pub use segments::*;

//! Source ingestion: CSV loading and locale-aware number parsing.

pub mod loader;
pub mod locale;

pub use loader::*;

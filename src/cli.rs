//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{OrderFilter, ShippingScope};
use clap::Parser;
use std::path::PathBuf;

/// Salesdash - sales order aggregation and dashboard reports
///
/// Load a sales orders CSV, compute KPIs, monthly series, rankings and
/// segmentations, and write them as a Markdown or JSON report.
///
/// Examples:
///   salesdash --data data/merchandise-sales.csv
///   salesdash --data orders.csv --year 2024 --category Clothing,Ornaments
///   salesdash --data orders.csv --format json --output report.json
///   salesdash --data orders.csv --dry-run
///   salesdash --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Orders CSV to load
    ///
    /// Defaults to the `[data] path` of the config file.
    #[arg(short, long, value_name = "FILE", env = "SALESDASH_DATA")]
    pub data: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .salesdash.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Read at most this many data rows
    #[arg(long, value_name = "ROWS")]
    pub limit: Option<usize>,

    /// chrono format of the Order Date column (default: %d/%m/%Y)
    #[arg(long, value_name = "FORMAT")]
    pub date_format: Option<String>,

    /// Only orders placed in this year
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,

    /// Only orders placed in this month (1-12)
    #[arg(long, value_name = "MONTH")]
    pub month: Option<u32>,

    /// Only these product categories (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub category: Vec<String>,

    /// Only these order locations (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub location: Vec<String>,

    /// Only these buyer genders (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub gender: Vec<String>,

    /// Only these product ids (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub product: Vec<String>,

    /// Minimum buyer age (inclusive)
    #[arg(long, value_name = "AGE")]
    pub min_age: Option<u32>,

    /// Maximum buyer age (inclusive)
    #[arg(long, value_name = "AGE")]
    pub max_age: Option<u32>,

    /// Only international (yes) or national (no) orders
    #[arg(long, value_name = "YES|NO")]
    pub international: Option<InternationalArg>,

    /// Rows in the top/bottom product tables
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Age bin edges (comma-separated, strictly increasing)
    ///
    /// Example: --age-bins 18,21,24,27,30,33,36
    #[arg(long, value_name = "EDGES", value_delimiter = ',')]
    pub age_bins: Option<Vec<u32>>,

    /// Exit with code 2 if any row was rejected during load
    #[arg(long)]
    pub strict: bool,

    /// Accept a source with zero valid rows
    #[arg(long)]
    pub allow_empty: bool,

    /// Dry run: load and validate the file without writing a report
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .salesdash.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Value of --international.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InternationalArg {
    Yes,
    No,
}

impl From<InternationalArg> for ShippingScope {
    fn from(arg: InternationalArg) -> Self {
        match arg {
            InternationalArg::Yes => ShippingScope::International,
            InternationalArg::No => ShippingScope::Domestic,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err("Month must be between 1 and 12".to_string());
            }
        }

        if self.limit == Some(0) {
            return Err("Row limit must be at least 1".to_string());
        }

        if self.top == Some(0) {
            return Err("Top must be at least 1".to_string());
        }

        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(format!(
                    "--min-age ({}) cannot exceed --max-age ({})",
                    min, max
                ));
            }
        }

        if let Some(ref bins) = self.age_bins {
            if bins.len() < 2 || bins.windows(2).any(|w| w[0] >= w[1]) {
                return Err(
                    "Age bins need at least two strictly increasing edges".to_string(),
                );
            }
        }

        if let Some(ref data) = self.data {
            if data.is_dir() {
                return Err(format!("Data path is a directory: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Row filter built from the filter flags.
    pub fn filter(&self) -> OrderFilter {
        OrderFilter {
            year: self.year,
            month: self.month,
            categories: self.category.clone(),
            locations: self.location.clone(),
            genders: self.gender.clone(),
            products: self.product.clone(),
            min_age: self.min_age,
            max_age: self.max_age,
            international: self.international.map(ShippingScope::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["salesdash"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--data", "orders.csv"]);
        assert_eq!(args.format, OutputFormat::Markdown);
        assert!(args.output.is_none());
        assert!(args.filter().is_empty());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_filter_flags() {
        let args = parse(&[
            "--year",
            "2024",
            "--category",
            "Clothing,Ornaments",
            "--international",
            "yes",
            "--min-age",
            "20",
        ]);
        let filter = args.filter();
        assert_eq!(filter.year, Some(2024));
        assert_eq!(filter.categories, vec!["Clothing", "Ornaments"]);
        assert_eq!(filter.international, Some(ShippingScope::International));
        assert_eq!(filter.min_age, Some(20));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let args = parse(&["--verbose", "--quiet"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        assert!(parse(&["--month", "13"]).validate().is_err());
        assert!(parse(&["--limit", "0"]).validate().is_err());
        assert!(parse(&["--top", "0"]).validate().is_err());
        assert!(parse(&["--min-age", "40", "--max-age", "30"])
            .validate()
            .is_err());
        assert!(parse(&["--age-bins", "18,18,30"]).validate().is_err());
        assert!(parse(&["--age-bins", "18"]).validate().is_err());
        assert!(parse(&["--age-bins", "18,30,40"]).validate().is_ok());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let args = parse(&["--init-config", "--verbose", "--quiet"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&[]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}

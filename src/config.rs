//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.salesdash.toml` files.

use crate::analysis::DEFAULT_AGE_EDGES;
use crate::ingest::DEFAULT_DATE_FORMAT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".salesdash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Source data settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "sales_report.md".to_string()
}

/// Source file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Path of the orders CSV.
    #[serde(default = "default_data_path")]
    pub path: PathBuf,

    /// `chrono` format of the `Order Date` column.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Read at most this many data rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_limit: Option<usize>,

    /// Accept a load that yields zero valid rows.
    #[serde(default)]
    pub allow_empty: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            date_format: default_date_format(),
            row_limit: None,
            allow_empty: false,
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/merchandise-sales.csv")
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows in the top/bottom product tables.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Edges of the half-open buyer age bins.
    #[serde(default = "default_age_bins")]
    pub age_bins: Vec<u32>,

    /// Rejected rows listed individually in the report.
    #[serde(default = "default_max_rejections")]
    pub max_rejections_listed: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            age_bins: default_age_bins(),
            max_rejections_listed: default_max_rejections(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_age_bins() -> Vec<u32> {
    DEFAULT_AGE_EDGES.to_vec()
}

fn default_max_rejections() -> usize {
    20
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when the CLI provides an explicit value.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.data.path = data.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref date_format) = args.date_format {
            self.data.date_format = date_format.clone();
        }
        if let Some(limit) = args.limit {
            self.data.row_limit = Some(limit);
        }
        if args.allow_empty {
            self.data.allow_empty = true;
        }

        if let Some(top) = args.top {
            self.report.top_n = top;
        }
        if let Some(ref bins) = args.age_bins {
            self.report.age_bins = bins.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

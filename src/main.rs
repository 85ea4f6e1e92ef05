//! Salesdash - sales order aggregation and dashboard reports
//!
//! A CLI tool that loads a sales orders CSV, aggregates it into KPIs,
//! time series, rankings and segmentations, and writes a Markdown or
//! JSON report for a dashboard front end.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing columns, unreadable file, bad config, no rows)
//!   2 - Rows were rejected and --strict was set

mod analysis;
mod cli;
mod config;
mod engine;
mod error;
mod ingest;
mod models;
mod report;

use analysis::AgeBins;
use anyhow::{bail, Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use engine::SalesSnapshot;
use ingest::{LoadOptions, LoadOutcome, OPTIONAL_COLUMNS, REQUIRED_COLUMNS};
use models::KeyField;
use report::ReportSettings;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Where the effective configuration came from.
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    Defaults,
    /// The default file exists but could not be used.
    Ignored(String),
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let (config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("Salesdash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    log_config_origin(&origin);

    match run(args, config) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .salesdash.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        bail!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the data path, date format, and report tables.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` overrides.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::Defaults)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Ignored(format!("{:#}", e)))),
    }
}

fn log_config_origin(origin: &ConfigOrigin) {
    match origin {
        ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
        ConfigOrigin::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
        ConfigOrigin::Defaults => debug!("No config file found, using defaults"),
        ConfigOrigin::Ignored(reason) => warn!("Failed to load config: {}", reason),
    }
}

/// Run the load-aggregate-report workflow. Returns exit code (0 or 2).
fn run(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.merge_with_args(&args);

    let data_path = config.data.path.clone();
    let options = LoadOptions {
        show_progress: !args.quiet,
        ..LoadOptions::from(&config.data)
    };

    // Step 1: Load the source file
    println!("📥 Loading orders: {}", data_path.display());
    let outcome = ingest::load_path(&data_path, &options)
        .with_context(|| format!("Failed to load {}", data_path.display()))?;

    let rejected_count = outcome.rejected.len();

    // Handle --dry-run: report what was loaded and exit
    if args.dry_run {
        handle_dry_run(&outcome, config.report.max_rejections_listed);
        return Ok(strict_exit_code(args.strict, rejected_count));
    }

    if outcome.table.is_empty() && !config.data.allow_empty {
        bail!(
            "No valid rows loaded from {} ({} rejected). Use --allow-empty to accept an empty table.",
            data_path.display(),
            rejected_count
        );
    }

    // Step 2: Build the snapshot every query reads from
    let snapshot = SalesSnapshot::from_outcome(data_path.display().to_string(), outcome);

    let settings = ReportSettings {
        top_n: config.report.top_n,
        age_bins: AgeBins::new(config.report.age_bins.clone())
            .context("Age bins need at least two strictly increasing edges")?,
        max_rejections_listed: config.report.max_rejections_listed,
    };

    // Step 3: Aggregate
    println!("📊 Aggregating...");
    let filter = args.filter();
    if !filter.is_empty() {
        println!("   Filter: {}", filter.describe());
    }
    let dashboard = report::build_dashboard(&snapshot, &filter, &settings);

    // Step 4: Write the report
    let output = output_path(&config.general.output, args.output.is_some(), args.format);
    let written = match args.format {
        OutputFormat::Markdown => report::write_markdown_report(&dashboard, &output),
        OutputFormat::Json => report::generate_json_report(&dashboard).and_then(|json| {
            std::fs::write(&output, json).map_err(Into::into)
        }),
    };
    written.with_context(|| format!("Failed to write report to {}", output.display()))?;

    // Print summary
    let duration = start_time.elapsed().as_secs_f64();
    println!("\n📈 Summary:");
    println!(
        "   Rows loaded: {} | Rejected: {} | In view: {}",
        dashboard.metadata.rows_loaded, rejected_count, dashboard.metadata.rows_in_view
    );
    if let Some(total) = dashboard
        .kpis
        .iter()
        .find(|k| k.label == "Total Sales")
        .and_then(|k| k.value)
    {
        println!("   Total sales: {:.2}", total);
    }
    println!(
        "   Months covered: {}",
        dashboard.sales_over_time.points.len()
    );
    println!("   Duration: {:.2}s", duration);
    println!("\n✅ Report saved to: {}", output.display());

    Ok(strict_exit_code(args.strict, rejected_count))
}

/// Exit code 2 when --strict is set and rows were rejected.
fn strict_exit_code(strict: bool, rejected: usize) -> i32 {
    if strict && rejected > 0 {
        eprintln!(
            "\n⛔ {} row(s) rejected and --strict is set. Failing (exit code 2).",
            rejected
        );
        2
    } else {
        0
    }
}

/// Pick the report path; a defaulted `.md` path becomes `.json` for JSON output.
fn output_path(configured: &str, explicit: bool, format: OutputFormat) -> PathBuf {
    let path = PathBuf::from(configured);
    if !explicit && format == OutputFormat::Json && path.extension().is_some_and(|e| e == "md") {
        path.with_extension("json")
    } else {
        path
    }
}

/// Handle --dry-run: print the load summary, write nothing.
fn handle_dry_run(outcome: &LoadOutcome, max_listed: usize) {
    println!("\n🔍 Dry run: load summary (no report written)...\n");

    println!("   Columns ({}):", outcome.headers.len());
    for column in REQUIRED_COLUMNS.iter().chain(OPTIONAL_COLUMNS.iter()) {
        let present = outcome
            .headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(column));
        let marker = if present { "✔" } else { "·" };
        println!("     {} {}", marker, column);
    }

    println!("\n   Rows read: {}", outcome.rows_read());
    println!("   Accepted:  {}", outcome.table.len());
    println!("   Rejected:  {}", outcome.rejected.len());

    for row in outcome.rejected.iter().take(max_listed) {
        println!("     ❌ {}", row);
    }
    if outcome.rejected.len() > max_listed {
        println!("     ...and {} more", outcome.rejected.len() - max_listed);
    }

    let categories = outcome.table.distinct_values(KeyField::ProductCategory);
    let locations = outcome.table.distinct_values(KeyField::OrderLocation);
    println!(
        "\n   Categories: {} | Locations: {}",
        categories.len(),
        locations.len()
    );
    if !categories.is_empty() {
        println!("     {}", categories.join(", "));
    }

    if let Some(first) = outcome.table.records().first() {
        println!(
            "\n   First row: {} | {} | {} | {:.2}",
            first.order_date, first.product_id, first.product_category, first.total_sales
        );
    }

    println!("\n✅ Dry run complete.");
}

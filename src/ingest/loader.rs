//! CSV loading for order records.
//!
//! Reads a comma-delimited file with a header row into an
//! [`OrderTable`]. Missing required columns abort the load; a row that
//! fails to coerce is rejected and reported, and loading continues.

use crate::error::{EngineError, RowError};
use crate::ingest::locale::parse_locale_decimal;
use crate::models::{OrderRecord, OrderTable, ShippingScope};
use chrono::NaiveDate;
use csv::StringRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Columns every source file must carry.
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "Order Date",
    "Product ID",
    "Product Category",
    "Sales Price",
    "Quantity",
    "Total Sales",
    "Shipping Charges",
    "International Shipping",
    "Buyer Age",
    "Buyer Gender",
    "Order Location",
    "Latitude",
    "Longitude",
];

/// Columns read when present.
pub const OPTIONAL_COLUMNS: [&str; 2] = ["Order ID", "Rating"];

/// Default `Order Date` format (day/month/year).
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Options controlling a load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// `chrono` format string for the `Order Date` column.
    pub date_format: String,
    /// Stop after this many data rows (accepted or rejected).
    pub row_limit: Option<usize>,
    /// Show a progress spinner while reading.
    pub show_progress: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            row_limit: None,
            show_progress: false,
        }
    }
}

impl From<&crate::config::DataConfig> for LoadOptions {
    fn from(config: &crate::config::DataConfig) -> Self {
        Self {
            date_format: config.date_format.clone(),
            row_limit: config.row_limit,
            show_progress: false,
        }
    }
}

/// Result of a load: the accepted rows plus every rejected one.
#[derive(Debug)]
pub struct LoadOutcome {
    /// Successfully parsed rows, in source order.
    pub table: OrderTable,
    /// Rows that failed coercion, in source order.
    pub rejected: Vec<RowError>,
    /// Header row as read from the source.
    pub headers: Vec<String>,
}

impl LoadOutcome {
    /// Number of data rows read (accepted + rejected).
    pub fn rows_read(&self) -> usize {
        self.table.len() + self.rejected.len()
    }
}

/// Column positions resolved from the header row.
#[derive(Debug)]
struct ColumnIndex {
    order_id: Option<usize>,
    order_date: usize,
    product_id: usize,
    product_category: usize,
    sales_price: usize,
    quantity: usize,
    total_sales: usize,
    shipping_charges: usize,
    international_shipping: usize,
    buyer_age: usize,
    buyer_gender: usize,
    order_location: usize,
    latitude: usize,
    longitude: usize,
    rating: Option<usize>,
}

impl ColumnIndex {
    /// Resolve columns case-insensitively, ignoring surrounding whitespace.
    fn resolve(headers: &[String]) -> Result<Self, EngineError> {
        let find = |name: &str| -> Option<usize> {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(**name).is_none())
            .map(|name| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(EngineError::Schema { missing });
        }

        let required = |name: &str| find(name).unwrap_or_default();

        Ok(Self {
            order_id: find("Order ID"),
            order_date: required("Order Date"),
            product_id: required("Product ID"),
            product_category: required("Product Category"),
            sales_price: required("Sales Price"),
            quantity: required("Quantity"),
            total_sales: required("Total Sales"),
            shipping_charges: required("Shipping Charges"),
            international_shipping: required("International Shipping"),
            buyer_age: required("Buyer Age"),
            buyer_gender: required("Buyer Gender"),
            order_location: required("Order Location"),
            latitude: required("Latitude"),
            longitude: required("Longitude"),
            rating: find("Rating"),
        })
    }
}

/// Load order records from a file path.
pub fn load_path(path: &Path, options: &LoadOptions) -> Result<LoadOutcome, EngineError> {
    info!("Loading orders from: {}", path.display());
    let file = File::open(path)?;
    load(file, options)
}

/// Load order records from any reader producing CSV text.
pub fn load<R: Read>(source: R, options: &LoadOptions) -> Result<LoadOutcome, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{FEFF}').trim().to_string())
        .collect();

    debug!("CSV headers: {:?}", headers);

    let columns = ColumnIndex::resolve(&headers)?;

    if columns.rating.is_none() {
        debug!("No Rating column; ratings will be absent");
    }

    let progress = if options.show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} rows read")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut records = Vec::new();
    let mut rejected = Vec::new();
    let mut rows_read = 0usize;

    for result in reader.records() {
        if options.row_limit.is_some_and(|limit| rows_read >= limit) {
            debug!("Row limit of {} reached", rows_read);
            break;
        }
        rows_read += 1;

        // Header is line 1, so the n-th data row defaults to line n + 1.
        let fallback_line = rows_read as u64 + 1;

        let outcome = match result {
            Ok(row) => {
                let line = row.position().map_or(fallback_line, |p| p.line());
                parse_row(&row, &columns, &options.date_format)
                    .map_err(|error| RowError { line, error })
            }
            Err(e) => {
                let line = e.position().map_or(fallback_line, |p| p.line());
                Err(RowError {
                    line,
                    error: EngineError::from(e),
                })
            }
        };

        match outcome {
            Ok(record) => records.push(record),
            Err(row_error) => {
                warn!("Rejected row: {}", row_error);
                rejected.push(row_error);
            }
        }

        if rows_read % 256 == 0 {
            progress.set_position(rows_read as u64);
        }
    }

    progress.set_position(rows_read as u64);
    progress.finish_and_clear();

    info!(
        "Loaded {} rows ({} rejected)",
        records.len(),
        rejected.len()
    );

    Ok(LoadOutcome {
        table: OrderTable::new(records),
        rejected,
        headers,
    })
}

/// Coerce one CSV row into an [`OrderRecord`].
fn parse_row(
    row: &StringRecord,
    columns: &ColumnIndex,
    date_format: &str,
) -> Result<OrderRecord, EngineError> {
    let cell = |idx: usize| row.get(idx).unwrap_or("").trim();

    let text = |idx: usize| cell(idx).to_string();

    let decimal = |idx: usize, column: &str| -> Result<f64, EngineError> {
        let raw = cell(idx);
        parse_locale_decimal(raw).map_err(|reason| EngineError::parse(column, raw, reason))
    };

    let integer = |idx: usize, column: &str| -> Result<u32, EngineError> {
        let raw = cell(idx);
        raw.parse::<u32>()
            .map_err(|e| EngineError::parse(column, raw, e.to_string()))
    };

    let raw_date = cell(columns.order_date);
    let order_date = NaiveDate::parse_from_str(raw_date, date_format).map_err(|e| {
        EngineError::parse(
            "Order Date",
            raw_date,
            format!("{} (expected {})", e, date_format),
        )
    })?;

    let raw_scope = cell(columns.international_shipping);
    let international_shipping: ShippingScope = raw_scope
        .parse()
        .map_err(|reason: String| EngineError::parse("International Shipping", raw_scope, reason))?;

    let rating = match columns.rating {
        Some(idx) if !cell(idx).is_empty() => Some(decimal(idx, "Rating")?),
        _ => None,
    };

    let order_id = columns
        .order_id
        .map(|idx| text(idx))
        .filter(|id| !id.is_empty());

    Ok(OrderRecord {
        order_id,
        order_date,
        product_id: text(columns.product_id),
        product_category: text(columns.product_category),
        sales_price: decimal(columns.sales_price, "Sales Price")?,
        quantity: integer(columns.quantity, "Quantity")?,
        total_sales: decimal(columns.total_sales, "Total Sales")?,
        shipping_charges: decimal(columns.shipping_charges, "Shipping Charges")?,
        international_shipping,
        buyer_age: integer(columns.buyer_age, "Buyer Age")?,
        buyer_gender: text(columns.buyer_gender),
        order_location: text(columns.order_location),
        latitude: decimal(columns.latitude, "Latitude")?,
        longitude: decimal(columns.longitude, "Longitude")?,
        rating,
    })
}

//! Assembles every dashboard dataset from a snapshot.
//!
//! The output is plain data for a presentation layer; nothing here
//! knows about charts or layout.

use crate::analysis::{
    bucket_by, bucket_by_month, compute_kpis, geo_points, mean_by, month_over_month,
    orders_per_calendar_month, percent_of_total, profile, sales_by_age_group_and_gender,
    series_mean, top_n, total_by, total_by_key_and_month, AgeBins, ColumnProfile,
    ExcludedBuyer, GeoPoint, Kpi, PeriodChange,
};
use crate::engine::SalesSnapshot;
use crate::error::RejectedRow;
use crate::models::{
    Direction, Granularity, KeyField, MetricField, OrderFilter, OrderTable, Period, ShippingScope,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Knobs for report assembly.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Rows in ranked tables (top/bottom products).
    pub top_n: usize,
    pub age_bins: AgeBins,
    /// Rejected rows listed individually; the rest are only counted.
    pub max_rejections_listed: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_n: 10,
            age_bins: AgeBins::default(),
            max_rejections_listed: 20,
        }
    }
}

/// Metadata about the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Path or label of the source file.
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub rows_loaded: usize,
    pub rows_rejected: usize,
    /// Rows left after filtering.
    pub rows_in_view: usize,
    pub filter: OrderFilter,
    pub first_order_date: Option<NaiveDate>,
    pub last_order_date: Option<NaiveDate>,
}

/// A label with its aggregated value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: f64,
}

impl From<(String, f64)> for LabeledValue {
    fn from((label, value): (String, f64)) -> Self {
        Self { label, value }
    }
}

/// Monthly sales with period-over-period change.
#[derive(Debug, Clone, Serialize)]
pub struct SalesOverTime {
    pub points: Vec<PeriodChange>,
    /// Mean of the monthly totals.
    pub average: Option<f64>,
}

/// Category total and its share of all sales.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub total_sales: f64,
    pub share_percent: Option<f64>,
}

/// Category total within one month.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryMonth {
    pub category: String,
    pub period: Period,
    pub total_sales: f64,
}

/// Per-product sales, quantity and average unit price.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub product_id: String,
    pub total_sales: f64,
    pub quantity: f64,
    pub average_price: Option<f64>,
}

/// Sales for one (age group, gender) cell.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentRow {
    pub age_group: String,
    pub gender: String,
    pub total_sales: f64,
}

/// Orders placed in one month of the year, across all years.
#[derive(Debug, Clone, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub orders: usize,
}

/// Everything a dashboard front end needs, in one serializable value.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub kpis: Vec<Kpi>,
    pub sales_over_time: SalesOverTime,
    pub international_sales_by_year: Vec<LabeledValue>,
    pub sales_by_category: Vec<CategoryShare>,
    pub category_by_month: Vec<CategoryMonth>,
    pub top_products: Vec<ProductSummary>,
    pub bottom_products: Vec<ProductSummary>,
    pub sales_by_location: Vec<LabeledValue>,
    pub shipping_charges: Vec<LabeledValue>,
    pub age_gender: Vec<SegmentRow>,
    pub excluded_buyers: Vec<ExcludedBuyer>,
    pub orders_by_month: Vec<MonthCount>,
    pub geo_points: Vec<GeoPoint>,
    pub profile: Vec<ColumnProfile>,
    pub rejected_rows: Vec<RejectedRow>,
}

/// Build the dashboard report for the rows of `snapshot` matching `filter`.
pub fn build_dashboard(
    snapshot: &SalesSnapshot,
    filter: &OrderFilter,
    settings: &ReportSettings,
) -> DashboardReport {
    let view = snapshot.view(filter);
    let table: &OrderTable = &view;

    debug!(
        "Building dashboard over {} of {} rows (filter: {})",
        table.len(),
        snapshot.table().len(),
        filter.describe()
    );

    let metadata = ReportMetadata {
        source: snapshot.source().to_string(),
        generated_at: Utc::now(),
        rows_loaded: snapshot.table().len(),
        rows_rejected: snapshot.rejected().len(),
        rows_in_view: table.len(),
        filter: filter.clone(),
        first_order_date: table.iter().map(|r| r.order_date).min(),
        last_order_date: table.latest_order_date(),
    };

    let monthly = bucket_by_month(table, MetricField::TotalSales);
    let sales_over_time = SalesOverTime {
        average: series_mean(&monthly),
        points: month_over_month(&monthly),
    };

    let international = table.select(|r| r.international_shipping == ShippingScope::International);
    let international_sales_by_year = bucket_by(&international, Granularity::Year, MetricField::TotalSales)
        .into_iter()
        .map(|(period, value)| LabeledValue {
            label: period.to_string(),
            value,
        })
        .collect();

    let by_category = total_by(table, KeyField::ProductCategory, MetricField::TotalSales).sorted_by_key();
    let category_total = by_category.total();
    let sales_by_category = by_category
        .into_entries()
        .into_iter()
        .map(|(category, total_sales)| CategoryShare {
            share_percent: percent_of_total(total_sales, category_total),
            category,
            total_sales,
        })
        .collect();

    let category_by_month = total_by_key_and_month(table, KeyField::ProductCategory, MetricField::TotalSales)
        .into_entries()
        .into_iter()
        .map(|((category, period), total_sales)| CategoryMonth {
            category,
            period,
            total_sales,
        })
        .collect();

    let (top_products, bottom_products) = product_rankings(table, settings.top_n);

    let sales_by_location = total_by(table, KeyField::OrderLocation, MetricField::TotalSales)
        .sorted_by_value(Direction::Largest)
        .into_entries()
        .into_iter()
        .map(LabeledValue::from)
        .collect();

    let shipping_charges = total_by(table, KeyField::ShippingCharges, MetricField::ShippingCharges)
        .sorted_by_value(Direction::Largest)
        .into_entries()
        .into_iter()
        .map(LabeledValue::from)
        .collect();

    let segmentation = sales_by_age_group_and_gender(table, &settings.age_bins);
    let age_gender = segmentation
        .result
        .into_entries()
        .into_iter()
        .map(|((age_group, gender), total_sales)| SegmentRow {
            age_group,
            gender,
            total_sales,
        })
        .collect();

    let orders_by_month = orders_per_calendar_month(table)
        .iter()
        .zip(MONTH_NAMES)
        .map(|(&orders, month)| MonthCount {
            month: month.to_string(),
            orders,
        })
        .collect();

    let rejected_rows = snapshot
        .rejected()
        .iter()
        .take(settings.max_rejections_listed)
        .cloned()
        .collect();

    DashboardReport {
        metadata,
        kpis: compute_kpis(table),
        sales_over_time,
        international_sales_by_year,
        sales_by_category,
        category_by_month,
        top_products,
        bottom_products,
        sales_by_location,
        shipping_charges,
        age_gender,
        excluded_buyers: segmentation.excluded,
        orders_by_month,
        geo_points: geo_points(table),
        profile: profile(table),
        rejected_rows,
    }
}

/// Top and bottom `n` products by total sales.
fn product_rankings(table: &OrderTable, n: usize) -> (Vec<ProductSummary>, Vec<ProductSummary>) {
    let sales = total_by(table, KeyField::ProductId, MetricField::TotalSales);
    let quantity = total_by(table, KeyField::ProductId, MetricField::Quantity);
    let avg_price = mean_by(table, KeyField::ProductId, MetricField::SalesPrice);

    let summarize = |ranked: Vec<(String, f64)>| -> Vec<ProductSummary> {
        ranked
            .into_iter()
            .map(|(product_id, total_sales)| ProductSummary {
                quantity: quantity.get(&product_id).unwrap_or_default(),
                average_price: avg_price.get(&product_id),
                product_id,
                total_sales,
            })
            .collect()
    };

    (
        summarize(top_n(&sales, n, Direction::Largest)),
        summarize(top_n(&sales, n, Direction::Smallest)),
    )
}

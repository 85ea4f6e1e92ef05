//! Markdown and JSON rendering of dashboard reports.
//!
//! Markdown output is a set of tables, one per dashboard dataset.
//! Undefined values render as `N/A`.

use crate::analysis::{Kpi, KpiUnit};
use crate::report::dashboard::{DashboardReport, LabeledValue, ProductSummary, ReportMetadata};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &DashboardReport) -> String {
    let mut output = String::new();

    output.push_str("# Sales Dashboard\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_kpi_section(&report.kpis));
    output.push_str(&generate_sales_over_time_section(report));
    output.push_str(&generate_category_section(report));
    output.push_str(&generate_products_section(
        "Top Products",
        &report.top_products,
    ));
    output.push_str(&generate_products_section(
        "Bottom Products",
        &report.bottom_products,
    ));
    output.push_str(&generate_value_table(
        "Sales by Location",
        "Location",
        "Total Sales",
        &report.sales_by_location,
    ));
    output.push_str(&generate_value_table(
        "Shipping Charges",
        "Charge",
        "Total Charges",
        &report.shipping_charges,
    ));
    output.push_str(&generate_value_table(
        "International Sales by Year",
        "Year",
        "Total Sales",
        &report.international_sales_by_year,
    ));
    output.push_str(&generate_segment_section(report));
    output.push_str(&generate_orders_by_month_section(report));
    output.push_str(&generate_geo_section(report));
    output.push_str(&generate_profile_section(report));
    output.push_str(&generate_rejections_section(report));

    output.push_str(&generate_footer());

    output
}

/// Format an optional number, `N/A` when undefined.
fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "N/A".to_string(),
    }
}

/// Format an optional percentage, `N/A` when undefined.
fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => "N/A".to_string(),
    }
}

/// Format a currency amount with thousands separators, e.g. `$12,345`.
fn fmt_currency(value: f64) -> String {
    let rounded = value.round().abs() as u64;
    let digits = rounded.to_string();
    let mut grouped = String::new();

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0.0 && rounded > 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Escape a table cell so a `|` in source data cannot split the row.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn fmt_kpi_value(kpi: &Kpi) -> String {
    match (kpi.unit, kpi.value) {
        (_, None) => "N/A".to_string(),
        (KpiUnit::Currency, Some(v)) => fmt_currency(v),
        (KpiUnit::Count, Some(v)) => format!("{:.0}", v),
        (KpiUnit::Score, Some(v)) => format!("{:.2}", v),
    }
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Rows Loaded:** {}\n", metadata.rows_loaded));
    if metadata.rows_rejected > 0 {
        section.push_str(&format!(
            "- **Rows Rejected:** {}\n",
            metadata.rows_rejected
        ));
    }
    section.push_str(&format!("- **Filter:** {}\n", metadata.filter.describe()));
    section.push_str(&format!("- **Rows in View:** {}\n", metadata.rows_in_view));
    if let (Some(first), Some(last)) = (metadata.first_order_date, metadata.last_order_date) {
        section.push_str(&format!("- **Order Dates:** {} to {}\n", first, last));
    }
    section.push('\n');

    section
}

/// Generate the KPI section.
fn generate_kpi_section(kpis: &[Kpi]) -> String {
    let mut section = String::new();

    section.push_str("## Key Performance Indicators\n\n");
    section.push_str("| KPI | Value | Last Month Share |\n");
    section.push_str("|:---|---:|---:|\n");

    for kpi in kpis {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            kpi.label,
            fmt_kpi_value(kpi),
            fmt_pct(kpi.delta_percent)
        ));
    }
    section.push('\n');

    section
}

/// Generate the monthly sales section.
fn generate_sales_over_time_section(report: &DashboardReport) -> String {
    let series = &report.sales_over_time;
    let mut section = String::new();

    section.push_str("## Total Sales Over Time\n\n");

    if series.points.is_empty() {
        section.push_str("No orders in view.\n\n");
        return section;
    }

    section.push_str("| Month | Total Sales | MoM Change |\n");
    section.push_str("|:---|---:|---:|\n");
    for point in &series.points {
        section.push_str(&format!(
            "| {} | {:.2} | {} |\n",
            point.period.short_label(),
            point.value,
            fmt_pct(point.change_percent)
        ));
    }
    section.push_str(&format!(
        "\n*Average monthly sales: {}*\n\n",
        fmt_opt(series.average, 2)
    ));

    section
}

/// Generate the category section.
fn generate_category_section(report: &DashboardReport) -> String {
    let mut section = String::new();

    section.push_str("## Sales by Category\n\n");
    section.push_str("| Category | Total Sales | Share |\n");
    section.push_str("|:---|---:|---:|\n");
    for share in &report.sales_by_category {
        section.push_str(&format!(
            "| {} | {:.2} | {} |\n",
            escape_cell(&share.category),
            share.total_sales,
            fmt_pct(share.share_percent)
        ));
    }
    section.push('\n');

    if !report.category_by_month.is_empty() {
        section.push_str("### Category Sales by Month\n\n");
        section.push_str("| Category | Month | Total Sales |\n");
        section.push_str("|:---|:---|---:|\n");
        for row in &report.category_by_month {
            section.push_str(&format!(
                "| {} | {} | {:.2} |\n",
                escape_cell(&row.category),
                row.period,
                row.total_sales
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate a product ranking table.
fn generate_products_section(title: &str, products: &[ProductSummary]) -> String {
    if products.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    section.push_str("| Product | Total Sales | Quantity | Avg Price |\n");
    section.push_str("|:---|---:|---:|---:|\n");
    for product in products {
        section.push_str(&format!(
            "| {} | {:.2} | {:.0} | {} |\n",
            escape_cell(&product.product_id),
            product.total_sales,
            product.quantity,
            fmt_opt(product.average_price, 2)
        ));
    }
    section.push('\n');

    section
}

/// Generate a two-column label/value table.
fn generate_value_table(title: &str, label: &str, value: &str, rows: &[LabeledValue]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    section.push_str(&format!("| {} | {} |\n", label, value));
    section.push_str("|:---|---:|\n");
    for row in rows {
        section.push_str(&format!("| {} | {:.2} |\n", escape_cell(&row.label), row.value));
    }
    section.push('\n');

    section
}

/// Generate the age/gender section, including excluded buyers.
fn generate_segment_section(report: &DashboardReport) -> String {
    let mut section = String::new();

    section.push_str("## Sales by Age Group and Gender\n\n");
    if report.age_gender.is_empty() {
        section.push_str("No buyers fall within the configured age bins.\n\n");
    } else {
        section.push_str("| Age Group | Gender | Total Sales |\n");
        section.push_str("|:---|:---|---:|\n");
        for row in &report.age_gender {
            section.push_str(&format!(
                "| {} | {} | {:.2} |\n",
                row.age_group,
                escape_cell(&row.gender),
                row.total_sales
            ));
        }
        section.push('\n');
    }

    if !report.excluded_buyers.is_empty() {
        section.push_str(&format!(
            "> {} row(s) excluded: buyer age outside every bin.\n\n",
            report.excluded_buyers.len()
        ));
    }

    section
}

/// Generate the order histogram section.
fn generate_orders_by_month_section(report: &DashboardReport) -> String {
    let mut section = String::new();

    section.push_str("## Orders by Month of Year\n\n");
    section.push_str("| Month | Orders |\n");
    section.push_str("|:---|---:|\n");
    for row in &report.orders_by_month {
        section.push_str(&format!("| {} | {} |\n", row.month, row.orders));
    }
    section.push('\n');

    section
}

/// Generate the per-location coordinates section.
fn generate_geo_section(report: &DashboardReport) -> String {
    if report.geo_points.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Sales Map Points\n\n");
    section.push_str("| Location | Latitude | Longitude | Orders | Total Sales |\n");
    section.push_str("|:---|---:|---:|---:|---:|\n");
    for point in &report.geo_points {
        section.push_str(&format!(
            "| {} | {:.4} | {:.4} | {} | {:.2} |\n",
            escape_cell(&point.location),
            point.latitude,
            point.longitude,
            point.orders,
            point.total_sales
        ));
    }
    section.push('\n');

    section
}

/// Generate the column profiling section.
fn generate_profile_section(report: &DashboardReport) -> String {
    let mut section = String::new();

    section.push_str("## Profiling\n\n");
    section.push_str("| Column | Count | Mean | Std | Min | Max |\n");
    section.push_str("|:---|---:|---:|---:|---:|---:|\n");
    for p in &report.profile {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            p.column,
            p.count,
            fmt_opt(p.mean, 2),
            fmt_opt(p.std, 2),
            fmt_opt(p.min, 2),
            fmt_opt(p.max, 2)
        ));
    }
    section.push('\n');

    section
}

/// Generate the rejected rows section.
fn generate_rejections_section(report: &DashboardReport) -> String {
    if report.metadata.rows_rejected == 0 {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Rejected Rows\n\n");
    if !report.rejected_rows.is_empty() {
        section.push_str("| Line | Kind | Reason |\n");
        section.push_str("|---:|:---|:---|\n");
        for row in &report.rejected_rows {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                row.line,
                row.kind,
                escape_cell(&row.message)
            ));
        }
        section.push('\n');
    }

    let unlisted = report
        .metadata
        .rows_rejected
        .saturating_sub(report.rejected_rows.len());
    if unlisted > 0 {
        section.push_str(&format!("*...and {} more.*\n\n", unlisted));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by salesdash*\n".to_string()
}

/// Write the Markdown report to a file.
pub fn write_markdown_report(report: &DashboardReport, path: &Path) -> Result<()> {
    let content = generate_markdown_report(report);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SalesSnapshot;
    use crate::error::RejectedRow;
    use crate::models::{test_record, OrderFilter, OrderTable};
    use crate::report::dashboard::{build_dashboard, ReportSettings};
    use std::sync::Arc;

    fn create_test_report() -> DashboardReport {
        let mut outside = test_record("2024-02-20", "B", 50.0);
        outside.buyer_age = 70;
        let table = OrderTable::new(vec![test_record("2024-01-15", "A", 1234.5), outside]);
        let rejected = vec![
            RejectedRow {
                line: 4,
                kind: "parse".to_string(),
                message: "cannot parse Order Date value \"x|y\"".to_string(),
            },
            RejectedRow {
                line: 5,
                kind: "csv".to_string(),
                message: "malformed".to_string(),
            },
        ];
        let snapshot = SalesSnapshot::new("orders.csv", Arc::new(table), rejected);
        let settings = ReportSettings {
            max_rejections_listed: 1,
            ..Default::default()
        };
        build_dashboard(&snapshot, &OrderFilter::default(), &settings)
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Sales Dashboard"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Key Performance Indicators"));
        assert!(markdown.contains("| Total Sales | $1,285 |"));
        assert!(markdown.contains("| Jan 24 | 1234.50 | N/A |"));
        assert!(markdown.contains("## Sales by Age Group and Gender"));
        assert!(markdown.contains("1 row(s) excluded"));
        assert!(markdown.contains("## Rejected Rows"));
        assert!(markdown.contains("x\\|y"));
        assert!(markdown.contains("*...and 1 more.*"));
    }

    #[test]
    fn test_undefined_values_render_as_na() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);
        // No ratings at all.
        assert!(markdown.contains("| Average Rating | N/A | N/A |"));
    }

    #[test]
    fn test_labels_with_pipes_are_escaped() {
        let mut record = test_record("2024-03-01", "Home|Garden", 10.0);
        record.product_id = "P|9".to_string();
        record.order_location = "Porto|Norte".to_string();
        record.buyer_gender = "F|M".to_string();
        let snapshot = SalesSnapshot::new("orders.csv", Arc::new(OrderTable::new(vec![record])), Vec::new());
        let report = build_dashboard(&snapshot, &OrderFilter::default(), &ReportSettings::default());
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("| Home\\|Garden | 10.00 | 100.00% |"));
        assert!(markdown.contains("| Home\\|Garden | 2024-03 | 10.00 |"));
        assert!(markdown.contains("| P\\|9 | 10.00 |"));
        assert!(markdown.contains("| Porto\\|Norte | 10.00 |"));
        assert!(markdown.contains("| 24-26 | F\\|M | 10.00 |"));
        assert!(!markdown.contains("| Home|Garden"));
        assert!(!markdown.contains("P|9"));
    }

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("plain"), "plain");
        assert_eq!(escape_cell("a|b|c"), "a\\|b\\|c");
    }

    #[test]
    fn test_fmt_currency() {
        assert_eq!(fmt_currency(0.0), "$0");
        assert_eq!(fmt_currency(999.4), "$999");
        assert_eq!(fmt_currency(1234567.0), "$1,234,567");
        assert_eq!(fmt_currency(-1500.0), "-$1,500");
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"kpis\""));
        assert!(json.contains("\"period\": \"2024-01\""));
        assert!(json.contains("\"change_percent\": null"));
    }

    #[test]
    fn test_write_markdown_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        write_markdown_report(&create_test_report(), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Sales Dashboard"));
    }
}

//! Headline KPIs with a delta against the latest month of orders.

use crate::analysis::aggregator::{count_distinct_orders, grand_total, mean, percent_of_total};
use crate::models::{MetricField, OrderTable, ShippingScope};
use chrono::Months;
use serde::Serialize;

/// How a KPI value should be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiUnit {
    Currency,
    Count,
    Score,
}

/// A single scalar summary metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub unit: KpiUnit,
    /// Value over the whole table; `None` when undefined (mean of nothing).
    pub value: Option<f64>,
    /// Value over the last-month window.
    pub last_month: Option<f64>,
    /// `last_month / value * 100`; `None` when undefined.
    pub delta_percent: Option<f64>,
}

type Measure = fn(&OrderTable) -> Option<f64>;

/// Rows dated within one calendar month of the latest order (inclusive).
pub fn last_month_window(table: &OrderTable) -> OrderTable {
    let Some(latest) = table.latest_order_date() else {
        return OrderTable::default();
    };

    match latest.checked_sub_months(Months::new(1)) {
        Some(cutoff) => table.select(|r| r.order_date >= cutoff),
        None => table.clone(),
    }
}

fn sum_scope(table: &OrderTable, scope: ShippingScope, metric: MetricField) -> f64 {
    table
        .iter()
        .filter(|r| r.international_shipping == scope)
        .filter_map(|r| metric.value_of(r))
        .sum()
}

fn count_scope(table: &OrderTable, scope: ShippingScope) -> f64 {
    table
        .iter()
        .filter(|r| r.international_shipping == scope)
        .count() as f64
}

fn measures() -> [(&'static str, KpiUnit, Measure); 9] {
    [
        ("Total Sales", KpiUnit::Currency, |t| {
            Some(grand_total(t, MetricField::TotalSales))
        }),
        ("Total International Sales", KpiUnit::Currency, |t| {
            Some(sum_scope(t, ShippingScope::International, MetricField::TotalSales))
        }),
        ("Total National Sales", KpiUnit::Currency, |t| {
            Some(sum_scope(t, ShippingScope::Domestic, MetricField::TotalSales))
        }),
        ("Total Shipping Charges", KpiUnit::Currency, |t| {
            Some(grand_total(t, MetricField::ShippingCharges))
        }),
        ("Distinct Orders", KpiUnit::Count, |t| {
            Some(count_distinct_orders(t) as f64)
        }),
        ("Total Quantity", KpiUnit::Count, |t| {
            Some(grand_total(t, MetricField::Quantity))
        }),
        ("Average Rating", KpiUnit::Score, |t| mean(t, MetricField::Rating)),
        ("Qty International Orders", KpiUnit::Count, |t| {
            Some(count_scope(t, ShippingScope::International))
        }),
        ("Qty National Orders", KpiUnit::Count, |t| {
            Some(count_scope(t, ShippingScope::Domestic))
        }),
    ]
}

/// Compute every headline KPI for `table`.
pub fn compute_kpis(table: &OrderTable) -> Vec<Kpi> {
    let window = last_month_window(table);

    measures()
        .into_iter()
        .map(|(label, unit, measure)| {
            let value = measure(table);
            let last_month = measure(&window);
            let delta_percent = value
                .zip(last_month)
                .and_then(|(total, recent)| percent_of_total(recent, total));

            Kpi {
                label: label.to_string(),
                unit,
                value,
                last_month,
                delta_percent,
            }
        })
        .collect()
}

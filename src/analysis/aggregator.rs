//! Grouped aggregation over order tables.
//!
//! Every function here is a pure function of its arguments: results are
//! newly allocated and the source table is never touched.

use crate::models::{
    AggregationResult, Direction, Granularity, KeyField, MetricField, OrderTable, Period,
};
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;

/// Sum `metric` grouped by `key`, one entry per distinct key.
///
/// Entries are in first-appearance order. Every row has a key (missing
/// order ids group under `(none)`), so the entries sum to [`grand_total`].
/// Rows without a metric value (no rating) do not contribute, and a key
/// whose rows all lack the metric is absent rather than zero.
pub fn total_by(table: &OrderTable, key: KeyField, metric: MetricField) -> AggregationResult<String> {
    AggregationResult::accumulate(
        table
            .iter()
            .filter_map(|r| metric.value_of(r).map(|value| (key.key_of(r), value))),
    )
}

/// Unfiltered sum of `metric` over the whole table.
pub fn grand_total(table: &OrderTable, metric: MetricField) -> f64 {
    table.iter().filter_map(|r| metric.value_of(r)).sum()
}

/// Arithmetic mean of `metric`; `None` when no row carries a value.
pub fn mean(table: &OrderTable, metric: MetricField) -> Option<f64> {
    let values: Vec<f64> = table.iter().filter_map(|r| metric.value_of(r)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean of `metric` grouped by `key`, in first-appearance order.
pub fn mean_by(table: &OrderTable, key: KeyField, metric: MetricField) -> AggregationResult<String> {
    let pairs: Vec<(String, f64)> = table
        .iter()
        .filter_map(|r| metric.value_of(r).map(|value| (key.key_of(r), value)))
        .collect();

    let sums = AggregationResult::accumulate(pairs.iter().cloned());
    let counts = AggregationResult::accumulate(pairs.into_iter().map(|(k, _)| (k, 1.0)));

    // Both passes see keys in the same order, so entries line up.
    AggregationResult::from_entries(
        sums.into_entries()
            .into_iter()
            .zip(counts.into_entries())
            .map(|((key, sum), (_, count))| (key, sum / count))
            .collect(),
    )
}

/// Number of distinct order ids. Rows without an id are not counted.
pub fn count_distinct_orders(table: &OrderTable) -> usize {
    table
        .iter()
        .filter_map(|r| r.order_id.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

/// `partial / total * 100`, or `None` when the ratio is undefined.
///
/// A zero (or non-finite) denominator yields `None`, never `0` or `NaN`.
pub fn percent_of_total(partial: f64, total: f64) -> Option<f64> {
    if total == 0.0 || !total.is_finite() || !partial.is_finite() {
        None
    } else {
        Some(partial / total * 100.0)
    }
}

/// The `n` largest or smallest entries; ties broken by key ascending.
pub fn top_n<K>(result: &AggregationResult<K>, n: usize, direction: Direction) -> Vec<(K, f64)>
where
    K: Clone + Eq + Hash + Ord,
{
    let mut ranked = result.clone().sorted_by_value(direction).into_entries();
    ranked.truncate(n);
    ranked
}

/// Sum `metric` per calendar bucket, in chronological order.
///
/// Buckets with no rows are omitted, not zero-filled: a gap in the
/// output means no orders fell in that period.
pub fn bucket_by(
    table: &OrderTable,
    granularity: Granularity,
    metric: MetricField,
) -> Vec<(Period, f64)> {
    AggregationResult::accumulate(table.iter().filter_map(|r| {
        let value = metric.value_of(r)?;
        Some((Period::containing(r.order_date, granularity), value))
    }))
    .sorted_by_key()
    .into_entries()
}

/// Sum `metric` per calendar month, in chronological order. Empty months are omitted.
pub fn bucket_by_month(table: &OrderTable, metric: MetricField) -> Vec<(Period, f64)> {
    bucket_by(table, Granularity::Month, metric)
}

/// Sum `metric` grouped by `key` and calendar month, sorted by (key, month).
pub fn total_by_key_and_month(
    table: &OrderTable,
    key: KeyField,
    metric: MetricField,
) -> AggregationResult<(String, Period)> {
    AggregationResult::accumulate(table.iter().filter_map(|r| {
        let month = Period::containing(r.order_date, Granularity::Month);
        metric.value_of(r).map(|value| ((key.key_of(r), month), value))
    }))
    .sorted_by_key()
}

/// One point of a bucketed series with its change against the previous point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodChange {
    pub period: Period,
    pub value: f64,
    /// Percent change from the previous non-empty bucket; `None` for the
    /// first bucket or when the previous value is zero.
    pub change_percent: Option<f64>,
}

/// Period-over-period change of a bucketed series.
///
/// Empty buckets are absent from the series, so each change is measured
/// against the previous non-empty bucket: with no February orders, March
/// is compared with January.
pub fn month_over_month(series: &[(Period, f64)]) -> Vec<PeriodChange> {
    let mut previous: Option<f64> = None;

    series
        .iter()
        .map(|&(period, value)| {
            let change_percent = previous.and_then(|prev| percent_of_total(value - prev, prev));
            previous = Some(value);
            PeriodChange {
                period,
                value,
                change_percent,
            }
        })
        .collect()
}

/// Mean bucket value of a series; `None` for an empty series.
pub fn series_mean(series: &[(Period, f64)]) -> Option<f64> {
    if series.is_empty() {
        None
    } else {
        Some(series.iter().map(|(_, v)| v).sum::<f64>() / series.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{test_record, MISSING_ORDER_ID};
    use chrono::NaiveDate;

    fn example_table() -> OrderTable {
        OrderTable::new(vec![
            test_record("2024-01-15", "A", 100.0),
            test_record("2024-02-20", "A", 50.0),
            test_record("2024-01-10", "B", 30.0),
        ])
    }

    fn month(year: i32, m: u32) -> Period {
        Period::containing(
            NaiveDate::from_ymd_opt(year, m, 1).unwrap(),
            Granularity::Month,
        )
    }

    #[test]
    fn test_total_by_category() {
        let result = total_by(&example_table(), KeyField::ProductCategory, MetricField::TotalSales);
        assert_eq!(
            result.entries(),
            &[("A".to_string(), 150.0), ("B".to_string(), 30.0)]
        );
    }

    #[test]
    fn test_total_by_is_additive() {
        let mut no_id = test_record("2024-03-05", "C", 20.0);
        no_id.order_id = None;
        no_id.shipping_charges = 4.5;
        no_id.buyer_age = 31;
        let mut records = example_table().records().to_vec();
        records.push(no_id);
        let table = OrderTable::new(records);

        let grand = grand_total(&table, MetricField::TotalSales);
        assert_eq!(grand, 200.0);
        for key in [
            KeyField::OrderId,
            KeyField::ProductId,
            KeyField::ProductCategory,
            KeyField::InternationalShipping,
            KeyField::BuyerGender,
            KeyField::OrderLocation,
            KeyField::ShippingCharges,
            KeyField::BuyerAge,
        ] {
            let total = total_by(&table, key, MetricField::TotalSales).total();
            assert!((total - grand).abs() < 1e-9, "{:?}: {} != {}", key, total, grand);
        }
        let star = total_by(&table, KeyField::All, MetricField::TotalSales);
        assert_eq!(star.get(&"*".to_string()), Some(grand));
    }

    #[test]
    fn test_total_by_groups_missing_order_ids() {
        let mut first = test_record("2024-01-15", "A", 100.0);
        first.order_id = None;
        let mut second = test_record("2024-01-16", "A", 25.0);
        second.order_id = None;
        let table = OrderTable::new(vec![first, second, test_record("2024-01-17", "A", 50.0)]);

        let result = total_by(&table, KeyField::OrderId, MetricField::TotalSales);
        assert_eq!(result.get(&MISSING_ORDER_ID.to_string()), Some(125.0));
        assert_eq!(result.get(&"A-2024-01-17".to_string()), Some(50.0));
        assert_eq!(result.total(), 175.0);
        // Distinct order counting still ignores rows without an id.
        assert_eq!(count_distinct_orders(&table), 1);
    }

    #[test]
    fn test_bucket_by_month() {
        let series = bucket_by_month(&example_table(), MetricField::TotalSales);
        let labels: Vec<(String, f64)> = series
            .iter()
            .map(|(p, v)| (p.to_string(), *v))
            .collect();
        assert_eq!(
            labels,
            vec![("2024-01".to_string(), 130.0), ("2024-02".to_string(), 50.0)]
        );
    }

    #[test]
    fn test_bucket_by_month_omits_empty_months_and_is_chronological() {
        let table = OrderTable::new(vec![
            test_record("2024-05-02", "A", 5.0),
            test_record("2023-12-31", "A", 1.0),
            test_record("2024-02-01", "A", 2.0),
        ]);
        let series = bucket_by_month(&table, MetricField::TotalSales);
        let periods: Vec<Period> = series.iter().map(|(p, _)| *p).collect();
        assert_eq!(periods, vec![month(2023, 12), month(2024, 2), month(2024, 5)]);
        assert!(periods.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bucket_by_year() {
        let table = OrderTable::new(vec![
            test_record("2024-05-02", "A", 5.0),
            test_record("2023-12-31", "A", 1.0),
            test_record("2024-02-01", "A", 2.0),
        ]);
        let series = bucket_by(&table, Granularity::Year, MetricField::TotalSales);
        let labels: Vec<(String, f64)> = series
            .iter()
            .map(|(p, v)| (p.to_string(), *v))
            .collect();
        assert_eq!(
            labels,
            vec![("2023".to_string(), 1.0), ("2024".to_string(), 7.0)]
        );
    }

    #[test]
    fn test_percent_of_total() {
        assert_eq!(percent_of_total(25.0, 200.0), Some(12.5));
        assert_eq!(percent_of_total(5.0, 0.0), None);
        assert_eq!(percent_of_total(0.0, 0.0), None);
        assert_eq!(percent_of_total(f64::NAN, 10.0), None);
    }

    #[test]
    fn test_top_n() {
        let result = AggregationResult::from_entries(vec![
            ("P3".to_string(), 10.0),
            ("P1".to_string(), 30.0),
            ("P2".to_string(), 10.0),
            ("P4".to_string(), 5.0),
        ]);

        let top = top_n(&result, 3, Direction::Largest);
        assert_eq!(
            top,
            vec![
                ("P1".to_string(), 30.0),
                ("P2".to_string(), 10.0),
                ("P3".to_string(), 10.0),
            ]
        );

        let bottom = top_n(&result, 2, Direction::Smallest);
        assert_eq!(bottom[0].0, "P4");
        assert_eq!(bottom[1].0, "P2");

        assert_eq!(top_n(&result, 10, Direction::Largest).len(), 4);
    }

    #[test]
    fn test_mean_by_and_mean() {
        let mut cheap = test_record("2024-01-01", "A", 10.0);
        cheap.product_id = "P1".to_string();
        let mut pricey = test_record("2024-01-02", "A", 30.0);
        pricey.product_id = "P1".to_string();
        let mut other = test_record("2024-01-03", "B", 7.0);
        other.product_id = "P2".to_string();
        let table = OrderTable::new(vec![cheap, pricey, other]);

        let result = mean_by(&table, KeyField::ProductId, MetricField::SalesPrice);
        assert_eq!(
            result.entries(),
            &[("P1".to_string(), 20.0), ("P2".to_string(), 7.0)]
        );

        // No row carries a rating.
        assert_eq!(mean(&table, MetricField::Rating), None);
        assert!(mean_by(&table, KeyField::ProductId, MetricField::Rating)
            .entries()
            .is_empty());
    }

    #[test]
    fn test_count_distinct_orders() {
        let mut a = test_record("2024-01-01", "A", 1.0);
        a.order_id = Some("1".to_string());
        let mut b = a.clone();
        b.product_id = "P2".to_string();
        let mut c = test_record("2024-01-01", "A", 1.0);
        c.order_id = None;
        let table = OrderTable::new(vec![a, b, c]);
        assert_eq!(count_distinct_orders(&table), 1);
    }

    #[test]
    fn test_total_by_key_and_month() {
        let result = total_by_key_and_month(
            &example_table(),
            KeyField::ProductCategory,
            MetricField::TotalSales,
        );
        assert_eq!(
            result.entries(),
            &[
                (("A".to_string(), month(2024, 1)), 100.0),
                (("A".to_string(), month(2024, 2)), 50.0),
                (("B".to_string(), month(2024, 1)), 30.0),
            ]
        );
    }

    #[test]
    fn test_month_over_month() {
        let series = vec![
            (month(2024, 1), 100.0),
            (month(2024, 2), 150.0),
            (month(2024, 3), 0.0),
            (month(2024, 4), 20.0),
        ];
        let changes = month_over_month(&series);
        assert_eq!(changes[0].change_percent, None);
        assert_eq!(changes[1].change_percent, Some(50.0));
        assert_eq!(changes[2].change_percent, Some(-100.0));
        // Previous bucket was zero.
        assert_eq!(changes[3].change_percent, None);

        assert_eq!(series_mean(&series), Some(67.5));
        assert_eq!(series_mean(&[]), None);
    }

    #[test]
    fn test_month_over_month_spans_empty_months() {
        let table = OrderTable::new(vec![
            test_record("2024-01-10", "A", 80.0),
            test_record("2024-03-02", "A", 100.0),
        ]);
        let changes = month_over_month(&bucket_by_month(&table, MetricField::TotalSales));

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].period, month(2024, 3));
        // March against January, no February bucket in between.
        assert_eq!(changes[1].change_percent, Some(25.0));
    }
}

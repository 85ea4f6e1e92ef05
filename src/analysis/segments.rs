//! Buyer segmentation, geographic rollups, and order histograms.

use crate::error::EngineError;
use crate::models::{AggregationResult, OrderTable};
use chrono::Datelike;
use serde::Serialize;
use std::collections::HashMap;

/// Default age bin edges: `[18,21) [21,24) ... [33,36)`.
pub const DEFAULT_AGE_EDGES: [u32; 7] = [18, 21, 24, 27, 30, 33, 36];

/// Half-open integer age bins defined by ascending edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeBins {
    edges: Vec<u32>,
}

impl Default for AgeBins {
    fn default() -> Self {
        Self {
            edges: DEFAULT_AGE_EDGES.to_vec(),
        }
    }
}

impl AgeBins {
    /// Build bins from edges; needs at least two strictly increasing edges.
    pub fn new(edges: Vec<u32>) -> Option<Self> {
        if edges.len() < 2 || edges.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        Some(Self { edges })
    }

    pub fn edges(&self) -> &[u32] {
        &self.edges
    }

    /// Labels of every bin in ascending order, e.g. `18-20`.
    pub fn labels(&self) -> Vec<String> {
        self.edges
            .windows(2)
            .map(|w| bin_label(w[0], w[1]))
            .collect()
    }
}

fn bin_label(lo: u32, hi: u32) -> String {
    format!("{}-{}", lo, hi - 1)
}

/// Map an age to its `[lo, hi)` bin label.
///
/// Ages outside every bin are an [`EngineError::OutOfRange`], never dropped.
pub fn age_group(age: u32, bins: &AgeBins) -> Result<String, EngineError> {
    bins.edges
        .windows(2)
        .find(|w| (w[0]..w[1]).contains(&age))
        .map(|w| bin_label(w[0], w[1]))
        .ok_or_else(|| EngineError::OutOfRange {
            value: i64::from(age),
            lower: i64::from(bins.edges[0]),
            upper: i64::from(bins.edges[bins.edges.len() - 1]),
        })
}

/// A row left out of an age segmentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedBuyer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub buyer_age: u32,
    pub reason: String,
}

/// Total sales per (age group, gender) plus the rows that fit no bin.
#[derive(Debug, Clone, Default)]
pub struct AgeGenderSegmentation {
    /// Sorted by age group descending, then gender ascending.
    pub result: AggregationResult<(String, String)>,
    pub excluded: Vec<ExcludedBuyer>,
}

/// Sum total sales by age group and buyer gender.
pub fn sales_by_age_group_and_gender(table: &OrderTable, bins: &AgeBins) -> AgeGenderSegmentation {
    let mut excluded = Vec::new();
    let mut pairs = Vec::with_capacity(table.len());

    for record in table {
        match age_group(record.buyer_age, bins) {
            Ok(group) => pairs.push(((group, record.buyer_gender.clone()), record.total_sales)),
            Err(e) => excluded.push(ExcludedBuyer {
                order_id: record.order_id.clone(),
                buyer_age: record.buyer_age,
                reason: e.to_string(),
            }),
        }
    }

    if !excluded.is_empty() {
        tracing::warn!(
            "{} row(s) excluded from age segmentation: age outside bins {:?}",
            excluded.len(),
            bins.edges()
        );
    }

    let order: HashMap<String, usize> = bins
        .labels()
        .into_iter()
        .enumerate()
        .map(|(i, label)| (label, i))
        .collect();

    let mut entries = AggregationResult::accumulate(pairs).into_entries();
    entries.sort_by(|a, b| {
        let rank = |label: &String| order.get(label).copied().unwrap_or_default();
        rank(&b.0 .0)
            .cmp(&rank(&a.0 .0))
            .then_with(|| a.0 .1.cmp(&b.0 .1))
    });

    AgeGenderSegmentation {
        result: AggregationResult::from_entries(entries),
        excluded,
    }
}

/// Sales rolled up to one point per order location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint {
    pub location: String,
    /// Coordinates of the first order seen for this location.
    pub latitude: f64,
    pub longitude: f64,
    pub total_sales: f64,
    pub orders: usize,
}

/// One point per order location, in first-appearance order.
pub fn geo_points(table: &OrderTable) -> Vec<GeoPoint> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut points: Vec<GeoPoint> = Vec::new();

    for record in table {
        match index.get(record.order_location.as_str()) {
            Some(&slot) => {
                points[slot].total_sales += record.total_sales;
                points[slot].orders += 1;
            }
            None => {
                index.insert(&record.order_location, points.len());
                points.push(GeoPoint {
                    location: record.order_location.clone(),
                    latitude: record.latitude,
                    longitude: record.longitude,
                    total_sales: record.total_sales,
                    orders: 1,
                });
            }
        }
    }

    points
}

/// Row count per month of year; slot 0 is January.
pub fn orders_per_calendar_month(table: &OrderTable) -> [usize; 12] {
    let mut histogram = [0usize; 12];
    for record in table {
        histogram[record.order_date.month0() as usize] += 1;
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_record;

    #[test]
    fn test_age_group_labels() {
        let bins = AgeBins::default();
        assert_eq!(age_group(20, &bins).unwrap(), "18-20");
        assert_eq!(age_group(18, &bins).unwrap(), "18-20");
        assert_eq!(age_group(21, &bins).unwrap(), "21-23");
        assert_eq!(age_group(35, &bins).unwrap(), "33-35");
    }

    #[test]
    fn test_age_group_out_of_range() {
        let bins = AgeBins::default();
        match age_group(40, &bins) {
            Err(EngineError::OutOfRange {
                value,
                lower,
                upper,
            }) => {
                assert_eq!(value, 40);
                assert_eq!(lower, 18);
                assert_eq!(upper, 36);
            }
            other => panic!("expected out of range, got {:?}", other),
        }
        // Upper edge is exclusive.
        assert!(age_group(36, &bins).is_err());
        assert!(age_group(17, &bins).is_err());
    }

    #[test]
    fn test_age_bins_validation() {
        assert!(AgeBins::new(vec![18]).is_none());
        assert!(AgeBins::new(vec![18, 18, 20]).is_none());
        assert!(AgeBins::new(vec![30, 20]).is_none());
        let bins = AgeBins::new(vec![0, 50, 100]).unwrap();
        assert_eq!(bins.labels(), vec!["0-49", "50-99"]);
    }

    #[test]
    fn test_sales_by_age_group_and_gender_reports_exclusions() {
        let mut young = test_record("2024-01-01", "A", 10.0);
        young.buyer_age = 19;
        young.buyer_gender = "Male".to_string();
        let mut young_f = test_record("2024-01-02", "A", 15.0);
        young_f.buyer_age = 20;
        let mut older = test_record("2024-01-03", "A", 40.0);
        older.buyer_age = 34;
        let mut outside = test_record("2024-01-04", "A", 99.0);
        outside.buyer_age = 40;

        let table = OrderTable::new(vec![young, young_f, older, outside]);
        let segmentation = sales_by_age_group_and_gender(&table, &AgeBins::default());

        assert_eq!(
            segmentation.result.entries(),
            &[
                (("33-35".to_string(), "Female".to_string()), 40.0),
                (("18-20".to_string(), "Female".to_string()), 15.0),
                (("18-20".to_string(), "Male".to_string()), 10.0),
            ]
        );
        assert_eq!(segmentation.excluded.len(), 1);
        assert_eq!(segmentation.excluded[0].buyer_age, 40);
    }

    #[test]
    fn test_geo_points() {
        let mut paris = test_record("2024-01-01", "A", 10.0);
        paris.order_location = "Paris".to_string();
        paris.latitude = 48.85;
        let table = OrderTable::new(vec![
            test_record("2024-01-01", "A", 5.0),
            paris,
            test_record("2024-01-02", "A", 7.0),
        ]);

        let points = geo_points(&table);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].location, "Lisbon");
        assert_eq!(points[0].total_sales, 12.0);
        assert_eq!(points[0].orders, 2);
        assert_eq!(points[1].latitude, 48.85);
    }

    #[test]
    fn test_orders_per_calendar_month() {
        let table = OrderTable::new(vec![
            test_record("2024-01-01", "A", 1.0),
            test_record("2023-01-31", "A", 1.0),
            test_record("2024-12-25", "A", 1.0),
        ]);
        let histogram = orders_per_calendar_month(&table);
        assert_eq!(histogram[0], 2);
        assert_eq!(histogram[11], 1);
        assert_eq!(histogram.iter().sum::<usize>(), 3);
    }
}

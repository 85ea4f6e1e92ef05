//! Data models for the sales aggregation engine.
//!
//! This module contains the order record and table types, the field
//! selectors used by aggregation queries, time buckets, and the
//! ordered aggregation result.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Whether an order shipped across borders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShippingScope {
    /// `International Shipping = Yes`
    #[serde(rename = "Yes")]
    International,
    /// `International Shipping = No`
    #[serde(rename = "No")]
    Domestic,
}

impl fmt::Display for ShippingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShippingScope::International => write!(f, "Yes"),
            ShippingScope::Domestic => write!(f, "No"),
        }
    }
}

impl FromStr for ShippingScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" => Ok(ShippingScope::International),
            "no" | "n" | "false" => Ok(ShippingScope::Domestic),
            other => Err(format!("expected Yes or No, got {:?}", other)),
        }
    }
}

/// One row of the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Order identifier, absent when the source has no `Order ID` column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub order_date: NaiveDate,
    pub product_id: String,
    pub product_category: String,
    pub sales_price: f64,
    pub quantity: u32,
    /// Expected to equal `sales_price * quantity`; not validated.
    pub total_sales: f64,
    pub shipping_charges: f64,
    pub international_shipping: ShippingScope,
    pub buyer_age: u32,
    pub buyer_gender: String,
    pub order_location: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

/// Group key of rows whose `Order ID` is absent or empty.
pub const MISSING_ORDER_ID: &str = "(none)";

/// Fields usable as a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    /// Single group holding every row, keyed `*`.
    All,
    OrderId,
    ProductId,
    ProductCategory,
    InternationalShipping,
    BuyerGender,
    OrderLocation,
    /// Groups on the exact charge amount.
    ShippingCharges,
    BuyerAge,
}

impl KeyField {
    /// Extracts the key value from a record.
    ///
    /// Every record has a key: a missing order id groups under
    /// [`MISSING_ORDER_ID`], so grouped totals always add up to the grand total.
    pub fn key_of(&self, record: &OrderRecord) -> String {
        match self {
            KeyField::All => "*".to_string(),
            KeyField::OrderId => record
                .order_id
                .clone()
                .unwrap_or_else(|| MISSING_ORDER_ID.to_string()),
            KeyField::ProductId => record.product_id.clone(),
            KeyField::ProductCategory => record.product_category.clone(),
            KeyField::InternationalShipping => record.international_shipping.to_string(),
            KeyField::BuyerGender => record.buyer_gender.clone(),
            KeyField::OrderLocation => record.order_location.clone(),
            KeyField::ShippingCharges => format_amount(record.shipping_charges),
            KeyField::BuyerAge => record.buyer_age.to_string(),
        }
    }
}

/// Numeric fields that can be aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricField {
    SalesPrice,
    Quantity,
    TotalSales,
    ShippingCharges,
    Rating,
    BuyerAge,
}

impl MetricField {
    /// Source column name of this metric.
    pub fn column(&self) -> &'static str {
        match self {
            MetricField::SalesPrice => "Sales Price",
            MetricField::Quantity => "Quantity",
            MetricField::TotalSales => "Total Sales",
            MetricField::ShippingCharges => "Shipping Charges",
            MetricField::Rating => "Rating",
            MetricField::BuyerAge => "Buyer Age",
        }
    }

    /// Reads the metric from a record. `None` only for an absent rating.
    pub fn value_of(&self, record: &OrderRecord) -> Option<f64> {
        match self {
            MetricField::SalesPrice => Some(record.sales_price),
            MetricField::Quantity => Some(f64::from(record.quantity)),
            MetricField::TotalSales => Some(record.total_sales),
            MetricField::ShippingCharges => Some(record.shipping_charges),
            MetricField::Rating => record.rating,
            MetricField::BuyerAge => Some(f64::from(record.buyer_age)),
        }
    }

    /// Every metric, in column order.
    pub fn all() -> [MetricField; 6] {
        [
            MetricField::SalesPrice,
            MetricField::Quantity,
            MetricField::TotalSales,
            MetricField::ShippingCharges,
            MetricField::Rating,
            MetricField::BuyerAge,
        ]
    }
}

/// Renders an amount without a trailing `.0` for whole numbers.
fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

/// Size of a time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Month,
    Year,
}

/// A calendar bucket, identified by its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    start: NaiveDate,
    granularity: Granularity,
}

impl Period {
    /// Truncates a date to the start of its bucket.
    pub fn containing(date: NaiveDate, granularity: Granularity) -> Self {
        let month = match granularity {
            Granularity::Month => date.month(),
            Granularity::Year => 1,
        };
        // Day 1 of an existing month of an existing year is always valid.
        let start = NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date);
        Self { start, granularity }
    }

    /// Short display label such as `Jan 24` (month) or `2024` (year).
    pub fn short_label(&self) -> String {
        match self.granularity {
            Granularity::Month => self.start.format("%b %y").to_string(),
            Granularity::Year => self.start.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Month => write!(f, "{}", self.start.format("%Y-%m")),
            Granularity::Year => write!(f, "{}", self.start.format("%Y")),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Sort direction for ranked queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Largest values first.
    Largest,
    /// Smallest values first.
    Smallest,
}

/// Mapping from group key to metric value with deterministic ordering.
///
/// Entries keep first-appearance order until the caller asks for a
/// sorted view. "Key ascending" is the key type's `Ord`: for `String`
/// keys that is lexicographic, so numeric labels such as ages or charge
/// amounts sort as text (`"100" < "50" < "9"`).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult<K> {
    entries: Vec<(K, f64)>,
}

impl<K> Default for AggregationResult<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Clone + Eq + Hash + Ord> AggregationResult<K> {
    /// Sums values per key, keeping the order in which keys first appear.
    pub fn accumulate<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut entries: Vec<(K, f64)> = Vec::new();

        for (key, value) in pairs {
            match index.get(&key) {
                Some(&slot) => entries[slot].1 += value,
                None => {
                    index.insert(key.clone(), entries.len());
                    entries.push((key, value));
                }
            }
        }

        Self { entries }
    }

    /// Builds a result from already-aggregated entries.
    pub fn from_entries(entries: Vec<(K, f64)>) -> Self {
        Self { entries }
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[(K, f64)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(K, f64)> {
        self.entries
    }

    /// Value for a key, if present.
    pub fn get(&self, key: &K) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| *value)
    }

    /// Sum of every entry.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, value)| value).sum()
    }

    /// Reorders entries by key ascending (lexicographic for `String` keys).
    pub fn sorted_by_key(mut self) -> Self {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    /// Reorders entries by value; ties broken by key ascending.
    pub fn sorted_by_value(mut self, direction: Direction) -> Self {
        self.entries.sort_by(|a, b| {
            let by_value = match direction {
                Direction::Largest => b.1.total_cmp(&a.1),
                Direction::Smallest => a.1.total_cmp(&b.1),
            };
            by_value.then_with(|| a.0.cmp(&b.0))
        });
        self
    }
}

/// Row-level filter forwarded from the CLI. Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genders: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub international: Option<ShippingScope>,
}

impl OrderFilter {
    /// True when no criterion is set.
    pub fn is_empty(&self) -> bool {
        *self == OrderFilter::default()
    }

    /// Whether a record passes every criterion.
    pub fn matches(&self, record: &OrderRecord) -> bool {
        fn listed(allowed: &[String], value: &str) -> bool {
            allowed.is_empty() || allowed.iter().any(|a| a.eq_ignore_ascii_case(value))
        }

        self.year.map_or(true, |y| record.order_date.year() == y)
            && self.month.map_or(true, |m| record.order_date.month() == m)
            && listed(&self.categories, &record.product_category)
            && listed(&self.locations, &record.order_location)
            && listed(&self.genders, &record.buyer_gender)
            && listed(&self.products, &record.product_id)
            && self.min_age.map_or(true, |min| record.buyer_age >= min)
            && self.max_age.map_or(true, |max| record.buyer_age <= max)
            && self
                .international
                .map_or(true, |scope| record.international_shipping == scope)
    }

    /// Human-readable summary of the active criteria.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "none".to_string();
        }

        let mut parts = Vec::new();
        if let Some(year) = self.year {
            parts.push(format!("year={}", year));
        }
        if let Some(month) = self.month {
            parts.push(format!("month={}", month));
        }
        for (name, values) in [
            ("category", &self.categories),
            ("location", &self.locations),
            ("gender", &self.genders),
            ("product", &self.products),
        ] {
            if !values.is_empty() {
                parts.push(format!("{}={}", name, values.join("|")));
            }
        }
        if let Some(min) = self.min_age {
            parts.push(format!("age>={}", min));
        }
        if let Some(max) = self.max_age {
            parts.push(format!("age<={}", max));
        }
        if let Some(scope) = self.international {
            parts.push(format!("international={}", scope));
        }

        parts.join(", ")
    }
}

/// Immutable, ordered collection of order records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderTable {
    records: Vec<OrderRecord>,
}

impl OrderTable {
    pub fn new(records: Vec<OrderRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// New table holding the rows accepted by `predicate`.
    pub fn select<F>(&self, predicate: F) -> OrderTable
    where
        F: Fn(&OrderRecord) -> bool,
    {
        OrderTable::new(
            self.records
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
        )
    }

    /// New table holding the rows matching `filter`.
    pub fn filtered(&self, filter: &OrderFilter) -> OrderTable {
        self.select(|r| filter.matches(r))
    }

    /// Latest order date, `None` for an empty table.
    pub fn latest_order_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.order_date).max()
    }

    /// Distinct key values in first-appearance order.
    pub fn distinct_values(&self, key: KeyField) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .map(|r| key.key_of(r))
            .filter(|v| seen.insert(v.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a OrderTable {
    type Item = &'a OrderRecord;
    type IntoIter = std::slice::Iter<'a, OrderRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Minimal record for unit tests: date, category and total sales set, rest defaulted.
#[cfg(test)]
pub(crate) fn test_record(date: &str, category: &str, total_sales: f64) -> OrderRecord {
    OrderRecord {
        order_id: Some(format!("{}-{}", category, date)),
        order_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("valid test date"),
        product_id: "P-1".to_string(),
        product_category: category.to_string(),
        sales_price: total_sales,
        quantity: 1,
        total_sales,
        shipping_charges: 0.0,
        international_shipping: ShippingScope::Domestic,
        buyer_age: 25,
        buyer_gender: "Female".to_string(),
        order_location: "Lisbon".to_string(),
        latitude: 38.72,
        longitude: -9.14,
        rating: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_scope_from_str() {
        assert_eq!(
            "Yes".parse::<ShippingScope>(),
            Ok(ShippingScope::International)
        );
        assert_eq!(" no ".parse::<ShippingScope>(), Ok(ShippingScope::Domestic));
        assert!("maybe".parse::<ShippingScope>().is_err());
    }

    #[test]
    fn test_period_truncation_and_labels() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        let month = Period::containing(date, Granularity::Month);
        assert_eq!(month, Period::containing(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), Granularity::Month));
        assert_eq!(month.to_string(), "2024-02");
        assert_eq!(month.short_label(), "Feb 24");

        let year = Period::containing(date, Granularity::Year);
        assert_eq!(year.to_string(), "2024");
    }

    #[test]
    fn test_accumulate_keeps_first_appearance_order() {
        let result = AggregationResult::accumulate(vec![
            ("B".to_string(), 1.0),
            ("A".to_string(), 2.0),
            ("B".to_string(), 3.0),
        ]);
        assert_eq!(
            result.entries(),
            &[("B".to_string(), 4.0), ("A".to_string(), 2.0)]
        );
        assert_eq!(result.total(), 6.0);

        let sorted = result.sorted_by_key();
        assert_eq!(sorted.entries()[0].0, "A");
    }

    #[test]
    fn test_sorted_by_value_breaks_ties_by_key() {
        let result = AggregationResult::from_entries(vec![
            ("c".to_string(), 5.0),
            ("a".to_string(), 5.0),
            ("b".to_string(), 9.0),
        ]);
        let keys: Vec<_> = result
            .sorted_by_value(Direction::Largest)
            .into_entries()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sorted_by_key_is_lexicographic() {
        let result = AggregationResult::accumulate(vec![
            ("9".to_string(), 1.0),
            ("100".to_string(), 2.0),
            ("50".to_string(), 3.0),
        ]);
        let keys: Vec<_> = result
            .sorted_by_key()
            .into_entries()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["100", "50", "9"]);
    }

    #[test]
    fn test_filter_matches() {
        let record = test_record("2024-03-05", "Clothing", 40.0);
        let table = OrderTable::new(vec![
            record.clone(),
            test_record("2023-03-05", "Ornaments", 10.0),
        ]);

        let filter = OrderFilter {
            year: Some(2024),
            categories: vec!["clothing".to_string()],
            ..Default::default()
        };
        let filtered = table.filtered(&filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records()[0], record);
        // Source table untouched.
        assert_eq!(table.len(), 2);

        let by_age = OrderFilter {
            min_age: Some(30),
            ..Default::default()
        };
        assert!(table.filtered(&by_age).is_empty());
        assert_eq!(filter.describe(), "year=2024, category=clothing");
        assert_eq!(OrderFilter::default().describe(), "none");
    }

    #[test]
    fn test_distinct_values_and_latest_date() {
        let table = OrderTable::new(vec![
            test_record("2024-01-15", "A", 100.0),
            test_record("2024-02-20", "A", 50.0),
            test_record("2024-01-10", "B", 30.0),
        ]);
        assert_eq!(
            table.distinct_values(KeyField::ProductCategory),
            vec!["A", "B"]
        );
        assert_eq!(
            table.latest_order_date(),
            NaiveDate::from_ymd_opt(2024, 2, 20)
        );
        assert_eq!(OrderTable::default().latest_order_date(), None);
    }

    #[test]
    fn test_shipping_charge_key_formatting() {
        let mut record = test_record("2024-01-01", "A", 1.0);
        record.shipping_charges = 50.0;
        assert_eq!(
            KeyField::ShippingCharges.key_of(&record),
            "50".to_string()
        );
        record.shipping_charges = 12.5;
        assert_eq!(
            KeyField::ShippingCharges.key_of(&record),
            "12.5".to_string()
        );

        record.order_id = None;
        assert_eq!(KeyField::OrderId.key_of(&record), MISSING_ORDER_ID);
    }
}

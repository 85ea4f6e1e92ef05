//! Descriptive statistics for the numeric columns of a table.

use crate::models::{MetricField, OrderTable};
use serde::Serialize;

/// Summary of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    /// Rows carrying a value.
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; needs at least two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Profile a single metric column.
pub fn profile_column(table: &OrderTable, metric: MetricField) -> ColumnProfile {
    let values: Vec<f64> = table.iter().filter_map(|r| metric.value_of(r)).collect();
    let count = values.len();

    let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);

    let std = match mean {
        Some(m) if count > 1 => {
            let variance =
                values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(variance.sqrt())
        }
        _ => None,
    };

    ColumnProfile {
        column: metric.column().to_string(),
        count,
        mean,
        std,
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

/// Profile every numeric column, in column order.
pub fn profile(table: &OrderTable) -> Vec<ColumnProfile> {
    MetricField::all()
        .into_iter()
        .map(|metric| profile_column(table, metric))
        .collect()
}

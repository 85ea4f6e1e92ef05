//! Loaded-table snapshot shared by every query.
//!
//! The table is loaded once by the caller and handed in; the snapshot
//! never reloads or memoizes on its own. Clones share the same
//! underlying rows.

use crate::error::RejectedRow;
use crate::ingest::LoadOutcome;
use crate::models::{OrderFilter, OrderTable};
use std::borrow::Cow;
use std::sync::Arc;

/// Immutable view of one load of a source file.
#[derive(Debug, Clone)]
pub struct SalesSnapshot {
    source: String,
    table: Arc<OrderTable>,
    rejected: Arc<[RejectedRow]>,
}

impl SalesSnapshot {
    /// Wrap an already-loaded table.
    pub fn new(source: impl Into<String>, table: Arc<OrderTable>, rejected: Vec<RejectedRow>) -> Self {
        Self {
            source: source.into(),
            table,
            rejected: rejected.into(),
        }
    }

    /// Take ownership of a loader outcome.
    pub fn from_outcome(source: impl Into<String>, outcome: LoadOutcome) -> Self {
        let rejected = outcome.rejected.iter().map(RejectedRow::from).collect();
        Self::new(source, Arc::new(outcome.table), rejected)
    }

    /// Where the rows came from (path or label).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn table(&self) -> &OrderTable {
        &self.table
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Rows matching `filter`; borrows the full table when no filter is set.
    pub fn view(&self, filter: &OrderFilter) -> Cow<'_, OrderTable> {
        if filter.is_empty() {
            Cow::Borrowed(self.table.as_ref())
        } else {
            Cow::Owned(self.table.filtered(filter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{grand_total, total_by};
    use crate::models::{test_record, KeyField, MetricField};

    fn snapshot() -> SalesSnapshot {
        let table = OrderTable::new(vec![
            test_record("2024-01-15", "A", 100.0),
            test_record("2024-02-20", "A", 50.0),
            test_record("2024-01-10", "B", 30.0),
        ]);
        SalesSnapshot::new("inline", Arc::new(table), Vec::new())
    }

    #[test]
    fn test_view_borrows_without_filter() {
        let snap = snapshot();
        assert!(matches!(snap.view(&OrderFilter::default()), Cow::Borrowed(_)));

        let filter = OrderFilter {
            categories: vec!["B".to_string()],
            ..Default::default()
        };
        let view = snap.view(&filter);
        assert_eq!(view.len(), 1);
        assert_eq!(snap.table().len(), 3);
    }

    #[test]
    fn test_snapshot_shared_across_threads() {
        let snap = snapshot();
        let expected = grand_total(snap.table(), MetricField::TotalSales);

        let totals: Vec<f64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let handle = snap.clone();
                    assert!(Arc::ptr_eq(&handle.table, &snap.table));
                    scope.spawn(move || {
                        total_by(handle.table(), KeyField::ProductCategory, MetricField::TotalSales)
                            .total()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(totals.iter().all(|t| (*t - expected).abs() < 1e-9));
    }
}

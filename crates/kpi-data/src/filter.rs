//! Filter engine: selects the rows of a store that match a [`FilterSpec`].

use kpi_core::models::{FilterSpec, TransactionRecord};

use crate::store::TransactionStore;

/// Borrowed subset of a store's rows, in store order.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    rows: Vec<&'a TransactionRecord>,
    store_rows: usize,
}

impl<'a> FilteredView<'a> {
    /// A view over an explicit list of rows.
    pub fn from_rows(rows: Vec<&'a TransactionRecord>) -> Self {
        let store_rows = rows.len();
        Self { rows, store_rows }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a TransactionRecord> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows in the store the view was taken from.
    pub fn store_rows(&self) -> usize {
        self.store_rows
    }

    /// Non-missing amounts of the view.
    pub fn amounts(&self) -> Vec<f64> {
        self.iter().filter_map(|r| r.amount).collect()
    }
}

/// Whether one record passes every restriction of `spec`.
pub fn matches(record: &TransactionRecord, spec: &FilterSpec) -> bool {
    spec.store.matches(record.store.as_deref())
        && spec.category.matches(record.category.as_deref())
        && spec.payment_mode.matches(record.payment_mode.as_deref())
        && spec.start.map_or(true, |start| record.date >= start)
        && spec.end.map_or(true, |end| record.date <= end)
}

/// Apply `spec` to `store`. Unknown selector values and inverted date ranges
/// simply produce an empty view.
pub fn apply<'a>(store: &'a TransactionStore, spec: &FilterSpec) -> FilteredView<'a> {
    let rows = store.rows().filter(|r| matches(r, spec)).collect();
    FilteredView {
        rows,
        store_rows: store.len(),
    }
}

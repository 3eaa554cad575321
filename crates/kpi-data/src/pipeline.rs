//! One full recomputation: filter, aggregate every family, assemble.
//!
//! [`compute_kpis`] only borrows the store and keeps its state on the stack,
//! so any number of passes can run against the same store at once.

use std::time::Instant;

use chrono::Utc;
use kpi_core::models::FilterSpec;
use tracing::debug;

use crate::aggregator;
use crate::assembler::{assemble, KpiBundle, KpiParts, ViewMetadata};
use crate::filter::apply;
use crate::store::TransactionStore;

/// Compute every KPI of `store` restricted to `filter`.
///
/// 1. Select matching rows.
/// 2. Run each aggregator family over the view.
/// 3. Package the outputs into a [`KpiBundle`].
pub fn compute_kpis(store: &TransactionStore, filter: &FilterSpec) -> KpiBundle {
    // ── Step 1: Filter ────────────────────────────────────────────────────────
    let started = Instant::now();
    let view = apply(store, filter);
    let filter_time = started.elapsed().as_secs_f64();

    // ── Step 2: Aggregate ─────────────────────────────────────────────────────
    let aggregate_start = Instant::now();
    let overview = aggregator::overview(&view);
    let amount = aggregator::amount_stats(&view);
    let category_revenue = aggregator::category_revenue(&view);
    let top_category = aggregator::top_category(&view);
    let recurrence = aggregator::recurrence(&view);
    let payment_modes = aggregator::payment_modes(&view);
    let clv = aggregator::client_lifetime_value(&view);
    let stores = aggregator::store_aggregates(&view);
    let store_categories = aggregator::store_category_aggregates(&view);
    let satisfaction_distribution = aggregator::satisfaction_distribution(&view);
    let satisfaction_by_store = aggregator::satisfaction_by_store(&view);
    let satisfaction_by_category = aggregator::satisfaction_by_category(&view);
    let daily_revenue = aggregator::daily_revenue(&view);
    let category_quantities = aggregator::category_quantities(&view);
    let aggregate_time = aggregate_start.elapsed().as_secs_f64();

    debug!(
        "kpi pass: {}/{} rows, filter {:.4}s, aggregate {:.4}s",
        view.len(),
        view.store_rows(),
        filter_time,
        aggregate_time
    );

    // ── Step 3: Assemble ──────────────────────────────────────────────────────
    let metadata = ViewMetadata {
        filter: filter.clone(),
        rows_in_store: view.store_rows(),
        rows_in_view: view.len(),
        generated_at: Utc::now().to_rfc3339(),
        compute_time_seconds: started.elapsed().as_secs_f64(),
    };

    assemble(KpiParts {
        metadata,
        overview,
        amount,
        category_revenue,
        top_category,
        recurrence,
        payment_modes,
        clv,
        stores,
        store_categories,
        satisfaction_distribution,
        satisfaction_by_store,
        satisfaction_by_category,
        daily_revenue,
        category_quantities,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

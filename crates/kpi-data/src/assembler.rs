//! Packaging of the KPI families into one named, serialisable bundle.

use kpi_core::models::FilterSpec;
use serde::{Deserialize, Serialize};

use crate::aggregator::{
    AmountStats, CategoryQuantity, CategoryShare, ClvStats, DailyRevenue, GroupSatisfaction,
    Overview, PaymentModeShare, Recurrence, SatisfactionBucket, StoreAggregate,
    StoreCategoryAggregate, TopCategory,
};

// ── Public types ──────────────────────────────────────────────────────────────

/// Describes which slice of the store a bundle was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMetadata {
    /// The filter exactly as applied.
    pub filter: FilterSpec,
    pub rows_in_store: usize,
    pub rows_in_view: usize,
    /// RFC 3339 timestamp of the pass.
    pub generated_at: String,
    /// Wall-clock seconds spent filtering and aggregating.
    pub compute_time_seconds: f64,
}

/// Raw outputs of one aggregation pass.
#[derive(Debug, Clone)]
pub struct KpiParts {
    pub metadata: ViewMetadata,
    pub overview: Overview,
    pub amount: AmountStats,
    pub category_revenue: Vec<CategoryShare>,
    pub top_category: TopCategory,
    pub recurrence: Recurrence,
    pub payment_modes: Vec<PaymentModeShare>,
    pub clv: ClvStats,
    pub stores: Vec<StoreAggregate>,
    pub store_categories: Vec<StoreCategoryAggregate>,
    pub satisfaction_distribution: Vec<SatisfactionBucket>,
    pub satisfaction_by_store: Vec<GroupSatisfaction>,
    pub satisfaction_by_category: Vec<GroupSatisfaction>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub category_quantities: Vec<CategoryQuantity>,
}

/// Every KPI of one filtered view.
///
/// All fields are always serialised: statistics without data are `null` and
/// empty tables are `[]`, so consumers never have to test for a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiBundle {
    pub metadata: ViewMetadata,
    pub overview: Overview,
    pub transaction_amount: AmountStats,
    pub category_revenue: Vec<CategoryShare>,
    pub top_category: TopCategory,
    pub client_recurrence: Recurrence,
    pub payment_modes: Vec<PaymentModeShare>,
    /// Most used payment mode; `null` when no row has one.
    pub top_payment_mode: Option<PaymentModeShare>,
    pub client_lifetime_value: ClvStats,
    pub store_aggregates: Vec<StoreAggregate>,
    pub store_category_aggregates: Vec<StoreCategoryAggregate>,
    pub satisfaction_distribution: Vec<SatisfactionBucket>,
    pub satisfaction_by_store: Vec<GroupSatisfaction>,
    pub satisfaction_by_category: Vec<GroupSatisfaction>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub category_quantities: Vec<CategoryQuantity>,
}

impl KpiBundle {
    /// `true` when the filter selected no rows.
    pub fn is_empty_view(&self) -> bool {
        self.metadata.rows_in_view == 0
    }
}

// ── Public function ───────────────────────────────────────────────────────────

/// Move the parts into a [`KpiBundle`]. Derives `top_payment_mode` from the
/// already ranked payment table and does nothing else.
pub fn assemble(parts: KpiParts) -> KpiBundle {
    let top_payment_mode = parts.payment_modes.first().cloned();
    KpiBundle {
        metadata: parts.metadata,
        overview: parts.overview,
        transaction_amount: parts.amount,
        category_revenue: parts.category_revenue,
        top_category: parts.top_category,
        client_recurrence: parts.recurrence,
        payment_modes: parts.payment_modes,
        top_payment_mode,
        client_lifetime_value: parts.clv,
        store_aggregates: parts.stores,
        store_category_aggregates: parts.store_categories,
        satisfaction_distribution: parts.satisfaction_distribution,
        satisfaction_by_store: parts.satisfaction_by_store,
        satisfaction_by_category: parts.satisfaction_by_category,
        daily_revenue: parts.daily_revenue,
        category_quantities: parts.category_quantities,
    }
}

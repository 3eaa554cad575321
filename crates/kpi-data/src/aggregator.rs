//! KPI families computed over a [`FilteredView`].
//!
//! Each family is a pure function of the view built on [`Grouping`]. None of
//! them can fail: an empty view answers with `None` for statistics, `0` for
//! totals and counts, and empty tables.

use chrono::NaiveDate;
use kpi_core::formatting::{percentage, raw_percentage};
use kpi_core::models::{ClientId, TransactionRecord};
use kpi_core::stats::{mean, Summary};
use serde::{Deserialize, Serialize};

use crate::filter::FilteredView;
use crate::grouping::{Group, Grouping, Metric};

/// Number of clients listed in the top-CLV table.
pub const TOP_CLIENTS: usize = 5;

fn amount(r: &&TransactionRecord) -> Option<f64> {
    r.amount
}

fn satisfaction(r: &&TransactionRecord) -> Option<f64> {
    r.satisfaction.map(f64::from)
}

fn by_category(view: &FilteredView<'_>) -> Grouping<String> {
    Grouping::build(view.iter(), |r| r.category.clone(), amount)
}

fn by_client(view: &FilteredView<'_>) -> Grouping<ClientId> {
    Grouping::build(view.iter(), |r| r.client_id.clone(), amount)
}

// ── Overview ──────────────────────────────────────────────────────────────────

/// Headline figures of the view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Every row of the view, whatever its amount.
    pub transaction_count: usize,
    pub total_sales: f64,
    pub mean_amount: Option<f64>,
    pub mean_satisfaction: Option<f64>,
}

pub fn overview(view: &FilteredView<'_>) -> Overview {
    let amounts = view.amounts();
    let scores: Vec<f64> = view.iter().filter_map(|r| satisfaction(&r)).collect();
    Overview {
        transaction_count: view.len(),
        total_sales: amounts.iter().sum(),
        mean_amount: mean(&amounts),
        mean_satisfaction: mean(&scores),
    }
}

// ── Transaction amount ────────────────────────────────────────────────────────

/// Central tendency of the transaction amount plus total revenue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountStats {
    /// Rows with a non-missing amount.
    pub observed: usize,
    pub total_revenue: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
}

pub fn amount_stats(view: &FilteredView<'_>) -> AmountStats {
    let amounts = view.amounts();
    let summary = Summary::of(&amounts);
    AmountStats {
        observed: summary.count,
        total_revenue: amounts.iter().sum(),
        mean: summary.mean,
        min: summary.min,
        max: summary.max,
        median: summary.median,
    }
}

// ── Category revenue ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub revenue: f64,
    /// Share of the summed category revenue, two decimals.
    pub percentage: Option<f64>,
}

/// Revenue and share per category, ascending by category.
///
/// Shares are taken against the revenue of rows that carry a category and
/// are not re-normalised after rounding.
pub fn category_revenue(view: &FilteredView<'_>) -> Vec<CategoryShare> {
    let grouping = by_category(view);
    grouping
        .shares(Metric::Sum, grouping.total(Metric::Sum))
        .into_iter()
        .map(|s| CategoryShare {
            category: s.key,
            revenue: s.value,
            percentage: s.percentage,
        })
        .collect()
}

/// Best category by revenue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopCategory {
    pub category: Option<String>,
    pub revenue: f64,
    /// Unrounded share of category revenue; `None` when there is none.
    pub share: Option<f64>,
}

/// Category performance index. Ties go to the first category in ascending
/// order.
pub fn top_category(view: &FilteredView<'_>) -> TopCategory {
    let grouping = by_category(view);
    let total = grouping.total(Metric::Sum);
    match grouping.top_by(Metric::Sum) {
        Some(top) => TopCategory {
            category: Some(top.key.clone()),
            revenue: top.sum,
            share: raw_percentage(top.sum, total),
        },
        None => TopCategory::default(),
    }
}

// ── Client recurrence ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub distinct_clients: usize,
    /// Clients with more than one transaction.
    pub recurring_clients: usize,
    /// `recurring / distinct * 100`; `None` without clients.
    pub rate: Option<f64>,
}

pub fn recurrence(view: &FilteredView<'_>) -> Recurrence {
    let grouping = by_client(view);
    let distinct = grouping.len();
    let recurring = grouping.groups().iter().filter(|g| g.rows > 1).count();
    Recurrence {
        distinct_clients: distinct,
        recurring_clients: recurring,
        rate: raw_percentage(recurring as f64, distinct as f64),
    }
}

// ── Payment modes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentModeShare {
    pub payment_mode: String,
    pub transactions: usize,
    /// Share of all rows in the view, two decimals.
    pub percentage: Option<f64>,
}

/// Transactions per payment mode, most used first. Equal counts keep
/// ascending label order, so the first row is the top payment mode.
pub fn payment_modes(view: &FilteredView<'_>) -> Vec<PaymentModeShare> {
    let grouping = Grouping::build(view.iter(), |r| r.payment_mode.clone(), |_| None);
    let rows_in_view = view.len() as f64;
    grouping
        .ranked_by(Metric::Count)
        .into_iter()
        .map(|g| PaymentModeShare {
            payment_mode: g.key.clone(),
            transactions: g.rows,
            percentage: percentage(g.rows as f64, rows_in_view, 2),
        })
        .collect()
}

// ── Client lifetime value ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientValue {
    pub client_id: ClientId,
    pub value: f64,
    pub transactions: usize,
}

/// Spread of per-client revenue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClvStats {
    pub clients: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    /// At most [`TOP_CLIENTS`] clients, highest value first, ties by id.
    pub top_clients: Vec<ClientValue>,
}

/// CLV is the sum of a client's non-missing amounts; clients whose amounts
/// are all missing count with a value of `0`.
pub fn client_lifetime_value(view: &FilteredView<'_>) -> ClvStats {
    let grouping = by_client(view);
    let values: Vec<f64> = grouping.groups().iter().map(|g| g.sum).collect();
    let summary = Summary::of(&values);
    let top_clients = grouping
        .ranked_by(Metric::Sum)
        .into_iter()
        .take(TOP_CLIENTS)
        .map(|g| ClientValue {
            client_id: g.key.clone(),
            value: g.sum,
            transactions: g.rows,
        })
        .collect();
    ClvStats {
        clients: grouping.len(),
        mean: summary.mean,
        min: summary.min,
        max: summary.max,
        median: summary.median,
        top_clients,
    }
}

// ── Store aggregates ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreAggregate {
    pub store: String,
    pub revenue: f64,
    /// Rows that carry an amount.
    pub transactions: usize,
    pub mean_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreCategoryAggregate {
    pub store: String,
    pub category: String,
    pub revenue: f64,
    /// Rows that carry an amount.
    pub transactions: usize,
    pub mean_amount: Option<f64>,
}

/// Revenue, count and mean amount per store, ascending by store.
pub fn store_aggregates(view: &FilteredView<'_>) -> Vec<StoreAggregate> {
    Grouping::build(view.iter(), |r| r.store.clone(), amount)
        .into_groups()
        .into_iter()
        .map(|g| StoreAggregate {
            mean_amount: g.mean(),
            store: g.key,
            revenue: g.sum,
            transactions: g.observed,
        })
        .collect()
}

/// Same figures per `(store, category)` pair, ascending by store then category.
pub fn store_category_aggregates(view: &FilteredView<'_>) -> Vec<StoreCategoryAggregate> {
    Grouping::build(
        view.iter(),
        |r| Some((r.store.clone()?, r.category.clone()?)),
        amount,
    )
    .into_groups()
    .into_iter()
    .map(|g| StoreCategoryAggregate {
        mean_amount: g.mean(),
        store: g.key.0,
        category: g.key.1,
        revenue: g.sum,
        transactions: g.observed,
    })
    .collect()
}

// ── Satisfaction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatisfactionBucket {
    pub score: u8,
    pub transactions: usize,
    /// Share of rows that carry a score, two decimals.
    pub percentage: Option<f64>,
}

/// Rows per observed score, ascending by score.
pub fn satisfaction_distribution(view: &FilteredView<'_>) -> Vec<SatisfactionBucket> {
    let grouping = Grouping::build(view.iter(), |r| r.satisfaction, |_| None);
    let scored = grouping.total(Metric::Count);
    grouping
        .groups()
        .iter()
        .map(|g| SatisfactionBucket {
            score: g.key,
            transactions: g.rows,
            percentage: percentage(g.rows as f64, scored, 2),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSatisfaction {
    pub group: String,
    pub mean_score: Option<f64>,
    /// Rows of the group that carry a score.
    pub responses: usize,
}

fn mean_satisfaction(groups: Vec<Group<String>>) -> Vec<GroupSatisfaction> {
    groups
        .into_iter()
        .map(|g| GroupSatisfaction {
            mean_score: g.mean(),
            responses: g.observed,
            group: g.key,
        })
        .collect()
}

/// Mean satisfaction per store, ascending by store.
pub fn satisfaction_by_store(view: &FilteredView<'_>) -> Vec<GroupSatisfaction> {
    mean_satisfaction(Grouping::build(view.iter(), |r| r.store.clone(), satisfaction).into_groups())
}

/// Mean satisfaction per category, ascending by category.
pub fn satisfaction_by_category(view: &FilteredView<'_>) -> Vec<GroupSatisfaction> {
    mean_satisfaction(
        Grouping::build(view.iter(), |r| r.category.clone(), satisfaction).into_groups(),
    )
}

// ── Time series and quantities ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: f64,
    pub transactions: usize,
}

/// Revenue per calendar day, oldest first.
pub fn daily_revenue(view: &FilteredView<'_>) -> Vec<DailyRevenue> {
    Grouping::build(view.iter(), |r| Some(r.date), amount)
        .into_groups()
        .into_iter()
        .map(|g| DailyRevenue {
            date: g.key,
            revenue: g.sum,
            transactions: g.rows,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryQuantity {
    pub category: String,
    pub quantity: i64,
}

/// Units sold per category, ascending by category.
pub fn category_quantities(view: &FilteredView<'_>) -> Vec<CategoryQuantity> {
    Grouping::build(
        view.iter(),
        |r| r.category.clone(),
        |r| r.quantity.map(|q| q as f64),
    )
    .into_groups()
    .into_iter()
    .map(|g| CategoryQuantity {
        category: g.key,
        quantity: g.sum.round() as i64,
    })
    .collect()
}

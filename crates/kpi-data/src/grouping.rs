//! Grouped aggregate-and-rank primitive shared by every KPI family.
//!
//! [`Grouping::build`] buckets rows by an optional key and accumulates an
//! optional numeric value per bucket. Groups always iterate in ascending key
//! order, which makes every tie-break below deterministic.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use kpi_core::formatting::percentage;
use serde::{Deserialize, Serialize};

// ── Group ─────────────────────────────────────────────────────────────────────

/// Which per-group figure to rank or share on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Rows in the group.
    Count,
    /// Sum of observed values.
    Sum,
}

/// Running totals for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<K> {
    pub key: K,
    /// Rows that landed in this group.
    pub rows: usize,
    /// Rows whose value was present.
    pub observed: usize,
    pub sum: f64,
}

impl<K> Group<K> {
    /// `None` when no row of the group had a value.
    pub fn mean(&self) -> Option<f64> {
        (self.observed > 0).then(|| self.sum / self.observed as f64)
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Count => self.rows as f64,
            Metric::Sum => self.sum,
        }
    }
}

/// One row of a share table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share<K> {
    pub key: K,
    pub value: f64,
    /// Percentage of the whole, two decimals; `None` when the whole is zero.
    pub percentage: Option<f64>,
}

// ── Grouping ──────────────────────────────────────────────────────────────────

/// Groups in ascending key order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping<K> {
    groups: Vec<Group<K>>,
}

impl<K: Ord> Grouping<K> {
    /// Group `rows` by `key_fn`, accumulating `value_fn`.
    ///
    /// Rows for which `key_fn` returns `None` are dropped.
    pub fn build<T, I, KF, VF>(rows: I, key_fn: KF, value_fn: VF) -> Self
    where
        I: IntoIterator<Item = T>,
        KF: Fn(&T) -> Option<K>,
        VF: Fn(&T) -> Option<f64>,
    {
        let mut buckets: BTreeMap<K, Tally> = BTreeMap::new();
        for row in rows {
            let Some(key) = key_fn(&row) else {
                continue;
            };
            buckets.entry(key).or_default().add(value_fn(&row));
        }

        let groups = buckets
            .into_iter()
            .map(|(key, t)| Group {
                key,
                rows: t.rows,
                observed: t.observed,
                sum: t.sum,
            })
            .collect();
        Self { groups }
    }
}

impl<K> Grouping<K> {
    pub fn groups(&self) -> &[Group<K>] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Group<K>> {
        self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of `metric` over every group.
    pub fn total(&self, metric: Metric) -> f64 {
        self.groups.iter().map(|g| g.metric(metric)).sum()
    }

    /// Groups sorted by `metric`, largest first. The sort is stable, so equal
    /// groups stay in ascending key order.
    pub fn ranked_by(&self, metric: Metric) -> Vec<&Group<K>> {
        let mut ranked: Vec<&Group<K>> = self.groups.iter().collect();
        ranked.sort_by(|a, b| descending(a.metric(metric), b.metric(metric)));
        ranked
    }

    /// First group with the largest `metric` in ascending key order.
    pub fn top_by(&self, metric: Metric) -> Option<&Group<K>> {
        self.ranked_by(metric).into_iter().next()
    }

    /// Percentage of `whole` per group, in ascending key order.
    pub fn shares(&self, metric: Metric, whole: f64) -> Vec<Share<K>>
    where
        K: Clone,
    {
        self.groups
            .iter()
            .map(|g| {
                let value = g.metric(metric);
                Share {
                    key: g.key.clone(),
                    value,
                    percentage: percentage(value, whole, 2),
                }
            })
            .collect()
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[derive(Default)]
struct Tally {
    rows: usize,
    observed: usize,
    sum: f64,
}

impl Tally {
    fn add(&mut self, value: Option<f64>) {
        self.rows += 1;
        if let Some(v) = value {
            self.observed += 1;
            self.sum += v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grouping<&'static str> {
        let rows = [
            ("Y", Some(20.0)),
            ("X", Some(10.0)),
            ("X", Some(30.0)),
            ("Z", None),
            ("W", Some(20.0)),
        ];
        Grouping::build(rows, |r| Some(r.0), |r| r.1)
    }

    // ── build ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_build_orders_keys_ascending() {
        let keys: Vec<&str> = sample().groups().iter().map(|g| g.key).collect();
        assert_eq!(keys, vec!["W", "X", "Y", "Z"]);
    }

    #[test]
    fn test_build_tracks_rows_observed_and_sum() {
        let grouping = sample();
        let x = &grouping.groups()[1];
        assert_eq!((x.rows, x.observed, x.sum), (2, 2, 40.0));
        assert_eq!(x.mean(), Some(20.0));

        let z = &grouping.groups()[3];
        assert_eq!((z.rows, z.observed), (1, 0));
        assert_eq!(z.mean(), None);
    }

    #[test]
    fn test_build_drops_rows_without_key() {
        let rows = [(None, Some(1.0)), (Some("A"), Some(2.0))];
        let grouping = Grouping::build(rows, |r| r.0, |r| r.1);
        assert_eq!(grouping.len(), 1);
        assert_eq!(grouping.total(Metric::Sum), 2.0);
    }

    // ── ranking ───────────────────────────────────────────────────────────────

    #[test]
    fn test_ranked_by_sum_is_stable_descending() {
        let ranked: Vec<&str> = sample()
            .ranked_by(Metric::Sum)
            .iter()
            .map(|g| g.key)
            .collect();
        // W and Y tie on 20 and keep ascending key order.
        assert_eq!(ranked, vec!["X", "W", "Y", "Z"]);
    }

    #[test]
    fn test_ranked_by_count() {
        let ranked: Vec<&str> = sample()
            .ranked_by(Metric::Count)
            .iter()
            .map(|g| g.key)
            .collect();
        assert_eq!(ranked, vec!["X", "W", "Y", "Z"]);
    }

    #[test]
    fn test_top_by_picks_first_maximum() {
        let grouping = sample();
        assert_eq!(grouping.top_by(Metric::Count).map(|g| g.key), Some("X"));
        let tied = Grouping::build([("b", Some(5.0)), ("a", Some(5.0))], |r| Some(r.0), |r| r.1);
        assert_eq!(tied.top_by(Metric::Sum).map(|g| g.key), Some("a"));
    }

    #[test]
    fn test_top_by_empty_is_none() {
        let empty: Grouping<&str> =
            Grouping::build(Vec::<(&str, Option<f64>)>::new(), |r| Some(r.0), |r| r.1);
        assert!(empty.top_by(Metric::Sum).is_none());
    }

    // ── shares ────────────────────────────────────────────────────────────────

    #[test]
    fn test_shares_round_to_two_decimals() {
        let grouping = Grouping::build(
            [("X", 10.0), ("Y", 20.0), ("X", 30.0)],
            |r| Some(r.0),
            |r| Some(r.1),
        );
        let shares = grouping.shares(Metric::Sum, grouping.total(Metric::Sum));
        assert_eq!(shares[0].key, "X");
        assert_eq!(shares[0].percentage, Some(66.67));
        assert_eq!(shares[1].percentage, Some(33.33));
    }

    #[test]
    fn test_shares_with_zero_whole() {
        let grouping = Grouping::build([("X", 0.0)], |r| Some(r.0), |r| Some(r.1));
        assert_eq!(grouping.shares(Metric::Sum, 0.0)[0].percentage, None);
    }
}

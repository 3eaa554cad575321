//! Plain-text rendering of a [`KpiBundle`] for `--format text`.

use std::fmt::Write;

use kpi_core::formatting::{format_amount, format_number, format_percent, NO_DATA};
use kpi_data::KpiBundle;

fn or_no_data(value: Option<f64>, decimals: u32) -> String {
    value
        .map(|v| format_number(v, decimals))
        .unwrap_or_else(|| NO_DATA.to_string())
}

fn bound(date: Option<impl std::fmt::Display>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "…".to_string())
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}\n{}", "─".repeat(title.chars().count()));
}

/// Render every KPI of `bundle` as an aligned text report.
pub fn render_text(bundle: &KpiBundle) -> String {
    let mut out = String::new();
    let meta = &bundle.metadata;

    let scope = if meta.filter.is_unrestricted() {
        "all data".to_string()
    } else {
        format!(
            "store={}, category={}, payment={}, {} → {}",
            meta.filter.store,
            meta.filter.category,
            meta.filter.payment_mode,
            bound(meta.filter.start),
            bound(meta.filter.end),
        )
    };
    let _ = writeln!(
        out,
        "KPI report: {} of {} transactions ({})",
        meta.rows_in_view, meta.rows_in_store, scope
    );

    // ── Overview ─────────────────────────────────────────────────────────────
    let amount = &bundle.transaction_amount;
    heading(&mut out, "Overview");
    let _ = writeln!(out, "{:<24}{}", "Transactions", bundle.overview.transaction_count);
    let _ = writeln!(out, "{:<24}{}", "Total revenue", format_amount(Some(amount.total_revenue)));
    let _ = writeln!(out, "{:<24}{}", "Mean amount", format_amount(amount.mean));
    let _ = writeln!(out, "{:<24}{}", "Median amount", format_amount(amount.median));
    let _ = writeln!(out, "{:<24}{}", "Min amount", format_amount(amount.min));
    let _ = writeln!(out, "{:<24}{}", "Max amount", format_amount(amount.max));
    let _ = writeln!(
        out,
        "{:<24}{}",
        "Mean satisfaction",
        or_no_data(bundle.overview.mean_satisfaction, 2)
    );
    let _ = writeln!(
        out,
        "{:<24}{}",
        "Recurrence rate",
        format_percent(bundle.client_recurrence.rate)
    );
    let top_mode = bundle
        .top_payment_mode
        .as_ref()
        .map(|m| format!("{} ({})", m.payment_mode, format_percent(m.percentage)))
        .unwrap_or_else(|| NO_DATA.to_string());
    let _ = writeln!(out, "{:<24}{}", "Top payment mode", top_mode);
    let top_category = bundle
        .top_category
        .category
        .as_ref()
        .map(|c| format!("{} ({})", c, format_percent(bundle.top_category.share)))
        .unwrap_or_else(|| NO_DATA.to_string());
    let _ = writeln!(out, "{:<24}{}", "Top category", top_category);

    // ── Tables ───────────────────────────────────────────────────────────────
    heading(&mut out, "Revenue by category");
    for row in &bundle.category_revenue {
        let _ = writeln!(
            out,
            "{:<24}{:>18}  {:>8}",
            row.category,
            format_amount(Some(row.revenue)),
            format_percent(row.percentage)
        );
    }

    heading(&mut out, "Payment modes");
    for row in &bundle.payment_modes {
        let _ = writeln!(
            out,
            "{:<24}{:>8}  {:>8}",
            row.payment_mode,
            row.transactions,
            format_percent(row.percentage)
        );
    }

    let clv = &bundle.client_lifetime_value;
    heading(&mut out, "Client lifetime value");
    let _ = writeln!(
        out,
        "mean {}  median {}  min {}  max {}",
        format_amount(clv.mean),
        format_amount(clv.median),
        format_amount(clv.min),
        format_amount(clv.max)
    );
    for (rank, client) in clv.top_clients.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. {:<20}{:>18}",
            rank + 1,
            client.client_id.to_string(),
            format_amount(Some(client.value))
        );
    }

    if !bundle.store_aggregates.is_empty() {
        heading(&mut out, "Stores");
        for row in &bundle.store_aggregates {
            let _ = writeln!(
                out,
                "{:<24}{:>18}  {:>6}  mean {}",
                row.store,
                format_amount(Some(row.revenue)),
                row.transactions,
                format_amount(row.mean_amount)
            );
        }
    }

    if !bundle.satisfaction_distribution.is_empty() {
        heading(&mut out, "Satisfaction");
        for row in &bundle.satisfaction_distribution {
            let _ = writeln!(
                out,
                "{:<24}{:>8}  {:>8}",
                format!("score {}", row.score),
                row.transactions,
                format_percent(row.percentage)
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kpi_core::models::{ClientId, FilterSpec, TransactionRecord};
    use kpi_data::{compute_kpis, TransactionStore};

    fn store() -> TransactionStore {
        let record = |client: i64, amount: f64, category: &str, mode: &str| TransactionRecord {
            transaction_id: String::new(),
            client_id: Some(ClientId::Numeric(client)),
            amount: Some(amount),
            category: Some(category.to_string()),
            payment_mode: Some(mode.to_string()),
            store: None,
            quantity: None,
            satisfaction: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        TransactionStore::from_records(vec![
            record(1, 10.0, "X", "Carte"),
            record(1, 20.0, "Y", "Carte"),
            record(2, 1000.0, "X", "Especes"),
        ])
    }

    #[test]
    fn test_render_text_contains_headline_figures() {
        let text = render_text(&compute_kpis(&store(), &FilterSpec::all()));
        assert!(text.contains("3 of 3 transactions (all data)"));
        assert!(text.contains("1,030.00 €"));
        assert!(text.contains("Carte (66.67%)"));
        assert!(text.contains("Revenue by category"));
        assert!(!text.contains("Stores"));
    }

    #[test]
    fn test_render_text_empty_view_uses_no_data() {
        let text = render_text(&compute_kpis(&store(), &FilterSpec::all().with_store("Lyon")));
        assert!(text.contains("0 of 3 transactions (store=Lyon, category="));
        assert!(text.contains(&format!("{:<24}{}", "Mean amount", NO_DATA)));
        assert!(text.contains(&format!("{:<24}{}", "Top payment mode", NO_DATA)));
    }
}

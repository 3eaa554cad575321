//! Number formatting and rounding shared by the aggregator and the CLI.
//!
//! Aggregates keep full precision internally; rounding to two decimals only
//! happens in share tables and when values are rendered for people.

/// Placeholder rendered for a KPI that has no data behind it.
pub const NO_DATA: &str = "n/a";

/// Round `value` to `decimals` places, half away from zero.
///
/// # Examples
///
/// ```
/// use kpi_core::formatting::round_to;
///
/// assert_eq!(round_to(66.666_666, 2), 66.67);
/// assert_eq!(round_to(33.333_333, 2), 33.33);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `None` when `whole` is zero: there is nothing to take a share of.
///
/// # Examples
///
/// ```
/// use kpi_core::formatting::percentage;
///
/// assert_eq!(percentage(40.0, 60.0, 2), Some(66.67));
/// assert_eq!(percentage(0.0, 0.0, 2), None);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> Option<f64> {
    if whole == 0.0 {
        return None;
    }
    Some(round_to((part / whole) * 100.0, decimal_places))
}

/// Unrounded share of `part` in `whole`, in percent.
pub fn raw_percentage(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 {
        return None;
    }
    Some(part / whole * 100.0)
}

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use kpi_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by a scaled epsilon so exact midpoints such as 1.005 round up
    // despite their binary representation.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let grouped = group_thousands(&integer_part.to_string());

    let body = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", rounded - rounded.trunc(), prec = decimals as usize);
        // "0.50" → ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

/// Format a monetary amount with two decimals and a trailing euro sign.
///
/// # Examples
///
/// ```
/// use kpi_core::formatting::format_amount;
///
/// assert_eq!(format_amount(Some(1234.5)), "1,234.50 €");
/// assert_eq!(format_amount(None), "n/a");
/// ```
pub fn format_amount(amount: Option<f64>) -> String {
    match amount {
        Some(v) => format!("{} €", format_number(v, 2)),
        None => NO_DATA.to_string(),
    }
}

/// Format a percentage with two decimals.
///
/// # Examples
///
/// ```
/// use kpi_core::formatting::format_percent;
///
/// assert_eq!(format_percent(Some(50.0)), "50.00%");
/// assert_eq!(format_percent(None), "n/a");
/// ```
pub fn format_percent(pct: Option<f64>) -> String {
    match pct {
        Some(v) => format!("{}%", format_number(v, 2)),
        None => NO_DATA.to_string(),
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = s.len() % 3;
    for (i, c) in s.chars().enumerate() {
        if i != 0 && i % 3 == remainder {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

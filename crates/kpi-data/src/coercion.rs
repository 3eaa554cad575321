//! Cell-level coercion rules applied while loading transactions.
//!
//! Each parser returns `Ok(None)` for a blank cell, `Ok(Some(_))` for a value
//! that coerced cleanly and `Err(kind)` when the cell holds something that
//! cannot be turned into the target type. The loader turns the `Err` case into
//! a [`CoercionWarning`](kpi_core::models::CoercionWarning).

use chrono::{Days, NaiveDate, NaiveDateTime};
use kpi_core::models::{CoercionKind, DecimalSeparator};

use crate::source::Cell;

/// Outcome of coercing one cell.
pub type Coerced<T> = Result<Option<T>, CoercionKind>;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M",
];

/// Day zero of the spreadsheet serial date system (1900 leap-year bug included).
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

// ── Amount ────────────────────────────────────────────────────────────────────

/// Coerce an amount cell.
pub fn parse_amount(cell: &Cell, separator: DecimalSeparator) -> Coerced<f64> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(v) if v.is_finite() => Ok(Some(*v)),
        Cell::Number(_) | Cell::Date(_) => Err(CoercionKind::InvalidAmount),
        Cell::Text(s) if s.trim().is_empty() => Ok(None),
        Cell::Text(s) => parse_amount_str(s, separator)
            .map(Some)
            .ok_or(CoercionKind::InvalidAmount),
    }
}

/// Parse a textual amount such as `"1 234,50 €"` or `"1,234.50"`.
///
/// Whitespace (including non-breaking spaces) and currency symbols are
/// dropped, then the separator policy decides which of `.` / `,` is the
/// decimal mark. Non-finite results are rejected.
pub fn parse_amount_str(raw: &str, separator: DecimalSeparator) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '€' | '$' | '£'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match separator {
        DecimalSeparator::Dot => cleaned.replace(',', ""),
        DecimalSeparator::Comma => cleaned.replace('.', "").replace(',', "."),
        DecimalSeparator::Auto => match (cleaned.rfind('.'), cleaned.rfind(',')) {
            (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => cleaned.replace(',', ""),
            (None, Some(_)) if cleaned.matches(',').count() > 1 => cleaned.replace(',', ""),
            (None, Some(_)) => cleaned.replace(',', "."),
            _ => cleaned,
        },
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ── Date ──────────────────────────────────────────────────────────────────────

/// Coerce a date cell. Numbers are read as spreadsheet serial dates.
pub fn parse_date(cell: &Cell) -> Coerced<NaiveDate> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Date(d) => Ok(Some(*d)),
        Cell::Number(serial) => {
            if !serial.is_finite() || *serial < 1.0 {
                return Err(CoercionKind::InvalidDate);
            }
            excel_epoch()
                .and_then(|epoch| epoch.checked_add_days(Days::new(serial.trunc() as u64)))
                .map(Some)
                .ok_or(CoercionKind::InvalidDate)
        }
        Cell::Text(s) if s.trim().is_empty() => Ok(None),
        Cell::Text(s) => parse_date_str(s).map(Some).ok_or(CoercionKind::InvalidDate),
    }
}

/// Parse a date or date-time string, keeping only the calendar date.
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // RFC 3339 with an offset, e.g. "2024-01-15T10:00:00+01:00".
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

// ── Integers ──────────────────────────────────────────────────────────────────

fn parse_integer(cell: &Cell) -> Result<Option<i64>, ()> {
    let value = match cell {
        Cell::Empty => return Ok(None),
        Cell::Number(v) => *v,
        Cell::Date(_) => return Err(()),
        Cell::Text(s) if s.trim().is_empty() => return Ok(None),
        Cell::Text(s) => {
            let t = s.trim();
            if let Ok(n) = t.parse::<i64>() {
                return Ok(Some(n));
            }
            t.replace(',', ".").parse::<f64>().map_err(|_| ())?
        }
    };
    if value.is_finite() && value.fract() == 0.0 {
        Ok(Some(value as i64))
    } else {
        Err(())
    }
}

/// Coerce a quantity cell. `"3.0"` is accepted, `"3.5"` is not.
pub fn parse_quantity(cell: &Cell) -> Coerced<i64> {
    parse_integer(cell).map_err(|_| CoercionKind::InvalidQuantity)
}

/// Coerce a satisfaction score; only `1..=5` is meaningful.
pub fn parse_satisfaction(cell: &Cell) -> Coerced<u8> {
    match parse_integer(cell) {
        Ok(None) => Ok(None),
        Ok(Some(n)) if (1..=5).contains(&n) => Ok(Some(n as u8)),
        Ok(Some(_)) => Err(CoercionKind::SatisfactionOutOfRange),
        Err(()) => Err(CoercionKind::InvalidSatisfaction),
    }
}

// ── Text ──────────────────────────────────────────────────────────────────────

/// Categorical value of a cell; blank cells are `None`.
pub fn parse_text(cell: &Cell) -> Option<String> {
    let text = cell.to_text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector value meaning "no restriction on this dimension".
pub const ALL: &str = "ALL";

/// Key identifying a client.
///
/// Ids that look like integers are kept numeric so that `2 < 10` orders the
/// way a spreadsheet user expects; everything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientId {
    Numeric(i64),
    Text(String),
}

impl ClientId {
    /// Build a client id from a raw cell value. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<i64>() {
            Ok(n) => Some(ClientId::Numeric(n)),
            Err(_) => Some(ClientId::Text(trimmed.to_string())),
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientId::Numeric(n) => write!(f, "{}", n),
            ClientId::Text(s) => f.write_str(s),
        }
    }
}

/// A single sale read from the transaction source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Opaque transaction identifier.
    pub transaction_id: String,
    /// Buying client; `None` rows are left out of client-keyed KPIs.
    pub client_id: Option<ClientId>,
    /// Transaction amount, `None` when the cell could not be coerced.
    pub amount: Option<f64>,
    /// Product category.
    pub category: Option<String>,
    /// Payment method (card, cash, ...).
    pub payment_mode: Option<String>,
    /// Store the sale happened in.
    pub store: Option<String>,
    /// Units sold.
    pub quantity: Option<i64>,
    /// Client satisfaction score in `1..=5`.
    pub satisfaction: Option<u8>,
    /// Calendar date of the transaction.
    pub date: NaiveDate,
}

// ── Filter selectors ──────────────────────────────────────────────────────────

/// One categorical filter dimension: either a concrete value or `ALL`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    #[default]
    All,
    Only(String),
}

impl Selector {
    /// Whether `value` passes this selector.
    ///
    /// A missing value never matches a concrete selector.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => value == Some(wanted.as_str()),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

impl From<String> for Selector {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
            Selector::All
        } else {
            Selector::Only(trimmed.to_string())
        }
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Selector::from(value.to_string())
    }
}

impl From<Option<String>> for Selector {
    fn from(value: Option<String>) -> Self {
        value.map(Selector::from).unwrap_or_default()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        match selector {
            Selector::All => ALL.to_string(),
            Selector::Only(v) => v,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str(ALL),
            Selector::Only(v) => f.write_str(v),
        }
    }
}

// ── FilterSpec ────────────────────────────────────────────────────────────────

/// The five degrees of freedom a dashboard user can filter on.
///
/// Built fresh for every interaction through the consuming `with_*` methods
/// and never modified afterwards. Missing JSON keys default to `ALL` and an
/// unbounded date range.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub store: Selector,
    pub category: Selector,
    pub payment_mode: Selector,
    /// Inclusive lower date bound.
    pub start: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub end: Option<NaiveDate>,
}

impl FilterSpec {
    /// A filter that keeps every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: impl Into<Selector>) -> Self {
        self.store = store.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<Selector>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_payment_mode(mut self, payment_mode: impl Into<Selector>) -> Self {
        self.payment_mode = payment_mode.into();
        self
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// `true` when no dimension restricts the data.
    pub fn is_unrestricted(&self) -> bool {
        self.store.is_all()
            && self.category.is_all()
            && self.payment_mode.is_all()
            && self.start.is_none()
            && self.end.is_none()
    }
}

// ── Coercion diagnostics ──────────────────────────────────────────────────────

/// What went wrong when coercing a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionKind {
    /// Amount is not a number; stored as missing.
    InvalidAmount,
    /// Amount parsed but is below zero; kept as is.
    NegativeAmount,
    /// Date did not parse; the row is skipped.
    InvalidDate,
    /// Quantity is not an integer; stored as missing.
    InvalidQuantity,
    /// Satisfaction is not an integer; stored as missing.
    InvalidSatisfaction,
    /// Satisfaction is outside `1..=5`; stored as missing.
    SatisfactionOutOfRange,
}

/// A cell that failed numeric or date coercion during load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionWarning {
    /// 1-based source line, header included.
    pub row: usize,
    /// Header name of the offending column.
    pub column: String,
    /// Raw cell content.
    pub value: String,
    pub kind: CoercionKind,
}

/// How to read the decimal separator of textual amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecimalSeparator {
    /// Whichever of `.` / `,` comes last is the decimal mark.
    #[default]
    Auto,
    /// `1,234.50`
    Dot,
    /// `1.234,50`
    Comma,
}

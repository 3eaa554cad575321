use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KpiError, Result};
use crate::models::{DecimalSeparator, FilterSpec, Selector};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Compute business KPIs from a transaction table
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kpi-dashboard",
    about = "Compute business KPIs from a transaction table",
    version
)]
pub struct Settings {
    /// Transaction source (.csv, .xlsx, .xls, .xlsm, .ods)
    #[arg(long, env = "KPI_SOURCE")]
    pub source: PathBuf,

    /// Worksheet to read from a workbook (first sheet when omitted)
    #[arg(long)]
    pub sheet: Option<String>,

    /// JSON file overriding the accepted column names
    #[arg(long)]
    pub columns: Option<PathBuf>,

    /// Decimal separator used by textual amounts
    #[arg(long, value_enum, default_value_t = DecimalSeparator::Auto)]
    pub decimal_separator: DecimalSeparator,

    /// Store filter ("ALL" for every store)
    #[arg(long)]
    pub store: Option<String>,

    /// Category filter ("ALL" for every category)
    #[arg(long)]
    pub category: Option<String>,

    /// Payment mode filter ("ALL" for every mode)
    #[arg(long)]
    pub payment_mode: Option<String>,

    /// First day of the period (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub start: Option<NaiveDate>,

    /// Last day of the period (inclusive)
    #[arg(long, value_parser = parse_date_arg)]
    pub end: Option<NaiveDate>,

    /// Output format
    #[arg(long, default_value = "json", value_parser = ["json", "text"])]
    pub format: String,

    /// Read filter changes as JSON lines from stdin and emit one bundle each
    #[arg(long)]
    pub interactive: bool,

    /// Logging level
    #[arg(long, env = "KPI_LOG_LEVEL", default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse the process arguments and apply derived overrides.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] but from an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args).map(Self::resolve)
    }

    /// `--debug` wins over whatever log level was requested.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Build the filter described by the command-line selectors.
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::all()
            .with_store(Selector::from(self.store.clone()))
            .with_category(Selector::from(self.category.clone()))
            .with_payment_mode(Selector::from(self.payment_mode.clone()))
            .with_date_range(self.start, self.end)
    }

    /// Column mapping from `--columns`, or the built-in one.
    pub fn column_mapping(&self) -> Result<ColumnMapping> {
        match &self.columns {
            Some(path) => ColumnMapping::load_from(path),
            None => Ok(ColumnMapping::default()),
        }
    }
}

/// Parse a date given as `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map_err(|_| KpiError::InvalidDate(trimmed.to_string()))
}

// ── ColumnMapping ──────────────────────────────────────────────────────────────

/// A logical column of the transaction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnField {
    TransactionId,
    Date,
    Amount,
    Category,
    PaymentMode,
    ClientId,
    Store,
    Quantity,
    Satisfaction,
}

impl ColumnField {
    pub const ALL: [ColumnField; 9] = [
        ColumnField::TransactionId,
        ColumnField::Date,
        ColumnField::Amount,
        ColumnField::Category,
        ColumnField::PaymentMode,
        ColumnField::ClientId,
        ColumnField::Store,
        ColumnField::Quantity,
        ColumnField::Satisfaction,
    ];

    /// Loading fails when a required column is absent.
    pub fn is_required(self) -> bool {
        !matches!(
            self,
            ColumnField::Store | ColumnField::Quantity | ColumnField::Satisfaction
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ColumnField::TransactionId => "transaction_id",
            ColumnField::Date => "date",
            ColumnField::Amount => "amount",
            ColumnField::Category => "category",
            ColumnField::PaymentMode => "payment_mode",
            ColumnField::ClientId => "client_id",
            ColumnField::Store => "store",
            ColumnField::Quantity => "quantity",
            ColumnField::Satisfaction => "satisfaction",
        }
    }
}

/// Header names accepted for each logical column, first match wins.
///
/// The defaults cover both spreadsheet layouts the dashboard has been fed
/// with (`Montant_Transaction` and the later `Montant`) plus plain English
/// names. A JSON file only needs to list the fields it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub transaction_id: Vec<String>,
    pub date: Vec<String>,
    pub amount: Vec<String>,
    pub category: Vec<String>,
    pub payment_mode: Vec<String>,
    pub client_id: Vec<String>,
    pub store: Vec<String>,
    pub quantity: Vec<String>,
    pub satisfaction: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            transaction_id: names(&["ID_Transaction", "transaction_id"]),
            date: names(&["Date_Transaction", "date"]),
            amount: names(&["Montant_Transaction", "Montant", "amount"]),
            category: names(&["Categorie_Produit", "category"]),
            payment_mode: names(&["Mode_Paiement", "payment_mode"]),
            client_id: names(&["ID_Client", "client_id"]),
            store: names(&["Magasin", "store"]),
            quantity: names(&["Quantite", "quantity"]),
            satisfaction: names(&["Satisfaction_Client", "satisfaction"]),
        }
    }
}

impl ColumnMapping {
    /// Load a mapping from a JSON file; absent fields keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| KpiError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mapping: ColumnMapping = serde_json::from_str(&content)?;
        mapping.validate()?;
        tracing::debug!("column mapping loaded from {}", path.display());
        Ok(mapping)
    }

    /// Every field must accept at least one header name.
    pub fn validate(&self) -> Result<()> {
        for field in ColumnField::ALL {
            if self.aliases(field).iter().all(|a| a.trim().is_empty()) {
                return Err(KpiError::Config(format!(
                    "{} column has no aliases",
                    field.label()
                )));
            }
        }
        Ok(())
    }

    pub fn aliases(&self, field: ColumnField) -> &[String] {
        match field {
            ColumnField::TransactionId => &self.transaction_id,
            ColumnField::Date => &self.date,
            ColumnField::Amount => &self.amount,
            ColumnField::Category => &self.category,
            ColumnField::PaymentMode => &self.payment_mode,
            ColumnField::ClientId => &self.client_id,
            ColumnField::Store => &self.store,
            ColumnField::Quantity => &self.quantity,
            ColumnField::Satisfaction => &self.satisfaction,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

//! The in-memory transaction table.
//!
//! A [`TransactionStore`] is built once from a source and never mutated
//! afterwards. Every KPI pass borrows it read-only, so it can be shared
//! behind an `Arc` by concurrent passes.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use chrono::NaiveDate;
use kpi_core::models::{
    ClientId, CoercionKind, CoercionWarning, DecimalSeparator, TransactionRecord,
};
use kpi_core::settings::{ColumnField, ColumnMapping};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::coercion::{
    parse_amount, parse_date, parse_quantity, parse_satisfaction, parse_text, Coerced,
};
use crate::columns::ColumnIndex;
use crate::error::DataFormatError;
use crate::source::{read_csv, read_table, Cell, RawTable};

// ── Public types ──────────────────────────────────────────────────────────────

/// What happened while loading a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadDiagnostics {
    /// Non-blank data rows found in the source.
    pub rows_read: usize,
    /// Rows that became a [`TransactionRecord`].
    pub rows_kept: usize,
    /// Rows dropped because their date was missing or unparseable.
    pub rows_skipped: usize,
    pub warnings: Vec<CoercionWarning>,
    /// `(field, source header)` pairs.
    pub detected_columns: Vec<(String, String)>,
    pub missing_optional_columns: Vec<String>,
    /// Wall-clock seconds spent reading and coercing the source.
    pub load_time_seconds: f64,
}

impl LoadDiagnostics {
    /// Number of warnings per kind.
    pub fn warning_counts(&self) -> HashMap<CoercionKind, usize> {
        let mut counts = HashMap::new();
        for w in &self.warnings {
            *counts.entry(w.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Values available to the dashboard selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub stores: Vec<String>,
    pub categories: Vec<String>,
    pub payment_modes: Vec<String>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Read-only table of transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionStore {
    records: Vec<TransactionRecord>,
    diagnostics: LoadDiagnostics,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TransactionStore {
    /// Load a CSV file or a workbook. `sheet` selects a worksheet.
    pub fn load(
        path: &Path,
        sheet: Option<&str>,
        mapping: &ColumnMapping,
        separator: DecimalSeparator,
    ) -> Result<Self, DataFormatError> {
        let started = Instant::now();
        let table = read_table(path, sheet)?;
        let store = Self::from_table(table, mapping, separator, started)?;
        info!(
            "loaded {} transactions from {} ({} skipped)",
            store.len(),
            path.display(),
            store.diagnostics.rows_skipped
        );
        Ok(store)
    }

    /// Load delimited text from any reader.
    pub fn load_from_reader<R: Read>(
        reader: R,
        mapping: &ColumnMapping,
        separator: DecimalSeparator,
    ) -> Result<Self, DataFormatError> {
        let started = Instant::now();
        let table = read_csv(reader)?;
        Self::from_table(table, mapping, separator, started)
    }

    /// Wrap already typed records; diagnostics only carry row counts.
    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        let diagnostics = LoadDiagnostics {
            rows_read: records.len(),
            rows_kept: records.len(),
            ..LoadDiagnostics::default()
        };
        Self {
            records,
            diagnostics,
        }
    }

    fn from_table(
        table: RawTable,
        mapping: &ColumnMapping,
        separator: DecimalSeparator,
        started: Instant,
    ) -> Result<Self, DataFormatError> {
        let columns = ColumnIndex::resolve(&table.headers, mapping)?;
        if table.rows.is_empty() {
            return Err(DataFormatError::EmptySource);
        }

        let mut builder = RowBuilder {
            columns: &columns,
            separator,
            warnings: Vec::new(),
        };
        let mut records = Vec::with_capacity(table.rows.len());
        let mut skipped = 0usize;
        for row in &table.rows {
            match builder.build(row.line, &row.cells) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        let diagnostics = LoadDiagnostics {
            rows_read: table.rows.len(),
            rows_kept: records.len(),
            rows_skipped: skipped,
            warnings: builder.warnings,
            detected_columns: columns.detected(),
            missing_optional_columns: columns.missing_optional(),
            load_time_seconds: started.elapsed().as_secs_f64(),
        };
        report(&diagnostics);

        Ok(Self {
            records,
            diagnostics,
        })
    }
}

fn report(diagnostics: &LoadDiagnostics) {
    if !diagnostics.missing_optional_columns.is_empty() {
        debug!(
            "optional columns not in source: {}",
            diagnostics.missing_optional_columns.join(", ")
        );
    }
    if diagnostics.warnings.is_empty() {
        return;
    }
    let mut counts: Vec<(String, usize)> = diagnostics
        .warning_counts()
        .into_iter()
        .map(|(kind, n)| (format!("{:?}", kind), n))
        .collect();
    counts.sort();
    let summary: Vec<String> = counts.iter().map(|(k, n)| format!("{k}={n}")).collect();
    warn!(
        "{} cells failed coercion ({}), {} rows skipped",
        diagnostics.warnings.len(),
        summary.join(", "),
        diagnostics.rows_skipped
    );
}

// ── Row coercion ──────────────────────────────────────────────────────────────

struct RowBuilder<'a> {
    columns: &'a ColumnIndex,
    separator: DecimalSeparator,
    warnings: Vec<CoercionWarning>,
}

static EMPTY: Cell = Cell::Empty;

impl RowBuilder<'_> {
    fn cell<'r>(&self, row: &'r [Cell], field: ColumnField) -> &'r Cell {
        self.columns
            .position(field)
            .and_then(|i| row.get(i))
            .unwrap_or(&EMPTY)
    }

    fn warn(&mut self, line: usize, field: ColumnField, cell: &Cell, kind: CoercionKind) {
        self.warnings.push(CoercionWarning {
            row: line,
            column: self
                .columns
                .header(field)
                .unwrap_or(field.label())
                .to_string(),
            value: cell.to_text(),
            kind,
        });
    }

    /// Record the failure and fall back to missing.
    fn keep<T>(&mut self, line: usize, field: ColumnField, cell: &Cell, coerced: Coerced<T>) -> Option<T> {
        match coerced {
            Ok(value) => value,
            Err(kind) => {
                self.warn(line, field, cell, kind);
                None
            }
        }
    }

    /// `None` when the row has no usable date.
    fn build(&mut self, line: usize, row: &[Cell]) -> Option<TransactionRecord> {
        let date_cell = self.cell(row, ColumnField::Date);
        let date = match parse_date(date_cell) {
            Ok(Some(date)) => date,
            Ok(None) | Err(_) => {
                self.warn(line, ColumnField::Date, date_cell, CoercionKind::InvalidDate);
                return None;
            }
        };

        let amount_cell = self.cell(row, ColumnField::Amount);
        let amount = self.keep(
            line,
            ColumnField::Amount,
            amount_cell,
            parse_amount(amount_cell, self.separator),
        );
        if amount.is_some_and(|a| a < 0.0) {
            self.warn(line, ColumnField::Amount, amount_cell, CoercionKind::NegativeAmount);
        }

        let quantity_cell = self.cell(row, ColumnField::Quantity);
        let quantity = self.keep(
            line,
            ColumnField::Quantity,
            quantity_cell,
            parse_quantity(quantity_cell),
        );

        let satisfaction_cell = self.cell(row, ColumnField::Satisfaction);
        let satisfaction = self.keep(
            line,
            ColumnField::Satisfaction,
            satisfaction_cell,
            parse_satisfaction(satisfaction_cell),
        );

        Some(TransactionRecord {
            transaction_id: parse_text(self.cell(row, ColumnField::TransactionId))
                .unwrap_or_default(),
            client_id: parse_text(self.cell(row, ColumnField::ClientId))
                .and_then(|raw| ClientId::parse(&raw)),
            amount,
            category: parse_text(self.cell(row, ColumnField::Category)),
            payment_mode: parse_text(self.cell(row, ColumnField::PaymentMode)),
            store: parse_text(self.cell(row, ColumnField::Store)),
            quantity,
            satisfaction,
            date,
        })
    }
}

// ── Access ────────────────────────────────────────────────────────────────────

impl TransactionStore {
    /// Every record in source order. Can be called any number of times.
    pub fn rows(&self) -> impl Iterator<Item = &TransactionRecord> + '_ {
        self.records.iter()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn diagnostics(&self) -> &LoadDiagnostics {
        &self.diagnostics
    }

    /// Sorted distinct selector values and the covered date span.
    pub fn filter_options(&self) -> FilterOptions {
        fn distinct<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Vec<String> {
            values
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        }

        FilterOptions {
            stores: distinct(self.rows().map(|r| r.store.as_ref())),
            categories: distinct(self.rows().map(|r| r.category.as_ref())),
            payment_modes: distinct(self.rows().map(|r| r.payment_mode.as_ref())),
            first_date: self.rows().map(|r| r.date).min(),
            last_date: self.rows().map(|r| r.date).max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
ID_Transaction;Date_Transaction;Montant;Categorie_Produit;Mode_Paiement;ID_Client;Magasin;Quantite;Satisfaction_Client
T1;2024-01-05;12,50;Epicerie;Carte;1;Lyon;2;4
T2;06/01/2024;abc;Boissons;Especes;2;Paris;1;9
T3;pas une date;8,00;Epicerie;Carte;1;Lyon;1;3
T4;2024-01-07;-5;Boissons;Carte;;Paris;x;
T5;;3;Epicerie;Carte;3;Lyon;1;5
";

    fn load_sample() -> TransactionStore {
        TransactionStore::load_from_reader(
            SAMPLE.as_bytes(),
            &ColumnMapping::default(),
            DecimalSeparator::Auto,
        )
        .unwrap()
    }

    // ── load ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_skips_rows_without_valid_date() {
        let store = load_sample();
        let diag = store.diagnostics();
        assert_eq!(diag.rows_read, 5);
        assert_eq!(diag.rows_kept, 3);
        assert_eq!(diag.rows_skipped, 2);
        let ids: Vec<&str> = store.rows().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2", "T4"]);
    }

    #[test]
    fn test_load_coerces_typed_fields() {
        let store = load_sample();
        let first = &store.records()[0];
        assert_eq!(first.amount, Some(12.5));
        assert_eq!(first.client_id, Some(ClientId::Numeric(1)));
        assert_eq!(first.store.as_deref(), Some("Lyon"));
        assert_eq!(first.quantity, Some(2));
        assert_eq!(first.satisfaction, Some(4));
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_load_records_coercion_warnings() {
        let store = load_sample();
        let counts = store.diagnostics().warning_counts();
        assert_eq!(counts.get(&CoercionKind::InvalidAmount), Some(&1));
        assert_eq!(counts.get(&CoercionKind::SatisfactionOutOfRange), Some(&1));
        assert_eq!(counts.get(&CoercionKind::NegativeAmount), Some(&1));
        assert_eq!(counts.get(&CoercionKind::InvalidQuantity), Some(&1));
        assert_eq!(counts.get(&CoercionKind::InvalidDate), Some(&2));

        let invalid_amount = store
            .diagnostics()
            .warnings
            .iter()
            .find(|w| w.kind == CoercionKind::InvalidAmount)
            .unwrap();
        assert_eq!(invalid_amount.row, 3);
        assert_eq!(invalid_amount.column, "Montant");
        assert_eq!(invalid_amount.value, "abc");
    }

    #[test]
    fn test_warning_rows_are_source_lines_after_blank_rows() {
        let input = "\
ID_Transaction,Date_Transaction,Montant,Categorie_Produit,Mode_Paiement,ID_Client
T1,2024-01-05,10,X,Carte,1
,,,,,

T2,2024-01-06,abc,X,Carte,2
";
        let store = TransactionStore::load_from_reader(
            input.as_bytes(),
            &ColumnMapping::default(),
            DecimalSeparator::Auto,
        )
        .unwrap();
        assert_eq!(store.diagnostics().rows_read, 2);
        let warning = &store.diagnostics().warnings[0];
        assert_eq!(warning.kind, CoercionKind::InvalidAmount);
        assert_eq!(warning.row, 5);
    }

    #[test]
    fn test_load_from_workbook() {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data_kpi.xlsx");
        let date_format = Format::new().set_num_format("dd/mm/yyyy");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("Ventes").unwrap();
        let headers = [
            "ID_Transaction",
            "Date_Transaction",
            "Montant",
            "Categorie_Produit",
            "Mode_Paiement",
            "ID_Client",
            "Quantite",
        ];
        for (col, header) in headers.into_iter().enumerate() {
            ws.write(0, col as u16, header).unwrap();
        }
        let date = ExcelDateTime::from_ymd(2024, 2, 10).unwrap();
        ws.write(1, 0, "T1").unwrap();
        ws.write_datetime_with_format(1, 1, &date, &date_format).unwrap();
        ws.write(1, 2, 19.9).unwrap();
        ws.write(1, 3, "Epicerie").unwrap();
        ws.write(1, 4, "Carte").unwrap();
        ws.write(1, 5, 42).unwrap();
        ws.write(1, 6, 3).unwrap();
        wb.save(&path).unwrap();

        let store = TransactionStore::load(
            &path,
            Some("Ventes"),
            &ColumnMapping::default(),
            DecimalSeparator::Auto,
        )
        .unwrap();
        assert_eq!(store.len(), 1);
        let record = &store.records()[0];
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
        assert_eq!(record.amount, Some(19.9));
        assert_eq!(record.client_id, Some(ClientId::Numeric(42)));
        assert_eq!(record.quantity, Some(3));
        assert!(store.diagnostics().warnings.is_empty());
    }

    #[test]
    fn test_load_keeps_negative_and_missing_values() {
        let store = load_sample();
        let t2 = &store.records()[1];
        assert_eq!(t2.amount, None);
        assert_eq!(t2.satisfaction, None);
        let t4 = &store.records()[2];
        assert_eq!(t4.amount, Some(-5.0));
        assert_eq!(t4.client_id, None);
        assert_eq!(t4.quantity, None);
    }

    #[test]
    fn test_load_missing_required_columns() {
        let input = "ID_Transaction,Date_Transaction,Montant\nT1,2024-01-01,3\n";
        let err = TransactionStore::load_from_reader(
            input.as_bytes(),
            &ColumnMapping::default(),
            DecimalSeparator::Auto,
        )
        .unwrap_err();
        assert!(matches!(err, DataFormatError::MissingColumns(_)));
    }

    #[test]
    fn test_load_header_only_is_empty_source() {
        let input = "ID_Transaction,Date_Transaction,Montant,Categorie_Produit,Mode_Paiement,ID_Client\n";
        let err = TransactionStore::load_from_reader(
            input.as_bytes(),
            &ColumnMapping::default(),
            DecimalSeparator::Auto,
        )
        .unwrap_err();
        assert!(matches!(err, DataFormatError::EmptySource));
    }

    #[test]
    fn test_load_from_csv_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ventes.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let store = TransactionStore::load(
            &path,
            None,
            &ColumnMapping::default(),
            DecimalSeparator::Auto,
        )
        .unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.diagnostics().missing_optional_columns.is_empty());
    }

    #[test]
    fn test_load_unsupported_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ventes.json");
        std::fs::write(&path, "[]").unwrap();
        let err = TransactionStore::load(
            &path,
            None,
            &ColumnMapping::default(),
            DecimalSeparator::Auto,
        )
        .unwrap_err();
        assert!(matches!(err, DataFormatError::UnsupportedSource(_)));
    }

    // ── access ────────────────────────────────────────────────────────────────

    #[test]
    fn test_rows_is_restartable() {
        let store = load_sample();
        assert_eq!(store.rows().count(), store.rows().count());
    }

    #[test]
    fn test_filter_options() {
        let store = load_sample();
        let options = store.filter_options();
        assert_eq!(options.stores, vec!["Lyon", "Paris"]);
        assert_eq!(options.categories, vec!["Boissons", "Epicerie"]);
        assert_eq!(options.payment_modes, vec!["Carte", "Especes"]);
        assert_eq!(options.first_date, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(options.last_date, NaiveDate::from_ymd_opt(2024, 1, 7));
    }

    #[test]
    fn test_filter_options_empty_store() {
        let options = TransactionStore::from_records(Vec::new()).filter_options();
        assert_eq!(options, FilterOptions::default());
    }
}

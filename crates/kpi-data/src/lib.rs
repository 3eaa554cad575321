//! Data layer of the KPI dashboard.
//!
//! Loads a transaction table from CSV or a workbook into an immutable
//! [`TransactionStore`], filters it and computes the full KPI catalogue
//! through [`compute_kpis`].

pub mod aggregator;
pub mod assembler;
pub mod coercion;
pub mod columns;
pub mod error;
pub mod filter;
pub mod grouping;
pub mod pipeline;
pub mod source;
pub mod store;

pub use assembler::KpiBundle;
pub use error::DataFormatError;
pub use filter::{apply, FilteredView};
pub use kpi_core as core;
pub use pipeline::compute_kpis;
pub use store::{FilterOptions, LoadDiagnostics, TransactionStore};

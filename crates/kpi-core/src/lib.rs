//! Shared vocabulary of the KPI dashboard.
//!
//! Transaction and filter models, error types, descriptive statistics,
//! number formatting and the command-line / column configuration.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod stats;

pub use error::{KpiError, Result};

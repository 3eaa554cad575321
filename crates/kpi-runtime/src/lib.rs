//! Runtime layer of the KPI dashboard.
//!
//! Owns the shared store and turns a stream of filter changes into a stream
//! of recomputed KPI bundles.

pub mod orchestrator;

pub use kpi_core as core;
pub use kpi_data as data;
pub use orchestrator::{DashboardHandle, DashboardOrchestrator, DashboardUpdate};

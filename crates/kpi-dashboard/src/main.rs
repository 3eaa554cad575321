mod bootstrap;
mod report;

use std::sync::Arc;

use anyhow::{Context, Result};
use kpi_core::models::FilterSpec;
use kpi_core::settings::Settings;
use kpi_data::{compute_kpis, KpiBundle, TransactionStore};
use kpi_runtime::DashboardOrchestrator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("KPI dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Source: {}, format: {}, interactive: {}",
        settings.source.display(),
        settings.format,
        settings.interactive
    );

    let mapping = settings
        .column_mapping()
        .context("invalid column mapping")?;
    let store = TransactionStore::load(
        &settings.source,
        settings.sheet.as_deref(),
        &mapping,
        settings.decimal_separator,
    )
    .with_context(|| format!("failed to load {}", settings.source.display()))?;

    let options = store.filter_options();
    tracing::debug!(
        "filter options: {} stores, {} categories, {} payment modes, {:?} → {:?}",
        options.stores.len(),
        options.categories.len(),
        options.payment_modes.len(),
        options.first_date,
        options.last_date
    );

    let filter = settings.filter_spec();

    if settings.interactive {
        run_interactive(Arc::new(store), filter, &settings.format).await
    } else {
        let bundle = compute_kpis(&store, &filter);
        emit(&bundle, &settings.format, true)
    }
}

/// Write one bundle to stdout. Interactive mode passes `pretty = false` so
/// every JSON bundle stays on a single line.
fn emit(bundle: &KpiBundle, format: &str, pretty: bool) -> Result<()> {
    match format {
        "text" => print!("{}", report::render_text(bundle)),
        _ if pretty => println!("{}", serde_json::to_string_pretty(bundle)?),
        _ => println!("{}", serde_json::to_string(bundle)?),
    }
    Ok(())
}

/// `None` for blank lines, otherwise the parsed filter.
fn parse_filter_line(line: &str) -> Option<serde_json::Result<FilterSpec>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

/// Queue a filter without waiting, so the loop keeps draining updates. A
/// full queue drops the event; the orchestrator only answers the newest one.
fn forward(tx: &mpsc::Sender<FilterSpec>, filter: FilterSpec) -> bool {
    match tx.try_send(filter) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::debug!("filter queue full; dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::warn!("dashboard loop has stopped; ignoring filter event");
            false
        }
    }
}

/// Answer the initial filter, then one bundle per JSON filter line read from
/// stdin until EOF or Ctrl+C.
async fn run_interactive(store: Arc<TransactionStore>, initial: FilterSpec, format: &str) -> Result<()> {
    tracing::info!("Interactive mode: reading filter events from stdin");

    let (tx, mut rx, handle) = DashboardOrchestrator::new(store).start();
    tx.send(initial).await?;

    let mut events = Some(tx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line(), if events.is_some() => {
                match line.context("failed to read stdin")? {
                    Some(line) => match parse_filter_line(&line) {
                        Some(Ok(filter)) => {
                            if let Some(tx) = &events {
                                forward(tx, filter);
                            }
                        }
                        Some(Err(e)) => tracing::warn!("ignoring malformed filter event: {}", e),
                        None => {}
                    },
                    // EOF: let the loop drain and close.
                    None => events = None,
                }
            }
            update = rx.recv() => match update {
                Some(update) => emit(&update.bundle, format, false)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; shutting down dashboard loop");
                handle.abort();
                return Ok(());
            }
        }
    }

    handle.join().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpi_core::models::Selector;

    #[test]
    fn test_parse_filter_line() {
        assert!(parse_filter_line("   ").is_none());

        let spec = parse_filter_line(r#"{"category": "Epicerie", "start": "2024-01-01"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(spec.category, Selector::Only("Epicerie".to_string()));
        assert!(spec.store.is_all());

        assert!(parse_filter_line("{not json").unwrap().is_err());
    }

    #[test]
    fn test_forward_drops_event_when_queue_full() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(forward(&tx, FilterSpec::all()));
        assert!(!forward(&tx, FilterSpec::all().with_store("Lyon")));
        assert_eq!(rx.try_recv().unwrap(), FilterSpec::all());
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!forward(&tx, FilterSpec::all()));
    }
}

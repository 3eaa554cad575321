use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to an [`EnvFilter`] directive.
///
/// Unknown names are passed through so that raw directives such as
/// `kpi_data=trace` keep working.
pub fn log_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Create the parent directory of `log_file` when it does not exist yet.
pub fn ensure_log_dir(log_file: &Path) -> anyhow::Result<()> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory {}", parent.display()))?;
    }
    Ok(())
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr, or are appended to `log_file` when given, so that
/// stdout only ever carries KPI output. Falls back to `info` when the level
/// does not parse.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(log_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            ensure_log_dir(path)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            registry.with(layer).try_init()?;
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            registry.with(layer).try_init()?;
        }
    }

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── log_directive ─────────────────────────────────────────────────────────

    #[test]
    fn test_log_directive_maps_level_names() {
        assert_eq!(log_directive("DEBUG"), "debug");
        assert_eq!(log_directive("info"), "info");
        assert_eq!(log_directive("WARNING"), "warn");
        assert_eq!(log_directive("CRITICAL"), "error");
        assert_eq!(log_directive("kpi_data=trace"), "kpi_data=trace");
    }

    // ── ensure_log_dir ────────────────────────────────────────────────────────

    #[test]
    fn test_ensure_log_dir_creates_parents() {
        let tmp = TempDir::new().expect("tempdir");
        let log_file = tmp.path().join("logs").join("nested").join("kpi.log");

        ensure_log_dir(&log_file).expect("ensure_log_dir should succeed");

        assert!(tmp.path().join("logs").join("nested").is_dir());
        assert!(!log_file.exists(), "only the directory is created");
    }

    #[test]
    fn test_ensure_log_dir_bare_file_name() {
        ensure_log_dir(Path::new("kpi.log")).expect("no parent to create");
    }
}

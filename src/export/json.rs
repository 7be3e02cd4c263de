// src/export/json.rs
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::runner::RunReport;

pub const REPORT_FORMAT: &str = "snapshot-sender-run-report-v1";

/// Run report wrapped in a versioned envelope
pub fn report_to_json(report: &RunReport) -> Result<Value> {
    Ok(json!({
        "export_format": REPORT_FORMAT,
        "exported_at": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "exporter_version": env!("CARGO_PKG_VERSION"),
        "exit_code": report.exit_code(),
        "report": serde_json::to_value(report)?,
    }))
}

/// Write the run report as pretty-printed JSON to `path`
///
/// The skip log carries record ids and error messages, never payloads or keys.
pub fn export_report_json<P: AsRef<Path>>(report: &RunReport, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let export = report_to_json(report)?;
    std::fs::write(path, serde_json::to_string_pretty(&export)?)?;
    info!(
        path = %path.display(),
        skipped = report.records_skipped,
        "run report exported"
    );
    Ok(())
}

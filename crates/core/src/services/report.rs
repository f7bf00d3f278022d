use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::SearchReport;

/// Serialize a report as pretty JSON with four-space indentation.
pub fn render_report(report: &SearchReport) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    report.serialize(&mut serializer).context("Failed to serialize search report")?;
    out.push(b'\n');
    Ok(out)
}

/// Write a report to `path` via a sibling temp file and a rename, so readers
/// never observe a half-written report.
pub fn write_report(path: &Path, report: &SearchReport) -> Result<()> {
    let body = render_report(report)?;
    let file_name = path
        .file_name()
        .with_context(|| format!("Report path has no file name: {}", path.display()))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&tmp_path, &body)
        .with_context(|| format!("Failed to write report to {}", tmp_path.display()))?;
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("Failed to move report into {}", path.display()));
    }
    Ok(())
}

/// Read a report back, e.g. for post-processing or tests.
pub fn read_report(path: &Path) -> Result<SearchReport> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report at {}", path.display()))?;
    serde_json::from_str(&body).context("Failed to parse report JSON")
}

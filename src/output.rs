use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::types::ProbeOutcome;

/// Serialization format picked from the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

impl OutputFormat {
    /// `.json` (any case) selects JSON; everything else is tab-separated text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Glyph used for a reachable / unreachable outcome.
pub fn mark(outcome: &ProbeOutcome) -> &'static str {
    if outcome.reachable {
        "✓"
    } else {
        "✗"
    }
}

/// Render outcomes as `<mark>\t<mode>\t<host>:<port>` lines.
pub fn render_text(outcomes: &[ProbeOutcome]) -> String {
    let mut out = String::new();
    for o in outcomes {
        out.push_str(mark(o));
        out.push('\t');
        out.push_str(o.mode.as_str());
        out.push('\t');
        out.push_str(&o.endpoint());
        out.push('\n');
    }
    out
}

/// Write outcomes as a pretty JSON array.
pub fn write_results_json(path: &Path, outcomes: &[ProbeOutcome]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, outcomes)?;
    writer.flush()?;
    Ok(())
}

pub fn write_results_text(path: &Path, outcomes: &[ProbeOutcome]) -> Result<()> {
    fs::write(path, render_text(outcomes))
        .with_context(|| format!("cannot write {}", path.display()))
}

/// Write outcomes in the format implied by `path`.
pub fn write_results(path: &Path, outcomes: &[ProbeOutcome]) -> Result<OutputFormat> {
    let format = OutputFormat::from_path(path);
    match format {
        OutputFormat::Json => write_results_json(path, outcomes)?,
        OutputFormat::Text => write_results_text(path, outcomes)?,
    }
    Ok(format)
}

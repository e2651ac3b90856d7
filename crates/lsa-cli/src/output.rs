//! Result documents: JSON with provenance, or one flat CSV table.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use lsa_common::format_numeric;
use lsa_ingest::InputFingerprint;
use lsa_model::{AnalysisResults, ResultRow, RowStatus};

/// Where a result document came from.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance<'a> {
    pub study: &'a str,
    pub generated_at: DateTime<Utc>,
    pub tool_version: &'static str,
    pub inputs: &'a [InputFingerprint],
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultDocument<'a> {
    pub provenance: Provenance<'a>,
    pub results: &'a AnalysisResults,
}

impl<'a> ResultDocument<'a> {
    pub fn new(
        study: &'a str,
        inputs: &'a [InputFingerprint],
        results: &'a AnalysisResults,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provenance: Provenance {
                study,
                generated_at,
                tool_version: env!("CARGO_PKG_VERSION"),
                inputs,
            },
            results,
        }
    }
}

/// Result file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

pub fn write_json<W: Write>(writer: W, document: &ResultDocument<'_>) -> Result<()> {
    serde_json::to_writer_pretty(writer, document).context("serialize result document")
}

const CSV_HEADER: [&str; 14] = [
    "analysis",
    "outcome",
    "moderator",
    "stratum",
    "comparison",
    "status",
    "estimate",
    "standard_error",
    "lower_ci",
    "upper_ci",
    "t_ratio",
    "p_value",
    "degrees_of_freedom",
    "reason",
];

/// One line per result row, every analysis in one table.
pub fn write_csv<W: Write>(writer: W, results: &AnalysisResults) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADER).context("write CSV header")?;
    for row in results.rows() {
        out.write_record(csv_record(row)).context("write CSV row")?;
    }
    out.flush().context("flush CSV output")?;
    Ok(())
}

fn csv_record(row: &ResultRow) -> Vec<String> {
    let mut record = vec![
        row.analysis.as_str().to_string(),
        row.outcome.clone(),
        row.moderator.clone().unwrap_or_default(),
        row.stratum.clone(),
        row.comparison.clone(),
    ];
    match &row.status {
        RowStatus::Computed(stats) => {
            record.push("computed".to_string());
            record.extend(
                [
                    stats.estimate,
                    stats.standard_error,
                    stats.lower_ci,
                    stats.upper_ci,
                    stats.t_ratio,
                    stats.p_value,
                    stats.degrees_of_freedom,
                ]
                .map(format_numeric),
            );
            record.push(String::new());
        }
        RowStatus::Omitted { reason } => {
            record.push("omitted".to_string());
            record.extend(std::iter::repeat_n(String::new(), 7));
            record.push(reason.clone());
        }
    }
    record
}

/// Writes `document` to `path` in `format`.
pub fn write_results(path: &Path, format: OutputFormat, document: &ResultDocument<'_>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Json => write_json(&mut writer, document)?,
        OutputFormat::Csv => write_csv(&mut writer, document.results)?,
    }
    writer
        .flush()
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = document.results.rows().count(), "wrote results");
    Ok(())
}

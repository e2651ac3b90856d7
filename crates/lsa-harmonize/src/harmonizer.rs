//! Instrument tables to the long measurement panel.

use std::collections::{BTreeMap, BTreeSet};

use lsa_model::{HarmonizationError, Panel, PanelRow, StudyConfig};
use polars::prelude::DataFrame;

use crate::assignments::ArmAssignments;
use crate::records::{InstrumentRecord, apply_fixes, extract_records};

/// Audit trail of one harmonization run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarmonizationReport {
    /// Non-fatal issues, in the order they were found.
    pub issues: Vec<HarmonizationError>,
    /// Cells changed per fix name.
    pub fix_counts: BTreeMap<String, usize>,
    /// Records kept per instrument after the arm join.
    pub records_by_instrument: BTreeMap<String, usize>,
    /// Instrument rows dropped for lack of an arm.
    pub dropped_rows: usize,
}

impl HarmonizationReport {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn cells_fixed(&self) -> usize {
        self.fix_counts.values().sum()
    }
}

/// The panel plus its audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Harmonized {
    pub panel: Panel,
    pub report: HarmonizationReport,
}

/// Merges instrument tables into one long panel.
///
/// `tables` maps instrument names to their wide tables. Every instrument an
/// outcome reads from needs a table. Composites are computed from the fixed
/// item values; rows of participants without an arm assignment are dropped
/// and reported once per participant and instrument.
pub fn harmonize(
    config: &StudyConfig,
    tables: &BTreeMap<String, DataFrame>,
    arms: &ArmAssignments,
) -> Result<Harmonized, HarmonizationError> {
    for name in tables.keys() {
        if config.instrument(name).is_none() {
            return Err(HarmonizationError::UnknownInstrument {
                instrument: name.clone(),
            });
        }
    }

    let mut report = HarmonizationReport::default();
    let mut records_by_instrument: BTreeMap<&str, Vec<InstrumentRecord>> = BTreeMap::new();
    for mapping in &config.instruments {
        let used = config.outcomes.iter().any(|o| o.instrument == mapping.name);
        let Some(df) = tables.get(&mapping.name) else {
            if used {
                return Err(HarmonizationError::MissingTable {
                    instrument: mapping.name.clone(),
                });
            }
            continue;
        };

        let mut records = extract_records(df, mapping, &config.timepoints)?;
        report
            .fix_counts
            .extend(apply_fixes(&mapping.name, &mut records, &config.fixes));

        let before = records.len();
        let mut unresolved = BTreeSet::new();
        records.retain(|record| {
            let known = arms.arm(&record.participant).is_some();
            if !known {
                unresolved.insert(record.participant.clone());
            }
            known
        });
        report.dropped_rows += before - records.len();
        for participant in unresolved {
            let issue = HarmonizationError::UnresolvedArm {
                participant,
                instrument: mapping.name.clone(),
            };
            tracing::warn!(%issue, "dropping rows without an arm");
            report.issues.push(issue);
        }

        report
            .records_by_instrument
            .insert(mapping.name.clone(), records.len());
        records_by_instrument.insert(mapping.name.as_str(), records);
    }

    let mut rows = Vec::new();
    for outcome in &config.outcomes {
        let Some(records) = records_by_instrument.get(outcome.instrument.as_str()) else {
            continue;
        };
        let start = rows.len();
        for record in records {
            let Some(arm) = arms.arm(&record.participant) else {
                continue;
            };
            rows.push(PanelRow {
                participant_id: record.participant.clone(),
                timepoint: record.timepoint,
                arm,
                outcome: outcome.name.clone(),
                value: outcome.composite(&record.items),
            });
        }
        rows[start..].sort_by(|a, b| {
            a.participant_id
                .cmp(&b.participant_id)
                .then(a.timepoint.cmp(&b.timepoint))
        });
    }

    let panel = Panel {
        timepoints: config.timepoints.clone(),
        arms: config.arms.clone(),
        outcomes: config.outcomes.iter().map(|o| o.name.clone()).collect(),
        rows,
    };
    tracing::info!(
        rows = panel.rows.len(),
        participants = panel.participants().len(),
        outcomes = panel.outcomes.len(),
        issues = report.issues.len(),
        cells_fixed = report.cells_fixed(),
        "harmonized panel"
    );
    Ok(Harmonized { panel, report })
}

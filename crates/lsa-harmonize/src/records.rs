//! Wide instrument rows parsed into typed records.

use std::collections::{BTreeMap, BTreeSet};

use lsa_common::{NumericCell, cell_text, numeric_cell};
use lsa_model::{DataFix, HarmonizationError, InstrumentMapping, Timepoint, TimepointScale};
use polars::prelude::{Column, DataFrame};

/// One participant × timepoint row of an instrument table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InstrumentRecord {
    pub participant: String,
    pub timepoint: Timepoint,
    /// Item name -> parsed value.
    pub items: BTreeMap<String, Option<f64>>,
}

pub(crate) fn column<'a>(
    df: &'a DataFrame,
    table: &str,
    name: &str,
) -> Result<&'a Column, HarmonizationError> {
    df.column(name)
        .map_err(|_| HarmonizationError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
}

pub(crate) fn cell(
    column: &Column,
    row: usize,
) -> Result<polars::prelude::AnyValue<'_>, HarmonizationError> {
    column.get(row).map_err(|e| HarmonizationError::Frame {
        message: e.to_string(),
    })
}

/// Parses an instrument table into records with canonical timepoints.
///
/// Rows with a blank participant id are skipped. Unmapped timepoint labels,
/// non-numeric item text and duplicate (participant, timepoint) rows are
/// fatal.
pub(crate) fn extract_records(
    df: &DataFrame,
    mapping: &InstrumentMapping,
    scale: &TimepointScale,
) -> Result<Vec<InstrumentRecord>, HarmonizationError> {
    let table = mapping.name.as_str();
    let participant_col = column(df, table, &mapping.participant_column)?;
    let timepoint_col = column(df, table, &mapping.timepoint_column)?;
    let item_cols = mapping
        .items
        .iter()
        .map(|(item, source)| Ok((item.as_str(), column(df, table, source)?)))
        .collect::<Result<Vec<_>, HarmonizationError>>()?;

    let mut seen = BTreeSet::new();
    let mut records = Vec::with_capacity(df.height());
    let mut blank_ids = 0usize;
    for row in 0..df.height() {
        let participant = cell_text(cell(participant_col, row)?);
        if participant.is_empty() {
            blank_ids += 1;
            continue;
        }
        let label = cell_text(cell(timepoint_col, row)?);
        let Some(timepoint) = scale.resolve(&label, &mapping.timepoint_labels) else {
            return Err(HarmonizationError::UnmappedTimepoint {
                instrument: mapping.name.clone(),
                label,
            });
        };
        if !seen.insert((participant.clone(), timepoint)) {
            return Err(HarmonizationError::DuplicateMeasurement {
                instrument: mapping.name.clone(),
                participant,
                timepoint: scale.label(timepoint).to_string(),
            });
        }

        let mut items = BTreeMap::new();
        for (item, col) in &item_cols {
            let value = match numeric_cell(cell(col, row)?) {
                NumericCell::Missing => None,
                NumericCell::Value(v) => Some(v),
                NumericCell::Invalid(text) => {
                    return Err(HarmonizationError::InvalidItemValue {
                        instrument: mapping.name.clone(),
                        participant,
                        item: (*item).to_string(),
                        value: text,
                    });
                }
            };
            items.insert((*item).to_string(), value);
        }
        records.push(InstrumentRecord {
            participant,
            timepoint,
            items,
        });
    }

    if blank_ids > 0 {
        tracing::warn!(
            instrument = %mapping.name,
            rows = blank_ids,
            "skipped rows with a blank participant id"
        );
    }
    Ok(records)
}

/// Applies every fix declared for `instrument`, in declaration order.
///
/// Returns the number of changed cells per fix name; fixes that touched
/// nothing still appear with a zero count.
pub(crate) fn apply_fixes(
    instrument: &str,
    records: &mut [InstrumentRecord],
    fixes: &[DataFix],
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for fix in fixes.iter().filter(|fix| fix.instrument == instrument) {
        let mut changed = 0usize;
        for record in records.iter_mut() {
            for (item, value) in record.items.iter_mut() {
                if !fix.applies_to(instrument, item) {
                    continue;
                }
                if let Some(fixed) = value.and_then(|v| fix.apply(v)) {
                    *value = Some(fixed);
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            tracing::info!(fix = %fix.name, instrument, cells = changed, "applied data fix");
        }
        counts.insert(fix.name.clone(), changed);
    }
    counts
}

//! Cleaned instrument tables.

use std::collections::BTreeMap;

use lsa_model::{HarmonizationError, InstrumentMapping, StudyConfig};
use polars::prelude::{Column, DataFrame, NamedFrom, Series};

use crate::records::{InstrumentRecord, apply_fixes, extract_records};

/// An instrument table after label normalization and data fixes.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    /// Participant column, canonical timepoint labels and one numeric column
    /// per mapped item, under the mapping's own column names.
    pub frame: DataFrame,
    /// Cells changed per fix name.
    pub fix_counts: BTreeMap<String, usize>,
}

/// Normalizes timepoint labels and applies the instrument's fixes.
///
/// The output still matches `mapping`, so it can be cleaned or harmonized
/// again. Cleaning a cleaned table changes nothing and reports zero fixes.
pub fn clean_table(
    df: &DataFrame,
    mapping: &InstrumentMapping,
    config: &StudyConfig,
) -> Result<CleanedTable, HarmonizationError> {
    let mut records = extract_records(df, mapping, &config.timepoints)?;
    let fix_counts = apply_fixes(&mapping.name, &mut records, &config.fixes);
    let frame = records_to_frame(&records, mapping, config)?;
    Ok(CleanedTable { frame, fix_counts })
}

fn records_to_frame(
    records: &[InstrumentRecord],
    mapping: &InstrumentMapping,
    config: &StudyConfig,
) -> Result<DataFrame, HarmonizationError> {
    let participants: Vec<&str> = records.iter().map(|r| r.participant.as_str()).collect();
    let timepoints: Vec<&str> = records
        .iter()
        .map(|r| config.timepoints.label(r.timepoint))
        .collect();

    let mut columns: Vec<Column> = vec![
        Series::new(mapping.participant_column.as_str().into(), participants).into(),
        Series::new(mapping.timepoint_column.as_str().into(), timepoints).into(),
    ];
    for (item, source) in &mapping.items {
        let values: Vec<Option<f64>> = records
            .iter()
            .map(|r| r.items.get(item).copied().flatten())
            .collect();
        columns.push(Series::new(source.as_str().into(), values).into());
    }
    DataFrame::new(columns).map_err(|e| HarmonizationError::Frame {
        message: e.to_string(),
    })
}

//! Participant-keyed tables: arm assignments and covariates.

use std::collections::BTreeMap;

use lsa_common::{cell_text, is_missing_token};
use lsa_model::{Arm, ArmSet, CovariateSpec, CovariateTable, HarmonizationError, TableSource};
use polars::prelude::DataFrame;

use crate::records::{cell, column};

/// Authoritative participant -> arm map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmAssignments {
    arms: BTreeMap<String, Arm>,
}

impl ArmAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, participant: impl Into<String>, arm: Arm) -> Self {
        self.arms.insert(participant.into(), arm);
        self
    }

    pub fn arm(&self, participant: &str) -> Option<Arm> {
        self.arms.get(participant).copied()
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}

/// Reads arm assignments from the arm table.
///
/// The arm column is `source.column_for("arm")`. Participants whose value
/// does not resolve to a declared arm, or who appear with two different
/// arms, get no assignment; the harmonizer then reports them as unresolved.
pub fn arm_assignments_from_frame(
    df: &DataFrame,
    source: &TableSource,
    arms: &ArmSet,
) -> Result<ArmAssignments, HarmonizationError> {
    let participant_col = column(df, "arms", &source.participant_column)?;
    let arm_col = column(df, "arms", source.column_for("arm"))?;

    let mut resolved: BTreeMap<String, Option<Arm>> = BTreeMap::new();
    for row in 0..df.height() {
        let participant = cell_text(cell(participant_col, row)?);
        if participant.is_empty() {
            continue;
        }
        let raw = cell_text(cell(arm_col, row)?);
        let arm = arms.resolve(&raw);
        if arm.is_none() && !is_missing_token(&raw) {
            tracing::warn!(participant = %participant, value = %raw, "arm value matches no declared arm");
        }
        match resolved.get(&participant) {
            Some(previous) if *previous != arm => {
                tracing::warn!(participant = %participant, "conflicting arm assignments");
                resolved.insert(participant, None);
            }
            Some(_) => {}
            None => {
                resolved.insert(participant, arm);
            }
        }
    }

    let arms = resolved
        .into_iter()
        .filter_map(|(participant, arm)| arm.map(|arm| (participant, arm)))
        .collect::<BTreeMap<_, _>>();
    tracing::info!(participants = arms.len(), "loaded arm assignments");
    Ok(ArmAssignments { arms })
}

/// Builds the covariate table from a participant-keyed frame.
///
/// Every declared covariate needs a column (`source.column_for(name)`).
/// Missing tokens stay missing; undeclared levels are returned as non-fatal
/// [`HarmonizationError::InvalidCovariateLevel`] issues and treated as missing.
pub fn covariate_table_from_frame(
    df: &DataFrame,
    source: &TableSource,
    specs: &[CovariateSpec],
) -> Result<(CovariateTable, Vec<HarmonizationError>), HarmonizationError> {
    let participant_col = column(df, "covariates", &source.participant_column)?;
    let value_cols = specs
        .iter()
        .map(|spec| {
            Ok((
                spec.name.as_str(),
                column(df, "covariates", source.column_for(&spec.name))?,
            ))
        })
        .collect::<Result<Vec<_>, HarmonizationError>>()?;

    let mut table = CovariateTable::new(specs.to_vec());
    let mut issues = Vec::new();
    for row in 0..df.height() {
        let participant = cell_text(cell(participant_col, row)?);
        if participant.is_empty() {
            continue;
        }
        for (name, col) in &value_cols {
            let raw = cell_text(cell(col, row)?);
            if is_missing_token(&raw) {
                continue;
            }
            if let Err(issue) = table.insert(&participant, name, &raw) {
                tracing::warn!(%issue, "covariate value treated as missing");
                issues.push(issue);
            }
        }
    }
    tracing::info!(
        participants = table.participant_count(),
        covariates = specs.len(),
        issues = issues.len(),
        "built covariate table"
    );
    Ok((table, issues))
}

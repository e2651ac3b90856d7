//! Phase collapsing for subgroup models.

use std::collections::BTreeMap;

use lsa_model::{Arm, Timepoint};
use serde::{Deserialize, Serialize};

use crate::baseline::{AdjustedRow, BaselineAdjusted};

/// A named group of post-baseline timepoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub timepoints: Vec<Timepoint>,
}

impl Phase {
    pub fn new(name: impl Into<String>, timepoints: Vec<Timepoint>) -> Self {
        Self {
            name: name.into(),
            timepoints,
        }
    }
}

/// One participant's mean value within one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRow {
    pub participant_id: String,
    pub phase: String,
    pub arm: Arm,
    pub value: f64,
    pub baseline: f64,
    pub baseline_centered: f64,
}

/// Averages each participant's adjusted values within each phase.
///
/// Output is ordered by phase (declaration order) then participant id.
/// Participants with no value in a phase contribute no row for it.
pub fn collapse_phases(adjusted: &BaselineAdjusted, phases: &[Phase]) -> Vec<PhaseRow> {
    let mut out = Vec::new();
    for phase in phases {
        // participant -> (sum, count, first row seen)
        let mut acc: BTreeMap<&str, (f64, usize, &AdjustedRow)> = BTreeMap::new();
        for row in adjusted
            .rows
            .iter()
            .filter(|row| phase.timepoints.contains(&row.timepoint))
        {
            let entry = acc
                .entry(row.participant_id.as_str())
                .or_insert((0.0, 0, row));
            entry.0 += row.value;
            entry.1 += 1;
        }
        out.extend(acc.into_iter().map(|(participant, (sum, count, row))| PhaseRow {
            participant_id: participant.to_string(),
            phase: phase.name.clone(),
            arm: row.arm,
            value: sum / count as f64,
            baseline: row.baseline,
            baseline_centered: row.baseline_centered,
        }));
    }
    out
}

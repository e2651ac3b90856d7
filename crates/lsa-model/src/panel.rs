//! The harmonized long-format measurement panel.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::arm::{Arm, ArmSet};
use crate::timepoint::{Timepoint, TimepointScale};

/// One outcome value for one participant at one timepoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub participant_id: String,
    pub timepoint: Timepoint,
    pub arm: Arm,
    pub outcome: String,
    pub value: Option<f64>,
}

/// Long-format panel shared by every analysis.
///
/// Rows are unique per (participant, timepoint, outcome) and sorted by
/// outcome (declaration order), participant id and timepoint, so two panels
/// built from the same inputs serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub timepoints: TimepointScale,
    pub arms: ArmSet,
    /// Outcome names in declaration order.
    pub outcomes: Vec<String>,
    pub rows: Vec<PanelRow>,
}

impl Panel {
    /// Rows of one outcome.
    pub fn rows_for<'a>(&'a self, outcome: &'a str) -> impl Iterator<Item = &'a PanelRow> + 'a {
        self.rows.iter().filter(move |row| row.outcome == outcome)
    }

    pub fn has_outcome(&self, outcome: &str) -> bool {
        self.outcomes.iter().any(|o| o == outcome)
    }

    /// Distinct participant ids across all outcomes.
    pub fn participants(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .map(|row| row.participant_id.as_str())
            .collect()
    }

    /// Looks up one cell.
    pub fn value(&self, participant: &str, timepoint: Timepoint, outcome: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| {
                row.participant_id == participant
                    && row.timepoint == timepoint
                    && row.outcome == outcome
            })
            .and_then(|row| row.value)
    }

    /// Timepoints with at least one observed value for an outcome, in study order.
    pub fn observed_timepoints(&self, outcome: &str) -> Vec<Timepoint> {
        let set: BTreeSet<Timepoint> = self
            .rows_for(outcome)
            .filter(|row| row.value.is_some())
            .map(|row| row.timepoint)
            .collect();
        set.into_iter().collect()
    }

    pub fn timepoint_label(&self, timepoint: Timepoint) -> &str {
        self.timepoints.label(timepoint)
    }

    pub fn arm_label(&self, arm: Arm) -> &str {
        self.arms.label(arm)
    }
}

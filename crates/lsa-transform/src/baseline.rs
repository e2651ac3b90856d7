//! Baseline normalization.

use std::collections::BTreeMap;

use lsa_model::{Arm, Panel, Timepoint};
use serde::{Deserialize, Serialize};

/// A post-baseline panel row carrying the participant's baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedRow {
    pub participant_id: String,
    pub timepoint: Timepoint,
    pub arm: Arm,
    pub value: f64,
    pub baseline: f64,
    /// `baseline` minus the outcome's mean baseline.
    pub baseline_centered: f64,
}

/// Baseline-adjusted rows of one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineAdjusted {
    pub outcome: String,
    /// Mean baseline over participants with an observed baseline.
    pub baseline_mean: Option<f64>,
    /// Participants with an observed baseline.
    pub n_baseline: usize,
    /// Participant id -> centered baseline.
    pub centered_baselines: BTreeMap<String, f64>,
    /// Post-baseline rows with an observed value, in panel order.
    pub rows: Vec<AdjustedRow>,
}

impl BaselineAdjusted {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct post-baseline timepoints present in `rows`, in study order.
    pub fn timepoints(&self) -> Vec<Timepoint> {
        let mut tps: Vec<Timepoint> = self.rows.iter().map(|r| r.timepoint).collect();
        tps.sort();
        tps.dedup();
        tps
    }
}

/// Annotates an outcome's post-baseline rows with the centered baseline.
///
/// The mean is taken over every participant with an observed baseline for
/// this outcome, including those with no post-baseline values. Participants
/// without a baseline contribute no rows. Unknown outcomes give an empty
/// result.
pub fn baseline_adjust(panel: &Panel, outcome: &str) -> BaselineAdjusted {
    let baselines: BTreeMap<&str, f64> = panel
        .rows_for(outcome)
        .filter(|row| row.timepoint.is_baseline())
        .filter_map(|row| row.value.map(|v| (row.participant_id.as_str(), v)))
        .collect();

    let n_baseline = baselines.len();
    let baseline_mean =
        (n_baseline > 0).then(|| baselines.values().sum::<f64>() / n_baseline as f64);
    let mean = baseline_mean.unwrap_or(0.0);

    let centered_baselines: BTreeMap<String, f64> = baselines
        .iter()
        .map(|(participant, &value)| ((*participant).to_string(), value - mean))
        .collect();

    let mut missing_baseline = 0usize;
    let rows: Vec<AdjustedRow> = panel
        .rows_for(outcome)
        .filter(|row| !row.timepoint.is_baseline())
        .filter_map(|row| {
            let value = row.value?;
            let Some(&baseline) = baselines.get(row.participant_id.as_str()) else {
                missing_baseline += 1;
                return None;
            };
            Some(AdjustedRow {
                participant_id: row.participant_id.clone(),
                timepoint: row.timepoint,
                arm: row.arm,
                value,
                baseline,
                baseline_centered: baseline - mean,
            })
        })
        .collect();

    if missing_baseline > 0 {
        tracing::debug!(
            outcome,
            rows = missing_baseline,
            "dropped post-baseline rows without a baseline"
        );
    }
    BaselineAdjusted {
        outcome: outcome.to_string(),
        baseline_mean,
        n_baseline,
        centered_baselines,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsa_model::{ArmSet, PanelRow, TimepointScale};
    use proptest::prelude::*;

    fn panel(rows: Vec<PanelRow>) -> Panel {
        Panel {
            timepoints: TimepointScale::new(["Baseline", "Week 1", "Week 6"]),
            arms: ArmSet::new("Control", "Intervention"),
            outcomes: vec!["distress".to_string(), "loneliness".to_string()],
            rows,
        }
    }

    fn row(participant: &str, tp: usize, outcome: &str, value: Option<f64>) -> PanelRow {
        PanelRow {
            participant_id: participant.to_string(),
            timepoint: Timepoint(tp),
            arm: Arm::CONTROL,
            outcome: outcome.to_string(),
            value,
        }
    }

    #[test]
    fn test_centering_uses_all_observed_baselines() {
        let panel = panel(vec![
            row("P1", 0, "distress", Some(2.0)),
            row("P1", 1, "distress", Some(3.0)),
            row("P2", 0, "distress", Some(4.0)),
            row("P2", 1, "distress", None),
        ]);
        let adjusted = baseline_adjust(&panel, "distress");
        assert_eq!(adjusted.baseline_mean, Some(3.0));
        assert_eq!(adjusted.n_baseline, 2);
        assert_eq!(adjusted.rows.len(), 1);
        assert_eq!(adjusted.rows[0].baseline, 2.0);
        assert_eq!(adjusted.rows[0].baseline_centered, -1.0);
        assert_eq!(adjusted.centered_baselines["P2"], 1.0);
    }

    #[test]
    fn test_missing_baseline_only_affects_that_outcome() {
        let panel = panel(vec![
            row("P1", 0, "distress", None),
            row("P1", 1, "distress", Some(3.0)),
            row("P2", 0, "distress", Some(4.0)),
            row("P2", 2, "distress", Some(5.0)),
            row("P1", 0, "loneliness", Some(1.0)),
            row("P1", 2, "loneliness", Some(2.0)),
        ]);
        let distress = baseline_adjust(&panel, "distress");
        assert!(distress.rows.iter().all(|r| r.participant_id != "P1"));
        assert_eq!(distress.rows.len(), 1);

        let loneliness = baseline_adjust(&panel, "loneliness");
        assert_eq!(loneliness.rows.len(), 1);
        assert_eq!(loneliness.rows[0].participant_id, "P1");
        assert_eq!(loneliness.rows[0].baseline_centered, 0.0);
    }

    #[test]
    fn test_no_baselines() {
        let panel = panel(vec![row("P1", 1, "distress", Some(3.0))]);
        let adjusted = baseline_adjust(&panel, "distress");
        assert!(adjusted.is_empty());
        assert_eq!(adjusted.baseline_mean, None);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let panel = panel(vec![
            row("P1", 0, "distress", Some(2.5)),
            row("P1", 2, "distress", Some(3.0)),
        ]);
        assert_eq!(
            baseline_adjust(&panel, "distress"),
            baseline_adjust(&panel, "distress")
        );
    }

    proptest! {
        #[test]
        fn prop_centered_baselines_have_zero_mean(
            values in proptest::collection::vec(proptest::option::of(-50.0f64..50.0), 1..40)
        ) {
            let rows = values
                .iter()
                .enumerate()
                .map(|(i, v)| row(&format!("P{i:03}"), 0, "distress", *v))
                .collect();
            let adjusted = baseline_adjust(&panel(rows), "distress");
            prop_assert_eq!(adjusted.n_baseline, values.iter().flatten().count());
            if adjusted.n_baseline > 0 {
                let mean = adjusted.centered_baselines.values().sum::<f64>()
                    / adjusted.n_baseline as f64;
                prop_assert!(mean.abs() < 1e-9);
            }
        }
    }
}

//! Up-front enumeration of the analysis battery.
//!
//! Every model the run fits is one [`AnalysisTask`]. The plan is built before
//! any fitting starts and fixes the order of the result rows.

use std::fmt;

use lsa_model::{AnalysisKind, AnalysisOptions, Arm, Panel};
use serde::Serialize;

/// One model fit and the comparisons drawn from it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AnalysisTask {
    pub analysis: AnalysisKind,
    pub outcome: String,
    /// Arm the time course is fitted within.
    pub arm: Option<Arm>,
    /// Moderator of a subgroup model.
    pub moderator: Option<String>,
}

impl fmt::Display for AnalysisTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.analysis, self.outcome)?;
        if let Some(arm) = self.arm {
            write!(f, "/arm {}", arm.0)?;
        }
        if let Some(moderator) = &self.moderator {
            write!(f, "/{moderator}")?;
        }
        Ok(())
    }
}

/// Enumerates the tasks of a run: analyses in battery order, then outcomes
/// in declaration order, then arms or moderators in declaration order.
pub fn analysis_plan(panel: &Panel, options: &AnalysisOptions) -> Vec<AnalysisTask> {
    let mut plan = Vec::new();
    for analysis in AnalysisKind::ALL {
        if !options.runs(analysis) {
            continue;
        }
        for outcome in &panel.outcomes {
            let task = |arm, moderator| AnalysisTask {
                analysis,
                outcome: outcome.clone(),
                arm,
                moderator,
            };
            match analysis {
                AnalysisKind::TimeCourse => {
                    plan.extend(panel.arms.arms().map(|arm| task(Some(arm), None)));
                }
                AnalysisKind::ArmDifference => plan.push(task(None, None)),
                AnalysisKind::Subgroup => plan.extend(
                    options
                        .moderators
                        .iter()
                        .map(|moderator| task(None, Some(moderator.clone()))),
                ),
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsa_model::{ArmSet, TimepointScale};

    fn panel() -> Panel {
        Panel {
            timepoints: TimepointScale::new(["Baseline", "Week 6"]),
            arms: ArmSet::new("Control", "Intervention"),
            outcomes: vec!["distress".to_string(), "flourishing".to_string()],
            rows: Vec::new(),
        }
    }

    #[test]
    fn test_plan_order() {
        let options = AnalysisOptions {
            moderators: vec!["gender".to_string(), "site".to_string()],
            ..AnalysisOptions::default()
        };
        let plan = analysis_plan(&panel(), &options);
        let labels: Vec<String> = plan.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "time_course/distress/arm 0",
                "time_course/distress/arm 1",
                "time_course/flourishing/arm 0",
                "time_course/flourishing/arm 1",
                "arm_difference/distress",
                "arm_difference/flourishing",
                "subgroup/distress/gender",
                "subgroup/distress/site",
                "subgroup/flourishing/gender",
                "subgroup/flourishing/site",
            ]
        );
    }

    #[test]
    fn test_plan_respects_selected_analyses() {
        let options = AnalysisOptions {
            analyses: vec![AnalysisKind::Subgroup, AnalysisKind::ArmDifference],
            ..AnalysisOptions::default()
        };
        let plan = analysis_plan(&panel(), &options);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|t| t.analysis == AnalysisKind::ArmDifference));
    }
}

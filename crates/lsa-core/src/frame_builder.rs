//! Model frame assembly from panel-derived rows and the covariate table.

use std::collections::BTreeSet;

use lsa_model::{BASELINE_TERM, CovariateCoding, CovariateSpec, CovariateTable};
use lsa_stats::{FactorColumn, ModelFrame};

/// A design factor that does not come from the covariate table.
pub(crate) struct DesignFactor<'a> {
    pub name: &'static str,
    pub declared: &'a [String],
}

/// Accumulates observations for one model.
///
/// Observations of participants lacking any of the requested covariates are
/// skipped and the participants counted.
pub(crate) struct FrameBuilder<'a> {
    table: &'a CovariateTable,
    covariates: Vec<&'a CovariateSpec>,
    factors: Vec<DesignFactor<'a>>,
    response: Vec<f64>,
    groups: Vec<String>,
    factor_labels: Vec<Vec<String>>,
    covariate_labels: Vec<Vec<String>>,
    baseline: Vec<f64>,
    with_baseline: bool,
    excluded: BTreeSet<String>,
}

/// A finished frame and the number of excluded participants.
pub(crate) struct BuiltFrame {
    pub frame: ModelFrame,
    pub excluded: usize,
}

impl<'a> FrameBuilder<'a> {
    /// `covariates` must name declared covariates; unknown names are ignored.
    pub fn new(
        table: &'a CovariateTable,
        covariates: &[&str],
        factors: Vec<DesignFactor<'a>>,
    ) -> Self {
        let covariates: Vec<&CovariateSpec> =
            covariates.iter().filter_map(|name| table.spec(name)).collect();
        Self {
            table,
            factor_labels: vec![Vec::new(); factors.len()],
            covariate_labels: vec![Vec::new(); covariates.len()],
            covariates,
            factors,
            response: Vec::new(),
            groups: Vec::new(),
            baseline: Vec::new(),
            with_baseline: false,
            excluded: BTreeSet::new(),
        }
    }

    /// Adds a centered-baseline numeric column.
    pub fn with_baseline(mut self) -> Self {
        self.with_baseline = true;
        self
    }

    /// Adds one observation. `levels` is parallel to the design factors.
    pub fn push(&mut self, participant: &str, value: f64, levels: &[&str], baseline: f64) {
        let mut covariate_levels = Vec::with_capacity(self.covariates.len());
        for spec in &self.covariates {
            match self.table.level_label(participant, &spec.name) {
                Some(level) => covariate_levels.push(level.to_string()),
                None => {
                    self.excluded.insert(participant.to_string());
                    return;
                }
            }
        }
        self.response.push(value);
        self.groups.push(participant.to_string());
        for (labels, level) in self.factor_labels.iter_mut().zip(levels) {
            labels.push((*level).to_string());
        }
        for (labels, level) in self.covariate_labels.iter_mut().zip(covariate_levels) {
            labels.push(level);
        }
        self.baseline.push(baseline);
    }

    pub fn finish(self) -> BuiltFrame {
        let mut frame = ModelFrame::new(self.response, self.groups);
        for (factor, labels) in self.factors.iter().zip(&self.factor_labels) {
            frame = frame.with_factor(
                factor.name,
                FactorColumn::from_labels(labels, Some(factor.declared), CovariateCoding::Treatment),
            );
        }
        for (spec, labels) in self.covariates.iter().zip(&self.covariate_labels) {
            frame = frame.with_factor(
                spec.name.clone(),
                FactorColumn::from_labels(labels, Some(spec.levels.as_slice()), spec.coding),
            );
        }
        if self.with_baseline {
            frame = frame.with_numeric(BASELINE_TERM, self.baseline);
        }
        BuiltFrame {
            frame,
            excluded: self.excluded.len(),
        }
    }
}

/// Number of observed levels of a factor in the frame.
pub(crate) fn distinct_levels(frame: &ModelFrame, factor: &str) -> usize {
    frame
        .factors
        .get(factor)
        .map(|column| column.levels.len())
        .unwrap_or(0)
}

/// Covariate names for one model: adjustments, plus the moderator first when
/// given, without duplicates.
pub(crate) fn model_covariates<'b>(adjust_for: &'b [String], moderator: Option<&'b str>) -> Vec<&'b str> {
    let mut seen = BTreeSet::new();
    moderator
        .into_iter()
        .chain(adjust_for.iter().map(String::as_str))
        .filter(|name| seen.insert(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CovariateTable {
        let mut table = CovariateTable::new(vec![CovariateSpec::symmetric("gender", "female", "male")]);
        table.insert("P1", "gender", "female").expect("insert");
        table.insert("P2", "gender", "male").expect("insert");
        table
    }

    #[test]
    fn test_participant_without_covariate_excluded() {
        let table = table();
        let arms = vec!["Control".to_string(), "Intervention".to_string()];
        let mut builder = FrameBuilder::new(
            &table,
            &["gender"],
            vec![DesignFactor {
                name: "arm",
                declared: &arms,
            }],
        )
        .with_baseline();
        builder.push("P1", 1.0, &["Control"], 0.5);
        builder.push("P2", 2.0, &["Intervention"], -0.5);
        builder.push("P3", 3.0, &["Intervention"], 0.0);
        builder.push("P3", 4.0, &["Intervention"], 0.0);
        let built = builder.finish();
        assert_eq!(built.excluded, 1);
        assert_eq!(built.frame.len(), 2);
        assert_eq!(built.frame.factors["gender"].codes, vec![0, 1]);
        assert_eq!(built.frame.factors["gender"].coding, CovariateCoding::Symmetric);
        assert_eq!(built.frame.numerics[BASELINE_TERM], vec![0.5, -0.5]);
        assert_eq!(distinct_levels(&built.frame, "arm"), 2);
    }

    #[test]
    fn test_moderator_not_repeated_as_adjustment() {
        let adjust = vec!["gender".to_string(), "site".to_string()];
        assert_eq!(model_covariates(&adjust, Some("site")), vec!["site", "gender"]);
        assert_eq!(model_covariates(&adjust, None), vec!["gender", "site"]);
    }
}

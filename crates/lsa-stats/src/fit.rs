//! Model fitting: frame + formula -> fitted random-intercept model.

use lsa_model::ModelingError;
use nalgebra::{DMatrix, DVector};

use crate::design::{Design, DesignLayout};
use crate::formula::FormulaSpec;
use crate::frame::ModelFrame;
use crate::solver::{Deadline, MixedModelSolver, VarianceSensitivity};

/// Singular values below this fraction of the largest count as zero.
const RANK_TOLERANCE: f64 = 1e-9;

/// A fitted model, consumed by contrast extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    /// The formula as fitted, for logs.
    pub formula: String,
    pub layout: DesignLayout,
    pub coefficients: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub random_intercept_variance: f64,
    pub residual_variance: f64,
    pub sensitivity: Option<VarianceSensitivity>,
    pub observations: usize,
    pub participants: usize,
}

impl FittedModel {
    /// Residual degrees of freedom, `n − p`.
    pub fn residual_df(&self) -> f64 {
        self.observations.saturating_sub(self.coefficients.len()) as f64
    }
}

/// Numerical rank of a matrix.
pub fn matrix_rank(matrix: &DMatrix<f64>) -> usize {
    let singular_values = matrix.clone().svd(false, false).singular_values;
    let largest = singular_values.iter().copied().fold(0.0, f64::max);
    if largest <= 0.0 {
        return 0;
    }
    singular_values
        .iter()
        .filter(|&&s| s > largest * RANK_TOLERANCE)
        .count()
}

/// Fits `formula` with a participant random intercept.
///
/// Checks run before the solver is called, cheapest first: at least two
/// participants, at least two observed levels per factor term, more
/// observations than coefficients, and a full-rank design.
pub fn fit<S: MixedModelSolver + ?Sized>(
    frame: &ModelFrame,
    formula: &FormulaSpec,
    solver: &S,
    deadline: &Deadline,
) -> Result<FittedModel, ModelingError> {
    frame.validate()?;
    let participants = frame.participant_count();
    if participants < 2 {
        return Err(ModelingError::InsufficientParticipants {
            found: participants,
        });
    }

    let design = Design::build(frame, formula)?;
    let (n, p) = design.matrix.shape();
    if n <= p {
        return Err(ModelingError::InsufficientObservations {
            observations: n,
            parameters: p,
        });
    }
    let rank = matrix_rank(&design.matrix);
    if rank < p {
        return Err(ModelingError::RankDeficient { rank, columns: p });
    }

    let (groups, n_groups) = frame.group_indices();
    let response = DVector::from_column_slice(&frame.response);
    let solved = solver.fit(&design.matrix, &response, &groups, n_groups, deadline)?;

    tracing::debug!(
        formula = %formula,
        observations = n,
        participants,
        coefficients = p,
        random_intercept_variance = solved.random_intercept_variance,
        residual_variance = solved.residual_variance,
        "fitted model"
    );
    Ok(FittedModel {
        formula: formula.to_string(),
        layout: design.layout,
        coefficients: solved.coefficients,
        covariance: solved.covariance,
        random_intercept_variance: solved.random_intercept_variance,
        residual_variance: solved.residual_variance,
        sensitivity: solved.sensitivity,
        observations: n,
        participants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FactorColumn;
    use crate::reml::RemlSolver;
    use lsa_model::CovariateCoding;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(30))
    }

    #[test]
    fn test_single_participant_rejected() {
        let frame = ModelFrame::new(vec![1.0, 2.0, 3.0], vec!["P1".to_string(); 3]);
        let err = fit(&frame, &FormulaSpec::new(), &RemlSolver::default(), &deadline())
            .unwrap_err();
        assert_eq!(err, ModelingError::InsufficientParticipants { found: 1 });
    }

    #[test]
    fn test_collinear_columns_rejected() {
        let groups = ["P1", "P1", "P2", "P2", "P3"].map(String::from).to_vec();
        let frame = ModelFrame::new(vec![1.0, 2.0, 1.5, 2.5, 3.0], groups)
            .with_numeric("a", vec![1.0, 2.0, 3.0, 4.0, 5.0])
            .with_numeric("b", vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        let formula = FormulaSpec::new().main("a").main("b");
        let err = fit(&frame, &formula, &RemlSolver::default(), &deadline()).unwrap_err();
        assert_eq!(err, ModelingError::RankDeficient { rank: 2, columns: 3 });
    }

    #[test]
    fn test_too_few_observations() {
        let groups = ["P1", "P2", "P3"].map(String::from).to_vec();
        let frame = ModelFrame::new(vec![1.0, 2.0, 3.0], groups).with_factor(
            "site",
            FactorColumn::from_labels(&["a", "b", "c"], None, CovariateCoding::Treatment),
        );
        let err = fit(
            &frame,
            &FormulaSpec::new().main("site"),
            &RemlSolver::default(),
            &deadline(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModelingError::InsufficientObservations {
                observations: 3,
                parameters: 3,
            }
        );
    }
}

//! Estimated marginal means and contrasts.
//!
//! A marginal mean fixes the named factors at given levels, averages every
//! other factor over its levels with equal weights and holds numeric
//! covariates at their data mean. A contrast is the difference of two such
//! means, always the later level minus the earlier one in factor order.

use std::collections::BTreeMap;

use lsa_model::{ContrastError, ContrastStatistics};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::design::Setting;
use crate::fit::FittedModel;

/// Standard errors at or below this are treated as zero.
const ZERO_SE: f64 = 1e-300;

/// Which level pairs of a factor are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastMethod {
    /// Every level against the first (reference) level.
    TreatmentVsControl,
    /// Every pair of levels.
    Pairwise,
}

/// A contrast request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrastSpec {
    pub factor: String,
    /// Repeat the comparison within each level of this factor.
    pub by: Option<String>,
    pub method: ContrastMethod,
}

impl ContrastSpec {
    pub fn new(factor: impl Into<String>, method: ContrastMethod) -> Self {
        Self {
            factor: factor.into(),
            by: None,
            method,
        }
    }

    #[must_use]
    pub fn by(mut self, factor: impl Into<String>) -> Self {
        self.by = Some(factor.into());
        self
    }
}

/// One computed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Contrast {
    pub factor: String,
    pub higher: String,
    pub lower: String,
    /// Level of the `by` factor, if any.
    pub by_level: Option<String>,
    pub statistics: ContrastStatistics,
}

impl Contrast {
    /// `"<later level> - <earlier level>"`.
    pub fn label(&self) -> String {
        comparison_label(&self.higher, &self.lower)
    }
}

pub fn comparison_label(higher: &str, lower: &str) -> String {
    format!("{higher} - {lower}")
}

/// Orders two level indices as (earlier, later).
fn later_minus_earlier(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

fn levels<'a>(model: &'a FittedModel, factor: &str) -> Result<&'a [String], ContrastError> {
    model
        .layout
        .factor_levels(factor)
        .ok_or_else(|| ContrastError::UnknownFactor {
            name: factor.to_string(),
        })
}

fn level_index(levels: &[String], factor: &str, level: &str) -> Result<usize, ContrastError> {
    levels
        .iter()
        .position(|l| l == level)
        .ok_or_else(|| ContrastError::UnknownLevel {
            factor: factor.to_string(),
            level: level.to_string(),
        })
}

/// Contrast between two levels of `factor`, optionally within a level of
/// another factor.
///
/// The argument order of `a` and `b` does not matter: the result is always
/// the later level minus the earlier one.
pub fn contrast_between(
    model: &FittedModel,
    factor: &str,
    a: &str,
    b: &str,
    by: Option<(&str, &str)>,
    confidence_level: f64,
) -> Result<Contrast, ContrastError> {
    let factor_levels = levels(model, factor)?;
    if factor_levels.len() < 2 {
        return Err(ContrastError::TooFewLevels {
            factor: factor.to_string(),
        });
    }
    let (lo, hi) = later_minus_earlier(
        level_index(factor_levels, factor, a)?,
        level_index(factor_levels, factor, b)?,
    );

    let mut settings: BTreeMap<&str, Setting> = BTreeMap::new();
    if let Some((by_factor, by_level)) = by {
        let by_levels = levels(model, by_factor)?;
        let index = level_index(by_levels, by_factor, by_level)?;
        settings.insert(by_factor, Setting::Level(index));
    }
    settings.insert(factor, Setting::Level(hi));
    let upper = model.layout.encode(&settings);
    settings.insert(factor, Setting::Level(lo));
    let lower = model.layout.encode(&settings);

    Ok(Contrast {
        factor: factor.to_string(),
        higher: factor_levels[hi].clone(),
        lower: factor_levels[lo].clone(),
        by_level: by.map(|(_, level)| level.to_string()),
        statistics: linear_contrast(model, &(upper - lower), confidence_level),
    })
}

/// Every comparison `spec` asks for, in factor-level order.
pub fn extract_contrasts(
    model: &FittedModel,
    spec: &ContrastSpec,
    confidence_level: f64,
) -> Result<Vec<Contrast>, ContrastError> {
    let factor_levels = levels(model, &spec.factor)?;
    if factor_levels.len() < 2 {
        return Err(ContrastError::TooFewLevels {
            factor: spec.factor.clone(),
        });
    }
    let pairs: Vec<(usize, usize)> = match spec.method {
        ContrastMethod::TreatmentVsControl => (1..factor_levels.len()).map(|j| (0, j)).collect(),
        ContrastMethod::Pairwise => (0..factor_levels.len())
            .flat_map(|i| (i + 1..factor_levels.len()).map(move |j| (i, j)))
            .collect(),
    };
    let by_levels: Vec<Option<&str>> = match &spec.by {
        Some(by) => levels(model, by)?.iter().map(|l| Some(l.as_str())).collect(),
        None => vec![None],
    };

    let mut out = Vec::with_capacity(pairs.len() * by_levels.len());
    for by_level in by_levels {
        let by = spec.by.as_deref().zip(by_level);
        for &(i, j) in &pairs {
            out.push(contrast_between(
                model,
                &spec.factor,
                &factor_levels[i],
                &factor_levels[j],
                by,
                confidence_level,
            )?);
        }
    }
    Ok(out)
}

/// Satterthwaite degrees of freedom for `Lᵀβ`, or the residual df when the
/// variance parameters are not identified. Never below 1.
pub fn satterthwaite_df(model: &FittedModel, l: &DVector<f64>) -> f64 {
    let residual_df = model.residual_df().max(1.0);
    let Some(sensitivity) = model.sensitivity.as_ref() else {
        return residual_df;
    };
    let variance = (l.transpose() * &model.covariance * l)[(0, 0)];
    let gradient = DVector::from_iterator(
        2,
        sensitivity
            .covariance_gradient
            .iter()
            .map(|d| (l.transpose() * d * l)[(0, 0)]),
    );
    let denominator = (gradient.transpose() * &sensitivity.parameter_covariance * &gradient)[(0, 0)];
    let df = 2.0 * variance * variance / denominator;
    if df.is_finite() && denominator > 0.0 {
        df.max(1.0)
    } else {
        residual_df
    }
}

/// Estimate, standard error, t-based interval and two-sided p-value of `Lᵀβ`.
pub fn linear_contrast(
    model: &FittedModel,
    l: &DVector<f64>,
    confidence_level: f64,
) -> ContrastStatistics {
    let estimate = l.dot(&model.coefficients);
    let variance = (l.transpose() * &model.covariance * l)[(0, 0)];
    let standard_error = variance.max(0.0).sqrt();
    let degrees_of_freedom = satterthwaite_df(model, l);

    if standard_error <= ZERO_SE {
        let p_value = if estimate == 0.0 { 1.0 } else { 0.0 };
        let t_ratio = match estimate.partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Greater) => f64::INFINITY,
            Some(std::cmp::Ordering::Less) => f64::NEG_INFINITY,
            _ => 0.0,
        };
        return ContrastStatistics {
            estimate,
            standard_error,
            lower_ci: estimate,
            upper_ci: estimate,
            t_ratio,
            p_value,
            degrees_of_freedom,
        };
    }

    let t_ratio = estimate / standard_error;
    let (p_value, critical) = match StudentsT::new(0.0, 1.0, degrees_of_freedom) {
        Ok(dist) => (
            (2.0 * (1.0 - dist.cdf(t_ratio.abs()))).clamp(0.0, 1.0),
            dist.inverse_cdf(0.5 + confidence_level / 2.0),
        ),
        Err(_) => (f64::NAN, f64::NAN),
    };
    ContrastStatistics {
        estimate,
        standard_error,
        lower_ci: estimate - critical * standard_error,
        upper_ci: estimate + critical * standard_error,
        t_ratio,
        p_value,
        degrees_of_freedom,
    }
}

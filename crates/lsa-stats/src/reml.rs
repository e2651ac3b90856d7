//! Reference REML solver for the random-intercept model.
//!
//! With γ = σ²u/σ²e the marginal covariance is `σ²e·H`, where each
//! participant block of `H` is `I + γ·11ᵀ`. Its inverse and determinant have
//! closed forms per participant, so the profiled REML criterion
//!
//! ```text
//! (N − p)·ln σ̂²e(γ) + ln|H(γ)| + ln|Xᵀ H(γ)⁻¹ X|
//! ```
//!
//! costs one p×p Cholesky factorization per evaluation. γ is searched on a
//! grid over τ = γ/(1 + γ) and refined by golden-section search.

use lsa_model::ModelingError;
use nalgebra::{DMatrix, DVector};

use crate::solver::{Deadline, MixedModelSolver, SolverFit, VarianceSensitivity};

/// Residual sums of squares at or below this fraction of `yᵀy` count as an
/// exact fit.
const EXACT_FIT_TOLERANCE: f64 = 1e-20;

/// Relative determinant below which the variance parameters are treated as
/// not identified.
const INFORMATION_TOLERANCE: f64 = 1e-10;

/// REML estimation by profiled one-dimensional search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemlSolver {
    pub grid_points: usize,
    pub refine_iterations: usize,
    /// Upper bound of τ = γ/(1 + γ).
    pub max_tau: f64,
}

impl Default for RemlSolver {
    fn default() -> Self {
        Self {
            grid_points: 41,
            refine_iterations: 50,
            max_tau: 0.9999,
        }
    }
}

/// Per-participant sufficient statistics.
struct Clusters {
    sizes: Vec<f64>,
    /// `X_iᵀ1` per participant.
    x_sums: Vec<DVector<f64>>,
    /// `1ᵀy_i` per participant.
    y_sums: Vec<f64>,
}

struct Evaluation {
    objective: f64,
    beta: DVector<f64>,
    residual_variance: f64,
    /// `(Xᵀ H⁻¹ X)⁻¹`.
    m_inverse: DMatrix<f64>,
}

struct Problem<'a> {
    x: &'a DMatrix<f64>,
    y: &'a DVector<f64>,
    groups: &'a [usize],
    clusters: Clusters,
    xtx: DMatrix<f64>,
    xty: DVector<f64>,
    residual_df: f64,
}

impl<'a> Problem<'a> {
    fn new(
        x: &'a DMatrix<f64>,
        y: &'a DVector<f64>,
        groups: &'a [usize],
        n_groups: usize,
    ) -> Self {
        let p = x.ncols();
        let mut clusters = Clusters {
            sizes: vec![0.0; n_groups],
            x_sums: vec![DVector::zeros(p); n_groups],
            y_sums: vec![0.0; n_groups],
        };
        for (row, &g) in groups.iter().enumerate() {
            clusters.sizes[g] += 1.0;
            clusters.x_sums[g] += x.row(row).transpose();
            clusters.y_sums[g] += y[row];
        }
        let xt = x.transpose();
        Self {
            x,
            y,
            groups,
            clusters,
            xtx: &xt * x,
            xty: &xt * y,
            residual_df: (x.nrows() - p) as f64,
        }
    }

    fn evaluate(&self, gamma: f64) -> Option<Evaluation> {
        let mut m = self.xtx.clone();
        let mut b = self.xty.clone();
        let mut log_det_h = 0.0;
        let weights: Vec<f64> = self
            .clusters
            .sizes
            .iter()
            .map(|&n| gamma / (1.0 + n * gamma))
            .collect();
        for (i, &w) in weights.iter().enumerate() {
            let s = &self.clusters.x_sums[i];
            m -= (s * s.transpose()) * w;
            b -= s * (w * self.clusters.y_sums[i]);
            log_det_h += (1.0 + self.clusters.sizes[i] * gamma).ln();
        }

        let chol = m.cholesky()?;
        let beta = chol.solve(&b);
        let residuals = self.y - self.x * &beta;
        let mut residual_sums = vec![0.0; weights.len()];
        for (row, &g) in self.groups.iter().enumerate() {
            residual_sums[g] += residuals[row];
        }
        let quadratic = residuals.norm_squared()
            - weights
                .iter()
                .zip(&residual_sums)
                .map(|(w, r)| w * r * r)
                .sum::<f64>();
        let residual_variance = quadratic / self.residual_df;
        let log_det_m: f64 = 2.0 * chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();
        let objective = if residual_variance > 0.0 {
            self.residual_df * residual_variance.ln() + log_det_h + log_det_m
        } else {
            f64::INFINITY
        };
        Some(Evaluation {
            objective,
            beta,
            residual_variance,
            m_inverse: chol.inverse(),
        })
    }

    fn objective(&self, tau: f64, deadline: &Deadline) -> Result<f64, ModelingError> {
        deadline.check()?;
        let value = self
            .evaluate(tau_to_gamma(tau))
            .map_or(f64::INFINITY, |e| e.objective);
        Ok(if value.is_finite() { value } else { f64::INFINITY })
    }

    /// Closed-form covariance gradient and inverse expected information.
    fn sensitivity(
        &self,
        gamma: f64,
        sigma2: f64,
        covariance: &DMatrix<f64>,
    ) -> Option<VarianceSensitivity> {
        let p = self.x.ncols();
        let m = self.clusters.sizes.len();
        let mut g2 = self.xtx.clone();
        let mut g3 = self.xtx.clone();
        let mut u1 = DMatrix::<f64>::zeros(m, p);
        let mut u2 = DMatrix::<f64>::zeros(m, p);
        let mut d1 = DMatrix::<f64>::zeros(m, m);
        let mut tr_zv2z = 0.0;
        let mut tr_v2 = 0.0;
        for i in 0..m {
            let n = self.clusters.sizes[i];
            let d = 1.0 + n * gamma;
            let s = &self.clusters.x_sums[i];
            let outer = s * s.transpose();
            g2 -= &outer * ((1.0 - d.powi(-2)) / n);
            g3 -= &outer * ((1.0 - d.powi(-3)) / n);
            u1.set_row(i, &(s.transpose() / (sigma2 * d)));
            u2.set_row(i, &(s.transpose() / (sigma2 * sigma2 * d * d)));
            d1[(i, i)] = n / (sigma2 * d);
            tr_zv2z += n / (sigma2 * sigma2 * d * d);
            tr_v2 += (n - 1.0 + d.powi(-2)) / (sigma2 * sigma2);
        }
        g2 /= sigma2 * sigma2;
        g3 /= sigma2 * sigma2 * sigma2;

        let c = covariance;
        let gu = u1.transpose() * &u1;
        let d_cov_u = c * &gu * c;
        let d_cov_e = c * &g2 * c;

        let u1c = &u1 * c;
        let q = d1 - &u1c * u1.transpose();
        let cg2 = c * &g2;
        let i_uu = 0.5 * q.norm_squared();
        let i_ue = 0.5
            * (tr_zv2z - 2.0 * u1c.component_mul(&u2).sum()
                + (&u1c * &g2 * c).component_mul(&u1).sum());
        let i_ee = 0.5
            * (tr_v2 - 2.0 * c.component_mul(&g3).sum()
                + cg2.component_mul(&cg2.transpose()).sum());

        let det = i_uu * i_ee - i_ue * i_ue;
        if !det.is_finite() || det <= INFORMATION_TOLERANCE * (i_uu * i_ee).abs() {
            return None;
        }
        let parameter_covariance = DMatrix::from_row_slice(
            2,
            2,
            &[i_ee / det, -i_ue / det, -i_ue / det, i_uu / det],
        );
        Some(VarianceSensitivity {
            covariance_gradient: [d_cov_u, d_cov_e],
            parameter_covariance,
        })
    }
}

fn tau_to_gamma(tau: f64) -> f64 {
    tau / (1.0 - tau)
}

impl RemlSolver {
    /// Grid search over τ followed by golden-section refinement around the
    /// best grid point.
    fn optimize(&self, problem: &Problem<'_>, deadline: &Deadline) -> Result<f64, ModelingError> {
        let points = self.grid_points.max(3);
        let step = self.max_tau / (points - 1) as f64;
        let mut best: Option<(usize, f64)> = None;
        for k in 0..points {
            let value = problem.objective(step * k as f64, deadline)?;
            if value.is_finite() && best.is_none_or(|(_, b)| value < b) {
                best = Some((k, value));
            }
        }
        let Some((k, best_value)) = best else {
            return Err(ModelingError::NonConvergence {
                message: "REML criterion is not finite anywhere on the search grid".to_string(),
            });
        };

        let ratio = (5f64.sqrt() - 1.0) / 2.0;
        let mut lo = step * k.saturating_sub(1) as f64;
        let mut hi = (step * (k + 1) as f64).min(self.max_tau);
        let mut c = hi - ratio * (hi - lo);
        let mut d = lo + ratio * (hi - lo);
        let mut fc = problem.objective(c, deadline)?;
        let mut fd = problem.objective(d, deadline)?;
        for _ in 0..self.refine_iterations {
            if fc < fd {
                hi = d;
                d = c;
                fd = fc;
                c = hi - ratio * (hi - lo);
                fc = problem.objective(c, deadline)?;
            } else {
                lo = c;
                c = d;
                fc = fd;
                d = lo + ratio * (hi - lo);
                fd = problem.objective(d, deadline)?;
            }
        }
        let (tau, value) = if fc < fd { (c, fc) } else { (d, fd) };
        Ok(if value < best_value {
            tau
        } else {
            step * k as f64
        })
    }
}

impl MixedModelSolver for RemlSolver {
    fn fit(
        &self,
        design: &DMatrix<f64>,
        response: &DVector<f64>,
        groups: &[usize],
        n_groups: usize,
        deadline: &Deadline,
    ) -> Result<SolverFit, ModelingError> {
        let (n, p) = design.shape();
        if response.len() != n || groups.len() != n || groups.iter().any(|&g| g >= n_groups) {
            return Err(ModelingError::InvalidInput {
                message: "design, response and groups disagree in length".to_string(),
            });
        }
        if n <= p {
            return Err(ModelingError::InsufficientObservations {
                observations: n,
                parameters: p,
            });
        }
        deadline.check()?;
        let problem = Problem::new(design, response, groups, n_groups);

        let ols = problem
            .evaluate(0.0)
            .ok_or_else(|| ModelingError::NonConvergence {
                message: "XᵀX is not positive definite".to_string(),
            })?;
        let rss = ols.residual_variance * problem.residual_df;
        if rss <= EXACT_FIT_TOLERANCE * (response.norm_squared() + 1.0) {
            tracing::debug!(rss, "exact fit; variance components not estimated");
            let residual_variance = ols.residual_variance.max(0.0);
            return Ok(SolverFit {
                covariance: &ols.m_inverse * residual_variance,
                coefficients: ols.beta,
                random_intercept_variance: 0.0,
                residual_variance,
                sensitivity: None,
            });
        }

        let tau = self.optimize(&problem, deadline)?;
        let gamma = tau_to_gamma(tau);
        let fit = problem
            .evaluate(gamma)
            .filter(|e| e.residual_variance > 0.0)
            .ok_or_else(|| ModelingError::NonConvergence {
                message: format!("no valid estimate at variance ratio {gamma:.4}"),
            })?;
        let covariance = &fit.m_inverse * fit.residual_variance;
        let sensitivity = problem.sensitivity(gamma, fit.residual_variance, &covariance);
        tracing::debug!(
            gamma,
            residual_variance = fit.residual_variance,
            identified = sensitivity.is_some(),
            "REML fit"
        );
        Ok(SolverFit {
            coefficients: fit.beta,
            covariance,
            random_intercept_variance: gamma * fit.residual_variance,
            residual_variance: fit.residual_variance,
            sensitivity,
        })
    }
}

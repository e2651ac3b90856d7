//! Solver boundary for random-intercept linear mixed models.

use std::time::{Duration, Instant};

use lsa_model::ModelingError;
use nalgebra::{DMatrix, DVector};

/// Wall-clock limit for one solver call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() > self.limit
    }

    pub fn limit_ms(&self) -> u64 {
        u64::try_from(self.limit.as_millis()).unwrap_or(u64::MAX)
    }

    /// Returns [`ModelingError::Timeout`] once the limit has passed.
    pub fn check(&self) -> Result<(), ModelingError> {
        if self.expired() {
            Err(ModelingError::Timeout {
                limit_ms: self.limit_ms(),
            })
        } else {
            Ok(())
        }
    }
}

/// Sensitivity of the coefficient covariance to the variance parameters
/// θ = (σ²u, σ²e), for Satterthwaite degrees of freedom.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceSensitivity {
    /// ∂Cov(β̂)/∂σ²u and ∂Cov(β̂)/∂σ²e.
    pub covariance_gradient: [DMatrix<f64>; 2],
    /// Inverse expected REML information of θ.
    pub parameter_covariance: DMatrix<f64>,
}

/// Estimates returned by a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverFit {
    pub coefficients: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub random_intercept_variance: f64,
    pub residual_variance: f64,
    /// `None` when the variance parameters are not identified.
    pub sensitivity: Option<VarianceSensitivity>,
}

/// Fits `y = Xβ + u[group] + e` with `u ~ N(0, σ²u)` and `e ~ N(0, σ²e)`.
///
/// `groups` holds dense group indices `0..n_groups`. Implementations must
/// check `deadline` while iterating.
pub trait MixedModelSolver: Sync {
    fn fit(
        &self,
        design: &DMatrix<f64>,
        response: &DVector<f64>,
        groups: &[usize],
        n_groups: usize,
        deadline: &Deadline,
    ) -> Result<SolverFit, ModelingError>;
}

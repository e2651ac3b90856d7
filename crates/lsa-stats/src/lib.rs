//! Random-intercept linear mixed models and marginal-mean contrasts.
//!
//! - **frame**: observations, grouping and predictor columns of one model
//! - **formula / design**: fixed-effect terms and their matrix encoding
//! - **solver / reml**: the solver boundary and the REML reference solver
//! - **fit**: pre-fit checks and the fitted model
//! - **contrast**: marginal means, contrasts, Satterthwaite df

pub mod contrast;
pub mod design;
pub mod fit;
pub mod formula;
pub mod frame;
pub mod reml;
pub mod solver;

pub use contrast::{
    Contrast, ContrastMethod, ContrastSpec, comparison_label, contrast_between,
    extract_contrasts, linear_contrast, satterthwaite_df,
};
pub use design::{Design, DesignLayout, Setting, TermBlock, Variable};
pub use fit::{FittedModel, fit, matrix_rank};
pub use formula::{FormulaSpec, Term};
pub use frame::{FactorColumn, ModelFrame};
pub use reml::RemlSolver;
pub use solver::{Deadline, MixedModelSolver, SolverFit, VarianceSensitivity};

//! Panel transformations feeding the models.
//!
//! - **baseline**: per-outcome baseline extraction and mean-centering
//! - **phases**: collapsing post-baseline timepoints to per-phase means

pub mod baseline;
pub mod phases;

pub use baseline::{AdjustedRow, BaselineAdjusted, baseline_adjust};
pub use phases::{Phase, PhaseRow, collapse_phases};

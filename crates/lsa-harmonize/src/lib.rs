//! Panel harmonization.
//!
//! Turns heterogeneous per-instrument wide tables into the one long
//! measurement panel every analysis reads:
//!
//! - timepoint labels are mapped onto the canonical study scale
//! - named data fixes are applied and counted
//! - arm assignments are joined by participant id
//! - outcome composites are computed from the fixed items

mod assignments;
mod clean;
mod harmonizer;
mod records;

pub use assignments::{ArmAssignments, arm_assignments_from_frame, covariate_table_from_frame};
pub use clean::{CleanedTable, clean_table};
pub use harmonizer::{HarmonizationReport, Harmonized, harmonize};

//! Analysis battery orchestration.
//!
//! - **plan**: enumerates one task per model the run fits
//! - **context**: the immutable inputs every task reads
//! - **analyses**: time course, arm difference and subgroup models
//! - **runner**: parallel execution with deterministic result order

mod analyses;
pub mod context;
mod frame_builder;
pub mod plan;
pub mod runner;

pub use context::AnalysisContext;
pub use plan::{AnalysisTask, analysis_plan};
pub use runner::{run_analyses, run_plan};

//! Data model for longitudinal survey analysis.
//!
//! - **timepoint / arm**: canonical ordered study timepoints and the two study arms
//! - **covariate**: declared participant covariates and the immutable covariate table
//! - **outcome / instrument / fixes**: how wide instrument tables become composite scores
//! - **panel**: the harmonized long-format measurement panel
//! - **results**: contrast result rows and per-analysis tables
//! - **config**: the study configuration document and its validation
//! - **error**: error taxonomy shared by all pipeline stages

pub mod arm;
pub mod config;
pub mod covariate;
pub mod error;
pub mod fixes;
pub mod instrument;
pub mod outcome;
pub mod panel;
pub mod results;
pub mod timepoint;

pub use arm::{Arm, ArmSet};
pub use config::{
    ARM_TERM, AnalysisOptions, BASELINE_TERM, InputFiles, PHASE_TERM, PhaseDefinition, StudyConfig,
    StudyInfo, TIMEPOINT_TERM, TableSource,
};
pub use covariate::{CovariateCoding, CovariateSpec, CovariateTable};
pub use error::{ConfigError, ContrastError, HarmonizationError, ModelingError};
pub use fixes::{DataFix, FixRule};
pub use instrument::InstrumentMapping;
pub use outcome::{ItemScale, OutcomeDefinition};
pub use panel::{Panel, PanelRow};
pub use results::{
    AnalysisKind, AnalysisResults, ContrastStatistics, ResultRow, ResultTable, RowStatus,
};
pub use timepoint::{Timepoint, TimepointScale, normalize_label};

//! Error taxonomy for the analysis pipeline.
//!
//! Harmonization, modeling and contrast failures are kept apart because they
//! are handled at different scopes: a fatal harmonization error stops the run,
//! a modeling error omits one (outcome, stratum) model, and a contrast error
//! omits one comparison.

use thiserror::Error;

/// Errors raised while building the measurement panel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarmonizationError {
    /// A timepoint label that maps onto no canonical timepoint.
    #[error("instrument {instrument}: timepoint label '{label}' does not map to a canonical timepoint")]
    UnmappedTimepoint { instrument: String, label: String },

    /// A participant with no usable arm assignment.
    #[error("instrument {instrument}: participant {participant} has no resolvable arm assignment")]
    UnresolvedArm {
        participant: String,
        instrument: String,
    },

    /// Two rows for the same participant and timepoint in one instrument table.
    #[error("instrument {instrument}: duplicate rows for participant {participant} at {timepoint}")]
    DuplicateMeasurement {
        instrument: String,
        participant: String,
        timepoint: String,
    },

    /// A declared column is absent from the source table.
    #[error("table {table}: column '{column}' not found")]
    MissingColumn { table: String, column: String },

    /// An item cell holding text that is neither numeric nor a missing token.
    #[error("instrument {instrument}: participant {participant} item {item} has non-numeric value '{value}'")]
    InvalidItemValue {
        instrument: String,
        participant: String,
        item: String,
        value: String,
    },

    /// A covariate level outside the declared set.
    #[error("participant {participant}: covariate {covariate} has undeclared level '{level}'")]
    InvalidCovariateLevel {
        participant: String,
        covariate: String,
        level: String,
    },

    /// An instrument table with no mapping in the configuration.
    #[error("no mapping declared for instrument {instrument}")]
    UnknownInstrument { instrument: String },

    /// A declared instrument with no table to harmonize.
    #[error("no table supplied for instrument {instrument}")]
    MissingTable { instrument: String },

    /// Failure inside a DataFrame operation.
    #[error("data frame operation failed: {message}")]
    Frame { message: String },
}

impl HarmonizationError {
    /// Whether this error aborts harmonization.
    ///
    /// Unresolved arms and undeclared covariate levels drop the affected
    /// row or value and are recorded in the harmonization report instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            HarmonizationError::UnresolvedArm { .. }
                | HarmonizationError::InvalidCovariateLevel { .. }
        )
    }
}

/// Errors raised while assembling or fitting one mixed-effects model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelingError {
    #[error("fewer than 2 distinct participants ({found})")]
    InsufficientParticipants { found: usize },

    #[error("factor {factor} has {found} observed level(s); at least 2 required")]
    InsufficientLevels { factor: String, found: usize },

    #[error("{observations} observation(s) cannot identify {parameters} coefficient(s)")]
    InsufficientObservations {
        observations: usize,
        parameters: usize,
    },

    #[error("design matrix is rank deficient (rank {rank} of {columns} columns)")]
    RankDeficient { rank: usize, columns: usize },

    #[error("formula term {name} is not present in the model frame")]
    UnknownTerm { name: String },

    #[error("solver did not converge: {message}")]
    NonConvergence { message: String },

    #[error("solver exceeded its {limit_ms} ms time limit")]
    Timeout { limit_ms: u64 },

    #[error("invalid model input: {message}")]
    InvalidInput { message: String },
}

/// Errors raised while extracting one requested comparison.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContrastError {
    #[error("factor {name} is not part of the fitted model")]
    UnknownFactor { name: String },

    #[error("level '{level}' of factor {factor} was not observed in the fitted model")]
    UnknownLevel { factor: String, level: String },

    #[error("factor {factor} has fewer than 2 levels to compare")]
    TooFewLevels { factor: String },
}

/// Errors in the study configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no canonical timepoints declared")]
    EmptyTimepoints,

    #[error("timepoint label '{label}' is declared more than once")]
    DuplicateTimepoint { label: String },

    #[error("{context}: unknown timepoint '{label}'")]
    UnknownTimepoint { context: String, label: String },

    #[error("exactly 2 arms are required, found {found}")]
    ArmCount { found: usize },

    #[error("{kind} '{name}' is declared more than once")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{context}: unknown instrument '{name}'")]
    UnknownInstrument { context: String, name: String },

    #[error("instrument {instrument}: unknown item '{item}'")]
    UnknownItem { instrument: String, item: String },

    #[error("{context}: unknown covariate '{name}'")]
    UnknownCovariate { context: String, name: String },

    #[error("covariate {name}: {reason}")]
    InvalidCovariate { name: String, reason: String },

    #[error("outcome {name}: {reason}")]
    InvalidOutcome { name: String, reason: String },

    #[error("fix {name}: {reason}")]
    InvalidFix { name: String, reason: String },

    #[error("option {name}: {reason}")]
    InvalidOption { name: String, reason: String },
}

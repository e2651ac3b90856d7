//! Study ingestion.
//!
//! Loads the TOML study configuration, reads the per-instrument, arm and
//! covariate CSV tables into Polars DataFrames, and fingerprints every input
//! file so result documents can name exactly what they were computed from.
//!
//! ```ignore
//! use std::path::Path;
//! use lsa_ingest::{load_study_config, load_study_inputs};
//!
//! let config = load_study_config(Path::new("study/study.toml"))?;
//! let inputs = load_study_inputs(&config)?;
//! ```

mod csv;
mod error;
mod hash;
mod study;

// === Error Types ===
pub use error::{IngestError, Result};

// === CSV Reading ===
pub use csv::read_csv_table;

// === Fingerprints ===
pub use hash::{file_sha256, sha256_hex};

// === Study Loading ===
pub use study::{InputFingerprint, StudyInputs, load_study_config, load_study_inputs};

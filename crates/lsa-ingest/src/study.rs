//! Study configuration and input table loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lsa_model::StudyConfig;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::csv::read_csv_table;
use crate::error::{IngestError, Result};
use crate::hash::file_sha256;

/// Loads and validates a study configuration file.
///
/// Relative input paths are resolved against the configuration file's
/// directory.
pub fn load_study_config(path: &Path) -> Result<StudyConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    let mut config: StudyConfig =
        toml::from_str(&contents).map_err(|e| IngestError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    resolve_input_paths(&mut config, base);
    config.validate()?;
    tracing::info!(
        path = %path.display(),
        study = %config.study.name,
        instruments = config.instruments.len(),
        outcomes = config.outcomes.len(),
        "loaded study configuration"
    );
    Ok(config)
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn resolve_input_paths(config: &mut StudyConfig, base: &Path) {
    let inputs = &mut config.inputs;
    if let Some(arms) = inputs.arms.as_mut() {
        resolve(base, &mut arms.path);
    }
    if let Some(covariates) = inputs.covariates.as_mut() {
        resolve(base, &mut covariates.path);
    }
    for path in inputs.instruments.values_mut() {
        resolve(base, path);
    }
}

/// SHA-256 fingerprint of one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFingerprint {
    /// What the file holds: `arms`, `covariates` or `instrument:<name>`.
    pub role: String,
    pub path: PathBuf,
    pub sha256: String,
}

/// Every input table of a study, loaded and fingerprinted.
#[derive(Debug, Clone)]
pub struct StudyInputs {
    /// Instrument name -> wide table.
    pub instruments: BTreeMap<String, DataFrame>,
    pub arms: DataFrame,
    pub covariates: Option<DataFrame>,
    pub fingerprints: Vec<InputFingerprint>,
}

fn load_table(role: String, path: &Path, fingerprints: &mut Vec<InputFingerprint>) -> Result<DataFrame> {
    let df = read_csv_table(path)?;
    fingerprints.push(InputFingerprint {
        role,
        path: path.to_path_buf(),
        sha256: file_sha256(path)?,
    });
    Ok(df)
}

/// Loads every table declared under `[inputs]`.
///
/// Each declared instrument needs a table; the arm table is mandatory and
/// the covariate table optional.
pub fn load_study_inputs(config: &StudyConfig) -> Result<StudyInputs> {
    let mut fingerprints = Vec::new();

    let mut instruments = BTreeMap::new();
    for mapping in &config.instruments {
        let Some(path) = config.inputs.instruments.get(&mapping.name) else {
            return Err(IngestError::MissingInput {
                what: format!("instrument {}", mapping.name),
            });
        };
        let df = load_table(format!("instrument:{}", mapping.name), path, &mut fingerprints)?;
        instruments.insert(mapping.name.clone(), df);
    }

    let Some(arm_source) = config.inputs.arms.as_ref() else {
        return Err(IngestError::MissingInput {
            what: "arm assignments".to_string(),
        });
    };
    let arms = load_table("arms".to_string(), &arm_source.path, &mut fingerprints)?;

    let covariates = match config.inputs.covariates.as_ref() {
        Some(source) => Some(load_table(
            "covariates".to_string(),
            &source.path,
            &mut fingerprints,
        )?),
        None => None,
    };

    tracing::info!(
        instruments = instruments.len(),
        files = fingerprints.len(),
        "loaded study inputs"
    );
    Ok(StudyInputs {
        instruments,
        arms,
        covariates,
        fingerprints,
    })
}

//! Study pipeline stages behind the CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info_span;

use lsa_core::{AnalysisContext, run_analyses};
use lsa_harmonize::{Harmonized, arm_assignments_from_frame, covariate_table_from_frame, harmonize};
use lsa_ingest::{InputFingerprint, load_study_config, load_study_inputs};
use lsa_model::{AnalysisResults, CovariateTable, HarmonizationError, StudyConfig};

/// A study loaded, harmonized and ready for analysis.
#[derive(Debug, Clone)]
pub struct PreparedStudy {
    pub config: StudyConfig,
    pub fingerprints: Vec<InputFingerprint>,
    pub harmonized: Harmonized,
    pub covariates: CovariateTable,
    /// Covariate values treated as missing.
    pub covariate_issues: Vec<HarmonizationError>,
}

/// Loads the configuration and inputs, then harmonizes the panel.
pub fn prepare_study(config_path: &Path) -> Result<PreparedStudy> {
    let config = load_study_config(config_path)
        .with_context(|| format!("load study configuration {}", config_path.display()))?;
    let span = info_span!("study", study = %config.study.name);
    let _guard = span.enter();

    let inputs = load_study_inputs(&config).context("load study inputs")?;
    let arm_source = config
        .inputs
        .arms
        .as_ref()
        .context("study configuration declares no arm table")?;
    let assignments =
        arm_assignments_from_frame(&inputs.arms, arm_source, &config.arms).context("read arm table")?;
    let harmonized =
        harmonize(&config, &inputs.instruments, &assignments).context("harmonize panel")?;

    let (covariates, covariate_issues) = match (&inputs.covariates, &config.inputs.covariates) {
        (Some(frame), Some(source)) => covariate_table_from_frame(frame, source, &config.covariates)
            .context("read covariate table")?,
        _ => (CovariateTable::new(config.covariates.clone()), Vec::new()),
    };

    Ok(PreparedStudy {
        config,
        fingerprints: inputs.fingerprints,
        harmonized,
        covariates,
        covariate_issues,
    })
}

/// Runs the configured battery on a prepared study.
///
/// `workers` overrides the configured worker count.
pub fn run_battery(study: &PreparedStudy, workers: Option<usize>) -> AnalysisResults {
    let span = info_span!("analysis", study = %study.config.study.name);
    let _guard = span.enter();
    let mut options = study.config.analysis.clone();
    if workers.is_some() {
        options.workers = workers;
    }
    let ctx = AnalysisContext::new(&study.harmonized.panel, &study.covariates, &options);
    run_analyses(&ctx)
}

//! Study configuration document.
//!
//! One TOML file declares everything instrument-specific: timepoint
//! spellings, item columns, outcomes, fixes, covariates and analysis options.
//! [`StudyConfig::validate`] runs before any data is touched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::arm::ArmSet;
use crate::covariate::CovariateSpec;
use crate::error::ConfigError;
use crate::fixes::{DataFix, FixRule};
use crate::instrument::InstrumentMapping;
use crate::outcome::OutcomeDefinition;
use crate::results::AnalysisKind;
use crate::timepoint::{Timepoint, TimepointScale};

/// Default confidence level for contrast intervals.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Default per-fit solver time limit.
pub const DEFAULT_FIT_TIMEOUT_MS: u64 = 30_000;

/// Name of the phase used when none are declared.
pub const DEFAULT_PHASE_NAME: &str = "post-baseline";

/// Model term names the analyses use; covariates may not take them.
pub const TIMEPOINT_TERM: &str = "timepoint";
pub const ARM_TERM: &str = "arm";
pub const PHASE_TERM: &str = "phase";
pub const BASELINE_TERM: &str = "baseline_centered";
const RESERVED_TERMS: [&str; 4] = [TIMEPOINT_TERM, ARM_TERM, PHASE_TERM, BASELINE_TERM];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyInfo {
    pub name: String,
}

/// Study-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub study: StudyInfo,
    pub timepoints: TimepointScale,
    pub arms: ArmSet,
    #[serde(default)]
    pub covariates: Vec<CovariateSpec>,
    pub instruments: Vec<InstrumentMapping>,
    pub outcomes: Vec<OutcomeDefinition>,
    #[serde(default)]
    pub fixes: Vec<DataFix>,
    #[serde(default)]
    pub analysis: AnalysisOptions,
    #[serde(default)]
    pub inputs: InputFiles,
}

/// A study phase collapsed to one value per participant in subgroup runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub name: String,
    /// Canonical timepoint labels in this phase.
    pub timepoints: Vec<String>,
}

/// Options for the analysis battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Analyses to run, in battery order.
    pub analyses: Vec<AnalysisKind>,
    /// Covariates entered as main effects in every model.
    pub adjust_for: Vec<String>,
    /// Candidate moderators, each analyzed in its own model.
    pub moderators: Vec<String>,
    /// Phases for subgroup collapsing; empty means one phase of all
    /// post-baseline timepoints.
    pub phases: Vec<PhaseDefinition>,
    pub confidence_level: f64,
    pub fit_timeout_ms: u64,
    /// Worker threads; `None` uses the global pool.
    pub workers: Option<usize>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analyses: AnalysisKind::ALL.to_vec(),
            adjust_for: Vec::new(),
            moderators: Vec::new(),
            phases: Vec::new(),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            fit_timeout_ms: DEFAULT_FIT_TIMEOUT_MS,
            workers: None,
        }
    }
}

impl AnalysisOptions {
    /// Resolves phases to timepoints on `scale`.
    ///
    /// Unknown labels are skipped here; [`StudyConfig::validate`] rejects them.
    pub fn effective_phases(&self, scale: &TimepointScale) -> Vec<(String, Vec<Timepoint>)> {
        if self.phases.is_empty() {
            return vec![(
                DEFAULT_PHASE_NAME.to_string(),
                scale.post_baseline().collect(),
            )];
        }
        self.phases
            .iter()
            .map(|phase| {
                let mut timepoints: Vec<Timepoint> = phase
                    .timepoints
                    .iter()
                    .filter_map(|label| scale.position(label))
                    .collect();
                timepoints.sort();
                timepoints.dedup();
                (phase.name.clone(), timepoints)
            })
            .collect()
    }

    pub fn runs(&self, analysis: AnalysisKind) -> bool {
        self.analyses.contains(&analysis)
    }
}

/// A CSV table keyed by participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    pub path: PathBuf,
    pub participant_column: String,
    /// Value column(s): covariate name (or "arm") -> source column.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

impl TableSource {
    /// Source column of a value, defaulting to the value's own name.
    pub fn column_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.columns.get(name).map_or(name, String::as_str)
    }
}

/// Input files, relative to the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFiles {
    pub arms: Option<TableSource>,
    pub covariates: Option<TableSource>,
    /// Instrument name -> CSV path.
    #[serde(default)]
    pub instruments: BTreeMap<String, PathBuf>,
}

impl StudyConfig {
    pub fn instrument(&self, name: &str) -> Option<&InstrumentMapping> {
        self.instruments.iter().find(|i| i.name == name)
    }

    pub fn outcome(&self, name: &str) -> Option<&OutcomeDefinition> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn covariate(&self, name: &str) -> Option<&CovariateSpec> {
        self.covariates.iter().find(|c| c.name == name)
    }

    /// Checks internal consistency of the whole document.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timepoints.validate()?;
        self.arms.validate()?;
        self.validate_covariates()?;
        self.validate_instruments()?;
        self.validate_outcomes()?;
        self.validate_fixes()?;
        self.validate_analysis()
    }

    fn validate_covariates(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for spec in &self.covariates {
            if !names.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "covariate",
                    name: spec.name.clone(),
                });
            }
            if RESERVED_TERMS.contains(&spec.name.as_str()) {
                return Err(ConfigError::InvalidCovariate {
                    name: spec.name.clone(),
                    reason: "name is reserved for a model term".to_string(),
                });
            }
            spec.validate()?;
        }
        Ok(())
    }

    fn validate_instruments(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for instrument in &self.instruments {
            if !names.insert(instrument.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "instrument",
                    name: instrument.name.clone(),
                });
            }
            for (raw, canonical) in &instrument.timepoint_labels {
                if self.timepoints.position(canonical).is_none() {
                    return Err(ConfigError::UnknownTimepoint {
                        context: format!("instrument {} label '{raw}'", instrument.name),
                        label: canonical.clone(),
                    });
                }
            }
        }
        for name in self.inputs.instruments.keys() {
            if self.instrument(name).is_none() {
                return Err(ConfigError::UnknownInstrument {
                    context: "inputs.instruments".to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_outcomes(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for outcome in &self.outcomes {
            if !names.insert(outcome.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "outcome",
                    name: outcome.name.clone(),
                });
            }
            let Some(instrument) = self.instrument(&outcome.instrument) else {
                return Err(ConfigError::UnknownInstrument {
                    context: format!("outcome {}", outcome.name),
                    name: outcome.instrument.clone(),
                });
            };
            if outcome.items.is_empty() {
                return Err(ConfigError::InvalidOutcome {
                    name: outcome.name.clone(),
                    reason: "no items declared".to_string(),
                });
            }
            for item in &outcome.items {
                if instrument.column_for(item).is_none() {
                    return Err(ConfigError::UnknownItem {
                        instrument: instrument.name.clone(),
                        item: item.clone(),
                    });
                }
            }
            for item in &outcome.reverse_items {
                if !outcome.items.contains(item) {
                    return Err(ConfigError::InvalidOutcome {
                        name: outcome.name.clone(),
                        reason: format!("reverse item '{item}' is not one of its items"),
                    });
                }
            }
            if !outcome.reverse_items.is_empty() && outcome.scale.is_none() {
                return Err(ConfigError::InvalidOutcome {
                    name: outcome.name.clone(),
                    reason: "reverse items need an item scale".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_fixes(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for fix in &self.fixes {
            if !names.insert(fix.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "fix",
                    name: fix.name.clone(),
                });
            }
            let Some(instrument) = self.instrument(&fix.instrument) else {
                return Err(ConfigError::UnknownInstrument {
                    context: format!("fix {}", fix.name),
                    name: fix.instrument.clone(),
                });
            };
            for item in &fix.items {
                if instrument.column_for(item).is_none() {
                    return Err(ConfigError::UnknownItem {
                        instrument: instrument.name.clone(),
                        item: item.clone(),
                    });
                }
            }
            match fix.rule {
                FixRule::Recode { from, to } if from == to || !from.is_finite() || !to.is_finite() => {
                    return Err(ConfigError::InvalidFix {
                        name: fix.name.clone(),
                        reason: "recode needs two distinct finite values".to_string(),
                    });
                }
                FixRule::Clamp { min, max } if !(min <= max) => {
                    return Err(ConfigError::InvalidFix {
                        name: fix.name.clone(),
                        reason: format!("clamp bounds [{min}, {max}] are empty"),
                    });
                }
                _ => {}
            }
        }
        // Any value one fix produces must be left alone by every overlapping
        // fix, otherwise a second pass would change fixed data.
        for (i, fix) in self.fixes.iter().enumerate() {
            for (j, other) in self.fixes.iter().enumerate() {
                if i == j || !fix.overlaps(other) {
                    continue;
                }
                let conflict = match (fix.rule, other.rule) {
                    (FixRule::Recode { to, .. }, FixRule::Recode { from, .. }) => to == from,
                    (FixRule::Recode { to, .. }, FixRule::Clamp { min, max }) => to < min || to > max,
                    (FixRule::Clamp { min, max }, FixRule::Recode { from, .. }) => {
                        from == min || from == max
                    }
                    (FixRule::Clamp { .. }, FixRule::Clamp { .. }) => fix.rule != other.rule,
                };
                if conflict {
                    return Err(ConfigError::InvalidFix {
                        name: fix.name.clone(),
                        reason: format!("conflicts with fix {}; re-running would not be a no-op", other.name),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_analysis(&self) -> Result<(), ConfigError> {
        let options = &self.analysis;
        for name in &options.adjust_for {
            if self.covariate(name).is_none() {
                return Err(ConfigError::UnknownCovariate {
                    context: "analysis.adjust_for".to_string(),
                    name: name.clone(),
                });
            }
        }
        let mut moderators = BTreeSet::new();
        for name in &options.moderators {
            if self.covariate(name).is_none() {
                return Err(ConfigError::UnknownCovariate {
                    context: "analysis.moderators".to_string(),
                    name: name.clone(),
                });
            }
            if !moderators.insert(name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "moderator",
                    name: name.clone(),
                });
            }
        }
        let mut phases = BTreeSet::new();
        for phase in &options.phases {
            if !phases.insert(phase.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    kind: "phase",
                    name: phase.name.clone(),
                });
            }
            if phase.timepoints.is_empty() {
                return Err(ConfigError::InvalidOption {
                    name: format!("analysis.phases.{}", phase.name),
                    reason: "phase has no timepoints".to_string(),
                });
            }
            for label in &phase.timepoints {
                match self.timepoints.position(label) {
                    Some(tp) if tp.is_baseline() => {
                        return Err(ConfigError::InvalidOption {
                            name: format!("analysis.phases.{}", phase.name),
                            reason: "baseline cannot belong to a phase".to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        return Err(ConfigError::UnknownTimepoint {
                            context: format!("phase {}", phase.name),
                            label: label.clone(),
                        });
                    }
                }
            }
        }
        if !(options.confidence_level > 0.0 && options.confidence_level < 1.0) {
            return Err(ConfigError::InvalidOption {
                name: "analysis.confidence_level".to_string(),
                reason: format!("{} is not in (0, 1)", options.confidence_level),
            });
        }
        if options.fit_timeout_ms == 0 {
            return Err(ConfigError::InvalidOption {
                name: "analysis.fit_timeout_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if options.workers == Some(0) {
            return Err(ConfigError::InvalidOption {
                name: "analysis.workers".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

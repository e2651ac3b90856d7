//! Declared participant covariates and the covariate table.
//!
//! Covariates are declared up front with a fixed level set and a coding, and
//! every value is validated when the table is filled. Model assembly never has
//! to discover levels on its own.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, HarmonizationError};

/// How a covariate enters a model's design matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovariateCoding {
    /// Two levels encoded as -0.5 (first) and +0.5 (second).
    #[default]
    Symmetric,
    /// Indicator columns for every level after the first (reference).
    Treatment,
}

/// Declaration of one covariate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateSpec {
    pub name: String,
    /// Ordered levels; the first is the reference level.
    pub levels: Vec<String>,
    #[serde(default)]
    pub coding: CovariateCoding,
}

impl CovariateSpec {
    pub fn symmetric(name: impl Into<String>, first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            levels: vec![first.into(), second.into()],
            coding: CovariateCoding::Symmetric,
        }
    }

    pub fn treatment<I, S>(name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            levels: levels.into_iter().map(Into::into).collect(),
            coding: CovariateCoding::Treatment,
        }
    }

    /// Finds a level by case-insensitive, whitespace-trimmed comparison.
    pub fn level_index(&self, raw: &str) -> Option<usize> {
        let raw = raw.trim();
        self.levels
            .iter()
            .position(|level| level.trim().eq_ignore_ascii_case(raw))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for level in &self.levels {
            if !seen.insert(level.trim().to_ascii_lowercase()) {
                return Err(ConfigError::InvalidCovariate {
                    name: self.name.clone(),
                    reason: format!("level '{level}' is declared more than once"),
                });
            }
        }
        match self.coding {
            CovariateCoding::Symmetric if self.levels.len() != 2 => {
                Err(ConfigError::InvalidCovariate {
                    name: self.name.clone(),
                    reason: format!(
                        "symmetric coding needs exactly 2 levels, found {}",
                        self.levels.len()
                    ),
                })
            }
            CovariateCoding::Treatment if self.levels.len() < 2 => {
                Err(ConfigError::InvalidCovariate {
                    name: self.name.clone(),
                    reason: "treatment coding needs at least 2 levels".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Immutable per-participant covariate levels.
///
/// Built once and passed by reference to every stage that needs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CovariateTable {
    specs: Vec<CovariateSpec>,
    values: BTreeMap<String, BTreeMap<String, usize>>,
}

impl CovariateTable {
    pub fn new(specs: Vec<CovariateSpec>) -> Self {
        Self {
            specs,
            values: BTreeMap::new(),
        }
    }

    pub fn specs(&self) -> &[CovariateSpec] {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Option<&CovariateSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Records a participant's level for a declared covariate.
    ///
    /// Undeclared covariates and levels, blank ones included, are returned
    /// as errors and leave the table unchanged. Callers skip missing tokens
    /// before inserting.
    pub fn insert(
        &mut self,
        participant: &str,
        covariate: &str,
        raw_level: &str,
    ) -> Result<(), HarmonizationError> {
        let Some(spec) = self.specs.iter().find(|spec| spec.name == covariate) else {
            return Err(HarmonizationError::InvalidCovariateLevel {
                participant: participant.to_string(),
                covariate: covariate.to_string(),
                level: raw_level.to_string(),
            });
        };
        let Some(level) = spec.level_index(raw_level) else {
            return Err(HarmonizationError::InvalidCovariateLevel {
                participant: participant.to_string(),
                covariate: covariate.to_string(),
                level: raw_level.trim().to_string(),
            });
        };
        self.values
            .entry(participant.trim().to_string())
            .or_default()
            .insert(covariate.to_string(), level);
        Ok(())
    }

    /// Level index of a participant's covariate, if observed.
    pub fn level(&self, participant: &str, covariate: &str) -> Option<usize> {
        self.values.get(participant)?.get(covariate).copied()
    }

    /// Level label of a participant's covariate, if observed.
    pub fn level_label(&self, participant: &str, covariate: &str) -> Option<&str> {
        let level = self.level(participant, covariate)?;
        self.spec(covariate)?.levels.get(level).map(String::as_str)
    }

    /// All covariate levels of one participant (covariate -> level label).
    pub fn participant(&self, participant: &str) -> BTreeMap<&str, &str> {
        let mut out = BTreeMap::new();
        if let Some(values) = self.values.get(participant) {
            for (name, &level) in values {
                if let Some(label) = self.spec(name).and_then(|s| s.levels.get(level)) {
                    out.insert(name.as_str(), label.as_str());
                }
            }
        }
        out
    }

    pub fn participant_count(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CovariateTable {
        CovariateTable::new(vec![
            CovariateSpec::symmetric("gender", "female", "male"),
            CovariateSpec::treatment("age_group", ["18-29", "30-49", "50+"]),
        ])
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = table();
        table.insert("P01", "gender", " Male ").unwrap();
        table.insert("P01", "age_group", "50+").unwrap();
        assert_eq!(table.level("P01", "gender"), Some(1));
        assert_eq!(table.level_label("P01", "age_group"), Some("50+"));
        assert_eq!(table.level("P02", "gender"), None);
        assert_eq!(table.participant("P01").len(), 2);
    }

    #[test]
    fn test_insert_rejects_undeclared_level() {
        let mut table = table();
        let err = table.insert("P01", "gender", "other").unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(table.level("P01", "gender"), None);
    }

    #[test]
    fn test_insert_rejects_blank_level() {
        let mut table = table();
        let err = table.insert("P01", "age_group", "  ").unwrap_err();
        assert!(matches!(err, HarmonizationError::InvalidCovariateLevel { .. }));
        assert!(table.participant("P01").is_empty());
    }

    #[test]
    fn test_symmetric_requires_two_levels() {
        let spec = CovariateSpec {
            name: "site".to_string(),
            levels: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            coding: CovariateCoding::Symmetric,
        };
        assert!(spec.validate().is_err());
    }
}

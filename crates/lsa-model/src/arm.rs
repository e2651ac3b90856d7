//! Study arms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timepoint::normalize_label;

/// Index into [`ArmSet::levels`]; `Arm(0)` is the reference (control) arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arm(pub usize);

impl Arm {
    pub const CONTROL: Arm = Arm(0);
    pub const TREATMENT: Arm = Arm(1);
}

/// The two declared arms, reference first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmSet {
    pub levels: Vec<String>,
    /// Source spellings (alias -> declared level).
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl ArmSet {
    pub fn new(control: impl Into<String>, treatment: impl Into<String>) -> Self {
        Self {
            levels: vec![control.into(), treatment.into()],
            aliases: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, level: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), level.into());
        self
    }

    pub fn label(&self, arm: Arm) -> &str {
        self.levels
            .get(arm.0)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn arms(&self) -> impl Iterator<Item = Arm> + '_ {
        (0..self.levels.len()).map(Arm)
    }

    /// Resolves a raw arm value against declared levels, then aliases.
    pub fn resolve(&self, raw: &str) -> Option<Arm> {
        let key = normalize_label(raw);
        if key.is_empty() {
            return None;
        }
        let position = |label: &str| {
            self.levels
                .iter()
                .position(|level| normalize_label(level) == normalize_label(label))
                .map(Arm)
        };
        if let Some(arm) = position(raw) {
            return Some(arm);
        }
        self.aliases
            .iter()
            .find(|(alias, _)| normalize_label(alias) == key)
            .and_then(|(_, level)| position(level))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.len() != 2 {
            return Err(ConfigError::ArmCount {
                found: self.levels.len(),
            });
        }
        if normalize_label(&self.levels[0]) == normalize_label(&self.levels[1]) {
            return Err(ConfigError::DuplicateName {
                kind: "arm",
                name: self.levels[1].clone(),
            });
        }
        for (alias, level) in &self.aliases {
            if self.resolve(level).is_none() {
                return Err(ConfigError::InvalidOption {
                    name: format!("arms.aliases.{alias}"),
                    reason: format!("'{level}' is not a declared arm"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_levels_and_aliases() {
        let arms = ArmSet::new("Waitlist", "Intervention").with_alias("1", "Intervention");
        assert_eq!(arms.resolve("waitlist"), Some(Arm::CONTROL));
        assert_eq!(arms.resolve("INTERVENTION"), Some(Arm::TREATMENT));
        assert_eq!(arms.resolve("1"), Some(Arm::TREATMENT));
        assert_eq!(arms.resolve("2"), None);
        assert_eq!(arms.resolve(""), None);
    }

    #[test]
    fn test_validate_requires_two_arms() {
        let arms = ArmSet {
            levels: vec!["A".to_string()],
            aliases: BTreeMap::new(),
        };
        assert_eq!(arms.validate(), Err(ConfigError::ArmCount { found: 1 }));
    }
}

//! Tests for the study configuration document.

use lsa_model::{AnalysisKind, ConfigError, CovariateCoding, FixRule, StudyConfig, Timepoint};

const STUDY_TOML: &str = r#"
[study]
name = "Skills Pilot"

[timepoints]
labels = ["Baseline", "Week 1", "Week 2", "Week 6"]
aliases = { "T0" = "Baseline" }

[arms]
levels = ["Waitlist", "Intervention"]
aliases = { "0" = "Waitlist", "1" = "Intervention" }

[[covariates]]
name = "gender"
levels = ["female", "male"]

[[covariates]]
name = "site"
levels = ["north", "south", "east"]
coding = "treatment"

[[instruments]]
name = "k6"
participant_column = "pid"
timepoint_column = "visit"
items = { k1 = "K6_1", k2 = "K6_2", k3 = "K6_3" }
timepoint_labels = { "FU" = "Week 6" }

[[outcomes]]
name = "distress"
instrument = "k6"
items = ["k1", "k2", "k3"]
reverse_items = ["k3"]
scale = { min = 1.0, max = 5.0 }

[[fixes]]
name = "k6_out_of_range"
instrument = "k6"
rule = { kind = "clamp", min = 1.0, max = 5.0 }

[analysis]
adjust_for = ["gender"]
moderators = ["site"]
phases = [
    { name = "early", timepoints = ["Week 1", "Week 2"] },
    { name = "late", timepoints = ["Week 6"] },
]
confidence_level = 0.9
"#;

fn parse(contents: &str) -> StudyConfig {
    toml::from_str(contents).expect("parse study config")
}

#[test]
fn parses_and_validates_full_document() {
    let config = parse(STUDY_TOML);
    config.validate().expect("valid config");

    assert_eq!(config.study.name, "Skills Pilot");
    assert_eq!(config.timepoints.len(), 4);
    assert_eq!(config.covariates[0].coding, CovariateCoding::Symmetric);
    assert_eq!(config.covariates[1].coding, CovariateCoding::Treatment);
    assert_eq!(config.fixes[0].rule, FixRule::Clamp { min: 1.0, max: 5.0 });
    assert_eq!(config.analysis.analyses, AnalysisKind::ALL.to_vec());
    assert!((config.analysis.confidence_level - 0.9).abs() < 1e-12);
    assert_eq!(config.analysis.fit_timeout_ms, 30_000);
    assert!(config.analysis.workers.is_none());

    let phases = config.analysis.effective_phases(&config.timepoints);
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[0].1, vec![Timepoint(1), Timepoint(2)]);
    assert_eq!(phases[1].1, vec![Timepoint(3)]);
}

#[test]
fn default_phase_spans_all_post_baseline_timepoints() {
    let mut config = parse(STUDY_TOML);
    config.analysis.phases.clear();
    let phases = config.analysis.effective_phases(&config.timepoints);
    assert_eq!(phases.len(), 1);
    assert_eq!(phases[0].1, vec![Timepoint(1), Timepoint(2), Timepoint(3)]);
}

#[test]
fn rejects_unknown_outcome_item() {
    let mut config = parse(STUDY_TOML);
    config.outcomes[0].items.push("k9".to_string());
    assert_eq!(
        config.validate(),
        Err(ConfigError::UnknownItem {
            instrument: "k6".to_string(),
            item: "k9".to_string(),
        })
    );
}

#[test]
fn rejects_reverse_items_without_scale() {
    let mut config = parse(STUDY_TOML);
    config.outcomes[0].scale = None;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidOutcome { .. })
    ));
}

#[test]
fn rejects_baseline_inside_phase() {
    let mut config = parse(STUDY_TOML);
    config.analysis.phases[0].timepoints.push("Baseline".to_string());
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidOption { .. })
    ));
}

#[test]
fn rejects_undeclared_moderator() {
    let mut config = parse(STUDY_TOML);
    config.analysis.moderators.push("age_group".to_string());
    assert_eq!(
        config.validate(),
        Err(ConfigError::UnknownCovariate {
            context: "analysis.moderators".to_string(),
            name: "age_group".to_string(),
        })
    );
}

#[test]
fn rejects_recode_outside_overlapping_clamp() {
    let mut config = parse(STUDY_TOML);
    config.fixes.push(lsa_model::DataFix {
        name: "k6_nine".to_string(),
        instrument: "k6".to_string(),
        items: vec!["k1".to_string()],
        rule: FixRule::Recode { from: 9.0, to: 6.0 },
    });
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidFix { .. })
    ));
}

#[test]
fn rejects_confidence_level_out_of_range() {
    let mut config = parse(STUDY_TOML);
    config.analysis.confidence_level = 1.0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidOption { .. })
    ));
}

#[test]
fn config_serializes_back_to_equal_document() {
    let config = parse(STUDY_TOML);
    let text = toml::to_string(&config).expect("serialize config");
    assert_eq!(parse(&text), config);
}

#[test]
fn rejects_covariate_named_like_model_term() {
    let mut config = parse(STUDY_TOML);
    config.covariates[0].name = "arm".to_string();
    config.analysis.adjust_for.clear();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidCovariate { name, .. }) if name == "arm"
    ));
}

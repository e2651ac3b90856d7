//! Full analysis battery over synthetic two-arm panels.

use lsa_core::{AnalysisContext, run_analyses};
use lsa_model::{
    AnalysisKind, AnalysisOptions, AnalysisResults, Arm, ArmSet, CovariateSpec, CovariateTable,
    Panel, PanelRow, PhaseDefinition, ResultRow, Timepoint, TimepointScale,
};

const OUTCOMES: [&str; 2] = ["distress", "wellbeing"];

/// Twenty participants alternating Control/Intervention. Participants 2k and
/// 2k+1 share a baseline level; Intervention rows get `shift[t - 1]` at each
/// post-baseline timepoint.
fn study_panel(shift: [f64; 2], noise: f64) -> Panel {
    let mut rows = Vec::new();
    for (o, outcome) in OUTCOMES.iter().enumerate() {
        for i in 0..20usize {
            let arm = if i % 2 == 0 { Arm::CONTROL } else { Arm::TREATMENT };
            let base = 3.0 + 0.15 * (i / 2) as f64 + o as f64;
            for t in 0..3usize {
                let wiggle = noise * (i as f64 * 1.7 + t as f64 * 2.3 + o as f64).sin();
                let trend = [0.0, 0.2, 0.3][t];
                let effect = if t > 0 && arm == Arm::TREATMENT {
                    shift[t - 1]
                } else {
                    0.0
                };
                rows.push(PanelRow {
                    participant_id: format!("P{i:02}"),
                    timepoint: Timepoint(t),
                    arm,
                    outcome: (*outcome).to_string(),
                    value: Some(base + trend + effect + wiggle),
                });
            }
        }
    }
    Panel {
        timepoints: TimepointScale::new(["Baseline", "Mid", "End"]),
        arms: ArmSet::new("Control", "Intervention"),
        outcomes: OUTCOMES.iter().map(|o| (*o).to_string()).collect(),
        rows,
    }
}

fn covariates() -> CovariateTable {
    let mut table = CovariateTable::new(vec![
        CovariateSpec::symmetric("gender", "female", "male"),
        CovariateSpec::treatment("site", ["north", "south", "east"]),
        CovariateSpec::symmetric("cohort", "A", "B"),
    ]);
    for i in 0..20usize {
        let participant = format!("P{i:02}");
        let pair = i / 2;
        let gender = if pair % 2 == 0 { "female" } else { "male" };
        let site = if pair < 4 { "north" } else { "south" };
        table.insert(&participant, "gender", gender).expect("gender");
        table.insert(&participant, "site", site).expect("site");
        table.insert(&participant, "cohort", "A").expect("cohort");
    }
    table
}

fn options(analyses: &[AnalysisKind], moderators: &[&str]) -> AnalysisOptions {
    AnalysisOptions {
        analyses: analyses.to_vec(),
        moderators: moderators.iter().map(|m| (*m).to_string()).collect(),
        ..AnalysisOptions::default()
    }
}

fn run(panel: &Panel, table: &CovariateTable, options: &AnalysisOptions) -> AnalysisResults {
    run_analyses(&AnalysisContext::new(panel, table, options))
}

fn row<'a>(
    results: &'a AnalysisResults,
    analysis: AnalysisKind,
    outcome: &str,
    stratum: &str,
    comparison: &str,
) -> &'a ResultRow {
    results
        .table(analysis)
        .and_then(|table| table.find(outcome, stratum, comparison))
        .unwrap_or_else(|| panic!("missing row {analysis} {outcome} {stratum} {comparison}"))
}

#[test]
fn end_to_end_effect_at_final_timepoint_only() {
    let panel = study_panel([0.0, 1.0], 0.1);
    let table = covariates();
    let results = run(&panel, &table, &AnalysisOptions::default());

    let mid = row(&results, AnalysisKind::ArmDifference, "distress", "Mid", "Intervention - Control")
        .statistics()
        .expect("mid computed");
    assert!(mid.estimate.abs() < 0.25, "mid estimate {}", mid.estimate);

    let end = row(&results, AnalysisKind::ArmDifference, "distress", "End", "Intervention - Control")
        .statistics()
        .expect("end computed");
    assert!(end.estimate > 0.7 && end.estimate < 1.3, "end estimate {}", end.estimate);
    assert!(end.p_value < 0.05);
    assert!(end.lower_ci > 0.0);

    let course = row(&results, AnalysisKind::TimeCourse, "distress", "Intervention", "End - Baseline")
        .statistics()
        .expect("time course computed");
    assert!((course.estimate - 1.3).abs() < 0.25);

    let time_course = results.table(AnalysisKind::TimeCourse).expect("time course table");
    assert_eq!(time_course.rows.len(), 2 * 2 * 2);
    assert!(results.table(AnalysisKind::Subgroup).expect("subgroup table").rows.is_empty());
    assert_eq!(results.omitted_count(), 0);
}

#[test]
fn arm_contrast_is_treatment_minus_control() {
    let panel = study_panel([2.0, 2.0], 0.0);
    let table = covariates();
    let results = run(&panel, &table, &options(&[AnalysisKind::ArmDifference], &[]));
    for stratum in ["Mid", "End"] {
        let stats = row(&results, AnalysisKind::ArmDifference, "distress", stratum, "Intervention - Control")
            .statistics()
            .expect("computed");
        assert!((stats.estimate - 2.0).abs() < 1e-8, "{stratum}: {}", stats.estimate);
        assert!(stats.standard_error < 1e-6);
    }
}

#[test]
fn moderator_order_does_not_change_subgroup_results() {
    let panel = study_panel([0.5, 1.0], 0.1);
    let table = covariates();
    let sorted = |moderators: &[&str]| {
        let results = run(&panel, &table, &options(&[AnalysisKind::Subgroup], moderators));
        let mut rows = results
            .table(AnalysisKind::Subgroup)
            .expect("subgroup table")
            .rows
            .clone();
        rows.sort_by(|a, b| {
            (&a.outcome, &a.moderator, &a.stratum).cmp(&(&b.outcome, &b.moderator, &b.stratum))
        });
        rows
    };
    let forward = sorted(&["gender", "site"]);
    let backward = sorted(&["site", "gender"]);
    assert_eq!(forward.len(), 2 * (2 + 3));
    assert_eq!(forward, backward);
}

#[test]
fn subgroup_rows_cover_declared_levels() {
    let panel = study_panel([0.5, 1.0], 0.1);
    let table = covariates();
    let mut opts = options(&[AnalysisKind::Subgroup], &["site"]);
    opts.phases = vec![
        PhaseDefinition {
            name: "early".to_string(),
            timepoints: vec!["Mid".to_string()],
        },
        PhaseDefinition {
            name: "late".to_string(),
            timepoints: vec!["End".to_string()],
        },
    ];
    let results = run(&panel, &table, &opts);
    let subgroup = results.table(AnalysisKind::Subgroup).expect("subgroup table");
    let strata: Vec<&str> = subgroup
        .for_outcome("distress")
        .map(|r| r.stratum.as_str())
        .collect();
    assert_eq!(strata, vec!["north", "south", "east"]);
    assert!(subgroup.rows.iter().all(|r| r.moderator.as_deref() == Some("site")));

    let north = row(&results, AnalysisKind::Subgroup, "distress", "north", "Intervention - Control");
    assert!(north.is_computed());
    let east = row(&results, AnalysisKind::Subgroup, "distress", "east", "Intervention - Control");
    assert!(east.omission_reason().expect("omitted").contains("east"));
}

#[test]
fn single_level_moderator_is_omitted_with_reason() {
    let panel = study_panel([0.5, 1.0], 0.1);
    let table = covariates();
    let results = run(&panel, &table, &options(&[AnalysisKind::Subgroup], &["cohort"]));
    let subgroup = results.table(AnalysisKind::Subgroup).expect("subgroup table");
    assert_eq!(subgroup.rows.len(), 2 * 2);
    assert_eq!(subgroup.computed_count(), 0);
    for row in &subgroup.rows {
        assert!(row.omission_reason().expect("omitted").contains("cohort"));
    }
}

#[test]
fn missing_baseline_leaves_other_outcomes_unchanged() {
    let full = study_panel([0.0, 1.0], 0.1);
    let mut partial = full.clone();
    partial.rows.retain(|row| {
        !(row.participant_id == "P00" && row.outcome == "distress" && row.timepoint.is_baseline())
    });
    let table = covariates();
    let opts = options(&[AnalysisKind::ArmDifference], &[]);
    let with_all = run(&full, &table, &opts);
    let without = run(&partial, &table, &opts);

    let table_of = |results: &AnalysisResults, outcome: &str| -> Vec<ResultRow> {
        results
            .table(AnalysisKind::ArmDifference)
            .expect("arm difference table")
            .for_outcome(outcome)
            .cloned()
            .collect()
    };
    assert_eq!(table_of(&with_all, "wellbeing"), table_of(&without, "wellbeing"));
    assert_ne!(table_of(&with_all, "distress"), table_of(&without, "distress"));
    assert!(table_of(&without, "distress").iter().all(ResultRow::is_computed));
}

#[test]
fn baseline_only_outcome_is_reported_as_omitted() {
    let mut panel = study_panel([0.0, 1.0], 0.1);
    for row in panel.rows.iter_mut() {
        if row.outcome == "wellbeing" && !row.timepoint.is_baseline() {
            row.value = None;
        }
    }
    let table = covariates();
    let opts = options(&[AnalysisKind::TimeCourse, AnalysisKind::ArmDifference], &[]);
    let results = run(&panel, &table, &opts);

    let course = results.table(AnalysisKind::TimeCourse).expect("time course table");
    let strata: Vec<&str> = course
        .for_outcome("wellbeing")
        .map(|r| r.stratum.as_str())
        .collect();
    assert_eq!(strata, vec!["Control", "Intervention"]);
    let control = row(&results, AnalysisKind::TimeCourse, "wellbeing", "Control", "all timepoints - Baseline");
    assert!(control.omission_reason().expect("omitted").contains("post-baseline"));

    let difference = row(
        &results,
        AnalysisKind::ArmDifference,
        "wellbeing",
        "all timepoints",
        "Intervention - Control",
    );
    assert!(difference.omission_reason().expect("omitted").contains("wellbeing"));

    assert_eq!(results.omitted_count(), 3);
    assert!(
        results
            .table(AnalysisKind::ArmDifference)
            .expect("arm difference table")
            .for_outcome("distress")
            .all(ResultRow::is_computed)
    );
}

#[test]
fn unknown_moderator_is_reported_as_omitted() {
    let panel = study_panel([0.5, 1.0], 0.1);
    let table = covariates();
    let results = run(&panel, &table, &options(&[AnalysisKind::Subgroup], &["region"]));
    let subgroup = results.table(AnalysisKind::Subgroup).expect("subgroup table");
    assert_eq!(subgroup.rows.len(), 2);
    for outcome in OUTCOMES {
        let row = row(&results, AnalysisKind::Subgroup, outcome, "region", "Intervention - Control");
        assert_eq!(row.moderator.as_deref(), Some("region"));
        assert!(row.omission_reason().expect("omitted").contains("region"));
    }
}

#[test]
fn participants_missing_adjustment_are_excluded_not_fatal() {
    let panel = study_panel([0.0, 1.0], 0.1);
    let mut table = CovariateTable::new(vec![CovariateSpec::symmetric("gender", "female", "male")]);
    for i in 0..18usize {
        let gender = if (i / 2) % 2 == 0 { "female" } else { "male" };
        table.insert(&format!("P{i:02}"), "gender", gender).expect("gender");
    }
    let mut opts = options(&[AnalysisKind::ArmDifference], &[]);
    opts.adjust_for = vec!["gender".to_string()];
    let results = run(&panel, &table, &opts);
    assert_eq!(results.omitted_count(), 0);
    assert_eq!(results.computed_count(), 2 * 2);
}

#[test]
fn single_post_baseline_timepoint_drops_timepoint_terms() {
    let mut panel = study_panel([0.0, 1.0], 0.1);
    panel.rows.retain(|row| row.timepoint != Timepoint(1));
    let table = covariates();
    let results = run(&panel, &table, &options(&[AnalysisKind::ArmDifference], &[]));
    let arm_difference = results.table(AnalysisKind::ArmDifference).expect("table");
    let strata: Vec<&str> = arm_difference
        .for_outcome("distress")
        .map(|r| r.stratum.as_str())
        .collect();
    assert_eq!(strata, vec!["End"]);
    assert_eq!(arm_difference.omitted_count(), 0);
}

#[test]
fn dedicated_worker_pool_gives_identical_results() {
    let panel = study_panel([0.5, 1.0], 0.1);
    let table = covariates();
    let mut opts = options(&AnalysisKind::ALL, &["gender"]);
    let global = run(&panel, &table, &opts);
    opts.workers = Some(2);
    let pooled = run(&panel, &table, &opts);
    assert_eq!(global, pooled);
}

//! The three analyses of the battery.
//!
//! Each analysis fits one model per task and turns the requested comparisons
//! into result rows. The rows a task will produce are known before fitting,
//! so a failed model still yields one omitted row per comparison. A task
//! that fails before any comparison can be planned yields a single omitted
//! row covering the whole task.

use std::time::Duration;

use lsa_model::{
    ARM_TERM, AnalysisKind, Arm, BASELINE_TERM, ContrastError, ModelingError, PHASE_TERM,
    ResultRow, RowStatus, TIMEPOINT_TERM, Timepoint,
};
use lsa_stats::{
    Deadline, FittedModel, FormulaSpec, MixedModelSolver, comparison_label, contrast_between, fit,
};
use lsa_transform::{baseline_adjust, collapse_phases};

use crate::context::AnalysisContext;
use crate::frame_builder::{BuiltFrame, DesignFactor, FrameBuilder, distinct_levels, model_covariates};
use crate::plan::AnalysisTask;

/// Stratum or level of a row standing in for every timepoint of a task.
const ALL_TIMEPOINTS: &str = "all timepoints";

/// One comparison a task reports.
struct Comparison {
    stratum: String,
    factor: &'static str,
    earlier: String,
    later: String,
    by: Option<(String, String)>,
    /// Known before fitting that the comparison cannot be drawn.
    unavailable: Option<ContrastError>,
}

impl Comparison {
    fn new(stratum: impl Into<String>, factor: &'static str, earlier: &str, later: &str) -> Self {
        Self {
            stratum: stratum.into(),
            factor,
            earlier: earlier.to_string(),
            later: later.to_string(),
            by: None,
            unavailable: None,
        }
    }

    fn within(mut self, factor: &str, level: &str) -> Self {
        self.by = Some((factor.to_string(), level.to_string()));
        self
    }

    fn unavailable(mut self, error: ContrastError) -> Self {
        self.unavailable = Some(error);
        self
    }

    fn label(&self) -> String {
        comparison_label(&self.later, &self.earlier)
    }
}

/// Runs one task with `solver`, returning its rows in comparison order.
pub(crate) fn run_task(
    ctx: &AnalysisContext<'_>,
    solver: &dyn MixedModelSolver,
    task: &AnalysisTask,
) -> Vec<ResultRow> {
    let (comparisons, model) = match task.analysis {
        AnalysisKind::TimeCourse => time_course(ctx, solver, task),
        AnalysisKind::ArmDifference => arm_difference(ctx, solver, task),
        AnalysisKind::Subgroup => subgroup(ctx, solver, task),
    };
    let comparisons = match (&model, comparisons.is_empty()) {
        (Err(_), true) => vec![whole_task(ctx, task)],
        (Ok(_), true) => {
            tracing::debug!(task = %task, "no comparisons to draw");
            return Vec::new();
        }
        (_, false) => comparisons,
    };
    if let Err(error) = &model {
        tracing::warn!(
            task = %task,
            comparisons = comparisons.len(),
            error = %error,
            "model not fitted; comparisons omitted"
        );
    }
    comparisons
        .into_iter()
        .map(|comparison| row(ctx, task, &model, comparison))
        .collect()
}

/// The comparison reported when a task fails before planning any.
fn whole_task(ctx: &AnalysisContext<'_>, task: &AnalysisTask) -> Comparison {
    let panel = ctx.panel;
    let control = panel.arm_label(Arm::CONTROL);
    let treatment = panel.arm_label(Arm::TREATMENT);
    match task.analysis {
        AnalysisKind::TimeCourse => Comparison::new(
            panel.arm_label(task.arm.unwrap_or(Arm::CONTROL)),
            TIMEPOINT_TERM,
            panel.timepoint_label(panel.timepoints.baseline()),
            ALL_TIMEPOINTS,
        ),
        AnalysisKind::ArmDifference => {
            Comparison::new(ALL_TIMEPOINTS, ARM_TERM, control, treatment)
        }
        AnalysisKind::Subgroup => Comparison::new(
            task.moderator.as_deref().unwrap_or_default(),
            ARM_TERM,
            control,
            treatment,
        ),
    }
}

fn row(
    ctx: &AnalysisContext<'_>,
    task: &AnalysisTask,
    model: &Result<FittedModel, ModelingError>,
    comparison: Comparison,
) -> ResultRow {
    let status = match (model, &comparison.unavailable) {
        (Err(error), _) => omitted(error),
        (Ok(_), Some(error)) => omitted(error),
        (Ok(model), None) => {
            let by = comparison
                .by
                .as_ref()
                .map(|(factor, level)| (factor.as_str(), level.as_str()));
            match contrast_between(
                model,
                comparison.factor,
                &comparison.earlier,
                &comparison.later,
                by,
                ctx.options.confidence_level,
            ) {
                Ok(contrast) => RowStatus::Computed(contrast.statistics),
                Err(error) => {
                    tracing::warn!(task = %task, stratum = %comparison.stratum, error = %error, "comparison omitted");
                    omitted(&error)
                }
            }
        }
    };
    ResultRow {
        outcome: task.outcome.clone(),
        analysis: task.analysis,
        moderator: task.moderator.clone(),
        comparison: comparison.label(),
        stratum: comparison.stratum,
        status,
    }
}

fn omitted(error: &impl std::fmt::Display) -> RowStatus {
    RowStatus::Omitted {
        reason: error.to_string(),
    }
}

fn deadline(ctx: &AnalysisContext<'_>) -> Deadline {
    Deadline::after(Duration::from_millis(ctx.options.fit_timeout_ms))
}

fn log_exclusions(task: &AnalysisTask, built: &BuiltFrame) {
    if built.excluded > 0 {
        tracing::info!(
            task = %task,
            excluded = built.excluded,
            "participants without required covariates excluded"
        );
    }
}

fn fit_built(
    ctx: &AnalysisContext<'_>,
    solver: &dyn MixedModelSolver,
    task: &AnalysisTask,
    built: &BuiltFrame,
    formula: &FormulaSpec,
) -> Result<FittedModel, ModelingError> {
    log_exclusions(task, built);
    fit(&built.frame, formula, solver, &deadline(ctx))
}

/// Post-baseline timepoints at which the outcome was observed at all.
fn observed_post_baseline(ctx: &AnalysisContext<'_>, outcome: &str) -> Vec<Timepoint> {
    ctx.panel
        .observed_timepoints(outcome)
        .into_iter()
        .filter(|tp| !tp.is_baseline())
        .collect()
}

type TaskOutput = (Vec<Comparison>, Result<FittedModel, ModelingError>);

/// Within one arm, each post-baseline timepoint against baseline.
///
/// `value ~ timepoint + adjustments + (1 | participant)` on every observed
/// value of the arm, baseline included.
fn time_course(
    ctx: &AnalysisContext<'_>,
    solver: &dyn MixedModelSolver,
    task: &AnalysisTask,
) -> TaskOutput {
    let panel = ctx.panel;
    let arm = task.arm.unwrap_or(Arm::CONTROL);
    let arm_label = panel.arm_label(arm);
    let baseline_label = panel.timepoint_label(panel.timepoints.baseline());

    let comparisons: Vec<Comparison> = observed_post_baseline(ctx, &task.outcome)
        .into_iter()
        .map(|tp| {
            Comparison::new(
                arm_label,
                TIMEPOINT_TERM,
                baseline_label,
                panel.timepoint_label(tp),
            )
        })
        .collect();
    if comparisons.is_empty() {
        return (comparisons, Err(no_post_baseline(&task.outcome)));
    }

    let covariates = model_covariates(&ctx.options.adjust_for, None);
    let mut builder = FrameBuilder::new(
        ctx.covariates,
        &covariates,
        vec![DesignFactor {
            name: TIMEPOINT_TERM,
            declared: &panel.timepoints.labels,
        }],
    );
    for row in panel.rows_for(&task.outcome).filter(|row| row.arm == arm) {
        if let Some(value) = row.value {
            builder.push(&row.participant_id, value, &[panel.timepoint_label(row.timepoint)], 0.0);
        }
    }
    let built = builder.finish();

    let mut formula = FormulaSpec::new().main(TIMEPOINT_TERM);
    for name in &covariates {
        formula = formula.main(*name);
    }
    let model = fit_built(ctx, solver, task, &built, &formula);
    (comparisons, model)
}

/// Treatment minus control at each post-baseline timepoint.
///
/// `value ~ timepoint + arm + timepoint:arm + baseline_centered + adjustments
/// + (1 | participant)` on baseline-adjusted rows. With a single timepoint in
/// the data the timepoint terms are dropped and only that timepoint is
/// reported.
fn arm_difference(
    ctx: &AnalysisContext<'_>,
    solver: &dyn MixedModelSolver,
    task: &AnalysisTask,
) -> TaskOutput {
    let panel = ctx.panel;
    let control = panel.arm_label(Arm::CONTROL);
    let treatment = panel.arm_label(Arm::TREATMENT);
    let adjusted = baseline_adjust(panel, &task.outcome);
    let present = adjusted.timepoints();
    let by_timepoint = present.len() > 1;

    let comparisons: Vec<Comparison> = observed_post_baseline(ctx, &task.outcome)
        .into_iter()
        .map(|tp| {
            let label = panel.timepoint_label(tp);
            let comparison = Comparison::new(label, ARM_TERM, control, treatment);
            if by_timepoint {
                comparison.within(TIMEPOINT_TERM, label)
            } else if present.contains(&tp) {
                comparison
            } else {
                comparison.unavailable(ContrastError::UnknownLevel {
                    factor: TIMEPOINT_TERM.to_string(),
                    level: label.to_string(),
                })
            }
        })
        .collect();
    if comparisons.is_empty() {
        return (comparisons, Err(no_post_baseline(&task.outcome)));
    }

    let covariates = model_covariates(&ctx.options.adjust_for, None);
    let mut factors = vec![DesignFactor {
        name: ARM_TERM,
        declared: &panel.arms.levels,
    }];
    if by_timepoint {
        factors.push(DesignFactor {
            name: TIMEPOINT_TERM,
            declared: &panel.timepoints.labels,
        });
    }
    let mut builder = FrameBuilder::new(ctx.covariates, &covariates, factors).with_baseline();
    for row in &adjusted.rows {
        let arm = panel.arm_label(row.arm);
        let timepoint = panel.timepoint_label(row.timepoint);
        let levels = [arm, timepoint];
        let levels = if by_timepoint { &levels[..] } else { &levels[..1] };
        builder.push(&row.participant_id, row.value, levels, row.baseline_centered);
    }
    let built = builder.finish();

    let mut formula = FormulaSpec::new();
    if by_timepoint {
        formula = formula
            .main(TIMEPOINT_TERM)
            .main(ARM_TERM)
            .interaction(TIMEPOINT_TERM, ARM_TERM);
    } else {
        formula = formula.main(ARM_TERM);
    }
    formula = formula.main(BASELINE_TERM);
    for name in &covariates {
        formula = formula.main(*name);
    }
    let model = fit_built(ctx, solver, task, &built, &formula);
    (comparisons, model)
}

/// Treatment minus control within each level of one moderator.
///
/// `value ~ [phase] + arm + moderator + arm:moderator + baseline_centered +
/// adjustments + (1 | participant)` on phase means of baseline-adjusted rows.
fn subgroup(
    ctx: &AnalysisContext<'_>,
    solver: &dyn MixedModelSolver,
    task: &AnalysisTask,
) -> TaskOutput {
    let panel = ctx.panel;
    let control = panel.arm_label(Arm::CONTROL);
    let treatment = panel.arm_label(Arm::TREATMENT);
    let moderator = task.moderator.as_deref().unwrap_or_default();
    let Some(spec) = ctx.covariates.spec(moderator) else {
        return (
            Vec::new(),
            Err(ModelingError::UnknownTerm {
                name: moderator.to_string(),
            }),
        );
    };

    let comparisons: Vec<Comparison> = spec
        .levels
        .iter()
        .map(|level| Comparison::new(level.as_str(), ARM_TERM, control, treatment).within(moderator, level))
        .collect();

    let phases = ctx.phases();
    let phase_names: Vec<String> = phases.iter().map(|phase| phase.name.clone()).collect();
    let rows = collapse_phases(&baseline_adjust(panel, &task.outcome), &phases);

    let covariates = model_covariates(&ctx.options.adjust_for, Some(moderator));
    let factors = vec![
        DesignFactor {
            name: ARM_TERM,
            declared: &panel.arms.levels,
        },
        DesignFactor {
            name: PHASE_TERM,
            declared: &phase_names,
        },
    ];
    let mut builder = FrameBuilder::new(ctx.covariates, &covariates, factors).with_baseline();
    for row in &rows {
        builder.push(
            &row.participant_id,
            row.value,
            &[panel.arm_label(row.arm), row.phase.as_str()],
            row.baseline_centered,
        );
    }
    let built = builder.finish();

    let mut formula = FormulaSpec::new();
    if phases.len() > 1 && distinct_levels(&built.frame, PHASE_TERM) > 1 {
        formula = formula.main(PHASE_TERM);
    }
    formula = formula
        .main(ARM_TERM)
        .main(moderator)
        .interaction(ARM_TERM, moderator)
        .main(BASELINE_TERM);
    for name in covariates.iter().filter(|name| **name != moderator) {
        formula = formula.main(*name);
    }
    let model = fit_built(ctx, solver, task, &built, &formula);
    (comparisons, model)
}

fn no_post_baseline(outcome: &str) -> ModelingError {
    ModelingError::InvalidInput {
        message: format!("outcome {outcome} has no post-baseline observations"),
    }
}

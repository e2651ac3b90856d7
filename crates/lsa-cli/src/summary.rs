use std::collections::BTreeMap;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use lsa_cli::pipeline::PreparedStudy;
use lsa_model::{AnalysisResults, ResultRow};

pub fn print_run_summary(study: &PreparedStudy, results: &AnalysisResults) {
    println!("Study: {}", study.config.study.name);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Analysis"),
        header_cell("Outcome"),
        header_cell("Rows"),
        header_cell("Computed"),
        header_cell("Omitted"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 2..5 {
        align_column(&mut table, index, CellAlignment::Right);
    }

    let mut totals = (0usize, 0usize);
    for result_table in &results.tables {
        let mut per_outcome: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for row in &result_table.rows {
            let entry = per_outcome.entry(row.outcome.as_str()).or_default();
            if row.is_computed() {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
        for (outcome, (computed, omitted)) in per_outcome {
            totals.0 += computed;
            totals.1 += omitted;
            table.add_row(vec![
                Cell::new(result_table.analysis.as_str()),
                Cell::new(outcome),
                Cell::new(computed + omitted),
                Cell::new(computed),
                count_cell(omitted, Color::Yellow),
            ]);
        }
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(totals.0 + totals.1).add_attribute(Attribute::Bold),
        Cell::new(totals.0).add_attribute(Attribute::Bold),
        count_cell(totals.1, Color::Yellow).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    let omitted: Vec<&ResultRow> = results.rows().filter(|row| !row.is_computed()).collect();
    if !omitted.is_empty() {
        print_omitted_table(&omitted);
    }
}

fn print_omitted_table(rows: &[&ResultRow]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Analysis"),
        header_cell("Outcome"),
        header_cell("Moderator"),
        header_cell("Stratum"),
        header_cell("Comparison"),
        header_cell("Reason"),
    ]);
    apply_table_style(&mut table);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.analysis.as_str()),
            Cell::new(&row.outcome),
            Cell::new(row.moderator.as_deref().unwrap_or("-")),
            Cell::new(&row.stratum),
            Cell::new(&row.comparison),
            Cell::new(row.omission_reason().unwrap_or_default()).fg(Color::Yellow),
        ]);
    }
    println!();
    println!("Omitted comparisons:");
    println!("{table}");
}

pub fn print_harmonize_summary(study: &PreparedStudy) {
    let panel = &study.harmonized.panel;
    let report = &study.harmonized.report;
    println!("Study: {}", study.config.study.name);
    println!(
        "Panel: {} participants, {} outcomes, {} rows",
        panel.participants().len(),
        panel.outcomes.len(),
        panel.rows.len()
    );

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Outcome"),
        header_cell("Timepoint"),
        header_cell("Observed"),
        header_cell("Missing"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for outcome in &panel.outcomes {
        for timepoint in panel.timepoints.timepoints() {
            let (observed, missing) = panel
                .rows_for(outcome)
                .filter(|row| row.timepoint == timepoint)
                .fold((0usize, 0usize), |(o, m), row| match row.value {
                    Some(_) => (o + 1, m),
                    None => (o, m + 1),
                });
            if observed + missing == 0 {
                continue;
            }
            table.add_row(vec![
                Cell::new(outcome),
                Cell::new(panel.timepoint_label(timepoint)),
                Cell::new(observed),
                count_cell(missing, Color::Yellow),
            ]);
        }
    }
    println!("{table}");

    if !report.fix_counts.is_empty() {
        let mut fixes = Table::new();
        fixes.set_header(vec![header_cell("Fix"), header_cell("Cells changed")]);
        apply_table_style(&mut fixes);
        align_column(&mut fixes, 1, CellAlignment::Right);
        for (name, count) in &report.fix_counts {
            fixes.add_row(vec![Cell::new(name), Cell::new(count)]);
        }
        println!();
        println!("Data fixes:");
        println!("{fixes}");
    }

    if report.dropped_rows > 0 {
        println!("Rows dropped without an arm assignment: {}", report.dropped_rows);
    }
    let issues: Vec<String> = report
        .issues
        .iter()
        .chain(&study.covariate_issues)
        .map(ToString::to_string)
        .collect();
    if !issues.is_empty() {
        eprintln!("Issues:");
        for issue in issues {
            eprintln!("- {issue}");
        }
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).add_attribute(Attribute::Dim)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

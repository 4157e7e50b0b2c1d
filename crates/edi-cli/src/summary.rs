use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use edi_cli::pipeline::{Comparison, MapOutcome};
use edi_model::Layout;
use edi_synth::SynthesizedRecord;
use edi_validate::{Issue, RecordReport, Severity};

pub fn print_map_summary(outcomes: &[MapOutcome]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Layout"),
        header_cell("Lines"),
        header_cell("Fields"),
        header_cell("Refined"),
        header_cell("Advisories"),
    ]);
    apply_summary_table_style(&mut table);
    for column in 1..=4 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for outcome in outcomes {
        table.add_row(vec![
            name_cell(&outcome.layout),
            Cell::new(outcome.lines),
            Cell::new(outcome.fields),
            count_cell(outcome.rewritten, Color::Green),
            count_cell(outcome.advisories.len(), Color::Yellow),
        ]);
    }
    eprintln!("{table}");
    for outcome in outcomes {
        for advisory in &outcome.advisories {
            eprintln!("- {}: {advisory}", outcome.layout);
        }
    }
}

pub fn print_validation(report: &RecordReport) {
    let status = if report.is_valid() {
        Cell::new("VALID").fg(Color::Green).add_attribute(Attribute::Bold)
    } else {
        Cell::new("INVALID").fg(Color::Red).add_attribute(Attribute::Bold)
    };
    let mut header = Table::new();
    apply_table_style(&mut header);
    header.add_row(vec![
        header_cell("Layout"),
        name_cell(&report.layout),
        header_cell("Lines"),
        Cell::new(report.lines.len()),
        header_cell("Errors"),
        count_cell(report.error_count(), Color::Red),
        status,
    ]);
    println!("{header}");

    let mut issues: Vec<(String, &Issue)> = Vec::new();
    for (index, line) in report.lines.iter().enumerate() {
        for issue in &line.issues {
            let label = if line.line.is_empty() {
                (index + 1).to_string()
            } else {
                format!("{} {}", index + 1, line.line)
            };
            issues.push((label, issue));
        }
    }
    issues.extend(report.issues.iter().map(|issue| ("-".to_string(), issue)));
    if issues.is_empty() {
        return;
    }
    issues.sort_by_key(|(_, issue)| severity_rank(issue.severity()));

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Line"),
        header_cell("Severity"),
        header_cell("Field"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for (line, issue) in issues {
        table.add_row(vec![
            Cell::new(line),
            severity_cell(issue.severity()),
            issue.field().map_or_else(|| dim_cell("-"), Cell::new),
            Cell::new(issue.to_string()),
        ]);
    }
    println!();
    println!("Issues:");
    println!("{table}");
}

pub fn print_synthesis_summary(layout: &Layout, records: &[SynthesizedRecord]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Record"),
        header_cell("Lines"),
        header_cell("Retries"),
        header_cell("Defects"),
    ]);
    apply_summary_table_style(&mut table);
    for column in 0..=3 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    let mut total_lines = 0usize;
    let mut total_retries = 0usize;
    let mut total_defects = 0usize;
    for record in records {
        let retries = retries(record);
        total_lines += record.lines.len();
        total_retries += retries;
        total_defects += record.defects.len();
        table.add_row(vec![
            Cell::new(record.index + 1),
            Cell::new(record.lines.len()),
            count_cell(retries, Color::Yellow),
            count_cell(record.defects.len(), Color::Red),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL").fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new(total_lines).add_attribute(Attribute::Bold),
        count_cell(total_retries, Color::Yellow).add_attribute(Attribute::Bold),
        count_cell(total_defects, Color::Red).add_attribute(Attribute::Bold),
    ]);
    eprintln!("Layout: {}", layout.display_name());
    eprintln!("{table}");
    for record in records {
        for defect in &record.defects {
            eprintln!(
                "- record {} line {} #{}: {}",
                defect.record + 1,
                defect.line,
                defect.occurrence + 1,
                defect.errors.join("; ")
            );
        }
    }
}

fn retries(record: &SynthesizedRecord) -> usize {
    record
        .lines
        .iter()
        .map(|line| line.attempts.saturating_sub(1) as usize)
        .sum()
}

pub fn print_comparison(comparison: &Comparison) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Line"),
        header_cell("Field"),
        header_cell("Generated"),
        header_cell("Learned"),
        header_cell("Score"),
        header_cell("Components"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    for field in &comparison.fields {
        let (learned, score) = match &field.best {
            Some((pattern, score)) => (
                Cell::new(pattern),
                Cell::new(format!("{:.0}%", score * 100.0)).fg(score_color(*score)),
            ),
            None => (dim_cell("novel"), dim_cell("-")),
        };
        table.add_row(vec![
            Cell::new(&field.line),
            name_cell(&field.field),
            Cell::new(&field.generated),
            learned,
            score,
            Cell::new(&field.explanation),
        ]);
    }
    println!("{table}");
    if !comparison.advisories.is_empty() {
        println!();
        println!("Advisories:");
        for advisory in &comparison.advisories {
            println!("- {advisory}");
        }
    }
}

pub fn print_layouts(layouts: &[Layout]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Id"),
        header_cell("Name"),
        header_cell("Width"),
        header_cell("Lines"),
        header_cell("Fields"),
    ]);
    apply_table_style(&mut table);
    for column in 2..=4 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for layout in layouts {
        table.add_row(vec![
            name_cell(&layout.id),
            Cell::new(&layout.name),
            Cell::new(layout.line_width),
            Cell::new(layout.lines.len()),
            Cell::new(layout.lines.iter().map(|line| line.fields.len()).sum::<usize>()),
        ]);
    }
    println!("{table}");
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
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: Severity) -> Cell {
    match severity {
        Severity::Error => Cell::new("ERROR").fg(Color::Red),
        Severity::Warning => Cell::new("WARN").fg(Color::Yellow),
    }
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Error => 0,
        Severity::Warning => 1,
    }
}

fn score_color(score: f64) -> Color {
    if score >= 0.9 {
        Color::Green
    } else if score >= 0.75 {
        Color::Yellow
    } else {
        Color::DarkYellow
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn name_cell(name: &str) -> Cell {
    Cell::new(name)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

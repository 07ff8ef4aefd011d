use std::collections::BTreeMap;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use fcast_core::PipelineOutput;
use fcast_ensemble::MonitorReport;
use fcast_ingest::ColumnHint;
use fcast_model::{MatchMethod, RoutingPlan, SchemaReport, TransformReport};

pub fn print_schema(report: &SchemaReport) {
    println!(
        "Domain: {}  (confidence {:.0}/100)",
        report.detected_domain, report.overall_confidence
    );
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Role"),
        header_cell("Column"),
        header_cell("Method"),
        header_cell("Confidence"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for mapping in &report.mapped_schema {
        table.add_row(vec![
            Cell::new(mapping.role)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&mapping.column),
            method_cell(mapping.method),
            confidence_cell(mapping.confidence),
        ]);
    }
    for role in &report.missing_required {
        table.add_row(vec![
            Cell::new(role).fg(Color::Red).add_attribute(Attribute::Bold),
            dim_cell("-"),
            Cell::new("missing").fg(Color::Red),
            dim_cell("-"),
        ]);
    }
    println!("{table}");
    if !report.unmapped_columns.is_empty() {
        println!("Unmapped: {}", report.unmapped_columns.join(", "));
    }
}

pub fn print_profile(columns: &BTreeMap<String, ColumnHint>) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Kind"),
        header_cell("Unique"),
        header_cell("Blank"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for (name, hint) in columns {
        let kind = if hint.is_numeric {
            Cell::new("numeric").fg(Color::Green)
        } else {
            dim_cell("text")
        };
        table.add_row(vec![
            Cell::new(name),
            kind,
            Cell::new(percent(hint.unique_ratio)),
            Cell::new(percent(hint.null_ratio)),
        ]);
    }
    println!("{table}");
}

pub fn print_transform(report: &TransformReport) {
    println!(
        "Rows: {} in, {} out ({:?} layout)",
        report.rows_in, report.rows_out, report.format
    );
    let mut table = Table::new();
    table.set_header(vec![header_cell("Step"), header_cell("Detail")]);
    apply_table_style(&mut table);
    for (index, step) in report.transformations.iter().enumerate() {
        table.add_row(vec![dim_cell(index + 1), Cell::new(step)]);
    }
    println!("{table}");
    if !report.exogenous_columns.is_empty() {
        println!("Regressors: {}", report.exogenous_columns.join(", "));
    }
    if !report.dropped_columns.is_empty() {
        println!("Dropped: {}", report.dropped_columns.join(", "));
    }
    for suggestion in &report.enrichment {
        println!("Suggestion: {} - {}", suggestion.title, suggestion.benefit);
    }
}

pub fn print_plan(plan: &RoutingPlan) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("#"), header_cell("Model")]);
    apply_table_style(&mut table);
    for (index, model) in plan.models.iter().enumerate() {
        let cell = if model.is_baseline() {
            Cell::new(model).fg(Color::DarkGrey)
        } else {
            Cell::new(model).fg(Color::Green).add_attribute(Attribute::Bold)
        };
        table.add_row(vec![dim_cell(index + 1), cell]);
    }
    println!("{table}");
    let characteristics = &plan.characteristics;
    let volatility = characteristics
        .volatility
        .map_or_else(|| "-".to_string(), |cv| format!("{cv:.3}"));
    println!(
        "Rows: {}  Regressors: {}  Volatility (CV): {volatility}",
        characteristics.row_count,
        characteristics.exogenous_columns.len()
    );
    for reason in &plan.reasons {
        println!("- {reason}");
    }
}

pub fn print_forecast(output: &PipelineOutput) {
    let forecast = &output.forecast;
    println!(
        "Forecast: {} steps, {:?} cadence, {:.0}% interval, {:?} strategy",
        forecast.horizon(),
        forecast.cadence,
        forecast.confidence_level * 100.0,
        forecast.strategy
    );
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Date"),
        header_cell("Forecast"),
        header_cell("Lower"),
        header_cell("Upper"),
    ]);
    apply_table_style(&mut table);
    for column in 1..=3 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for (step, date) in forecast.dates.iter().enumerate() {
        table.add_row(vec![
            Cell::new(date),
            Cell::new(format!("{:.2}", forecast.point[step])).add_attribute(Attribute::Bold),
            dim_cell(format!("{:.2}", forecast.lower[step])),
            dim_cell(format!("{:.2}", forecast.upper[step])),
        ]);
    }
    println!("{table}");

    let mut models = Table::new();
    models.set_header(vec![
        header_cell("Model"),
        header_cell("Weight"),
        header_cell("MAE"),
        header_cell("sMAPE"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut models);
    align_column(&mut models, 1, CellAlignment::Right);
    align_column(&mut models, 2, CellAlignment::Right);
    align_column(&mut models, 3, CellAlignment::Right);
    for component in &forecast.components {
        let weight = forecast.weights.get(component.model).unwrap_or(0.0);
        let (mae, smape) = match &component.metrics {
            Some(metrics) => (
                Cell::new(format!("{:.2}", metrics.mae)),
                Cell::new(format!("{:.1}%", metrics.smape)),
            ),
            None => (dim_cell("-"), dim_cell("-")),
        };
        models.add_row(vec![
            Cell::new(component.model).add_attribute(Attribute::Bold),
            Cell::new(format!("{weight:.3}")),
            mae,
            smape,
            Cell::new("ok").fg(Color::Green),
        ]);
    }
    for failure in &forecast.failures {
        models.add_row(vec![
            Cell::new(failure.model),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            Cell::new(&failure.reason).fg(Color::Red),
        ]);
    }
    for model in &forecast.cancelled {
        models.add_row(vec![
            Cell::new(model),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            Cell::new("cancelled").fg(Color::Yellow),
        ]);
    }
    println!("{models}");
    print_caveats(output);
}

fn print_caveats(output: &PipelineOutput) {
    if output.caveats.is_empty() {
        return;
    }
    eprintln!("Caveats:");
    for caveat in &output.caveats {
        eprintln!("- {caveat}");
    }
}

pub fn print_monitor(report: &MonitorReport) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Model"),
        header_cell("WAPE"),
        header_cell("Rolling"),
        header_cell("Next weight"),
    ]);
    apply_table_style(&mut table);
    for column in 1..=3 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for (model, error) in &report.errors {
        let rolling = report
            .rolling_errors
            .get(model)
            .map_or_else(|| dim_cell("-"), |value| Cell::new(percent(*value)));
        let weight = report
            .weights
            .get(*model)
            .map_or_else(|| dim_cell("-"), |value| Cell::new(format!("{value:.3}")));
        table.add_row(vec![
            Cell::new(model).add_attribute(Attribute::Bold),
            Cell::new(percent(*error)),
            rolling,
            weight,
        ]);
    }
    println!("{table}");
    if let Some(error) = report.ensemble_error {
        println!("Combined forecast WAPE: {}", percent(error));
    }
    for alert in &report.alerts {
        eprintln!(
            "Drift: {} rolling error {} is {:.1}x its baseline {}",
            alert.model,
            percent(alert.rolling_error),
            alert.ratio,
            percent(alert.baseline_error)
        );
    }
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn method_cell(method: MatchMethod) -> Cell {
    match method {
        MatchMethod::Exact => Cell::new("exact").fg(Color::Green),
        MatchMethod::Synonym => Cell::new("synonym").fg(Color::Green),
        MatchMethod::Fuzzy => Cell::new("fuzzy").fg(Color::Yellow),
    }
}

fn confidence_cell(confidence: f64) -> Cell {
    let cell = Cell::new(format!("{confidence:.0}"));
    if confidence >= 90.0 {
        cell
    } else {
        cell.fg(Color::Yellow)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

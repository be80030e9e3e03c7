//! Reports command implementation: list submitted reports.

use crate::OutputFormat;
use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::model::{FlowKind, Report};
use crate::storage::{read_reports, reports_path};
use crate::ui::{self, stdout_supports_color};
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};

/// Check if stdout supports colors (delegates to centralized ui module)
fn use_colors() -> bool {
    stdout_supports_color()
}

/// Create an ID cell (cyan, bold when colors enabled)
fn id_cell(text: &str) -> Cell {
    if use_colors() {
        Cell::new(text)
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold)
    } else {
        Cell::new(text)
    }
}

/// Create a header cell (bold when colors enabled)
fn header_cell(text: &str) -> Cell {
    if use_colors() {
        Cell::new(text).add_attribute(Attribute::Bold)
    } else {
        Cell::new(text)
    }
}

fn text_or_dash(report: &Report, name: &str) -> String {
    report
        .record
        .get(name)
        .filter(|v| !v.is_empty())
        .map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// One-line description of a report
fn summary(flow: FlowKind, report: &Report) -> String {
    match flow {
        FlowKind::Incident => format!(
            "{} ({})",
            text_or_dash(report, "incidentType"),
            text_or_dash(report, "severity")
        ),
        FlowKind::Permit => format!(
            "{} at {} ({})",
            text_or_dash(report, "permitNumber"),
            text_or_dash(report, "workLocation"),
            text_or_dash(report, "permitStatus")
        ),
    }
}

/// List submitted reports for a flow
pub fn list_reports(
    config: &Config,
    flow: FlowKind,
    limit: Option<usize>,
    output: OutputFormat,
) -> anyhow::Result<Vec<Diagnostic>> {
    let path = reports_path(config, flow);
    let mut reports = read_reports(&path)?;
    if let Some(n) = limit {
        let skip = reports.len().saturating_sub(n);
        reports.drain(..skip);
    }

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Plain => {
            for report in &reports {
                println!(
                    "{}\t{}\t{}",
                    report.id,
                    report.submitted_at,
                    summary(flow, report)
                );
            }
        }
        OutputFormat::Table => {
            if reports.is_empty() {
                ui::info(format!("No {} reports in {}", flow.as_ref(), path.display()));
                return Ok(vec![]);
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(
                    ["ID", "Submitted", "Summary"]
                        .iter()
                        .map(|h| header_cell(h))
                        .collect::<Vec<_>>(),
                );
            for report in &reports {
                table.add_row(vec![
                    id_cell(&report.id),
                    Cell::new(&report.submitted_at),
                    Cell::new(summary(flow, report)),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(vec![])
}

//! Status command implementation: the step table of one flow.

use super::{open, report_position};
use crate::OutputFormat;
use crate::collab::Identity;
use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::model::{FlowKind, Role, StepStatus};
use crate::ui::stdout_supports_color;
use crate::wizard::{Position, Rejection, Wizard};
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

fn use_colors() -> bool {
    stdout_supports_color()
}

/// Create a status cell with semantic color
fn status_cell(status: StepStatus) -> Cell {
    let text = status.as_ref();
    if use_colors() {
        let color = match status {
            StepStatus::Pending => Color::White,
            StepStatus::Active => Color::Cyan,
            StepStatus::Completed => Color::Green,
            StepStatus::Locked => Color::DarkGrey,
            StepStatus::Rejected => Color::Red,
        };
        Cell::new(text).fg(color)
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

#[derive(Serialize)]
struct StepSummary {
    number: usize,
    id: &'static str,
    title: &'static str,
    role: &'static str,
    status: StepStatus,
    editable: bool,
    current: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusSummary<'a> {
    flow: FlowKind,
    role: Role,
    position: Position,
    steps: Vec<StepSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<&'a Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_report_id: Option<&'a str>,
    results: &'a BTreeMap<String, Value>,
}

fn summarize(wizard: &Wizard) -> Vec<StepSummary> {
    wizard
        .definition()
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| StepSummary {
            number: i + 1,
            id: step.id,
            title: step.title,
            role: if step.role_label.is_empty() {
                "Anyone"
            } else {
                step.role_label
            },
            status: wizard.step_status(i),
            editable: wizard.can_edit(i),
            current: wizard.current_index() == Some(i),
        })
        .collect()
}

/// Show the step table for `flow`
pub fn show_status(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    output: OutputFormat,
) -> anyhow::Result<Vec<Diagnostic>> {
    let wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let steps = summarize(&wizard);

    match output {
        OutputFormat::Json => {
            let state = wizard.state();
            let summary = StatusSummary {
                flow,
                role: identity.role,
                position: state.position,
                steps,
                rejection: state.rejection.as_ref(),
                last_report_id: state.last_report_id.as_deref(),
                results: state.store.results(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Plain => {
            for step in &steps {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    step.number,
                    step.id,
                    step.status.as_ref(),
                    if step.editable { "edit" } else { "view" },
                    if step.current { "*" } else { "" }
                );
            }
        }
        OutputFormat::Table => {
            report_position(&wizard);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(
                    ["#", "Step", "Title", "Role", "Status", "Edit"]
                        .iter()
                        .map(|h| header_cell(h))
                        .collect::<Vec<_>>(),
                );
            for step in &steps {
                let marker = if step.current {
                    format!("> {}", step.number)
                } else {
                    step.number.to_string()
                };
                table.add_row(vec![
                    Cell::new(marker),
                    Cell::new(step.id),
                    Cell::new(step.title),
                    Cell::new(step.role),
                    status_cell(step.status),
                    Cell::new(if step.editable { "yes" } else { "view" }),
                ]);
            }
            println!("{table}");

            if let Some(rejection) = &wizard.state().rejection {
                println!(
                    "Rejected at {} by {}: {}",
                    rejection.step_id,
                    rejection.role.badge(),
                    rejection.reason
                );
            }
        }
    }
    Ok(vec![])
}

//! Field commands: get, set, toggle and row edits on the active step.

use super::{open, save};
use crate::collab::Identity;
use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{FieldKind, FieldValue, FlowKind, Row};
use crate::storage::{self, WriteOp};
use crate::ui;
use crate::wizard::Wizard;
use anyhow::Context;
use std::io::Read;

/// Read value from stdin, trimming trailing newline
fn read_stdin() -> anyhow::Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    // Trim trailing newline that HEREDOC adds
    Ok(buffer.trim_end_matches('\n').to_string())
}

/// Resolve value from either argument or stdin
fn resolve_value(value: Option<&str>, stdin: bool) -> anyhow::Result<String> {
    match (value, stdin) {
        (Some(v), false) => Ok(v.to_string()),
        (None, true) => read_stdin(),
        (None, false) => anyhow::bail!("Provide a value, --stdin or --null"),
        (Some(_), true) => anyhow::bail!("Cannot use both value and --stdin"),
    }
}

/// Declared kind of `field`, text when the flow does not declare it
fn field_kind(wizard: &Wizard, field: &str) -> FieldKind {
    wizard
        .definition()
        .owner_of(field)
        .and_then(|s| s.field_rule(field))
        .map_or(FieldKind::Text, |r| r.kind)
}

/// Parse `key=value` cells into a row
fn parse_cells(cells: &[String], location: &str) -> Result<Row, Diagnostic> {
    cells
        .iter()
        .map(|cell| match cell.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(Diagnostic::new(
                DiagnosticCode::E0403InvalidRowSpec,
                format!("Invalid cell '{cell}' (expected key=value)"),
                location,
            )),
        })
        .collect()
}

/// Convert a 1-based row number from the command line
fn row_index(number: usize, location: &str) -> Result<usize, Diagnostic> {
    number.checked_sub(1).ok_or_else(|| {
        Diagnostic::new(
            DiagnosticCode::E0402RowIndexOutOfRange,
            "Row numbers start at 1",
            location,
        )
    })
}

/// Print the record, or one field of it
pub fn get_field(config: &Config, flow: FlowKind, field: Option<&str>) -> anyhow::Result<Vec<Diagnostic>> {
    let state = match storage::require_session(config, flow) {
        Ok(state) => state,
        Err(diag) => return Ok(vec![diag]),
    };
    let record = state.store.record();

    match field {
        None => println!("{}", serde_json::to_string_pretty(record)?),
        Some(name) => match record.get(name) {
            Some(FieldValue::Text(s)) => println!("{s}"),
            Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
            None => println!("null"),
        },
    }
    Ok(vec![])
}

/// Set a field of the active step
#[allow(clippy::too_many_arguments)]
pub fn set_field(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    field: &str,
    value: Option<&str>,
    stdin: bool,
    null: bool,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };

    let value = if null {
        FieldValue::Null
    } else {
        let raw = resolve_value(value, stdin)?;
        match FieldValue::parse(field_kind(&wizard, field), &raw) {
            Ok(value) => value,
            Err(message) => {
                return Ok(vec![Diagnostic::new(
                    DiagnosticCode::E0401ValueTypeMismatch,
                    format!("Invalid value for {field}: {message}"),
                    flow.as_ref(),
                )]);
            }
        }
    };

    let shown = value.to_string();
    if let Err(diag) = wizard.set_field(field, value) {
        return Ok(vec![diag]);
    }
    save(config, &wizard, op)?;
    if !op.is_preview() {
        ui::field_set(flow.as_ref(), field, &shown);
    }
    Ok(vec![])
}

/// Toggle an item in a list field
pub fn toggle_item(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    field: &str,
    item: &str,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let selected = match wizard.toggle(field, item) {
        Ok(selected) => selected,
        Err(diag) => return Ok(vec![diag]),
    };
    save(config, &wizard, op)?;
    if !op.is_preview() {
        ui::toggled(flow.as_ref(), field, item, selected);
    }
    Ok(vec![])
}

/// Row edit requested on the command line
#[derive(Debug, Clone)]
pub enum RowEdit {
    Add { cells: Vec<String> },
    Set { number: usize, cells: Vec<String> },
    Remove { number: usize },
}

/// Apply a row edit to a row-list field
pub fn edit_rows(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    field: &str,
    edit: &RowEdit,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let location = flow.as_ref();

    let outcome = match edit {
        RowEdit::Add { cells } => parse_cells(cells, location)
            .and_then(|row| wizard.add_row(field, row))
            .map(|index| ("Added", index + 1)),
        RowEdit::Set { number, cells } => row_index(*number, location).and_then(|index| {
            let row = parse_cells(cells, location)?;
            wizard.update_row(field, index, row).map(|()| ("Updated", *number))
        }),
        RowEdit::Remove { number } => row_index(*number, location)
            .and_then(|index| wizard.remove_row(field, index))
            .map(|_| ("Removed", *number)),
    };

    let (action, number) = match outcome {
        Ok(done) => done,
        Err(diag) => return Ok(vec![diag]),
    };
    save(config, &wizard, op)?;
    if !op.is_preview() {
        ui::row_changed(action, flow.as_ref(), field, number);
    }
    Ok(vec![])
}

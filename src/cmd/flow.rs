//! Flow lifecycle commands: start, next, back, reject, submit, reset.

use super::{open, report_position, save};
use crate::collab::Identity;
use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::FlowKind;
use crate::step::FlowDefinition;
use crate::storage::{self, JsonReportStore, WriteOp};
use crate::ui;
use crate::wizard::{Advance, ReportStamp, Retreat, Wizard};
use chrono::Utc;
use serde_json::Value;

/// Open a fresh session for `flow`
pub fn start(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    force: bool,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let definition = FlowDefinition::for_kind(flow);
    if let Err(diag) = definition.check() {
        return Ok(vec![diag]);
    }

    let mut diags = vec![];
    match storage::load_session(config, flow) {
        Ok(Some(state)) if !force && !state.position.is_terminal() => {
            return Ok(vec![Diagnostic::new(
                DiagnosticCode::E0209SessionExists,
                format!(
                    "A {} session is in progress (use --force to discard it)",
                    flow.as_ref()
                ),
                storage::session_path(config, flow).display().to_string(),
            )]);
        }
        Ok(Some(state)) => {
            if let Some(rejection) = state.rejection {
                diags.push(Diagnostic::new(
                    DiagnosticCode::W0103SessionTerminal,
                    format!(
                        "Discarded session rejected at {}: {}",
                        rejection.step_id, rejection.reason
                    ),
                    flow.as_ref(),
                ));
            }
        }
        Ok(None) => {}
        Err(_) if force => {}
        Err(diag) => return Ok(vec![diag]),
    }

    let total = definition.len();
    let wizard = Wizard::new(definition, identity.role);
    save(config, &wizard, op)?;
    if !op.is_preview() {
        ui::success(format!(
            "Started {} ({} steps) as {}",
            flow.title(),
            total,
            identity.role.badge()
        ));
    }
    report_position(&wizard);
    Ok(diags)
}

/// Complete the active step and advance
pub fn next(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let completed_step = wizard.current_step().map(|s| s.id);
    let advance = match wizard.go_next() {
        Ok(advance) => advance,
        Err(diag) => return Ok(vec![diag]),
    };

    let mut diags = vec![];
    if let Some(step_id) = completed_step
        && advance != Advance::Entered
    {
        ui::completed(step_id);
        let has_no = wizard
            .state()
            .store
            .results()
            .get(step_id)
            .and_then(|r| r.get("hasNoResponses"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if has_no {
            diags.push(Diagnostic::new(
                DiagnosticCode::W0102ChecklistNoResponses,
                "Checklist has items answered 'no'; review them before authorization",
                wizard.definition().location(
                    wizard.definition().index_of(step_id).unwrap_or_default(),
                ),
            ));
        }
    }

    save(config, &wizard, op)?;
    if advance == Advance::ReadyToSubmit {
        ui::info(format!(
            "All steps complete; run 'ptwctl submit {}'",
            flow.as_ref()
        ));
    } else {
        report_position(&wizard);
    }
    Ok(diags)
}

/// Move back one step, keeping all data
pub fn back(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    match wizard.go_back() {
        Ok(Retreat::AtStart) => ui::info("Already at the first step"),
        Ok(Retreat::Welcome | Retreat::Moved { .. }) => save(config, &wizard, op)?,
        Err(diag) => return Ok(vec![diag]),
    }
    report_position(&wizard);
    Ok(vec![])
}

/// Reject the flow at the active step
pub fn reject(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    reason: &str,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let step_id = wizard.current_step().map(|s| s.id).unwrap_or_default();
    if let Err(diag) = wizard.reject(reason) {
        return Ok(vec![diag]);
    }
    save(config, &wizard, op)?;
    ui::rejected(flow.as_ref(), step_id, reason.trim());
    Ok(vec![])
}

/// Submit the flow from its final step
pub fn submit(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };

    let stamp = ReportStamp::generate(flow, config.reports.id_strategy, &identity.name, Utc::now());
    let mut sink = JsonReportStore::new(storage::reports_path(config, flow), op);
    let report = match wizard.submit(&mut sink, stamp) {
        Ok(report) => report,
        Err(diag) => return Ok(vec![diag]),
    };

    println!("{}", report.id);
    if let Err(e) = save(config, &wizard, op) {
        return Ok(vec![Diagnostic::new(
            DiagnosticCode::E0901IoError,
            format!(
                "Report {} was saved to {}, but the session was not updated ({e:#}); \
                 run 'ptwctl reset {}' instead of submitting again",
                report.id,
                sink.path().display(),
                flow.as_ref()
            ),
            storage::session_path(config, flow).display().to_string(),
        )]);
    }
    if !op.is_preview() {
        ui::submitted(&report.id, sink.path());
    }
    Ok(vec![])
}

/// Cancel: discard the record and return to the entry point
pub fn reset(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let record = wizard.state().store.record();
    let cleared = if record.is_empty() {
        "record was already empty".to_string()
    } else {
        format!("cleared {} field(s)", record.len())
    };
    wizard.reset();
    save(config, &wizard, op)?;
    ui::info(format!("Reset {}: {cleared}", flow.as_ref()));
    report_position(&wizard);
    Ok(vec![])
}

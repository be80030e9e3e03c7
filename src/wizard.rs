//! Wizard controller: the step cursor, completion gating, role-based
//! edit permission, rejection and submission.
//!
//! The controller owns the form store and hands out snapshots. Every
//! operation either succeeds and mutates state, or fails with a diagnostic
//! and leaves state exactly as it was.

use crate::collab::{Camera, Locator, ReportSink};
use crate::config::IdStrategy;
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{FieldValue, FlowKind, FormRecord, GeoPoint, Report, Role, Row, StepStatus};
use crate::step::{FlowDefinition, StepDefinition};
use crate::store::{EditError, FormStore};
use crate::validate::{ValidationFailure, is_valid_step_transition, validate};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where the cursor is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", content = "index", rename_all = "lowercase")]
pub enum Position {
    Welcome,
    Step(usize),
    Success,
    Rejected,
}

impl Position {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Rejected)
    }
}

/// Recorded when a reviewer rejects the flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub step_id: String,
    pub reason: String,
    pub role: Role,
    pub at: String,
}

/// Persistable wizard state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    pub flow: FlowKind,
    pub position: Position,
    pub store: FormStore,
    #[serde(default)]
    pub completed: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_report_id: Option<String>,
    pub started_at: String,
    pub updated_at: String,
}

impl WizardState {
    /// Fresh state at the flow's entry point
    pub fn fresh(definition: &FlowDefinition) -> Self {
        let now = timestamp(Utc::now());
        Self {
            flow: definition.kind,
            position: entry_position(definition),
            store: FormStore::new(),
            completed: BTreeSet::new(),
            rejection: None,
            last_report_id: None,
            started_at: now.clone(),
            updated_at: now,
        }
    }
}

fn entry_position(definition: &FlowDefinition) -> Position {
    if definition.has_welcome {
        Position::Welcome
    } else {
        Position::Step(0)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Outcome of `go_next`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Left the welcome screen for the first step
    Entered,
    Moved { from: usize, to: usize },
    /// Last step completed; the flow is ready for `submit`
    ReadyToSubmit,
}

/// Outcome of `go_back`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    Welcome,
    Moved { from: usize, to: usize },
    /// Already at the entry point
    AtStart,
}

/// Outcome of a location request
#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    Position(GeoPoint),
    /// Locator failed; the manual description was stored instead
    Manual { text: String, cause: String },
}

/// Report id and submission timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStamp {
    pub id: String,
    pub submitted_at: String,
}

impl ReportStamp {
    /// `{INC|PTW}-{YYYYMMDDHHMMSS}-{suffix}` and an RFC 3339 UTC timestamp
    pub fn generate(flow: FlowKind, strategy: IdStrategy, author: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: format!(
                "{}-{}-{}",
                flow.id_prefix(),
                now.format("%Y%m%d%H%M%S"),
                strategy.suffix(author)
            ),
            submitted_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub struct Wizard {
    definition: FlowDefinition,
    state: WizardState,
    role: Role,
}

impl Wizard {
    pub fn new(definition: FlowDefinition, role: Role) -> Self {
        let state = WizardState::fresh(&definition);
        Self {
            definition,
            state,
            role,
        }
    }

    /// Resume persisted state; a cursor outside the step table is clamped.
    pub fn resume(definition: FlowDefinition, mut state: WizardState, role: Role) -> Self {
        if let Position::Step(i) = state.position
            && i >= definition.len()
        {
            state.position = Position::Step(definition.len().saturating_sub(1));
        }
        Self {
            definition,
            state,
            role,
        }
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn position(&self) -> Position {
        self.state.position
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state.position {
            Position::Step(i) => Some(i),
            _ => None,
        }
    }

    pub fn current_step(&self) -> Option<&StepDefinition> {
        self.current_index().and_then(|i| self.definition.step(i))
    }

    pub fn snapshot(&self) -> FormRecord {
        self.state.store.snapshot()
    }

    /// Whether the acting role may edit step `index`
    pub fn can_edit(&self, index: usize) -> bool {
        self.definition
            .step(index)
            .is_some_and(|s| s.can_edit(self.role))
    }

    pub fn step_status(&self, index: usize) -> StepStatus {
        let Some(step) = self.definition.step(index) else {
            return StepStatus::Pending;
        };
        if self
            .state
            .rejection
            .as_ref()
            .is_some_and(|r| r.step_id == step.id)
        {
            return StepStatus::Rejected;
        }
        let editable = step.can_edit(self.role);
        if self.current_index() == Some(index) {
            if editable {
                StepStatus::Active
            } else {
                StepStatus::Locked
            }
        } else if self.state.completed.contains(step.id) {
            StepStatus::Completed
        } else if !editable {
            StepStatus::Locked
        } else {
            StepStatus::Pending
        }
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Complete the active step and advance. Never advances past a failing
    /// step; on the last step the cursor stays and `ReadyToSubmit` is
    /// returned.
    pub fn go_next(&mut self) -> Result<Advance, Diagnostic> {
        let index = match self.state.position {
            Position::Welcome => {
                self.state.position = Position::Step(0);
                self.touch();
                return Ok(Advance::Entered);
            }
            Position::Step(i) => i,
            Position::Success | Position::Rejected => return Err(self.terminal_error()),
        };

        let location = self.definition.location(index);
        let status = self.step_status(index);
        if !is_valid_step_transition(status, StepStatus::Completed) {
            return Err(self.locked_error(index));
        }
        let step = self
            .definition
            .steps
            .get(index)
            .ok_or_else(|| no_active_step(&location))?;

        let record = self.state.store.record();
        validate(record, step).map_err(|f| f.to_diagnostic(&location))?;
        if let Some(payload) = step.complete(record) {
            self.state.store.merge_step_result(step.id, payload);
        }
        self.state.completed.insert(step.id.to_string());

        let advance = if index + 1 >= self.definition.len() {
            Advance::ReadyToSubmit
        } else {
            self.state.position = Position::Step(index + 1);
            Advance::Moved {
                from: index,
                to: index + 1,
            }
        };
        self.touch();
        Ok(advance)
    }

    /// Move back one step. Data and completion marks are kept; view-only
    /// steps can be passed through.
    pub fn go_back(&mut self) -> Result<Retreat, Diagnostic> {
        let retreat = match self.state.position {
            Position::Welcome => Retreat::AtStart,
            Position::Step(0) if self.definition.has_welcome => {
                self.state.position = Position::Welcome;
                Retreat::Welcome
            }
            Position::Step(0) => Retreat::AtStart,
            Position::Step(i) => {
                self.state.position = Position::Step(i - 1);
                Retreat::Moved { from: i, to: i - 1 }
            }
            Position::Success | Position::Rejected => return Err(self.terminal_error()),
        };
        if retreat != Retreat::AtStart {
            self.touch();
        }
        Ok(retreat)
    }

    // -------------------------------------------------------------------------
    // Field updates
    // -------------------------------------------------------------------------

    /// Overwrite-or-insert a field of the active step. No validation runs
    /// until the step is completed.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), Diagnostic> {
        let index = self.editable_step_for(name)?;
        if let Some(rule) = self.definition.step(index).and_then(|s| s.field_rule(name))
            && !value.matches_kind(rule.kind)
        {
            return Err(Diagnostic::new(
                DiagnosticCode::E0401ValueTypeMismatch,
                format!("Field {name} expects {}", rule.kind.as_ref()),
                self.definition.location(index),
            ));
        }
        self.state.store.set_field(name, value);
        self.touch();
        Ok(())
    }

    /// Toggle an item in a list field; returns whether it is now selected.
    pub fn toggle(&mut self, name: &str, item: &str) -> Result<bool, Diagnostic> {
        let index = self.editable_step_for(name)?;
        let selected = self
            .state
            .store
            .toggle_list_item(name, item)
            .map_err(|e| self.edit_error(e, index))?;
        self.touch();
        Ok(selected)
    }

    pub fn add_row(&mut self, name: &str, row: Row) -> Result<usize, Diagnostic> {
        let index = self.editable_step_for(name)?;
        let row_index = self
            .state
            .store
            .add_row(name, row)
            .map_err(|e| self.edit_error(e, index))?;
        self.touch();
        Ok(row_index)
    }

    pub fn update_row(&mut self, name: &str, row_index: usize, cells: Row) -> Result<(), Diagnostic> {
        let index = self.editable_step_for(name)?;
        self.state
            .store
            .update_row(name, row_index, cells)
            .map_err(|e| self.edit_error(e, index))?;
        self.touch();
        Ok(())
    }

    pub fn remove_row(&mut self, name: &str, row_index: usize) -> Result<Row, Diagnostic> {
        let index = self.editable_step_for(name)?;
        let removed = self
            .state
            .store
            .remove_row(name, row_index)
            .map_err(|e| self.edit_error(e, index))?;
        self.touch();
        Ok(removed)
    }

    /// Capture a photo into `photo`. On camera failure nothing changes.
    pub fn capture_photo(&mut self, camera: &mut dyn Camera) -> Result<String, Diagnostic> {
        let index = self.editable_step_for("photo")?;
        let photo = camera
            .capture()
            .map_err(|e| e.to_diagnostic(&self.definition.location(index)))?;
        self.state
            .store
            .set_field("photo", FieldValue::text(photo.uri.clone()));
        self.touch();
        Ok(photo.uri)
    }

    /// Store the current position in `location`. When the locator fails and
    /// a manual description is given, it is stored in `manualLocation`
    /// instead.
    pub fn locate(
        &mut self,
        locator: &mut dyn Locator,
        manual: Option<&str>,
    ) -> Result<Located, Diagnostic> {
        let index = self.editable_step_for("location")?;
        let located = match locator.current_position() {
            Ok(point) => {
                self.state
                    .store
                    .set_field("location", FieldValue::Location(point));
                Located::Position(point)
            }
            Err(err) => {
                let Some(text) = manual.map(str::trim).filter(|t| !t.is_empty()) else {
                    return Err(err.to_diagnostic(&self.definition.location(index)));
                };
                self.state
                    .store
                    .set_field("manualLocation", FieldValue::text(text));
                Located::Manual {
                    text: text.to_string(),
                    cause: err.to_string(),
                }
            }
        };
        self.touch();
        Ok(located)
    }

    // -------------------------------------------------------------------------
    // Terminal actions
    // -------------------------------------------------------------------------

    /// Reject the flow at the active step. Bypasses validation; entered data
    /// is kept for inspection until `reset`.
    pub fn reject(&mut self, reason: &str) -> Result<(), Diagnostic> {
        let index = self.live_step()?;
        let location = self.definition.location(index);
        let step = self
            .definition
            .step(index)
            .ok_or_else(|| no_active_step(&location))?;
        if !step.can_reject {
            return Err(Diagnostic::new(
                DiagnosticCode::E0206RejectNotAllowed,
                format!("Step {} cannot be rejected", step.id),
                location,
            ));
        }
        if !is_valid_step_transition(self.step_status(index), StepStatus::Rejected) {
            return Err(self.locked_error(index));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationFailure::MissingRequiredField("reason".to_string())
                .to_diagnostic(&location));
        }

        self.state.rejection = Some(Rejection {
            step_id: step.id.to_string(),
            reason: reason.to_string(),
            role: self.role,
            at: timestamp(Utc::now()),
        });
        self.state.position = Position::Rejected;
        self.touch();
        Ok(())
    }

    /// Submit from the final step. Every step is re-validated against the
    /// current record and the final step is completed if needed; the report
    /// is handed to `sink`. On any failure state is left untouched.
    pub fn submit(&mut self, sink: &mut dyn ReportSink, stamp: ReportStamp) -> Result<Report, Diagnostic> {
        let index = self.live_step()?;
        let last = self.definition.len().saturating_sub(1);
        if index != last {
            return Err(Diagnostic::new(
                DiagnosticCode::E0203NotAtFinalStep,
                format!(
                    "Submit is only available on the final step ({} of {})",
                    index + 1,
                    self.definition.len()
                ),
                self.definition.location(index),
            ));
        }
        if !is_valid_step_transition(self.step_status(index), StepStatus::Completed) {
            return Err(self.locked_error(index));
        }
        let location = self.definition.location(index);
        let final_step = self
            .definition
            .step(last)
            .ok_or_else(|| no_active_step(&location))?;

        let record = self.state.store.record();
        for (i, step) in self.definition.steps.iter().enumerate() {
            validate(record, step).map_err(|f| f.to_diagnostic(&self.definition.location(i)))?;
        }

        let mut completed = self.state.completed.clone();
        let mut results = self.state.store.results().clone();
        completed.insert(final_step.id.to_string());
        if let Some(payload) = final_step.complete(record) {
            results.insert(final_step.id.to_string(), payload);
        }

        let missing: Vec<&str> = self
            .definition
            .steps
            .iter()
            .map(|s| s.id)
            .filter(|id| !completed.contains(*id))
            .collect();
        if !missing.is_empty() {
            return Err(Diagnostic::new(
                DiagnosticCode::E0204StepsIncomplete,
                format!("Steps not completed: {}", missing.join(", ")),
                location,
            ));
        }

        let report = Report {
            id: stamp.id,
            submitted_at: stamp.submitted_at,
            results,
            record: self.snapshot(),
        };
        sink.append_report(&report)
            .map_err(|e| e.to_diagnostic(&location))?;

        self.state.store.reset();
        self.state.completed.clear();
        self.state.rejection = None;
        self.state.position = Position::Success;
        self.state.last_report_id = Some(report.id.clone());
        self.touch();
        Ok(report)
    }

    /// Cancel: clear record, results, completion and rejection, and return
    /// to the entry point. The last submitted report id is kept.
    pub fn reset(&mut self) {
        self.state.store.reset();
        self.state.completed.clear();
        self.state.rejection = None;
        self.state.position = entry_position(&self.definition);
        self.state.started_at = timestamp(Utc::now());
        self.touch();
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn touch(&mut self) {
        self.state.updated_at = timestamp(Utc::now());
    }

    fn live_step(&self) -> Result<usize, Diagnostic> {
        match self.state.position {
            Position::Step(i) => Ok(i),
            Position::Welcome => Err(no_active_step(self.definition.kind.as_ref())),
            Position::Success | Position::Rejected => Err(self.terminal_error()),
        }
    }

    /// Index of the active step if it declares `name` and the role may edit it
    fn editable_step_for(&self, name: &str) -> Result<usize, Diagnostic> {
        let index = self.live_step()?;
        let location = self.definition.location(index);
        let step = self
            .definition
            .step(index)
            .ok_or_else(|| no_active_step(&location))?;
        if !step.declares(name) {
            let message = match self.definition.owner_of(name) {
                Some(owner) => format!(
                    "Field {name} belongs to step {}, not the active step {}",
                    owner.id, step.id
                ),
                None => format!("Unknown field for {}: {name}", self.definition.kind.as_ref()),
            };
            return Err(Diagnostic::new(
                DiagnosticCode::E0205FieldNotInStep,
                message,
                location,
            ));
        }
        if !step.can_edit(self.role) {
            return Err(self.locked_error(index));
        }
        Ok(index)
    }

    fn locked_error(&self, index: usize) -> Diagnostic {
        let label = self
            .definition
            .step(index)
            .map_or("", |s| s.role_label);
        Diagnostic::new(
            DiagnosticCode::E0201StepLocked,
            format!(
                "Step is view-only for {}; it is completed by {}",
                self.role.badge(),
                if label.is_empty() { "another role" } else { label }
            ),
            self.definition.location(index),
        )
    }

    fn terminal_error(&self) -> Diagnostic {
        let what = match self.state.position {
            Position::Rejected => "was rejected",
            _ => "was submitted",
        };
        Diagnostic::new(
            DiagnosticCode::E0202FlowTerminal,
            format!("Flow {what}; run reset or start to begin again"),
            self.definition.kind.as_ref(),
        )
    }

    fn edit_error(&self, err: EditError, index: usize) -> Diagnostic {
        let code = match err {
            EditError::NotAList(_) | EditError::NotRows(_) => DiagnosticCode::E0404NotAList,
            EditError::RowOutOfRange { .. } => DiagnosticCode::E0402RowIndexOutOfRange,
        };
        Diagnostic::new(code, err.to_string(), self.definition.location(index))
    }
}

fn no_active_step(location: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::E0207NoActiveStep,
        "No active step; run next to leave the welcome screen",
        location,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{CollaboratorError, Photo};
    use crate::flows::permit::checklist_field;
    use serde_json::json;

    struct StubCamera(Result<Photo, CollaboratorError>);

    impl Camera for StubCamera {
        fn capture(&mut self) -> Result<Photo, CollaboratorError> {
            self.0.clone()
        }
    }

    struct StubLocator(Result<GeoPoint, CollaboratorError>);

    impl Locator for StubLocator {
        fn current_position(&mut self) -> Result<GeoPoint, CollaboratorError> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct MemorySink {
        reports: Vec<Report>,
        fail: bool,
    }

    impl ReportSink for MemorySink {
        fn append_report(&mut self, report: &Report) -> Result<(), CollaboratorError> {
            if self.fail {
                return Err(CollaboratorError::Storage("disk full".into()));
            }
            self.reports.push(report.clone());
            Ok(())
        }
    }

    fn stamp(flow: FlowKind) -> ReportStamp {
        ReportStamp {
            id: format!("{}-20260310091500-0badcafe", flow.id_prefix()),
            submitted_at: "2026-03-10T09:15:00.000Z".to_string(),
        }
    }

    fn incident() -> Wizard {
        Wizard::new(FlowDefinition::for_kind(FlowKind::Incident), Role::Worker)
    }

    fn permit(role: Role) -> Wizard {
        Wizard::new(FlowDefinition::for_kind(FlowKind::Permit), role)
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Walk the incident flow to the review step
    fn incident_at_review() -> Wizard {
        let mut wizard = incident();
        assert_eq!(wizard.go_next().unwrap(), Advance::Entered);
        wizard
            .capture_photo(&mut StubCamera(Ok(Photo {
                uri: "file:///tmp/scene.jpg".into(),
            })))
            .unwrap();
        wizard.go_next().unwrap();
        wizard
            .locate(&mut StubLocator(Ok(GeoPoint::new(40.0, -73.0))), None)
            .unwrap();
        wizard.go_next().unwrap();
        assert!(wizard.toggle("bodyParts", "Head").unwrap());
        wizard.go_next().unwrap();
        wizard
            .set_field("incidentType", FieldValue::text("Slip / Trip / Fall"))
            .unwrap();
        wizard.set_field("severity", FieldValue::text("high")).unwrap();
        wizard.go_next().unwrap();
        assert_eq!(wizard.current_step().unwrap().id, "review");
        wizard
    }

    /// Fill the permit as the right role for each step, up to the checklists
    fn permit_at_checklists() -> Wizard {
        let mut wizard = permit(Role::Receiver);
        let fields: &[(&str, &str)] = &[
            ("permitNumber", "PTW-0042"),
            ("workDescription", "Replace pump seal on line 4"),
            ("workLocation", "Pump house 3"),
            ("startDate", "2026-03-10"),
            ("endDate", "2026-03-12"),
            ("contractorName", "Acme Mechanical"),
        ];
        for (name, value) in fields {
            wizard.set_field(name, FieldValue::text(*value)).unwrap();
        }
        wizard.go_next().unwrap();
        wizard.set_field("verifiedBy", FieldValue::text("Gate 2")).unwrap();
        wizard.set_field("securityCode", FieldValue::text("493021")).unwrap();
        wizard.go_next().unwrap();
        wizard.toggle("workTypes", "Hot Work").unwrap();
        wizard.set_field("fireWatchAssigned", FieldValue::Bool(true)).unwrap();
        wizard.go_next().unwrap();
        wizard.toggle("equipment", "Welding set").unwrap();
        wizard.go_next().unwrap();
        wizard.toggle("ppe", "Safety Helmet").unwrap();
        wizard.toggle("ppe", "Face Shield").unwrap();
        wizard.go_next().unwrap();
        wizard
            .add_row(
                "risks",
                row(&[("hazard", "Sparks"), ("control", "Fire blanket"), ("status", "controlled")]),
            )
            .unwrap();
        wizard.go_next().unwrap();

        wizard.role = Role::Issuer;
        wizard.set_field("toolboxTopic", FieldValue::text("Hot work")).unwrap();
        wizard
            .add_row("attendees", row(&[("name", "J. Smith"), ("signed", "yes")]))
            .unwrap();
        wizard.go_next().unwrap();

        wizard.role = Role::SafetyOfficer;
        assert_eq!(wizard.current_step().unwrap().id, "checklists");
        wizard
    }

    /// Continue through checklists and authorization to closure
    fn permit_at_closure() -> Wizard {
        let mut wizard = permit_at_checklists();
        for n in 1..=25 {
            wizard
                .set_field(&checklist_field(n), FieldValue::text("yes"))
                .unwrap();
        }
        wizard.go_next().unwrap();

        wizard.role = Role::Issuer;
        wizard.set_field("issuerName", FieldValue::text("R. Jones")).unwrap();
        wizard
            .set_field("issuerSignature", FieldValue::text("sig:rjones"))
            .unwrap();
        wizard.go_next().unwrap();
        assert_eq!(wizard.current_step().unwrap().id, "closure");
        wizard
    }

    #[test]
    fn next_with_missing_required_field_never_advances() {
        let mut wizard = incident();
        wizard.go_next().unwrap();
        let before = wizard.state().clone();

        let err = wizard.go_next().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0101MissingRequiredField);
        assert_eq!(err.file, "incident:capture");
        assert_eq!(wizard.position(), Position::Step(0));
        assert_eq!(wizard.state().completed, before.completed);
    }

    #[test]
    fn checklist_with_an_unanswered_item_stays_active() {
        let mut wizard = permit_at_checklists();
        for n in 1..=24 {
            wizard
                .set_field(&checklist_field(n), FieldValue::text("yes"))
                .unwrap();
        }
        let index = wizard.current_index().unwrap();
        let before = wizard.state().clone();

        let err = wizard.go_next().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0101MissingRequiredField);
        assert_eq!(
            err.to_string(),
            "error[E0101]: Missing required field: checklist_25 (permit:checklists)"
        );
        assert_eq!(wizard.step_status(index), StepStatus::Active);
        assert_eq!(wizard.state(), &before);
    }

    #[test]
    fn closing_without_a_date_does_not_advance() {
        let mut wizard = permit_at_closure();
        wizard
            .set_field("permitStatus", FieldValue::text("closure"))
            .unwrap();
        wizard
            .set_field("closureSignature", FieldValue::text("sig:rjones"))
            .unwrap();
        let index = wizard.current_index().unwrap();
        let before = wizard.state().clone();

        let err = wizard.go_next().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0103CrossFieldValidation);
        assert_eq!(err.file, "permit:closure");
        assert_eq!(wizard.step_status(index), StepStatus::Active);
        assert_eq!(wizard.state(), &before);
    }

    #[test]
    fn back_then_next_is_idempotent() {
        let mut wizard = incident_at_review();
        let record = wizard.snapshot();
        let results = wizard.state().store.results().clone();

        assert_eq!(
            wizard.go_back().unwrap(),
            Retreat::Moved { from: 4, to: 3 }
        );
        assert_eq!(wizard.snapshot(), record);
        assert_eq!(wizard.step_status(4), StepStatus::Pending);
        assert_eq!(wizard.step_status(2), StepStatus::Completed);

        wizard.go_next().unwrap();
        assert_eq!(wizard.position(), Position::Step(4));
        assert_eq!(wizard.snapshot(), record);
        assert_eq!(wizard.state().store.results(), &results);
    }

    #[test]
    fn back_from_first_step_returns_to_welcome() {
        let mut wizard = incident();
        assert_eq!(wizard.go_back().unwrap(), Retreat::AtStart);
        wizard.go_next().unwrap();
        assert_eq!(wizard.go_back().unwrap(), Retreat::Welcome);
        assert_eq!(wizard.position(), Position::Welcome);

        let mut ptw = permit(Role::Receiver);
        assert_eq!(ptw.go_back().unwrap(), Retreat::AtStart);
        assert_eq!(ptw.position(), Position::Step(0));
    }

    #[test]
    fn toggle_twice_restores_list() {
        let mut wizard = incident();
        wizard.go_next().unwrap();
        wizard.go_next().unwrap_err();
        wizard
            .capture_photo(&mut StubCamera(Ok(Photo { uri: "file:///a.png".into() })))
            .unwrap();
        wizard.go_next().unwrap();
        wizard
            .set_field("manualLocation", FieldValue::text("Loading bay"))
            .unwrap();
        wizard.go_next().unwrap();

        wizard.toggle("bodyParts", "Chest").unwrap();
        let before = wizard.snapshot();
        wizard.toggle("bodyParts", "Left Hand").unwrap();
        wizard.toggle("bodyParts", "Left Hand").unwrap();
        assert_eq!(wizard.snapshot(), before);
    }

    #[test]
    fn writes_are_scoped_to_the_active_step() {
        let mut wizard = incident();
        let err = wizard.set_field("photo", FieldValue::text("x")).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0207NoActiveStep);

        wizard.go_next().unwrap();
        let err = wizard
            .set_field("severity", FieldValue::text("high"))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0205FieldNotInStep);
        assert!(err.message.contains("classification"));

        let err = wizard.set_field("photo", FieldValue::Bool(true)).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0401ValueTypeMismatch);
    }

    #[test]
    fn camera_failure_leaves_record_untouched() {
        let mut wizard = incident();
        wizard.go_next().unwrap();
        let err = wizard
            .capture_photo(&mut StubCamera(Err(CollaboratorError::Camera(
                "permission denied".into(),
            ))))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0301CameraFailure);
        assert!(wizard.snapshot().is_empty());
    }

    #[test]
    fn locator_failure_falls_back_to_manual_text() {
        let mut wizard = incident();
        wizard.go_next().unwrap();
        wizard
            .capture_photo(&mut StubCamera(Ok(Photo { uri: "file:///a.jpg".into() })))
            .unwrap();
        wizard.go_next().unwrap();

        let mut offline = StubLocator(Err(CollaboratorError::Location("no fix".into())));
        let err = wizard.locate(&mut offline, None).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0302LocationFailure);

        let located = wizard.locate(&mut offline, Some("North gate")).unwrap();
        assert!(matches!(located, Located::Manual { ref text, .. } if text == "North gate"));
        assert_eq!(
            wizard.snapshot().get("manualLocation"),
            Some(&FieldValue::text("North gate"))
        );
        wizard.go_next().unwrap();
    }

    #[test]
    fn incident_submission_builds_report_and_resets() {
        let mut wizard = incident_at_review();
        let mut sink = MemorySink::default();

        let report = wizard.submit(&mut sink, stamp(FlowKind::Incident)).unwrap();
        assert_eq!(sink.reports.len(), 1);
        assert_eq!(report.id, "INC-20260310091500-0badcafe");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["location"], json!({ "latitude": 40.0, "longitude": -73.0 }));
        assert_eq!(json["bodyParts"], json!(["Head"]));
        assert_eq!(json["incidentType"], json!("Slip / Trip / Fall"));
        assert_eq!(json["severity"], json!("high"));
        assert_eq!(json["photo"], json!("file:///tmp/scene.jpg"));
        assert_eq!(json["submittedAt"], json!("2026-03-10T09:15:00.000Z"));

        assert_eq!(wizard.position(), Position::Success);
        assert!(wizard.snapshot().is_empty());
        assert!(wizard.state().completed.is_empty());
        assert_eq!(
            wizard.state().last_report_id.as_deref(),
            Some("INC-20260310091500-0badcafe")
        );
    }

    #[test]
    fn failed_persistence_changes_nothing() {
        let mut wizard = incident_at_review();
        let before = wizard.state().clone();
        let mut sink = MemorySink {
            fail: true,
            ..Default::default()
        };

        let err = wizard
            .submit(&mut sink, stamp(FlowKind::Incident))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0303StorageFailure);
        assert_eq!(wizard.state(), &before);
    }

    #[test]
    fn submit_only_from_the_final_step() {
        let mut wizard = incident_at_review();
        wizard.go_back().unwrap();
        let err = wizard
            .submit(&mut MemorySink::default(), stamp(FlowKind::Incident))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0203NotAtFinalStep);
    }

    #[test]
    fn submit_revalidates_earlier_steps() {
        let mut wizard = incident_at_review();
        // Edit through a resumed state to corrupt a completed step
        let mut state = wizard.state().clone();
        state.store.set_field("severity", FieldValue::text("apocalyptic"));
        wizard = Wizard::resume(FlowDefinition::for_kind(FlowKind::Incident), state, Role::Worker);

        let err = wizard
            .submit(&mut MemorySink::default(), stamp(FlowKind::Incident))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0102InvalidFieldValue);
        assert_eq!(err.file, "incident:classification");
    }

    #[test]
    fn reset_yields_empty_snapshot() {
        let mut wizard = incident_at_review();
        wizard.reset();
        assert!(wizard.snapshot().is_empty());
        assert!(wizard.state().store.results().is_empty());
        assert_eq!(wizard.position(), Position::Welcome);
        assert!(wizard.state().completed.is_empty());
    }

    #[test]
    fn locked_steps_are_view_only() {
        let mut wizard = permit(Role::Worker);
        assert_eq!(wizard.step_status(0), StepStatus::Locked);
        assert!(!wizard.can_edit(0));

        let err = wizard
            .set_field("permitNumber", FieldValue::text("PTW-0042"))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0201StepLocked);
        let err = wizard.go_next().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0201StepLocked);
        assert!(wizard.snapshot().is_empty());
    }

    #[test]
    fn permit_results_accumulate_per_step() {
        let wizard = permit_at_closure();
        let results = wizard.state().store.results();
        assert_eq!(results["basic_info"], json!({ "durationDays": 3 }));
        assert_eq!(results["work_type"]["hotWork"], json!(true));
        assert_eq!(results["ppe"], json!({ "ppeCount": 2 }));
        assert_eq!(results["checklists"]["hasNoResponses"], json!(false));
        assert_eq!(wizard.step_status(7), StepStatus::Completed);
    }

    #[test]
    fn closure_without_date_is_rejected_by_submit() {
        let mut wizard = permit_at_closure();
        wizard
            .set_field("permitStatus", FieldValue::text("closure"))
            .unwrap();
        wizard
            .set_field("closureSignature", FieldValue::text("sig:rjones"))
            .unwrap();

        let err = wizard
            .submit(&mut MemorySink::default(), stamp(FlowKind::Permit))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0103CrossFieldValidation);
        assert_eq!(err.file, "permit:closure");

        wizard
            .set_field("closureDate", FieldValue::text("2026-03-12"))
            .unwrap();
        wizard
            .set_field("closureTime", FieldValue::text("17:30"))
            .unwrap();
        let mut sink = MemorySink::default();
        let report = wizard.submit(&mut sink, stamp(FlowKind::Permit)).unwrap();
        assert_eq!(report.results["closure"], json!({ "closed": true }));
        assert_eq!(report.results.len(), 8);
        assert_eq!(wizard.position(), Position::Success);
    }

    #[test]
    fn rejection_is_terminal_and_keeps_data() {
        let mut wizard = permit_at_closure();
        wizard.go_back().unwrap();
        assert_eq!(wizard.current_step().unwrap().id, "authorization");

        let err = wizard.reject("  ").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0101MissingRequiredField);

        wizard.reject("Gas test out of date").unwrap();
        assert_eq!(wizard.position(), Position::Rejected);
        assert_eq!(wizard.step_status(8), StepStatus::Rejected);
        assert_eq!(
            wizard.state().rejection.as_ref().unwrap().reason,
            "Gas test out of date"
        );
        assert!(!wizard.snapshot().is_empty());

        assert_eq!(
            wizard.go_next().unwrap_err().code,
            DiagnosticCode::E0202FlowTerminal
        );
        assert_eq!(
            wizard
                .submit(&mut MemorySink::default(), stamp(FlowKind::Permit))
                .unwrap_err()
                .code,
            DiagnosticCode::E0202FlowTerminal
        );

        wizard.reset();
        assert_eq!(wizard.position(), Position::Step(0));
        assert!(wizard.state().rejection.is_none());
    }

    #[test]
    fn reject_only_where_allowed() {
        let mut wizard = permit(Role::Receiver);
        let err = wizard.reject("no").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0206RejectNotAllowed);
    }

    #[test]
    fn state_survives_serialization() {
        let wizard = incident_at_review();
        let json = serde_json::to_string(wizard.state()).unwrap();
        let state: WizardState = serde_json::from_str(&json).unwrap();
        assert_eq!(&state, wizard.state());

        let resumed = Wizard::resume(
            FlowDefinition::for_kind(FlowKind::Incident),
            state,
            Role::Worker,
        );
        assert_eq!(resumed.position(), Position::Step(4));
    }

    #[test]
    fn stamp_format() {
        let now = DateTime::parse_from_rfc3339("2026-03-10T09:15:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let stamp = ReportStamp::generate(FlowKind::Permit, IdStrategy::Random, "x", now);
        let re = regex::Regex::new(r"^PTW-20260310091500-[0-9a-f]{8}$").unwrap();
        assert!(re.is_match(&stamp.id));
        assert_eq!(stamp.submitted_at, "2026-03-10T09:15:00.250Z");
    }
}

//! Step and flow definitions.
//!
//! Steps are data: a table of field rules, required fields, cross-field
//! validators and an optional completion transform. One generic controller
//! (`wizard.rs`) drives any table.

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::flows;
use crate::model::{FlowKind, FormRecord, RESERVED_FIELDS, Role};
use crate::validate::FieldRule;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Cross-field check over the whole record; `Err` carries the user message.
pub type CheckFn = fn(&FormRecord) -> Result<(), String>;

/// Derives a step's result payload from the record.
pub type CompletionFn = fn(&FormRecord) -> Value;

/// Named cross-field validator
#[derive(Clone, Copy)]
pub struct CustomValidator {
    pub name: &'static str,
    pub check: CheckFn,
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomValidator").field(&self.name).finish()
    }
}

/// One screen of a wizard
#[derive(Clone)]
pub struct StepDefinition {
    pub id: &'static str,
    pub title: &'static str,
    /// Badge text only, never consulted for behavior
    pub role_label: &'static str,
    /// Roles allowed to edit; empty means everyone
    pub editable_by: Vec<Role>,
    pub fields: Vec<FieldRule>,
    pub required: Vec<String>,
    pub validators: Vec<CustomValidator>,
    pub on_complete: Option<CompletionFn>,
    pub can_reject: bool,
}

impl StepDefinition {
    pub fn new(id: &'static str, title: &'static str) -> Self {
        Self {
            id,
            title,
            role_label: "",
            editable_by: Vec::new(),
            fields: Vec::new(),
            required: Vec::new(),
            validators: Vec::new(),
            on_complete: None,
            can_reject: false,
        }
    }

    pub fn role_label(mut self, label: &'static str) -> Self {
        self.role_label = label;
        self
    }

    pub fn editable_by(mut self, roles: &[Role]) -> Self {
        self.editable_by = roles.to_vec();
        self
    }

    /// Declare an optional field owned by this step
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Declare a field and mark it required
    pub fn required_field(mut self, rule: FieldRule) -> Self {
        self.required.push(rule.name.clone());
        self.fields.push(rule);
        self
    }

    pub fn validator(mut self, name: &'static str, check: CheckFn) -> Self {
        self.validators.push(CustomValidator { name, check });
        self
    }

    pub fn on_complete(mut self, transform: CompletionFn) -> Self {
        self.on_complete = Some(transform);
        self
    }

    /// Allow the explicit reject action on this step
    pub fn allow_reject(mut self) -> Self {
        self.can_reject = true;
        self
    }

    pub fn field_rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.field_rule(name).is_some()
    }

    pub fn can_edit(&self, role: Role) -> bool {
        self.editable_by.is_empty() || self.editable_by.contains(&role)
    }

    /// Run the completion transform, if any
    pub fn complete(&self, record: &FormRecord) -> Option<Value> {
        self.on_complete.map(|transform| transform(record))
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("editable_by", &self.editable_by)
            .field("required", &self.required)
            .field("validators", &self.validators)
            .field("has_on_complete", &self.on_complete.is_some())
            .field("can_reject", &self.can_reject)
            .finish()
    }
}

/// Ordered step table for one flow
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    pub kind: FlowKind,
    /// Flow starts on a welcome screen outside the step range
    pub has_welcome: bool,
    pub steps: Vec<StepDefinition>,
}

impl FlowDefinition {
    pub fn for_kind(kind: FlowKind) -> Self {
        match kind {
            FlowKind::Incident => flows::incident::definition(),
            FlowKind::Permit => flows::permit::definition(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Step that owns a field
    pub fn owner_of(&self, field: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.declares(field))
    }

    /// Location string used in diagnostics, e.g. "permit:closure"
    pub fn location(&self, index: usize) -> String {
        match self.step(index) {
            Some(step) => format!("{}:{}", self.kind.as_ref(), step.id),
            None => self.kind.as_ref().to_string(),
        }
    }

    /// Structural checks: unique step ids, each field owned by one step,
    /// required fields declared, no reserved field names, patterns compile.
    pub fn check(&self) -> Result<(), Diagnostic> {
        let invalid = |message: String| {
            Diagnostic::new(
                DiagnosticCode::E0502InvalidDefinition,
                message,
                self.kind.as_ref(),
            )
        };

        if self.steps.is_empty() {
            return Err(invalid("Flow has no steps".to_string()));
        }

        let mut step_ids = HashSet::new();
        let mut fields = HashSet::new();
        for step in &self.steps {
            if !step_ids.insert(step.id) {
                return Err(invalid(format!("Duplicate step id: {}", step.id)));
            }
            for rule in &step.fields {
                if RESERVED_FIELDS.contains(&rule.name.as_str()) {
                    return Err(invalid(format!(
                        "Step {} declares reserved field: {}",
                        step.id, rule.name
                    )));
                }
                if let Some(error) = rule.pattern.as_ref().and_then(|p| p.error()) {
                    return Err(invalid(format!(
                        "Field {} has an invalid pattern: {error}",
                        rule.name
                    )));
                }
                if !fields.insert(rule.name.as_str()) {
                    return Err(invalid(format!(
                        "Field {} is declared by more than one step",
                        rule.name
                    )));
                }
            }
            if let Some(name) = step.required.iter().find(|r| !step.declares(r)) {
                return Err(invalid(format!(
                    "Step {} requires undeclared field: {name}",
                    step.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use serde_json::json;

    #[test]
    fn builder_collects_rules() {
        let step = StepDefinition::new("ppe", "PPE")
            .editable_by(&[Role::Receiver])
            .required_field(FieldRule::list("ppe"))
            .field(FieldRule::text("ppeNotes"))
            .on_complete(|r| json!({ "count": r.list("ppe").len() }));

        assert_eq!(step.required, vec!["ppe".to_string()]);
        assert!(step.declares("ppeNotes"));
        assert!(!step.declares("equipment"));
        assert!(step.can_edit(Role::Receiver));
        assert!(!step.can_edit(Role::Worker));

        let mut record = FormRecord::new();
        record.insert("ppe", FieldValue::list(["Helmet", "Gloves"]));
        assert_eq!(step.complete(&record), Some(json!({ "count": 2 })));
    }

    #[test]
    fn open_steps_are_editable_by_anyone() {
        let step = StepDefinition::new("review", "Review");
        assert!(step.can_edit(Role::Worker));
        assert!(step.can_edit(Role::SafetyOfficer));
        assert_eq!(step.complete(&FormRecord::new()), None);
    }

    #[test]
    fn shipped_flows_are_well_formed() {
        for kind in [FlowKind::Incident, FlowKind::Permit] {
            FlowDefinition::for_kind(kind).check().unwrap();
        }
    }

    #[test]
    fn check_rejects_duplicate_field_owners() {
        let def = FlowDefinition {
            kind: FlowKind::Incident,
            has_welcome: false,
            steps: vec![
                StepDefinition::new("a", "A").field(FieldRule::text("photo")),
                StepDefinition::new("b", "B").field(FieldRule::text("photo")),
            ],
        };
        let err = def.check().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0502InvalidDefinition);
    }

    #[test]
    fn check_rejects_reserved_and_undeclared_fields() {
        let reserved = FlowDefinition {
            kind: FlowKind::Permit,
            has_welcome: false,
            steps: vec![StepDefinition::new("a", "A").field(FieldRule::text("submittedAt"))],
        };
        assert!(reserved.check().is_err());

        let mut undeclared = StepDefinition::new("a", "A");
        undeclared.required.push("ghost".into());
        let def = FlowDefinition {
            kind: FlowKind::Permit,
            has_welcome: false,
            steps: vec![undeclared],
        };
        assert!(def.check().unwrap_err().message.contains("ghost"));
    }

    #[test]
    fn check_rejects_invalid_patterns() {
        let def = FlowDefinition {
            kind: FlowKind::Permit,
            has_welcome: false,
            steps: vec![StepDefinition::new("a", "A").field(FieldRule::text("code").pattern("[0-9"))],
        };
        let err = def.check().unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0502InvalidDefinition);
        assert!(err.message.starts_with("Field code has an invalid pattern"));
    }

    #[test]
    fn locations_name_flow_and_step() {
        let def = FlowDefinition::for_kind(FlowKind::Permit);
        assert_eq!(def.location(0), "permit:basic_info");
        assert_eq!(def.location(99), "permit");
    }
}

//! Field validation rules and step state machine rules.
//!
//! A step is validated in three passes, stopping at the first failure:
//! required fields, declared field rules, then the step's custom
//! validators in declaration order.

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{FieldKind, FieldValue, FormRecord, StepStatus};
use crate::step::StepDefinition;
use regex::Regex;
use thiserror::Error;

// =============================================================================
// Field Rules
// =============================================================================

/// Declarative constraints on one field.
///
/// Lengths count characters for text and items for lists and row lists.
/// `one_of` applies to text values and to each item of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub one_of: &'static [&'static str],
    pub pattern: Option<Pattern>,
}

/// Regex compiled when the rule is declared; compared by source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: &'static str,
    compiled: Result<Regex, String>,
}

impl Pattern {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: Regex::new(source).map_err(|e| e.to_string()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.source
    }

    /// Compile error, if the source is not a valid regex
    pub fn error(&self) -> Option<&str> {
        self.compiled.as_ref().err().map(String::as_str)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl FieldRule {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            min_len: None,
            max_len: None,
            one_of: &[],
            pattern: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List)
    }

    pub fn rows(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Rows)
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn location(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Location)
    }

    pub fn min_len(mut self, n: usize) -> Self {
        self.min_len = Some(n);
        self
    }

    pub fn max_len(mut self, n: usize) -> Self {
        self.max_len = Some(n);
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = values;
        self
    }

    /// Regex the whole text value must match (anchor it yourself).
    pub fn pattern(mut self, pattern: &'static str) -> Self {
        self.pattern = Some(Pattern::new(pattern));
        self
    }

    /// Check a present value against this rule. Empty values pass; whether
    /// a field must be filled is decided by the step's required set.
    pub fn check(&self, value: &FieldValue) -> Result<(), ValidationFailure> {
        if value.is_empty() {
            return Ok(());
        }
        if !value.matches_kind(self.kind) {
            return Err(self.invalid(format!(
                "expected {}, got {}",
                self.kind.as_ref(),
                value.kind().as_ref().map_or("null", |k| k.as_ref())
            )));
        }

        match value {
            FieldValue::Text(s) => {
                self.check_len(s.trim().chars().count(), "characters")?;
                self.check_allowed(s)?;
                if let Some(pattern) = &self.pattern {
                    let source = pattern.as_str();
                    let re = pattern
                        .compiled
                        .as_ref()
                        .map_err(|e| self.invalid(format!("invalid pattern {source}: {e}")))?;
                    if !re.is_match(s.trim()) {
                        return Err(self.invalid(format!("'{s}' does not match {source}")));
                    }
                }
            }
            FieldValue::List(items) => {
                self.check_len(items.len(), "items")?;
                for item in items {
                    self.check_allowed(item)?;
                }
            }
            FieldValue::Rows(rows) => self.check_len(rows.len(), "rows")?,
            _ => {}
        }
        Ok(())
    }

    fn check_len(&self, len: usize, unit: &str) -> Result<(), ValidationFailure> {
        if let Some(min) = self.min_len
            && len < min
        {
            return Err(self.invalid(format!("at least {min} {unit} required, got {len}")));
        }
        if let Some(max) = self.max_len
            && len > max
        {
            return Err(self.invalid(format!("at most {max} {unit} allowed, got {len}")));
        }
        Ok(())
    }

    fn check_allowed(&self, value: &str) -> Result<(), ValidationFailure> {
        if self.one_of.is_empty() || self.one_of.contains(&value) {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "'{value}' is not one of: {}",
                self.one_of.join(", ")
            )))
        }
    }

    fn invalid(&self, message: String) -> ValidationFailure {
        ValidationFailure::InvalidField {
            field: self.name.clone(),
            message,
        }
    }
}

// =============================================================================
// Step Validation
// =============================================================================

/// First failure found while validating a step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },
    #[error("{0}")]
    CrossField(String),
}

impl ValidationFailure {
    /// Convert to a diagnostic located at `location` (e.g. "permit:closure")
    pub fn to_diagnostic(&self, location: &str) -> Diagnostic {
        let code = match self {
            Self::MissingRequiredField(_) => DiagnosticCode::E0101MissingRequiredField,
            Self::InvalidField { .. } => DiagnosticCode::E0102InvalidFieldValue,
            Self::CrossField(_) => DiagnosticCode::E0103CrossFieldValidation,
        };
        Diagnostic::new(code, self.to_string(), location)
    }
}

/// Validate the record against one step definition.
pub fn validate(record: &FormRecord, step: &StepDefinition) -> Result<(), ValidationFailure> {
    for name in &step.required {
        if !record.is_filled(name) {
            return Err(ValidationFailure::MissingRequiredField(name.clone()));
        }
    }

    for rule in &step.fields {
        if let Some(value) = record.get(&rule.name) {
            rule.check(value)?;
        }
    }

    for validator in &step.validators {
        (validator.check)(record).map_err(ValidationFailure::CrossField)?;
    }

    Ok(())
}

// =============================================================================
// State Machine Rules
// =============================================================================

/// Check if a step status transition is valid
///
/// Step lifecycle: pending → active → completed
///                           active → rejected
///                completed → active (re-entry via back navigation)
pub fn is_valid_step_transition(from: StepStatus, to: StepStatus) -> bool {
    matches!(
        (from, to),
        (StepStatus::Pending, StepStatus::Active)
            | (StepStatus::Completed, StepStatus::Active)
            | (StepStatus::Active, StepStatus::Completed)
            | (StepStatus::Active, StepStatus::Rejected)
    )
}

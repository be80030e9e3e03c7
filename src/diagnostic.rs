//! Diagnostic codes and error reporting.

use std::fmt;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// Diagnostic error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum DiagnosticCode {
    // Validation errors (E01xx)
    E0101MissingRequiredField,
    E0102InvalidFieldValue,
    E0103CrossFieldValidation,

    // Wizard errors (E02xx)
    E0201StepLocked,
    E0202FlowTerminal,
    E0203NotAtFinalStep,
    E0204StepsIncomplete,
    E0205FieldNotInStep,
    E0206RejectNotAllowed,
    E0207NoActiveStep,
    E0208NoSession,
    E0209SessionExists,

    // Collaborator errors (E03xx)
    E0301CameraFailure,
    E0302LocationFailure,
    E0303StorageFailure,

    // Record edit errors (E04xx)
    E0401ValueTypeMismatch,
    E0402RowIndexOutOfRange,
    E0403InvalidRowSpec,
    E0404NotAList,

    // Config errors (E05xx)
    E0501ConfigInvalid,
    E0502InvalidDefinition,

    // General errors (E09xx)
    E0901IoError,
    E0902JsonParseError,

    // Warnings (W01xx)
    W0101ManualLocationFallback,
    W0102ChecklistNoResponses,
    W0103SessionTerminal,
}

impl DiagnosticCode {
    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Self::W0101ManualLocationFallback
            | Self::W0102ChecklistNoResponses
            | Self::W0103SessionTerminal => DiagnosticLevel::Warning,
            _ => DiagnosticLevel::Error,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            // E01xx - Validation
            Self::E0101MissingRequiredField => "E0101",
            Self::E0102InvalidFieldValue => "E0102",
            Self::E0103CrossFieldValidation => "E0103",
            // E02xx - Wizard
            Self::E0201StepLocked => "E0201",
            Self::E0202FlowTerminal => "E0202",
            Self::E0203NotAtFinalStep => "E0203",
            Self::E0204StepsIncomplete => "E0204",
            Self::E0205FieldNotInStep => "E0205",
            Self::E0206RejectNotAllowed => "E0206",
            Self::E0207NoActiveStep => "E0207",
            Self::E0208NoSession => "E0208",
            Self::E0209SessionExists => "E0209",
            // E03xx - Collaborators
            Self::E0301CameraFailure => "E0301",
            Self::E0302LocationFailure => "E0302",
            Self::E0303StorageFailure => "E0303",
            // E04xx - Record edits
            Self::E0401ValueTypeMismatch => "E0401",
            Self::E0402RowIndexOutOfRange => "E0402",
            Self::E0403InvalidRowSpec => "E0403",
            Self::E0404NotAList => "E0404",
            // E05xx - Config
            Self::E0501ConfigInvalid => "E0501",
            Self::E0502InvalidDefinition => "E0502",
            // E09xx - General
            Self::E0901IoError => "E0901",
            Self::E0902JsonParseError => "E0902",
            // W01xx - Warnings
            Self::W0101ManualLocationFallback => "W0101",
            Self::W0102ChecklistNoResponses => "W0102",
            Self::W0103SessionTerminal => "W0103",
        }
    }
}

/// A diagnostic message
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub file: String,
    pub level: DiagnosticLevel,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            level: code.level(),
            code,
            message: message.into(),
            file: file.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        };
        write!(
            f,
            "{}[{}]: {} ({})",
            level_str,
            self.code.code(),
            self.message,
            self.file
        )
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_classified_by_code() {
        assert_eq!(
            DiagnosticCode::W0101ManualLocationFallback.level(),
            DiagnosticLevel::Warning
        );
        assert_eq!(
            DiagnosticCode::E0303StorageFailure.level(),
            DiagnosticLevel::Error
        );
    }

    #[test]
    fn display_includes_code_and_location() {
        let diag = Diagnostic::new(
            DiagnosticCode::E0101MissingRequiredField,
            "Missing required field: photo",
            "incident:capture",
        );
        insta::assert_snapshot!(diag.to_string(), @"error[E0101]: Missing required field: photo (incident:capture)");
    }
}

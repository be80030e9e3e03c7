//! Collaborator seams: camera, locator, report persistence and identity.
//!
//! The wizard treats each call as atomic: on `Err` nothing in the session
//! changes, on `Ok` the returned value is committed to the record.

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{GeoPoint, Report, Role};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("Camera capture failed: {0}")]
    Camera(String),
    #[error("Location unavailable: {0}")]
    Location(String),
    #[error("Report storage failed: {0}")]
    Storage(String),
}

impl CollaboratorError {
    pub fn to_diagnostic(&self, location: &str) -> Diagnostic {
        let code = match self {
            Self::Camera(_) => DiagnosticCode::E0301CameraFailure,
            Self::Location(_) => DiagnosticCode::E0302LocationFailure,
            Self::Storage(_) => DiagnosticCode::E0303StorageFailure,
        };
        Diagnostic::new(code, self.to_string(), location)
    }
}

/// Result of a camera capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub uri: String,
}

pub trait Camera {
    fn capture(&mut self) -> Result<Photo, CollaboratorError>;
}

pub trait Locator {
    fn current_position(&mut self) -> Result<GeoPoint, CollaboratorError>;
}

/// Persistence collaborator; responsible for its own atomicity.
pub trait ReportSink {
    fn append_report(&mut self, report: &Report) -> Result<(), CollaboratorError>;
}

/// Acting user, consumed read-only for role badges and edit permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub role: Role,
}

//! On-disk persistence: one session file per flow and one JSON array of
//! submitted reports per flow.
//!
//! Layout under the data root:
//!   sessions/<flow>.json   in-progress wizard state
//!   reports/<flow>.json    submitted reports, oldest first

use crate::collab::{CollaboratorError, ReportSink};
use crate::config::Config;
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{FlowKind, Report};
use crate::ui;
use crate::wizard::WizardState;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Whether a command writes or only previews (`--dry-run`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Execute,
    Preview,
}

impl WriteOp {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::Preview } else { Self::Execute }
    }

    pub fn is_preview(&self) -> bool {
        matches!(self, Self::Preview)
    }
}

/// Write `content` via a sibling temp file and rename, so readers never see
/// a half-written file.
pub fn write_file(path: &Path, content: &str, op: WriteOp) -> Result<()> {
    if op.is_preview() {
        ui::would("write", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, content)
        .with_context(|| format!("Failed to write: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace: {}", path.display()))?;
    Ok(())
}

pub fn create_dir_all(path: &Path, op: WriteOp) -> Result<()> {
    if op.is_preview() {
        ui::would("create", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

// =============================================================================
// Sessions
// =============================================================================

pub fn session_path(config: &Config, flow: FlowKind) -> PathBuf {
    config.sessions_dir().join(format!("{}.json", flow.as_ref()))
}

/// Load the session for `flow`, if one exists
pub fn load_session(config: &Config, flow: FlowKind) -> Result<Option<WizardState>, Diagnostic> {
    let path = session_path(config, flow);
    if !path.exists() {
        return Ok(None);
    }
    let location = path.display().to_string();
    let content = std::fs::read_to_string(&path).map_err(|e| {
        Diagnostic::new(
            DiagnosticCode::E0901IoError,
            format!("Failed to read session: {e}"),
            location.as_str(),
        )
    })?;
    let state: WizardState = serde_json::from_str(&content).map_err(|e| {
        Diagnostic::new(
            DiagnosticCode::E0902JsonParseError,
            format!("Invalid session file: {e}"),
            location.as_str(),
        )
    })?;
    if state.flow != flow {
        return Err(Diagnostic::new(
            DiagnosticCode::E0902JsonParseError,
            format!(
                "Session file holds a {} flow, expected {}",
                state.flow.as_ref(),
                flow.as_ref()
            ),
            location,
        ));
    }
    Ok(Some(state))
}

/// Load the session for `flow`, failing when none was started
pub fn require_session(config: &Config, flow: FlowKind) -> Result<WizardState, Diagnostic> {
    load_session(config, flow)?.ok_or_else(|| {
        Diagnostic::new(
            DiagnosticCode::E0208NoSession,
            format!("No {} session; run 'ptwctl start {}'", flow.as_ref(), flow.as_ref()),
            flow.as_ref(),
        )
    })
}

pub fn save_session(config: &Config, state: &WizardState, op: WriteOp) -> Result<()> {
    let path = session_path(config, state.flow);
    let content = serde_json::to_string_pretty(state)?;
    write_file(&path, &content, op)
}

// =============================================================================
// Reports
// =============================================================================

pub fn reports_path(config: &Config, flow: FlowKind) -> PathBuf {
    config.reports_dir().join(format!("{}.json", flow.as_ref()))
}

/// Read every submitted report for a flow (empty when none yet)
pub fn read_reports(path: &Path) -> Result<Vec<Report>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reports: {}", path.display()))?;
    let reports: Vec<Report> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse reports JSON: {}", path.display()))?;
    Ok(reports)
}

/// Appends reports to a JSON array file. Callers hold the data lock, so the
/// read-modify-write cycle is not interleaved with another writer.
pub struct JsonReportStore {
    path: PathBuf,
    op: WriteOp,
}

impl JsonReportStore {
    pub fn new(path: PathBuf, op: WriteOp) -> Self {
        Self { path, op }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonReportStore {
    fn append_report(&mut self, report: &Report) -> Result<(), CollaboratorError> {
        let storage = |e: anyhow::Error| CollaboratorError::Storage(format!("{e:#}"));

        let mut reports = read_reports(&self.path).map_err(storage)?;
        if reports.iter().any(|r| r.id == report.id) {
            return Err(CollaboratorError::Storage(format!(
                "report {} already exists",
                report.id
            )));
        }
        reports.push(report.clone());

        let content = serde_json::to_string_pretty(&reports)
            .map_err(|e| CollaboratorError::Storage(e.to_string()))?;
        write_file(&self.path, &content, self.op).map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldValue, FormRecord};
    use crate::step::FlowDefinition;
    use std::collections::BTreeMap;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.data_root = dir.join("ptw");
        config
    }

    fn report(id: &str) -> Report {
        let mut record = FormRecord::new();
        record.insert("severity", FieldValue::text("low"));
        Report {
            id: id.to_string(),
            submitted_at: "2026-03-10T09:15:00.000Z".to_string(),
            results: BTreeMap::new(),
            record,
        }
    }

    #[test]
    fn sessions_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_in(temp.path());
        assert_eq!(load_session(&config, FlowKind::Permit).unwrap(), None);
        assert_eq!(
            require_session(&config, FlowKind::Permit).unwrap_err().code,
            DiagnosticCode::E0208NoSession
        );

        let state = WizardState::fresh(&FlowDefinition::for_kind(FlowKind::Permit));
        save_session(&config, &state, WriteOp::Execute).unwrap();
        assert_eq!(load_session(&config, FlowKind::Permit).unwrap(), Some(state));
    }

    #[test]
    fn preview_writes_nothing() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_in(temp.path());
        let state = WizardState::fresh(&FlowDefinition::for_kind(FlowKind::Incident));
        save_session(&config, &state, WriteOp::Preview).unwrap();
        assert!(!session_path(&config, FlowKind::Incident).exists());
    }

    #[test]
    fn corrupt_session_is_a_diagnostic() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_in(temp.path());
        let path = session_path(&config, FlowKind::Incident);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_session(&config, FlowKind::Incident).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::E0902JsonParseError);
    }

    #[test]
    fn reports_are_appended_in_order() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_in(temp.path());
        let path = reports_path(&config, FlowKind::Incident);
        let mut store = JsonReportStore::new(path.clone(), WriteOp::Execute);

        store.append_report(&report("INC-1")).unwrap();
        store.append_report(&report("INC-2")).unwrap();
        let ids: Vec<String> = read_reports(&path).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["INC-1", "INC-2"]);

        assert!(matches!(
            store.append_report(&report("INC-2")),
            Err(CollaboratorError::Storage(_))
        ));
        assert_eq!(read_reports(&path).unwrap().len(), 2);
    }

    #[test]
    fn unreadable_report_file_fails_the_append() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("reports.json");
        std::fs::write(&path, "[{").unwrap();
        let mut store = JsonReportStore::new(path.clone(), WriteOp::Execute);
        assert!(store.append_report(&report("INC-1")).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{");
    }
}

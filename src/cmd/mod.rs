//! Command implementations.

pub mod capture;
pub mod edit;
pub mod flow;
pub mod init;
pub mod reports;
pub mod status;

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::model::{FlowKind, Role};
use crate::step::FlowDefinition;
use crate::storage::{self, WriteOp};
use crate::ui;
use crate::wizard::{Position, Wizard};

/// Resume the persisted session for `flow` as `role`
pub(crate) fn open(config: &Config, flow: FlowKind, role: Role) -> Result<Wizard, Diagnostic> {
    let state = storage::require_session(config, flow)?;
    Ok(Wizard::resume(FlowDefinition::for_kind(flow), state, role))
}

pub(crate) fn save(config: &Config, wizard: &Wizard, op: WriteOp) -> anyhow::Result<()> {
    storage::save_session(config, wizard.state(), op)
}

/// Print where the cursor is and whether the acting role may edit there
pub(crate) fn report_position(wizard: &Wizard) {
    let flow = wizard.definition().kind;
    match wizard.position() {
        Position::Welcome => ui::info(format!(
            "{}: welcome screen (run 'ptwctl next {}' to begin)",
            flow.title(),
            flow.as_ref()
        )),
        Position::Step(i) => {
            if let Some(step) = wizard.current_step() {
                ui::moved_to(flow.as_ref(), step.title, i + 1, wizard.definition().len());
                if !wizard.can_edit(i) {
                    ui::info(format!(
                        "View only for {}: this step is completed by {}",
                        wizard.role().badge(),
                        step.role_label
                    ));
                }
            }
        }
        Position::Success => ui::info(format!(
            "{}: submitted {}",
            flow.title(),
            wizard.state().last_report_id.as_deref().unwrap_or("-")
        )),
        Position::Rejected => ui::info(format!("{}: rejected", flow.title())),
    }
}

//! Device commands: photo capture and location.

use super::{open, save};
use crate::collab::Identity;
use crate::config::Config;
use crate::devices::{FileCamera, FixedLocator};
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{FlowKind, GeoPoint};
use crate::storage::WriteOp;
use crate::ui;
use crate::wizard::Located;
use std::path::Path;

/// Attach an image file as the scene photo
pub fn photo(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    path: &Path,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let uri = match wizard.capture_photo(&mut FileCamera::new(path)) {
        Ok(uri) => uri,
        Err(diag) => return Ok(vec![diag]),
    };
    save(config, &wizard, op)?;
    if !op.is_preview() {
        ui::field_set(flow.as_ref(), "photo", &uri);
    }
    Ok(vec![])
}

/// Record the current position, falling back to a manual description
pub fn locate(
    config: &Config,
    flow: FlowKind,
    identity: &Identity,
    coordinates: Option<(f64, f64)>,
    manual: Option<&str>,
    op: WriteOp,
) -> anyhow::Result<Vec<Diagnostic>> {
    let mut wizard = match open(config, flow, identity.role) {
        Ok(w) => w,
        Err(diag) => return Ok(vec![diag]),
    };
    let mut locator = FixedLocator::new(coordinates.map(|(lat, lon)| GeoPoint::new(lat, lon)));
    let located = match wizard.locate(&mut locator, manual) {
        Ok(located) => located,
        Err(diag) => return Ok(vec![diag]),
    };
    save(config, &wizard, op)?;

    let mut diags = vec![];
    match located {
        Located::Position(point) => {
            if !op.is_preview() {
                ui::field_set(
                    flow.as_ref(),
                    "location",
                    &format!("{:.6}, {:.6}", point.latitude, point.longitude),
                );
            }
        }
        Located::Manual { text, cause } => {
            diags.push(Diagnostic::new(
                DiagnosticCode::W0101ManualLocationFallback,
                format!("{cause}; using manual location"),
                wizard.definition().location(wizard.current_index().unwrap_or_default()),
            ));
            if !op.is_preview() {
                ui::field_set(flow.as_ref(), "manualLocation", &text);
            }
        }
    }
    Ok(diags)
}

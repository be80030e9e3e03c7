//! Init command implementation.

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::storage::{WriteOp, create_dir_all, write_file};
use crate::ui;

/// Write the default config and create the data directories
pub fn init_project(config: &Config, force: bool, op: WriteOp) -> anyhow::Result<Vec<Diagnostic>> {
    let config_path = config.paths.data_root.join("config.toml");

    if config_path.exists() && !force && !op.is_preview() {
        anyhow::bail!(
            "{} already exists (use -f to overwrite)",
            config_path.display()
        );
    }

    let dirs = [
        config.paths.data_root.clone(),
        config.sessions_dir(),
        config.reports_dir(),
    ];
    for dir in &dirs {
        create_dir_all(dir, op)?;
        if !op.is_preview() {
            ui::created_path(dir);
        }
    }

    write_file(&config_path, Config::default_toml(), op)?;
    if !op.is_preview() {
        ui::created_path(&config_path);
        ui::success("Initialized ptwctl; run 'ptwctl start incident' or 'ptwctl start permit'");
    }
    Ok(vec![])
}

//! ptwctl: step-wizard CLI for incident reports and permits to work.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

mod collab;
mod config;
mod devices;
mod diagnostic;
mod flows;
mod lock;
mod model;
mod step;
mod storage;
mod store;
mod ui;
mod validate;
mod wizard;

mod cmd;

use cmd::edit::RowEdit;
use config::Config;
use diagnostic::{Diagnostic, DiagnosticLevel};
use model::{FlowKind, Role};
use storage::WriteOp;

#[derive(Parser)]
#[command(name = "ptwctl")]
#[command(about = "Step-wizard CLI for incident reports and permits to work")]
#[command(version)]
struct Cli {
    /// Path to ptwctl config (TOML)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Act as this role instead of the configured one
    #[arg(long = "as", value_enum, global = true)]
    role: Option<Role>,

    /// Show what would be written without writing
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize ptwctl in the current directory
    Init {
        /// Overwrite existing config
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Open a fresh session for a flow
    Start {
        #[arg(value_enum)]
        flow: FlowKind,
        /// Discard a session that is still in progress
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Show the step table
    #[command(visible_alias = "stat")]
    Status {
        #[arg(value_enum)]
        flow: FlowKind,
        /// Output format
        #[arg(short = 'o', long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Print the record, or one field of it
    Get {
        #[arg(value_enum)]
        flow: FlowKind,
        /// Field name (omit for the whole record)
        field: Option<String>,
    },

    /// Set a field of the active step
    Set {
        #[arg(value_enum)]
        flow: FlowKind,
        /// Field name
        field: String,
        /// New value (omit if using --stdin or --null)
        #[arg(required_unless_present_any = ["stdin", "null"])]
        value: Option<String>,
        /// Read value from stdin (for multi-line content)
        #[arg(long, conflicts_with = "null")]
        stdin: bool,
        /// Clear the field
        #[arg(long)]
        null: bool,
    },

    /// Select or deselect an item of a list field
    Toggle {
        #[arg(value_enum)]
        flow: FlowKind,
        field: String,
        item: String,
    },

    /// Edit a row-list field (risks, attendees)
    Row {
        #[command(subcommand)]
        action: RowAction,
    },

    /// Attach an image file as the scene photo
    Photo {
        #[arg(value_enum)]
        flow: FlowKind,
        path: PathBuf,
    },

    /// Record the current location
    Locate {
        #[arg(value_enum)]
        flow: FlowKind,
        /// Latitude in degrees
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude in degrees
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Description to store when no position is available
        #[arg(long)]
        manual: Option<String>,
    },

    /// Complete the active step and advance
    Next {
        #[arg(value_enum)]
        flow: FlowKind,
    },

    /// Go back one step (data is kept)
    Back {
        #[arg(value_enum)]
        flow: FlowKind,
    },

    /// Reject the flow at the active step
    Reject {
        #[arg(value_enum)]
        flow: FlowKind,
        /// Reason recorded with the rejection
        #[arg(short = 'r', long)]
        reason: String,
    },

    /// Submit the flow from its final step
    Submit {
        #[arg(value_enum)]
        flow: FlowKind,
    },

    /// Cancel the session: clear the record and return to the start
    Reset {
        #[arg(value_enum)]
        flow: FlowKind,
    },

    /// List submitted reports
    #[command(visible_alias = "ls")]
    Reports {
        #[arg(value_enum)]
        flow: FlowKind,
        /// Show only the most recent N reports
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output format
        #[arg(short = 'o', long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Clone, Debug)]
enum RowAction {
    /// Append a row
    Add {
        #[arg(value_enum)]
        flow: FlowKind,
        field: String,
        /// Cells as key=value
        #[arg(required = true)]
        cells: Vec<String>,
    },
    /// Merge cells into row N (1-based)
    Set {
        #[arg(value_enum)]
        flow: FlowKind,
        field: String,
        number: usize,
        #[arg(required = true)]
        cells: Vec<String>,
    },
    /// Remove row N (1-based)
    Remove {
        #[arg(value_enum)]
        flow: FlowKind,
        field: String,
        number: usize,
    },
}

/// Output format for status and reports
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Plain,
}

impl Commands {
    /// Commands that write sessions or reports hold the data lock
    fn writes(&self) -> bool {
        !matches!(
            self,
            Commands::Init { .. }
                | Commands::Status { .. }
                | Commands::Get { .. }
                | Commands::Reports { .. }
                | Commands::Completions { .. }
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run(&cli);

    match result {
        Ok(diags) => {
            for diag in &diags {
                ui::diagnostic(diag);
            }
            if diags.iter().any(|d| d.level == DiagnosticLevel::Error) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<Vec<Diagnostic>> {
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "ptwctl", &mut std::io::stdout());
        return Ok(vec![]);
    }

    let config = Config::load(cli.config.as_deref())?;
    let identity = config.identity(cli.role);
    let op = WriteOp::from_dry_run(cli.dry_run);

    let _guard = if cli.command.writes() {
        Some(lock::acquire_data_lock(&config)?)
    } else {
        None
    };

    match &cli.command {
        Commands::Init { force } => cmd::init::init_project(&config, *force, op),
        Commands::Start { flow, force } => cmd::flow::start(&config, *flow, &identity, *force, op),
        Commands::Status { flow, output } => {
            cmd::status::show_status(&config, *flow, &identity, *output)
        }
        Commands::Get { flow, field } => cmd::edit::get_field(&config, *flow, field.as_deref()),
        Commands::Set {
            flow,
            field,
            value,
            stdin,
            null,
        } => cmd::edit::set_field(
            &config,
            *flow,
            &identity,
            field,
            value.as_deref(),
            *stdin,
            *null,
            op,
        ),
        Commands::Toggle { flow, field, item } => {
            cmd::edit::toggle_item(&config, *flow, &identity, field, item, op)
        }
        Commands::Row { action } => {
            let (flow, field, edit) = match action {
                RowAction::Add { flow, field, cells } => (
                    flow,
                    field,
                    RowEdit::Add {
                        cells: cells.clone(),
                    },
                ),
                RowAction::Set {
                    flow,
                    field,
                    number,
                    cells,
                } => (
                    flow,
                    field,
                    RowEdit::Set {
                        number: *number,
                        cells: cells.clone(),
                    },
                ),
                RowAction::Remove {
                    flow,
                    field,
                    number,
                } => (flow, field, RowEdit::Remove { number: *number }),
            };
            cmd::edit::edit_rows(&config, *flow, &identity, field, &edit, op)
        }
        Commands::Photo { flow, path } => cmd::capture::photo(&config, *flow, &identity, path, op),
        Commands::Locate {
            flow,
            lat,
            lon,
            manual,
        } => cmd::capture::locate(
            &config,
            *flow,
            &identity,
            lat.zip(*lon),
            manual.as_deref(),
            op,
        ),
        Commands::Next { flow } => cmd::flow::next(&config, *flow, &identity, op),
        Commands::Back { flow } => cmd::flow::back(&config, *flow, &identity, op),
        Commands::Reject { flow, reason } => {
            cmd::flow::reject(&config, *flow, &identity, reason, op)
        }
        Commands::Submit { flow } => cmd::flow::submit(&config, *flow, &identity, op),
        Commands::Reset { flow } => cmd::flow::reset(&config, *flow, &identity, op),
        Commands::Reports {
            flow,
            limit,
            output,
        } => cmd::reports::list_reports(&config, *flow, *limit, *output),
        Commands::Completions { .. } => Ok(vec![]),
    }
}

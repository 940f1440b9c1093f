// crates/dyntable-cli/src/main.rs
// ============================================================================
// Module: Dyntable CLI Entry Point
// Description: Command dispatcher for the Dyntable server and column tools.
// Purpose: Launch the HTTP server and administer columns without it.
// Dependencies: clap, dyntable-config, dyntable-core, dyntable-server, tokio
// ============================================================================

//! ## Overview
//! `dyntable serve` runs the HTTP server until Ctrl-C or SIGTERM. The
//! `columns` commands open the configured database directly and print the
//! resulting column list as canonical JSON; they must not run against a
//! database a live server is rebuilding. `config check` validates the
//! resolved configuration and `config example` prints the default file.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use dyntable_config::DyntableConfig;
use dyntable_config::config_toml_example;
use dyntable_core::SharedEngine;
use dyntable_core::TableService;
use dyntable_server::DyntableServer;
use dyntable_server::shutdown_signal;
use dyntable_store_sqlite::SqliteEngine;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "dyntable", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve(ConfigArg),
    /// Offline column administration.
    Columns {
        /// Selected columns subcommand.
        #[command(subcommand)]
        command: ColumnsCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Shared `--config` flag.
#[derive(Args, Debug)]
struct ConfigArg {
    /// Config file path (defaults to `DYNTABLE_CONFIG` or ./dyntable.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Column subcommands.
#[derive(Subcommand, Debug)]
enum ColumnsCommand {
    /// Print the current column list.
    List(ConfigArg),
    /// Append a column.
    Add {
        /// Config file selection.
        #[command(flatten)]
        config: ConfigArg,
        /// New column name.
        name: String,
        /// Declared column type.
        #[arg(long = "type", value_name = "TYPE", default_value = "TEXT")]
        declared_type: String,
    },
    /// Rename a column.
    Rename {
        /// Config file selection.
        #[command(flatten)]
        config: ConfigArg,
        /// Existing column name.
        old_name: String,
        /// Replacement column name.
        new_name: String,
    },
    /// Remove a column and its data.
    Remove {
        /// Config file selection.
        #[command(flatten)]
        config: ConfigArg,
        /// Column to remove.
        name: String,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the resolved configuration.
    Check(ConfigArg),
    /// Print a config file holding every default.
    Example,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => command_serve(&args).await,
        Commands::Columns {
            command,
        } => {
            let output = command_columns(command)?;
            write_json_value(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(args: &ConfigArg) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let server = tokio::task::spawn_blocking(move || DyntableServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    server
        .serve(shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Column Commands
// ============================================================================

/// Runs a column subcommand and returns the resulting column list.
fn command_columns(command: ColumnsCommand) -> CliResult<Value> {
    let (args, change) = match command {
        ColumnsCommand::List(args) => (args, None),
        ColumnsCommand::Add {
            config,
            name,
            declared_type,
        } => (config, Some(ColumnChange::Add {
            name,
            declared_type,
        })),
        ColumnsCommand::Rename {
            config,
            old_name,
            new_name,
        } => (config, Some(ColumnChange::Rename {
            old_name,
            new_name,
        })),
        ColumnsCommand::Remove {
            config,
            name,
        } => (config, Some(ColumnChange::Remove {
            name,
        })),
    };
    let config = load_config(args.config.as_deref())?;
    apply_column_change(&config, change.as_ref())
}

/// Column change requested on the command line.
#[derive(Debug)]
enum ColumnChange {
    /// Append a column.
    Add {
        /// New column name.
        name: String,
        /// Declared column type.
        declared_type: String,
    },
    /// Rename a column.
    Rename {
        /// Existing column name.
        old_name: String,
        /// Replacement column name.
        new_name: String,
    },
    /// Drop a column.
    Remove {
        /// Column to drop.
        name: String,
    },
}

/// Opens the configured database, applies `change`, and lists the columns.
fn apply_column_change(
    config: &DyntableConfig,
    change: Option<&ColumnChange>,
) -> CliResult<Value> {
    let service = open_service(config)?;
    let outcome = match change {
        None => Ok(()),
        Some(ColumnChange::Add {
            name,
            declared_type,
        }) => service.add_column(name, declared_type),
        Some(ColumnChange::Rename {
            old_name,
            new_name,
        }) => service.rename_column(old_name, new_name),
        Some(ColumnChange::Remove {
            name,
        }) => service.remove_column(name),
    };
    outcome.map_err(|err| CliError::new(format!("column change failed: {err}")))?;
    let columns = service
        .list_columns()
        .map_err(|err| CliError::new(format!("column listing failed: {err}")))?;
    serde_json::to_value(columns)
        .map_err(|err| CliError::new(format!("column rendering failed: {err}")))
}

/// Opens the configured database and ensures the tables exist.
fn open_service(config: &DyntableConfig) -> CliResult<TableService> {
    let engine = SqliteEngine::open(config.store.sqlite_config())
        .map_err(|err| CliError::new(format!("database open failed: {err}")))?;
    TableService::open(SharedEngine::from_engine(engine))
        .map_err(|err| CliError::new(format!("database open failed: {err}")))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(args) => {
            let config = load_config(args.config.as_deref())?;
            write_json_value(&config_summary(&config))?;
        }
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Summarizes a validated configuration.
fn config_summary(config: &DyntableConfig) -> Value {
    json!({
        "status": "ok",
        "bind": config.server.bind,
        "store_path": config.store.path,
        "atomic_rebuild": config.store.atomic_rebuild,
    })
}

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<DyntableConfig> {
    DyntableConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes canonical JSON followed by a newline to stdout.
fn write_json_value(value: &Value) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("json rendering failed: {err}")))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(&format!("error: {message}"));
    ExitCode::FAILURE
}

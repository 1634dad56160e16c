use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::io;
use std::process::ExitCode;
use tabula::{engine::Engine, shell};
use tracing_subscriber::{fmt, EnvFilter};

/// Main entry point for the tabula shell.
///
/// This function:
/// 1. Parses command-line arguments for the data directory
/// 2. Initializes structured logging with tracing (to stderr)
/// 3. Opens the engine, loading every table found in the data directory
/// 4. Runs the given statements, or an interactive session on stdin
///
/// # Arguments
/// - `--data DIR`: directory holding `<table>.csv` files (default: data)
/// - `--execute STMT`: run a statement and exit; may be repeated
///
/// # Example Usage
/// ```bash
/// cargo run -- --data ./data -e "CREATE TABLE users name,email" -e "SELECT users *"
/// ```
fn main() -> Result<ExitCode> {
    let matches = Command::new("tabula")
        .about("Embedded CSV-backed table store with a tiny command language")
        .arg(Arg::new("data")
            .long("data")
            .value_name("DIR")
            .env("TABULA_DATA")
            .default_value("data")
            .help("Directory for table CSV files"))
        .arg(Arg::new("execute")
            .short('e')
            .long("execute")
            .value_name("STMT")
            .action(ArgAction::Append)
            .help("Execute a statement and exit (repeatable)"))
        .get_matches();

    let data_dir = matches
        .get_one::<String>("data")
        .cloned()
        .unwrap_or_else(|| "data".to_string());
    let statements: Vec<String> = matches
        .get_many::<String>("execute")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    // Logs go to stderr so stdout carries only command output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let engine = Engine::open(data_dir)?;

    if statements.is_empty() {
        shell::run(&engine, io::stdin().lock(), io::stdout().lock())?;
        return Ok(ExitCode::SUCCESS);
    }

    let failed = shell::run_batch(&engine, &statements, io::stdout().lock())?;
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

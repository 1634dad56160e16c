use crate::{engine::Engine, sql::plan_and_exec};
use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::{debug, info};

/// Prompt shown before each command.
pub const PROMPT: &str = "tabula> ";

/// Runs an interactive session against the engine.
///
/// ## Session Lifecycle
/// 1. Write the greeting
/// 2. Prompt, read one line, execute it as a single command
/// 3. Print the response, or `ERROR: message` on failure
/// 4. Repeat until `exit`/`quit` or end of input
///
/// A failing command never ends the session. Blank lines are ignored.
///
/// ## Session Example
/// ```text
/// tabula> CREATE TABLE users name,email
/// CREATE TABLE users
/// tabula> INSERT users Alice,a@x.com
/// INSERT users 1
/// tabula> DELETE users 9
/// ERROR: record 9 not found in table 'users'
/// tabula> exit
/// bye
/// ```
///
/// Only writes to `output` can fail the session.
pub fn run<R: BufRead, W: Write>(engine: &Engine, input: R, mut output: W) -> Result<()> {
    writeln!(output, "tabula ready. Type /HELP for commands, exit to leave.")?;
    let mut lines = input.lines();

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            writeln!(output, "bye")?;
            break;
        }

        match plan_and_exec(engine, line) {
            Ok(resp) => writeln!(output, "{}", resp)?,
            Err(e) => {
                debug!(error = %e, command = line, "command failed");
                writeln!(output, "ERROR: {}", e)?;
            }
        }
    }

    info!("session ended");
    Ok(())
}

/// Executes statements without prompting, one response or error per
/// statement. Returns the number of statements that failed.
pub fn run_batch<W: Write>(engine: &Engine, statements: &[String], mut output: W) -> Result<usize> {
    let mut failed = 0;
    for stmt in statements {
        match plan_and_exec(engine, stmt) {
            Ok(resp) => writeln!(output, "{}", resp)?,
            Err(e) => {
                failed += 1;
                writeln!(output, "ERROR: {}", e)?;
            }
        }
    }
    Ok(failed)
}

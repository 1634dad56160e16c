use anyhow::Result;
use std::{collections::BTreeMap, fmt};

use crate::engine::{Engine, Record, SELECT_ALL_ID};

mod parser;

pub use parser::{parse, ParseError, Query, QueryKind};

/// Text printed for `/HELP`.
pub const HELP_TEXT: &str = "\
Commands:
  CREATE TABLE <table> <field1>,<field2>,...   create a table ('id' is reserved)
  INSERT <table> <value1>,<value2>,...         add a record, prints its id
  SELECT <table> <id>                          show one record
  SELECT <table> *                             show every record
  UPDATE <table> <id> <value1>,<value2>,...    replace a record's values
  DELETE <table> <id>                          remove a record
  /HELP                                        show this message
  exit                                         leave the shell";

/// Outcome of a successfully executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Created { table: String },
    Inserted { table: String, id: i64 },
    /// A single record, or `None` when selecting with `SELECT_ALL_ID`.
    Record { id: i64, record: Option<Record> },
    Records(BTreeMap<i64, Record>),
    Updated { table: String, id: i64 },
    Deleted { table: String, id: i64 },
    Help,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Created { table } => write!(f, "CREATE TABLE {}", table),
            Response::Inserted { table, id } => write!(f, "INSERT {} {}", table, id),
            Response::Updated { table, id } => write!(f, "UPDATE {} {}", table, id),
            Response::Deleted { table, id } => write!(f, "DELETE {} {}", table, id),
            Response::Record { record: None, .. } => write!(f, "no record"),
            Response::Record { id, record: Some(record) } => {
                let row = BTreeMap::from([(*id, record)]);
                write!(f, "{}", to_json(&row)?)
            }
            Response::Records(rows) if rows.is_empty() => write!(f, "no records"),
            Response::Records(rows) => write!(f, "{}", to_json(rows)?),
            Response::Help => f.write_str(HELP_TEXT),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, fmt::Error> {
    serde_json::to_string_pretty(value).map_err(|_| fmt::Error)
}

/// Parses and executes one command line against the engine.
///
/// ## Processing Pipeline
/// 1. **Parsing**: text → [`Query`]; a parse error stops here
/// 2. **Dispatch**: the matching [`Engine`] operation runs
/// 3. **Persistence**: after a successful mutation the table is saved
/// 4. **Result**: a [`Response`] the caller renders with `Display`
///
/// `SELECT <table> *` (identifier -1) reads every record through
/// `select_all`.
///
/// ## Errors
/// The error wraps either a [`ParseError`] or a
/// [`StoreError`](crate::engine::StoreError); callers can `downcast_ref`
/// to tell them apart. Either way the engine stays usable.
///
/// ## Example
/// ```rust
/// use tabula::{engine::Engine, sql::plan_and_exec};
///
/// let dir = tempfile::tempdir()?;
/// let engine = Engine::open(dir.path())?;
/// plan_and_exec(&engine, "CREATE TABLE users name,email")?;
/// let out = plan_and_exec(&engine, "INSERT users Alice,a@x.com")?;
/// assert_eq!(out.to_string(), "INSERT users 1");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn plan_and_exec(engine: &Engine, line: &str) -> Result<Response> {
    let query = parse(line)?;

    let response = match query {
        Query::CreateTable { table, fields } => {
            engine.create_table(&table, fields)?;
            Response::Created { table }
        }
        Query::Insert { table, values } => {
            let id = engine.insert(&table, values)?;
            Response::Inserted { table, id }
        }
        Query::Select { table, id } if id == SELECT_ALL_ID => {
            Response::Records(engine.select_all(&table)?)
        }
        Query::Select { table, id } => Response::Record {
            id,
            record: engine.select(&table, id)?,
        },
        Query::Update { table, id, values } => {
            engine.update(&table, id, values)?;
            Response::Updated { table, id }
        }
        Query::Delete { table, id } => {
            engine.delete(&table, id)?;
            Response::Deleted { table, id }
        }
        Query::Help => Response::Help,
    };

    match &response {
        Response::Created { table }
        | Response::Inserted { table, .. }
        | Response::Updated { table, .. }
        | Response::Deleted { table, .. } => engine.save_table(table)?,
        _ => {}
    }
    Ok(response)
}

//! Parser for the one-line command language.
//!
//! ```text
//! CREATE TABLE <table> <f1>,<f2>,...
//! SELECT <table> <id>|*
//! INSERT <table> <v1>,<v2>,...
//! UPDATE <table> <id> <v1>,<v2>,...
//! DELETE <table> <id>
//! /HELP
//! ```
//!
//! Keywords match case-insensitively. Table names, field names and values
//! are kept exactly as typed apart from whitespace trimming.

use thiserror::Error;

use crate::engine::SELECT_ALL_ID;

/// Errors produced while turning a line of text into a [`Query`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line does not start with a known command keyword.
    #[error("unknown command: '{0}' (type /HELP for the command list)")]
    UnknownCommand(String),

    /// The command is known but its arguments have the wrong shape.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// An identifier argument is not an integer.
    #[error("invalid id '{token}' in {command}")]
    InvalidId {
        command: &'static str,
        token: String,
    },
}

/// Bare command discriminant of a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    CreateTable,
    Select,
    Insert,
    Update,
    Delete,
    Help,
}

/// A parsed command, ready to dispatch to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    CreateTable { table: String, fields: Vec<String> },
    /// `id` is [`SELECT_ALL_ID`] for `SELECT <table> *`.
    Select { table: String, id: i64 },
    Insert { table: String, values: Vec<String> },
    Update { table: String, id: i64, values: Vec<String> },
    Delete { table: String, id: i64 },
    Help,
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::CreateTable { .. } => QueryKind::CreateTable,
            Query::Select { .. } => QueryKind::Select,
            Query::Insert { .. } => QueryKind::Insert,
            Query::Update { .. } => QueryKind::Update,
            Query::Delete { .. } => QueryKind::Delete,
            Query::Help => QueryKind::Help,
        }
    }

    /// Target table, if the command has one.
    pub fn table(&self) -> Option<&str> {
        match self {
            Query::CreateTable { table, .. }
            | Query::Select { table, .. }
            | Query::Insert { table, .. }
            | Query::Update { table, .. }
            | Query::Delete { table, .. } => Some(table),
            Query::Help => None,
        }
    }

    /// True for commands that change table contents and need a save.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Query::Select { .. } | Query::Help)
    }
}

/// Whether a command takes free text after its positional arguments.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Rest {
    Forbidden,
    Optional,
    Required,
}

/// How a keyword's arguments are laid out.
struct Shape {
    kind: QueryKind,
    words: &'static [&'static str],
    positional: usize,
    rest: Rest,
    usage: &'static str,
}

const SHAPES: &[Shape] = &[
    Shape {
        kind: QueryKind::CreateTable,
        words: &["CREATE", "TABLE"],
        positional: 1,
        rest: Rest::Optional,
        usage: "CREATE TABLE <table> <field1>,<field2>,...",
    },
    Shape {
        kind: QueryKind::Select,
        words: &["SELECT"],
        positional: 2,
        rest: Rest::Forbidden,
        usage: "SELECT <table> <id>|*",
    },
    Shape {
        kind: QueryKind::Insert,
        words: &["INSERT"],
        positional: 1,
        rest: Rest::Required,
        usage: "INSERT <table> <value1>,<value2>,...",
    },
    Shape {
        kind: QueryKind::Update,
        words: &["UPDATE"],
        positional: 2,
        rest: Rest::Required,
        usage: "UPDATE <table> <id> <value1>,<value2>,...",
    },
    Shape {
        kind: QueryKind::Delete,
        words: &["DELETE"],
        positional: 2,
        rest: Rest::Forbidden,
        usage: "DELETE <table> <id>",
    },
    Shape {
        kind: QueryKind::Help,
        words: &["/HELP"],
        positional: 0,
        rest: Rest::Forbidden,
        usage: "/HELP",
    },
];

/// A line split into its keyword shape, positional tokens and rest text.
struct Tokens<'a> {
    shape: &'static Shape,
    positional: Vec<&'a str>,
    rest: Option<String>,
}

impl Tokens<'_> {
    fn id(&self, index: usize) -> Result<i64, ParseError> {
        let token = self.positional[index];
        token.parse::<i64>().map_err(|_| ParseError::InvalidId {
            command: self.shape.words[0],
            token: token.to_string(),
        })
    }
}

/// Splits a line into keyword, positional tokens and the rest.
///
/// Whitespace runs collapse to single spaces, so the rest segment is the
/// remaining words re-joined with one space each.
fn tokenize(line: &str) -> Result<Tokens<'_>, ParseError> {
    let words: Vec<&str> = line.split_whitespace().collect();

    let shape = SHAPES
        .iter()
        .filter(|s| {
            s.words.len() <= words.len()
                && s.words.iter().zip(&words).all(|(k, w)| k.eq_ignore_ascii_case(w))
        })
        .max_by_key(|s| s.words.len())
        .ok_or_else(|| ParseError::UnknownCommand(words.join(" ")))?;

    let args = &words[shape.words.len()..];
    if args.len() < shape.positional {
        return Err(ParseError::Usage(shape.usage));
    }
    let (positional, rest) = args.split_at(shape.positional);
    let rest = (!rest.is_empty()).then(|| rest.join(" "));

    match (shape.rest, &rest) {
        (Rest::Forbidden, Some(_)) | (Rest::Required, None) => Err(ParseError::Usage(shape.usage)),
        _ => Ok(Tokens {
            shape,
            positional: positional.to_vec(),
            rest,
        }),
    }
}

/// Comma-splits a list and trims each element.
fn split_list(text: &str) -> Vec<String> {
    text.split(',').map(|s| s.trim().to_string()).collect()
}

/// Parses one line of input into a [`Query`].
///
/// Never touches any state; on error the caller must not run anything.
///
/// ## Example
/// ```rust
/// use tabula::sql::{parse, Query};
///
/// let q = parse("update users 1 Bob, b@x.com").unwrap();
/// assert_eq!(q, Query::Update {
///     table: "users".into(),
///     id: 1,
///     values: vec!["Bob".into(), "b@x.com".into()],
/// });
/// ```
pub fn parse(line: &str) -> Result<Query, ParseError> {
    let tokens = tokenize(line)?;
    let table = || tokens.positional[0].to_string();
    let list = || tokens.rest.as_deref().map(split_list).unwrap_or_default();

    let query = match tokens.shape.kind {
        QueryKind::CreateTable => Query::CreateTable {
            table: table(),
            fields: list(),
        },
        QueryKind::Select => {
            let id = match tokens.positional[1] {
                "*" => SELECT_ALL_ID,
                _ => tokens.id(1)?,
            };
            Query::Select { table: table(), id }
        }
        QueryKind::Insert => Query::Insert {
            table: table(),
            values: list(),
        },
        QueryKind::Update => Query::Update {
            table: table(),
            id: tokens.id(1)?,
            values: list(),
        },
        QueryKind::Delete => Query::Delete {
            table: table(),
            id: tokens.id(1)?,
        },
        QueryKind::Help => Query::Help,
    };
    Ok(query)
}

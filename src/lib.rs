//! # tabula - an embedded table store backed by CSV files
//!
//! A small single-process data store featuring:
//! - **Named tables** with a fixed, ordered list of string fields
//! - **CRUD** on integer-identified records with identifiers never reused
//! - **CSV persistence**: one `<table>.csv` snapshot per table
//! - **Concurrent access**: a registry lock plus one reader-writer lock per table
//! - **A one-line command language** and an interactive shell
//!
//! ## Architecture Overview
//!
//! 1. **SQL Layer** (`sql` module): parses command lines and dispatches them
//! 2. **Engine Layer** (`engine` module): tables, records, locking, CSV storage
//! 3. **Shell Layer** (`shell` module): prompt loop over any reader/writer
//!
//! ## Usage Example
//!
//! ```bash
//! cargo run -- --data ./data
//! tabula> CREATE TABLE users name,email
//! tabula> INSERT users Alice,a@x.com
//! tabula> SELECT users *
//! ```

/// Line-oriented interactive session
pub mod shell;

/// Tables, records, locking and CSV persistence
pub mod engine;

/// Command parsing and execution
pub mod sql;

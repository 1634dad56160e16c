use parking_lot::Mutex;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::error::PersistenceError;
use super::table::{validate_schema, Table, RESERVED_FIELD};

/// File extension of table snapshots.
pub const TABLE_EXTENSION: &str = "csv";

/// CSV-backed persistence for whole tables.
///
/// Each table lives in its own file under the base directory:
///
/// ```text
/// data/users.csv:
/// id,name,email
/// 1,Alice,a@x.com
/// 3,"Smith, Bob",b@x.com
/// ```
///
/// The first column is always the record identifier, followed by the
/// table's fields in declared order. Values use standard CSV quoting.
///
/// ## Snapshot Semantics
/// `save_table` rewrites the entire file from the given table; there is no
/// append or diff. `load_table` builds a fresh [`Table`] and hands it to the
/// caller. No `Table` is retained between calls.
///
/// ## Concurrency
/// A single mutex serializes every operation on the directory. Callers
/// already hold the table's lock when saving, so contention here is low.
pub struct CsvStorage {
    /// Directory containing all table files
    dir: PathBuf,
    lock: Mutex<()>,
}

impl CsvStorage {
    /// Opens a storage directory, creating it if it doesn't exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the backing file for `name` (`<dir>/<name>.csv`).
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, TABLE_EXTENSION))
    }

    /// Returns whether a backing file exists for `name`.
    pub fn table_exists(&self, name: &str) -> bool {
        let _guard = self.lock.lock();
        self.table_path(name).is_file()
    }

    /// Lists the names of all stored tables, sorted.
    ///
    /// Every `*.csv` file in the directory counts as a table; the extension
    /// is stripped to recover the name.
    pub fn list_tables(&self) -> Result<Vec<String>, PersistenceError> {
        let _guard = self.lock.lock();
        let entries = fs::read_dir(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PersistenceError::io(&self.dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Writes a full snapshot of `table`, replacing any previous file.
    ///
    /// The snapshot goes to a temporary sibling first and is renamed over
    /// the old file once synced, so a failed write leaves the previous
    /// snapshot intact.
    pub fn save_table(&self, table: &Table) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock();
        let path = self.table_path(&table.name);
        let tmp = path.with_extension(format!("{}.tmp", TABLE_EXTENSION));

        let mut writer = csv::Writer::from_path(&tmp).map_err(|e| PersistenceError::csv(&tmp, e))?;
        let header = std::iter::once(RESERVED_FIELD).chain(table.fields.iter().map(String::as_str));
        writer
            .write_record(header)
            .map_err(|e| PersistenceError::csv(&tmp, e))?;

        for (id, record) in table.records() {
            let id = id.to_string();
            let row = std::iter::once(id.as_str()).chain(record.values_in(&table.fields));
            writer
                .write_record(row)
                .map_err(|e| PersistenceError::csv(&tmp, e))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| PersistenceError::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| PersistenceError::io(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(|e| PersistenceError::io(&path, e))?;

        debug!(table = %table.name, rows = table.len(), path = %path.display(), "table saved");
        Ok(())
    }

    /// Loads a table from its backing file.
    ///
    /// The header row gives the schema (everything after the leading `id`
    /// column). Damaged rows are dropped rather than failing the load:
    /// - rows whose column count differs from the header
    /// - rows whose first column is not an integer identifier
    /// - rows whose identifier is outside [`VALID_IDS`](super::VALID_IDS)
    /// - rows that are not valid UTF-8
    ///
    /// `next_id` ends up one past the largest identifier read, or 1.
    ///
    /// ## Errors
    /// * missing or unreadable file
    /// * [`PersistenceError::EmptyFile`] when there is no header row
    /// * [`PersistenceError::InvalidHeader`] when the header does not start
    ///   with `id` or its fields fail [`validate_schema`]
    pub fn load_table(&self, name: &str) -> Result<Table, PersistenceError> {
        let _guard = self.lock.lock();
        let path = self.table_path(name);

        let file = fs::File::open(&path).map_err(|e| PersistenceError::io(&path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut rows = reader.records();

        let header = match rows.next() {
            Some(row) => row.map_err(|e| PersistenceError::csv(&path, e))?,
            None => return Err(PersistenceError::EmptyFile { path }),
        };
        let invalid = |reason: String| PersistenceError::InvalidHeader {
            path: path.clone(),
            reason,
        };
        if header.get(0) != Some(RESERVED_FIELD) {
            return Err(invalid(format!("first column must be '{}'", RESERVED_FIELD)));
        }
        let fields: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        validate_schema(name, &fields).map_err(|e| invalid(e.to_string()))?;
        let mut table = Table::new(name, fields);

        for (line, row) in rows.enumerate() {
            // header is line 1
            let line = line + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(PersistenceError::csv(&path, e)),
                Err(e) => {
                    debug!(table = name, line, error = %e, "skipping unreadable row");
                    continue;
                }
            };
            if row.len() != header.len() {
                debug!(table = name, line, columns = row.len(), "skipping row with wrong column count");
                continue;
            }

            let mut cols = row.iter();
            let Some(Ok(id)) = cols.next().map(|c| c.trim().parse::<i64>()) else {
                debug!(table = name, line, "skipping row with non-numeric id");
                continue;
            };
            if !table.restore(id, cols.map(str::to_string).collect()) {
                debug!(table = name, line, id, "skipping row with out-of-range id");
            }
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn users() -> Table {
        let mut table = Table::new("users", strings(&["name", "age"]));
        table.insert(strings(&["Alice", "30"])).unwrap();
        table.insert(strings(&["Smith, Bob", "25"])).unwrap();
        table.insert(strings(&["Carol", "41"])).unwrap();
        table.remove(2).unwrap();
        table
    }

    #[test]
    fn test_open_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("data");

        let storage = CsvStorage::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(storage.dir(), dir.as_path());
    }

    #[test]
    fn test_save_writes_header_and_rows() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();

        storage.save_table(&users()).unwrap();

        let text = fs::read_to_string(storage.table_path("users")).unwrap();
        assert_eq!(text, "id,name,age\n1,Alice,30\n3,Carol,41\n");
        assert!(!storage.table_path("users").with_extension("csv.tmp").exists());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();
        let mut table = users();
        table.update(1, strings(&["Alice \"Al\"", "line\nbreak"])).unwrap();

        storage.save_table(&table).unwrap();
        let loaded = storage.load_table("users").unwrap();

        assert_eq!(loaded.name, "users");
        assert_eq!(loaded.fields, table.fields);
        assert_eq!(loaded.records(), table.records());
        assert_eq!(loaded.next_id(), 4);
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();
        let mut table = users();
        storage.save_table(&table).unwrap();

        table.remove(1).unwrap();
        table.remove(3).unwrap();
        storage.save_table(&table).unwrap();

        let loaded = storage.load_table("users").unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.fields, strings(&["name", "age"]));
        // nothing left on disk to recover the counter from
        assert_eq!(loaded.next_id(), 1);
    }

    #[test]
    fn test_load_skips_corrupt_rows() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();
        fs::write(
            storage.table_path("people"),
            "id,name,email\n2,Alice,a@x.com\nabc,Bob,b@x.com\n5,short\n9,too,many,cols\n",
        )
        .unwrap();

        let table = storage.load_table("people").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(2).unwrap().get("email"), Some("a@x.com"));
        assert_eq!(table.next_id(), 3);
    }

    #[test]
    fn test_load_errors() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();

        let missing = storage.load_table("ghost").unwrap_err();
        assert!(missing.is_not_found());

        fs::write(storage.table_path("blank"), "").unwrap();
        assert!(matches!(
            storage.load_table("blank"),
            Err(PersistenceError::EmptyFile { .. })
        ));
    }

    #[test]
    fn test_load_rejects_bad_headers() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();

        for header in ["id,a,a\n1,x,y\n", "name,a\n", "id,id\n", "id,a,\n", "id\n"] {
            fs::write(storage.table_path("bad"), header).unwrap();
            let err = storage.load_table("bad").unwrap_err();
            assert!(
                matches!(err, PersistenceError::InvalidHeader { .. }),
                "header {:?} gave {:?}",
                header,
                err
            );
            assert!(!err.is_not_found());
        }
    }

    #[test]
    fn test_load_skips_out_of_range_ids() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();
        fs::write(
            storage.table_path("t"),
            "id,v\n9223372036854775807,max\n0,zero\n-3,negative\n1,a\n",
        )
        .unwrap();

        let mut table = storage.load_table("t").unwrap();
        assert_eq!(table.records().keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(table.next_id(), 2);
        assert_eq!(table.insert(vec!["b".into()]).unwrap(), 2);
    }

    #[test]
    fn test_list_and_exists() {
        let tmp = TempDir::new().unwrap();
        let storage = CsvStorage::open(tmp.path()).unwrap();
        storage.save_table(&Table::new("zeta", strings(&["a"]))).unwrap();
        storage.save_table(&Table::new("alpha", strings(&["b"]))).unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(tmp.path().join("dir.csv")).unwrap();

        assert_eq!(storage.list_tables().unwrap(), vec!["alpha", "zeta"]);
        assert!(storage.table_exists("alpha"));
        assert!(!storage.table_exists("notes"));
        assert!(!storage.table_exists("dir"));
    }
}

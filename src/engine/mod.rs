use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, info, warn};

mod error;
mod storage;
mod table;

pub use error::{PersistenceError, StoreError, StoreResult};
pub use storage::{CsvStorage, TABLE_EXTENSION};
pub use table::{validate_schema, Record, Table, RESERVED_FIELD, VALID_IDS};

/// Identifier value meaning "no specific record" in a select request.
pub const SELECT_ALL_ID: i64 = -1;

/// The table store: every table of one data directory, held in memory.
///
/// The Engine is responsible for:
/// - Registering tables and enforcing their schema rules
/// - Create/read/update/delete of records with per-table locking
/// - Loading tables from, and saving them to, [`CsvStorage`]
///
/// ## Locking
///
/// ```text
/// ┌────────────────────────────────────────────┐
/// │ tables: RwLock<HashMap<name, Arc<..>>>     │  registry lock
/// └──────────┬─────────────────────┬───────────┘
///            │                     │
///     ┌──────▼───────┐      ┌──────▼───────┐
///     │RwLock<Table> │      │RwLock<Table> │     one lock per table
///     └──────────────┘      └──────────────┘
/// ```
///
/// The registry lock is held only to look a table up or to register one.
/// Readers (`select`, `select_all`, `save_table`) then take the table's lock
/// shared; writers (`insert`, `update`, `delete`) take it exclusive. Work on
/// different tables never contends, and reads of one table run in parallel.
///
/// Mutations are not written to disk by the engine itself: callers follow
/// a mutation with [`Engine::save_table`], a separate critical section.
pub struct Engine {
    storage: CsvStorage,
    tables: RwLock<HashMap<String, Arc<RwLock<Table>>>>,
}

impl Engine {
    /// Creates an engine with no tables on top of `storage`.
    pub fn new(storage: CsvStorage) -> Self {
        Self {
            storage,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a data directory (creating it if missing) and loads every
    /// table found in it.
    pub fn open<P: Into<PathBuf>>(dir: P) -> StoreResult<Self> {
        let storage = CsvStorage::open(dir)?;
        let engine = Self::new(storage);
        let loaded = engine.load_tables()?;
        info!(dir = %engine.storage.dir().display(), tables = loaded, "engine opened");
        Ok(engine)
    }

    pub fn storage(&self) -> &CsvStorage {
        &self.storage
    }

    /// Loads every table the storage knows about into memory.
    ///
    /// A loaded table replaces any in-memory table of the same name. A table
    /// that fails to load is logged and skipped; the others still load.
    /// Only a failure to list the directory is returned.
    ///
    /// ## Returns
    /// The number of tables loaded.
    pub fn load_tables(&self) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        let mut loaded = 0;
        for name in self.storage.list_tables()? {
            match self.storage.load_table(&name) {
                Ok(table) => {
                    info!(table = %name, records = table.len(), "table loaded");
                    tables.insert(name, Arc::new(RwLock::new(table)));
                    loaded += 1;
                }
                Err(e) => warn!(table = %name, error = %e, "failed to load table, skipping"),
            }
        }
        Ok(loaded)
    }

    /// Registers a new, empty table.
    ///
    /// ## Errors
    /// * `DuplicateTable` - a table with this name is already registered, or
    ///   a backing file for it exists without having been loaded
    /// * `ReservedFieldName` - `fields` contains `id`
    /// * `InvalidSchema` / `InvalidTableName` - see [`validate_schema`]
    pub fn create_table(&self, name: &str, fields: Vec<String>) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(StoreError::DuplicateTable(name.to_string()));
        }
        validate_schema(name, &fields)?;
        // a file that failed to load must not be overwritten by a fresh table
        if self.storage.table_exists(name) {
            return Err(StoreError::DuplicateTable(name.to_string()));
        }
        tables.insert(name.to_string(), Arc::new(RwLock::new(Table::new(name, fields))));
        debug!(table = name, "table created");
        Ok(())
    }

    /// Inserts a record and returns its newly assigned identifier.
    pub fn insert(&self, table: &str, values: Vec<String>) -> StoreResult<i64> {
        let handle = self.table(table)?;
        let id = handle.write().insert(values)?;
        Ok(id)
    }

    /// Fetches one record.
    ///
    /// [`SELECT_ALL_ID`] only checks that the table exists: it returns
    /// `Ok(None)` once the table is known to exist. Use [`Engine::select_all`]
    /// to read every record.
    pub fn select(&self, table: &str, id: i64) -> StoreResult<Option<Record>> {
        let handle = self.table(table)?;
        let guard = handle.read();
        if id == SELECT_ALL_ID {
            return Ok(None);
        }
        guard
            .get(id)
            .cloned()
            .map(Some)
            .ok_or_else(|| StoreError::RecordNotFound {
                table: table.to_string(),
                id,
            })
    }

    /// Returns a copy of every record, in ascending identifier order.
    pub fn select_all(&self, table: &str) -> StoreResult<BTreeMap<i64, Record>> {
        let handle = self.table(table)?;
        let records = handle.read().records().clone();
        Ok(records)
    }

    /// Replaces the values of an existing record.
    pub fn update(&self, table: &str, id: i64, values: Vec<String>) -> StoreResult<()> {
        let handle = self.table(table)?;
        handle.write().update(id, values)?;
        Ok(())
    }

    /// Removes a record. Its identifier is never handed out again.
    pub fn delete(&self, table: &str, id: i64) -> StoreResult<()> {
        let handle = self.table(table)?;
        handle.write().remove(id)?;
        Ok(())
    }

    /// Writes the current full state of `table` to storage.
    ///
    /// The table's lock is held shared for the duration of the write, so no
    /// mutation can slip in between the snapshot and the file, and a later
    /// save always reflects every write that completed before it.
    pub fn save_table(&self, table: &str) -> StoreResult<()> {
        let handle = self.table(table)?;
        let guard = handle.read();
        self.storage.save_table(&guard)?;
        Ok(())
    }

    /// Declared fields of `table`, in order.
    pub fn fields(&self, table: &str) -> StoreResult<Vec<String>> {
        Ok(self.table(table)?.read().fields.clone())
    }

    /// Names of all registered tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Internal helper: looks a table up, holding the registry lock only for
    /// the lookup itself.
    fn table(&self, name: &str) -> StoreResult<Arc<RwLock<Table>>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }
}

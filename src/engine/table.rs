use serde::Serialize;
use std::collections::BTreeMap;

use super::error::{StoreError, StoreResult};

/// Name of the implicit, system-managed identifier column.
///
/// It is always the first CSV column and can never be declared as a user
/// field.
pub const RESERVED_FIELD: &str = "id";

/// Identifiers a record can carry. `i64::MAX` is excluded so `next_id`
/// always stays above every stored identifier.
pub const VALID_IDS: std::ops::Range<i64> = 1..i64::MAX;

/// A single record as a map from field name to value.
///
/// Values are untyped strings. The key set always equals the owning
/// table's field set; the map is ordered by field name so rendering is
/// stable.
#[derive(Clone, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Record {
    /// Field name -> value mapping for this record
    pub cols: BTreeMap<String, String>,
}

impl Record {
    /// Zips `fields` with `values` positionally. Callers check the lengths.
    fn from_values(fields: &[String], values: Vec<String>) -> Self {
        Self {
            cols: fields.iter().cloned().zip(values).collect(),
        }
    }

    /// Returns the value stored under `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.cols.get(field).map(String::as_str)
    }

    /// Values laid out in the given field order, as written to CSV.
    pub fn values_in<'a>(&'a self, fields: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
        fields.iter().map(move |f| self.get(f).unwrap_or_default())
    }
}

/// One table: an ordered field schema plus its records keyed by identifier.
///
/// ## Column Ordering
/// The order of `fields` determines:
/// - CSV column order (after the leading `id` column)
/// - positional mapping of INSERT and UPDATE value lists
///
/// ## Identifiers
/// `next_id` starts at 1 and only grows. It is always greater than every
/// identifier present in `records`; deleting a record never frees its
/// identifier for reuse.
#[derive(Clone, Debug)]
pub struct Table {
    /// Table name (unique within an engine, also the storage file stem)
    pub name: String,
    /// Ordered user-declared field names
    pub fields: Vec<String>,
    records: BTreeMap<i64, Record>,
    next_id: i64,
}

impl Table {
    /// Creates an empty table. Schema validation is the caller's job, see
    /// [`validate_schema`].
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// The identifier the next insert will receive.
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in ascending identifier order.
    pub fn records(&self) -> &BTreeMap<i64, Record> {
        &self.records
    }

    pub fn get(&self, id: i64) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Fails with `FieldCountMismatch` unless there is one value per field.
    pub fn check_field_count(&self, values: &[String]) -> StoreResult<()> {
        if values.len() != self.fields.len() {
            return Err(StoreError::FieldCountMismatch {
                table: self.name.clone(),
                expected: self.fields.len(),
                found: values.len(),
            });
        }
        Ok(())
    }

    /// Stores a new record under `next_id` and returns that identifier.
    ///
    /// Fails with `IdSpaceExhausted` once `next_id` reaches `i64::MAX`;
    /// that value is never assigned.
    pub fn insert(&mut self, values: Vec<String>) -> StoreResult<i64> {
        self.check_field_count(&values)?;
        let id = self.next_id;
        let next = id
            .checked_add(1)
            .ok_or_else(|| StoreError::IdSpaceExhausted(self.name.clone()))?;
        self.records.insert(id, Record::from_values(&self.fields, values));
        self.next_id = next;
        Ok(id)
    }

    /// Overwrites an existing record. On error the record is left as it was.
    pub fn update(&mut self, id: i64, values: Vec<String>) -> StoreResult<()> {
        self.check_field_count(&values)?;
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::RecordNotFound {
                table: self.name.clone(),
                id,
            })?;
        *record = Record::from_values(&self.fields, values);
        Ok(())
    }

    pub fn remove(&mut self, id: i64) -> StoreResult<Record> {
        self.records
            .remove(&id)
            .ok_or_else(|| StoreError::RecordNotFound {
                table: self.name.clone(),
                id,
            })
    }

    /// Puts back a record read from storage under its persisted identifier
    /// and keeps `next_id` above it. Identifiers outside
    /// [`VALID_IDS`] are ignored.
    pub(crate) fn restore(&mut self, id: i64, values: Vec<String>) -> bool {
        if !VALID_IDS.contains(&id) {
            return false;
        }
        self.records.insert(id, Record::from_values(&self.fields, values));
        self.next_id = self.next_id.max(id + 1);
        true
    }
}

/// Checks a table name and field list before a table is created.
///
/// The name becomes `<name>.csv` on disk, so it must be a plain file stem.
/// Fields must be non-empty, unique, and must not include [`RESERVED_FIELD`].
pub fn validate_schema(name: &str, fields: &[String]) -> StoreResult<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(&['/', '\\'][..])
        || name.chars().any(char::is_control)
    {
        return Err(StoreError::InvalidTableName(name.to_string()));
    }
    if fields.iter().any(|f| f == RESERVED_FIELD) {
        return Err(StoreError::ReservedFieldName);
    }

    let invalid = |reason: &str| StoreError::InvalidSchema {
        table: name.to_string(),
        reason: reason.to_string(),
    };
    if fields.is_empty() {
        return Err(invalid("at least one field is required"));
    }
    if fields.iter().any(|f| f.is_empty()) {
        return Err(invalid("field names must not be blank"));
    }
    for (i, f) in fields.iter().enumerate() {
        if fields[..i].contains(f) {
            return Err(invalid(&format!("field '{}' is declared twice", f)));
        }
    }
    Ok(())
}

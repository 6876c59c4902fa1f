use crate::catalog::types::{Row, Value};
use crate::catalog::{KeyValues, TableDef, format_key};
use crate::config::MetadataConfig;
use crate::error::MetadataError;
use crate::session::{HandleScope, Session};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

pub trait TryFromRow: Sized {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowDecodeError {
    #[error("missing column '{column}' at index {index}")]
    MissingColumn { column: String, index: usize },
    #[error("column '{column}' type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("{message}")]
    Custom { message: String },
}

/// One normalized table's row shape, mapped to an in-memory record.
pub trait SubRecord: TryFromRow + Clone + fmt::Debug {
    type Key: Clone + fmt::Debug;
    type Owner: ?Sized + fmt::Debug;

    const TABLE: &'static TableDef;

    fn key(&self) -> Self::Key;

    /// Primary-key values in the table's declared key order.
    fn key_values(key: &Self::Key) -> KeyValues;

    fn owner_value(owner: &Self::Owner) -> Value;

    fn to_row(&self) -> Row;
}

/// CRUD and batched key lookup for exactly one table.
///
/// Every operation borrows the caller's session and releases the handles it
/// loaded before returning, on success and on failure.
pub struct Repository<R> {
    max_batch_keys: usize,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            max_batch_keys: self.max_batch_keys,
            _record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("max_batch_keys", &self.max_batch_keys)
            .finish()
    }
}

impl<R: SubRecord> Repository<R> {
    pub fn new(config: &MetadataConfig) -> Self {
        Self {
            max_batch_keys: config.max_batch_keys,
            _record: PhantomData,
        }
    }

    /// Inserts `record` and returns it as persisted.
    pub fn add(&self, session: &mut dyn Session, record: &R) -> Result<R, MetadataError> {
        check_key(R::TABLE, &R::key_values(&record.key()))?;
        let mut scope = HandleScope::new(session);
        let handle = scope.insert(R::TABLE, record.to_row())?;
        scope.decode::<R>(handle)?.ok_or_else(|| {
            MetadataError::storage_internal(format!(
                "row inserted into '{}' is not readable",
                R::TABLE.name
            ))
        })
    }

    /// Upserts every record in one save batch.
    pub fn add_all(&self, session: &mut dyn Session, records: &[R]) -> Result<(), MetadataError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            check_key(R::TABLE, &R::key_values(&record.key()))?;
            rows.push(record.to_row());
        }
        debug!(table = R::TABLE.name, rows = rows.len(), "save batch");
        session.save_all(R::TABLE, rows)
    }

    pub fn find(&self, session: &mut dyn Session, key: &R::Key) -> Result<Option<R>, MetadataError> {
        let key = R::key_values(key);
        check_key(R::TABLE, &key)?;
        let mut scope = HandleScope::new(session);
        match scope.find(R::TABLE, &key)? {
            Some(handle) => scope.decode::<R>(handle),
            None => Ok(None),
        }
    }

    /// Single equality query on the owner column. Order is store-defined.
    pub fn get_by_owner(
        &self,
        session: &mut dyn Session,
        owner: &R::Owner,
    ) -> Result<Vec<R>, MetadataError> {
        let owner = R::owner_value(owner);
        check_key_part(R::TABLE, R::TABLE.owner_column_name(), &owner)?;
        let mut scope = HandleScope::new(session);
        let handles = scope.query_eq(R::TABLE, R::TABLE.owner_column, &owner)?;
        let records = scope.decode_all::<R>(&handles)?;
        debug!(
            table = R::TABLE.name,
            owner = %owner,
            rows = records.len(),
            "owner query"
        );
        Ok(records)
    }

    /// Queues one deferred load per key and flushes once. Keys with no row
    /// contribute nothing; results follow the order of `keys`.
    pub fn get_by_key_batched(
        &self,
        session: &mut dyn Session,
        keys: &[R::Key],
    ) -> Result<Vec<R>, MetadataError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        if keys.len() > self.max_batch_keys {
            return Err(MetadataError::invalid_key(
                R::TABLE.name,
                format!(
                    "batched lookup of {} keys exceeds limit of {}",
                    keys.len(),
                    self.max_batch_keys
                ),
            ));
        }
        let key_values: Vec<KeyValues> = keys.iter().map(R::key_values).collect();
        for key in &key_values {
            check_key(R::TABLE, key)?;
        }

        let mut scope = HandleScope::new(session);
        let mut handles = Vec::with_capacity(key_values.len());
        for key in key_values {
            handles.push(scope.load(R::TABLE, key)?);
        }
        scope.flush()?;
        let records = scope.decode_all::<R>(&handles)?;
        debug!(
            table = R::TABLE.name,
            requested = handles.len(),
            found = records.len(),
            "batched key lookup"
        );
        Ok(records)
    }

    /// Reads the owner's rows, then deletes them in one batch. Returns the
    /// number of rows removed.
    pub fn remove_all_by_owner(
        &self,
        session: &mut dyn Session,
        owner: &R::Owner,
    ) -> Result<usize, MetadataError> {
        let current = self.get_by_owner(session, owner)?;
        if current.is_empty() {
            return Ok(0);
        }
        let keys: Vec<KeyValues> = current.iter().map(|r| R::key_values(&r.key())).collect();
        let removed = keys.len();
        session.delete_all(R::TABLE, keys)?;
        debug!(table = R::TABLE.name, removed, "owner rows removed");
        Ok(removed)
    }

    /// Submits one delete batch for `removed` followed by one save batch for
    /// `modified`. A key present in both ends up holding the modified value.
    pub fn stage(
        &self,
        session: &mut dyn Session,
        removed: &[R],
        modified: &[R],
    ) -> Result<(), MetadataError> {
        let mut deletions = Vec::with_capacity(removed.len());
        for record in removed {
            let key = R::key_values(&record.key());
            check_key(R::TABLE, &key)?;
            deletions.push(key);
        }
        let mut changes = Vec::with_capacity(modified.len());
        for record in modified {
            check_key(R::TABLE, &R::key_values(&record.key()))?;
            changes.push(record.to_row());
        }

        debug!(
            table = R::TABLE.name,
            deletions = deletions.len(),
            changes = changes.len(),
            "stage"
        );
        if !deletions.is_empty() {
            session.delete_all(R::TABLE, deletions)?;
        }
        if !changes.is_empty() {
            session.save_all(R::TABLE, changes)?;
        }
        Ok(())
    }
}

/// Rejects keys with the wrong arity, blank text parts or negative ids.
pub fn check_key(table: &'static TableDef, key: &[Value]) -> Result<(), MetadataError> {
    if key.len() != table.primary_key.len() {
        return Err(MetadataError::invalid_key(
            table.name,
            format!(
                "expected {} key parts, got {}",
                table.primary_key.len(),
                key.len()
            ),
        ));
    }
    for (&column, value) in table.primary_key.iter().zip(key) {
        check_key_part(table, table.columns[column].name, value)?;
    }
    Ok(())
}

fn check_key_part(
    table: &'static TableDef,
    column: &str,
    value: &Value,
) -> Result<(), MetadataError> {
    let problem = match value {
        Value::Text(v) if v.trim().is_empty() => Some("is blank"),
        Value::Integer(v) if *v < 0 => Some("is negative"),
        Value::Null => Some("is missing"),
        _ => None,
    };
    match problem {
        Some(problem) => Err(MetadataError::invalid_key(
            table.name,
            format!("key column '{column}' {problem} in {}", format_key(&[value.clone()])),
        )),
        None => Ok(()),
    }
}

pub fn text_at<'a>(row: &'a Row, index: usize, column: &str) -> Result<&'a str, RowDecodeError> {
    match row.values.get(index) {
        Some(Value::Text(v)) => Ok(v.as_str()),
        Some(other) => Err(RowDecodeError::TypeMismatch {
            column: column.to_string(),
            expected: "Text",
            actual: value_kind(other),
        }),
        None => Err(RowDecodeError::MissingColumn {
            column: column.to_string(),
            index,
        }),
    }
}

/// Like [`text_at`], but NULL and empty text both decode as `None`.
pub fn opt_text_at<'a>(
    row: &'a Row,
    index: usize,
    column: &str,
) -> Result<Option<&'a str>, RowDecodeError> {
    match row.values.get(index) {
        Some(Value::Null) => Ok(None),
        Some(_) => text_at(row, index, column).map(|v| Some(v).filter(|v| !v.is_empty())),
        None => Err(RowDecodeError::MissingColumn {
            column: column.to_string(),
            index,
        }),
    }
}

pub fn i64_at(row: &Row, index: usize, column: &str) -> Result<i64, RowDecodeError> {
    match row.values.get(index) {
        Some(Value::Integer(v)) => Ok(*v),
        Some(other) => Err(RowDecodeError::TypeMismatch {
            column: column.to_string(),
            expected: "Integer",
            actual: value_kind(other),
        }),
        None => Err(RowDecodeError::MissingColumn {
            column: column.to_string(),
            index,
        }),
    }
}

pub fn i32_at(row: &Row, index: usize, column: &str) -> Result<i32, RowDecodeError> {
    let value = i64_at(row, index, column)?;
    i32::try_from(value).map_err(|_| RowDecodeError::Custom {
        message: format!("column '{column}' value {value} does not fit in 32 bits"),
    })
}

pub fn opt_i32_at(row: &Row, index: usize, column: &str) -> Result<Option<i32>, RowDecodeError> {
    match row.values.get(index) {
        Some(Value::Null) => Ok(None),
        _ => i32_at(row, index, column).map(Some),
    }
}

pub fn bool_at(row: &Row, index: usize, column: &str) -> Result<bool, RowDecodeError> {
    match row.values.get(index) {
        Some(Value::Boolean(v)) => Ok(*v),
        Some(other) => Err(RowDecodeError::TypeMismatch {
            column: column.to_string(),
            expected: "Boolean",
            actual: value_kind(other),
        }),
        None => Err(RowDecodeError::MissingColumn {
            column: column.to_string(),
            index,
        }),
    }
}

/// Boolean column that may also be stored as a 0/1 integer flag.
pub fn flag_at(row: &Row, index: usize, column: &str) -> Result<bool, RowDecodeError> {
    match row.values.get(index) {
        Some(Value::Integer(0)) => Ok(false),
        Some(Value::Integer(1)) => Ok(true),
        _ => bool_at(row, index, column),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Text(_) => "Text",
        Value::Integer(_) => "Integer",
        Value::Boolean(_) => "Boolean",
        Value::Null => "Null",
    }
}

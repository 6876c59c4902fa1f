use crate::catalog::types::{Row, Value};
use crate::catalog::{KeyValues, TableDef};
use crate::error::MetadataError;
use crate::repository::SubRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Lease on one backing-store connection. Rows read through it are exposed as
/// [`HandleId`]s that stay pinned in the session until released.
pub trait Session: Send {
    /// Inserts a new row and returns a handle to the row as persisted.
    /// Fails with `DuplicateKey` if the primary key is taken.
    fn insert(&mut self, table: &'static TableDef, row: Row) -> Result<HandleId, MetadataError>;

    /// Immediate point lookup; one round trip.
    fn find(
        &mut self,
        table: &'static TableDef,
        key: &[Value],
    ) -> Result<Option<HandleId>, MetadataError>;

    /// Deferred point lookup. The handle resolves on the next [`Session::flush`];
    /// until then, and afterwards when the key had no row, [`Session::row`]
    /// returns `None`.
    fn load(&mut self, table: &'static TableDef, key: KeyValues)
    -> Result<HandleId, MetadataError>;

    /// Materializes every load queued since the previous flush in one round trip.
    fn flush(&mut self) -> Result<(), MetadataError>;

    /// Equality query on one column; one round trip.
    fn query_eq(
        &mut self,
        table: &'static TableDef,
        column: usize,
        value: &Value,
    ) -> Result<Vec<HandleId>, MetadataError>;

    /// Upserts full rows as one batch.
    fn save_all(&mut self, table: &'static TableDef, rows: Vec<Row>) -> Result<(), MetadataError>;

    /// Deletes rows by primary key as one batch. Missing keys are ignored.
    fn delete_all(
        &mut self,
        table: &'static TableDef,
        keys: Vec<KeyValues>,
    ) -> Result<(), MetadataError>;

    fn row(&self, handle: HandleId) -> Option<&Row>;

    fn release(&mut self, handles: &[HandleId]);

    /// Handles loaded through this session and not yet released.
    fn live_handles(&self) -> usize;
}

/// Hands out one session per logical operation.
pub trait SessionProvider: Send + Sync {
    fn obtain_session(&self) -> Result<Box<dyn Session>, MetadataError>;
}

/// Releases every handle it hands out when dropped, on success and on error.
pub struct HandleScope<'s> {
    session: &'s mut dyn Session,
    handles: Vec<HandleId>,
}

impl<'s> HandleScope<'s> {
    pub fn new(session: &'s mut dyn Session) -> Self {
        Self {
            session,
            handles: Vec::new(),
        }
    }

    pub fn insert(&mut self, table: &'static TableDef, row: Row) -> Result<HandleId, MetadataError> {
        let handle = self.session.insert(table, row)?;
        self.handles.push(handle);
        Ok(handle)
    }

    pub fn find(
        &mut self,
        table: &'static TableDef,
        key: &[Value],
    ) -> Result<Option<HandleId>, MetadataError> {
        let handle = self.session.find(table, key)?;
        self.handles.extend(handle);
        Ok(handle)
    }

    pub fn load(
        &mut self,
        table: &'static TableDef,
        key: KeyValues,
    ) -> Result<HandleId, MetadataError> {
        let handle = self.session.load(table, key)?;
        self.handles.push(handle);
        Ok(handle)
    }

    pub fn flush(&mut self) -> Result<(), MetadataError> {
        self.session.flush()
    }

    pub fn query_eq(
        &mut self,
        table: &'static TableDef,
        column: usize,
        value: &Value,
    ) -> Result<Vec<HandleId>, MetadataError> {
        let handles = self.session.query_eq(table, column, value)?;
        self.handles.extend_from_slice(&handles);
        Ok(handles)
    }

    pub fn save_all(&mut self, table: &'static TableDef, rows: Vec<Row>) -> Result<(), MetadataError> {
        self.session.save_all(table, rows)
    }

    pub fn delete_all(
        &mut self,
        table: &'static TableDef,
        keys: Vec<KeyValues>,
    ) -> Result<(), MetadataError> {
        self.session.delete_all(table, keys)
    }

    pub fn row(&self, handle: HandleId) -> Option<&Row> {
        self.session.row(handle)
    }

    /// Decodes a resolved handle; `None` when the row does not exist.
    pub fn decode<R: SubRecord>(&self, handle: HandleId) -> Result<Option<R>, MetadataError> {
        match self.session.row(handle) {
            Some(row) => Ok(Some(R::try_from_row(row.clone())?)),
            None => Ok(None),
        }
    }

    /// Decodes every resolved handle in order, skipping the ones with no row.
    pub fn decode_all<R: SubRecord>(&self, handles: &[HandleId]) -> Result<Vec<R>, MetadataError> {
        let mut out = Vec::with_capacity(handles.len());
        for &handle in handles {
            if let Some(record) = self.decode::<R>(handle)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Reborrows the session for a nested call that manages its own scope.
    pub fn session(&mut self) -> &mut dyn Session {
        &mut *self.session
    }

    pub fn tracked(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for HandleScope<'_> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.session.release(&self.handles);
        }
    }
}

use crate::catalog::types::{Row, Value};
use crate::catalog::{KeyValues, TableDef, format_key};
use crate::config::MetadataConfig;
use crate::error::MetadataError;
use crate::session::{HandleId, Session, SessionProvider};
use crate::storage::encoded_key::EncodedKey;
use im::{HashMap, OrdMap};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

type TableData = OrdMap<EncodedKey, Row>;

#[derive(Debug, Clone, Default)]
struct Keyspace {
    tables: HashMap<&'static str, TableData>,
}

impl Keyspace {
    fn table(&self, name: &str) -> Option<&TableData> {
        self.tables.get(name)
    }

    fn table_mut(&mut self, name: &'static str) -> &mut TableData {
        self.tables.entry(name).or_insert_with(OrdMap::new)
    }
}

#[derive(Debug, Default)]
struct StoreCounters {
    flushes: AtomicU64,
    point_loads: AtomicU64,
    point_finds: AtomicU64,
    queries: AtomicU64,
    batches: AtomicU64,
    inserts: AtomicU64,
    leaked_handles: AtomicU64,
}

/// Cumulative operation counts since the store was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub flushes: u64,
    /// Deferred loads queued; these cost no round trip of their own.
    pub point_loads: u64,
    pub point_finds: u64,
    pub queries: u64,
    pub batches: u64,
    pub inserts: u64,
    pub leaked_handles: u64,
}

impl StoreStats {
    pub fn round_trips(&self) -> u64 {
        self.flushes + self.point_finds + self.queries + self.batches + self.inserts
    }
}

#[derive(Debug)]
struct Shared {
    keyspace: RwLock<Keyspace>,
    counters: StoreCounters,
    available: AtomicBool,
    fail_next: AtomicU64,
    fail_at: AtomicU64,
    max_scan_rows: usize,
    warn_on_leaked_handles: bool,
}

/// In-memory backing store. Tables are persistent ordered maps keyed by
/// [`EncodedKey`]; each flush resolves against one clone of the keyspace.
/// Round trips are counted and failures can be injected.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&MetadataConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: &MetadataConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                keyspace: RwLock::new(Keyspace::default()),
                counters: StoreCounters::default(),
                available: AtomicBool::new(true),
                fail_next: AtomicU64::new(0),
                fail_at: AtomicU64::new(0),
                max_scan_rows: config.max_scan_rows,
                warn_on_leaked_handles: config.warn_on_leaked_handles,
            }),
        }
    }

    pub fn stats(&self) -> StoreStats {
        let c = &self.shared.counters;
        StoreStats {
            flushes: c.flushes.load(Ordering::Relaxed),
            point_loads: c.point_loads.load(Ordering::Relaxed),
            point_finds: c.point_finds.load(Ordering::Relaxed),
            queries: c.queries.load(Ordering::Relaxed),
            batches: c.batches.load(Ordering::Relaxed),
            inserts: c.inserts.load(Ordering::Relaxed),
            leaked_handles: c.leaked_handles.load(Ordering::Relaxed),
        }
    }

    /// Makes the next `count` round trips fail with a retryable storage failure.
    pub fn fail_next(&self, count: u64) {
        self.shared.fail_next.store(count, Ordering::SeqCst);
    }

    /// Makes only the `nth` round trip from now fail, counting from 1.
    pub fn fail_on_round_trip(&self, nth: u64) {
        self.shared.fail_at.store(nth, Ordering::SeqCst);
    }

    /// While unavailable, sessions cannot be obtained and every round trip fails.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    pub fn row_count(&self, table: &TableDef) -> usize {
        self.shared
            .keyspace
            .read()
            .table(table.name)
            .map_or(0, |rows| rows.len())
    }

    fn snapshot(&self) -> Keyspace {
        self.shared.keyspace.read().clone()
    }

    fn round_trip(&self) -> Result<(), MetadataError> {
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(MetadataError::unavailable("backing store unavailable"));
        }
        let injected = self
            .shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let armed_for_this_call = self
            .shared
            .fail_at
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok_and(|previous| previous == 1);
        if injected || armed_for_this_call {
            return Err(MetadataError::unavailable("injected storage failure"));
        }
        Ok(())
    }
}

impl SessionProvider for MemoryStore {
    fn obtain_session(&self) -> Result<Box<dyn Session>, MetadataError> {
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(MetadataError::unavailable("backing store unavailable"));
        }
        Ok(Box::new(MemorySession::new(self.clone())))
    }
}

#[derive(Debug)]
enum Slot {
    Pending,
    Resolved(Option<Row>),
}

#[derive(Debug)]
struct PendingLoad {
    handle: HandleId,
    table: &'static str,
    key: EncodedKey,
}

#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    next_handle: u64,
    slots: std::collections::HashMap<HandleId, Slot>,
    pending: Vec<PendingLoad>,
}

impl MemorySession {
    fn new(store: MemoryStore) -> Self {
        Self {
            store,
            next_handle: 0,
            slots: std::collections::HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn allocate(&mut self, slot: Slot) -> HandleId {
        self.next_handle += 1;
        let handle = HandleId::new(self.next_handle);
        self.slots.insert(handle, slot);
        handle
    }

    fn encode_key(table: &'static TableDef, key: &[Value]) -> Result<EncodedKey, MetadataError> {
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
        Ok(EncodedKey::from_values(key))
    }

    fn encode_row(table: &'static TableDef, row: &Row) -> Result<EncodedKey, MetadataError> {
        table.check_row(row).map_err(|message| {
            MetadataError::storage_internal(format!("row rejected by '{}': {message}", table.name))
        })?;
        let key = table.key_of(row).ok_or_else(|| {
            MetadataError::invalid_key(table.name, "row does not carry its primary key")
        })?;
        Ok(EncodedKey::from_values(&key))
    }
}

impl Session for MemorySession {
    fn insert(&mut self, table: &'static TableDef, row: Row) -> Result<HandleId, MetadataError> {
        self.store.round_trip()?;
        let key = Self::encode_row(table, &row)?;
        {
            let mut keyspace = self.store.shared.keyspace.write();
            let rows = keyspace.table_mut(table.name);
            if rows.contains_key(&key) {
                let key_values = table.key_of(&row).unwrap_or_default();
                return Err(MetadataError::DuplicateKey {
                    table: table.name,
                    key: format_key(&key_values),
                });
            }
            rows.insert(key, row.clone());
        }
        self.store
            .shared
            .counters
            .inserts
            .fetch_add(1, Ordering::Relaxed);
        Ok(self.allocate(Slot::Resolved(Some(row))))
    }

    fn find(
        &mut self,
        table: &'static TableDef,
        key: &[Value],
    ) -> Result<Option<HandleId>, MetadataError> {
        let encoded = Self::encode_key(table, key)?;
        self.store.round_trip()?;
        self.store
            .shared
            .counters
            .point_finds
            .fetch_add(1, Ordering::Relaxed);
        let row = self
            .store
            .shared
            .keyspace
            .read()
            .table(table.name)
            .and_then(|rows| rows.get(&encoded).cloned());
        Ok(row.map(|row| self.allocate(Slot::Resolved(Some(row)))))
    }

    fn load(
        &mut self,
        table: &'static TableDef,
        key: KeyValues,
    ) -> Result<HandleId, MetadataError> {
        let encoded = Self::encode_key(table, &key)?;
        self.store
            .shared
            .counters
            .point_loads
            .fetch_add(1, Ordering::Relaxed);
        let handle = self.allocate(Slot::Pending);
        self.pending.push(PendingLoad {
            handle,
            table: table.name,
            key: encoded,
        });
        Ok(handle)
    }

    fn flush(&mut self) -> Result<(), MetadataError> {
        self.store.round_trip()?;
        self.store
            .shared
            .counters
            .flushes
            .fetch_add(1, Ordering::Relaxed);
        if self.pending.is_empty() {
            return Ok(());
        }
        let snapshot = self.store.snapshot();
        let pending = std::mem::take(&mut self.pending);
        debug!(loads = pending.len(), "flush");
        for load in pending {
            let row = snapshot
                .table(load.table)
                .and_then(|rows| rows.get(&load.key).cloned());
            if let Some(slot) = self.slots.get_mut(&load.handle) {
                *slot = Slot::Resolved(row);
            }
        }
        Ok(())
    }

    fn query_eq(
        &mut self,
        table: &'static TableDef,
        column: usize,
        value: &Value,
    ) -> Result<Vec<HandleId>, MetadataError> {
        if column >= table.columns.len() {
            return Err(MetadataError::storage_internal(format!(
                "table '{}' has no column at index {column}",
                table.name
            )));
        }
        self.store.round_trip()?;
        self.store
            .shared
            .counters
            .queries
            .fetch_add(1, Ordering::Relaxed);
        let snapshot = self.store.snapshot();
        let matches: Vec<Row> = snapshot
            .table(table.name)
            .map(|rows| {
                rows.values()
                    .filter(|row| row.values.get(column) == Some(value))
                    .take(self.store.shared.max_scan_rows.saturating_add(1))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if matches.len() > self.store.shared.max_scan_rows {
            return Err(MetadataError::storage_internal(format!(
                "query on '{}' exceeds max_scan_rows {}",
                table.name, self.store.shared.max_scan_rows
            )));
        }
        Ok(matches
            .into_iter()
            .map(|row| self.allocate(Slot::Resolved(Some(row))))
            .collect())
    }

    fn save_all(&mut self, table: &'static TableDef, rows: Vec<Row>) -> Result<(), MetadataError> {
        let mut encoded = Vec::with_capacity(rows.len());
        for row in rows {
            encoded.push((Self::encode_row(table, &row)?, row));
        }
        self.store.round_trip()?;
        self.store
            .shared
            .counters
            .batches
            .fetch_add(1, Ordering::Relaxed);
        let mut keyspace = self.store.shared.keyspace.write();
        let data = keyspace.table_mut(table.name);
        for (key, row) in encoded {
            data.insert(key, row);
        }
        Ok(())
    }

    fn delete_all(
        &mut self,
        table: &'static TableDef,
        keys: Vec<KeyValues>,
    ) -> Result<(), MetadataError> {
        let mut encoded = Vec::with_capacity(keys.len());
        for key in &keys {
            encoded.push(Self::encode_key(table, key)?);
        }
        self.store.round_trip()?;
        self.store
            .shared
            .counters
            .batches
            .fetch_add(1, Ordering::Relaxed);
        let mut keyspace = self.store.shared.keyspace.write();
        let data = keyspace.table_mut(table.name);
        for key in encoded {
            data.remove(&key);
        }
        Ok(())
    }

    fn row(&self, handle: HandleId) -> Option<&Row> {
        match self.slots.get(&handle) {
            Some(Slot::Resolved(row)) => row.as_ref(),
            _ => None,
        }
    }

    fn release(&mut self, handles: &[HandleId]) {
        for handle in handles {
            self.slots.remove(handle);
        }
        if !self.pending.is_empty() {
            self.pending.retain(|load| !handles.contains(&load.handle));
        }
    }

    fn live_handles(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let leaked = self.slots.len();
        if leaked == 0 {
            return;
        }
        self.store
            .shared
            .counters
            .leaked_handles
            .fetch_add(leaked as u64, Ordering::Relaxed);
        if self.store.shared.warn_on_leaked_handles {
            warn!(leaked, "session dropped with unreleased handles");
        }
    }
}

use serde::{Deserialize, Serialize};

/// Runtime configuration for the metadata access layer and the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Upper bound on keys accepted by one batched lookup. Larger requests
    /// are rejected with `InvalidKey` before any store call.
    pub max_batch_keys: usize,
    /// Store-side cap on rows returned by one owner-scoped equality query.
    pub max_scan_rows: usize,
    /// Composite operations slower than this are logged at `warn`.
    pub slow_operation_threshold_ms: u64,
    /// Log sessions that are dropped while still holding loaded handles.
    pub warn_on_leaked_handles: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            max_batch_keys: 4096,
            max_scan_rows: 10_000,
            slow_operation_threshold_ms: 250,
            warn_on_leaked_handles: true,
        }
    }
}

impl MetadataConfig {
    pub fn production() -> Self {
        Self {
            max_batch_keys: 1024,
            slow_operation_threshold_ms: 100,
            ..Self::default()
        }
    }

    pub fn development() -> Self {
        Self {
            max_scan_rows: 100_000,
            slow_operation_threshold_ms: 1_000,
            ..Self::default()
        }
    }

    pub fn with_max_batch_keys(mut self, max_batch_keys: usize) -> Self {
        self.max_batch_keys = max_batch_keys.max(1);
        self
    }

    pub fn with_max_scan_rows(mut self, max_scan_rows: usize) -> Self {
        self.max_scan_rows = max_scan_rows.max(1);
        self
    }

    pub fn with_slow_operation_threshold_ms(mut self, threshold_ms: u64) -> Self {
        self.slow_operation_threshold_ms = threshold_ms;
        self
    }

    pub fn with_warn_on_leaked_handles(mut self, enabled: bool) -> Self {
        self.warn_on_leaked_handles = enabled;
        self
    }
}

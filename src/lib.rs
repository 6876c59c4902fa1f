pub mod acl;
pub mod async_bridge;
pub mod catalog;
pub mod config;
pub mod error;
#[cfg(test)]
mod lib_tests;
pub mod node_snapshot;
pub mod records;
pub mod repository;
pub mod session;
pub mod storage;

use crate::acl::AceStore;
use crate::config::MetadataConfig;
use crate::error::MetadataError;
use crate::node_snapshot::{NodeSnapshot, NodeSnapshotStore};
use crate::records::Ace;
use crate::session::SessionProvider;
use std::sync::Arc;
use tracing::info;

/// Entry point for callers: ACL operations for the namespace service and
/// node snapshots for the resource manager, all backed by one session
/// provider. Every call obtains its own session.
pub struct MetadataStore {
    config: MetadataConfig,
    aces: AceStore,
    nodes: NodeSnapshotStore,
}

impl MetadataStore {
    pub fn new(provider: Arc<dyn SessionProvider>, config: MetadataConfig) -> Self {
        info!(
            max_batch_keys = config.max_batch_keys,
            slow_operation_threshold_ms = config.slow_operation_threshold_ms,
            "metadata store ready"
        );
        Self {
            aces: AceStore::new(Arc::clone(&provider), &config),
            nodes: NodeSnapshotStore::new(provider, &config),
            config,
        }
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    pub fn aces(&self) -> &AceStore {
        &self.aces
    }

    pub fn nodes(&self) -> &NodeSnapshotStore {
        &self.nodes
    }

    pub fn add_entry(&self, ace: &Ace) -> Result<Ace, MetadataError> {
        self.aces.add(ace)
    }

    pub fn get_entry(&self, id: i32, inode_id: i32) -> Result<Option<Ace>, MetadataError> {
        self.aces.get(id, inode_id)
    }

    pub fn list_entries_by_owner(&self, inode_id: i32) -> Result<Vec<Ace>, MetadataError> {
        self.aces.list_by_owner(inode_id)
    }

    pub fn remove_all_entries(&self, inode_id: i32) -> Result<usize, MetadataError> {
        self.aces.remove_all_by_owner(inode_id)
    }

    pub fn get_entries_by_ids_batched(
        &self,
        ids: &[i32],
        inode_id: i32,
    ) -> Result<Vec<Ace>, MetadataError> {
        self.aces.get_by_ids_batched(ids, inode_id)
    }

    pub fn stage_entries(&self, removed: &[Ace], modified: &[Ace]) -> Result<(), MetadataError> {
        self.aces.stage(removed, modified)
    }

    pub fn find_node_snapshot(&self, node_id: &str) -> Result<Option<NodeSnapshot>, MetadataError> {
        self.nodes.find_by_node_id(node_id)
    }

    pub fn node_exists(&self, node_id: &str) -> Result<bool, MetadataError> {
        self.nodes.exists(node_id)
    }

    pub fn persist_node_snapshot(&self, snapshot: &NodeSnapshot) -> Result<(), MetadataError> {
        self.nodes.persist(snapshot)
    }

    pub fn remove_node(&self, node_id: &str) -> Result<bool, MetadataError> {
        self.nodes.remove(node_id)
    }
}

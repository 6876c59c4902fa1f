use crate::MetadataStore;
use crate::error::MetadataError;
use crate::node_snapshot::NodeSnapshot;
use crate::records::Ace;
use std::sync::Arc;

/// Runs one blocking metadata operation on tokio's blocking pool. Each call
/// obtains its own session inside the worker, so concurrent calls never share
/// one.
pub async fn run_blocking<F, T>(f: F) -> Result<T, MetadataError>
where
    F: FnOnce() -> Result<T, MetadataError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|err| {
        MetadataError::storage_internal(format!("metadata worker task failed: {err}"))
    })?
}

#[derive(Clone)]
pub struct MetadataAsync {
    inner: Arc<MetadataStore>,
}

impl MetadataAsync {
    pub fn new(inner: Arc<MetadataStore>) -> Self {
        Self { inner }
    }

    pub fn blocking(&self) -> &MetadataStore {
        &self.inner
    }

    pub async fn add_entry(&self, ace: Ace) -> Result<Ace, MetadataError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.add_entry(&ace)).await
    }

    pub async fn get_entry(&self, id: i32, inode_id: i32) -> Result<Option<Ace>, MetadataError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.get_entry(id, inode_id)).await
    }

    pub async fn list_entries_by_owner(&self, inode_id: i32) -> Result<Vec<Ace>, MetadataError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.list_entries_by_owner(inode_id)).await
    }

    pub async fn remove_all_entries(&self, inode_id: i32) -> Result<usize, MetadataError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.remove_all_entries(inode_id)).await
    }

    pub async fn get_entries_by_ids_batched(
        &self,
        ids: Vec<i32>,
        inode_id: i32,
    ) -> Result<Vec<Ace>, MetadataError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.get_entries_by_ids_batched(&ids, inode_id)).await
    }

    pub async fn stage_entries(
        &self,
        removed: Vec<Ace>,
        modified: Vec<Ace>,
    ) -> Result<(), MetadataError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.stage_entries(&removed, &modified)).await
    }

    pub async fn find_node_snapshot(
        &self,
        node_id: impl Into<String>,
    ) -> Result<Option<NodeSnapshot>, MetadataError> {
        let inner = Arc::clone(&self.inner);
        let node_id = node_id.into();
        run_blocking(move || inner.find_node_snapshot(&node_id)).await
    }

    pub async fn node_exists(&self, node_id: impl Into<String>) -> Result<bool, MetadataError> {
        let inner = Arc::clone(&self.inner);
        let node_id = node_id.into();
        run_blocking(move || inner.node_exists(&node_id)).await
    }

    pub async fn persist_node_snapshot(&self, snapshot: NodeSnapshot) -> Result<(), MetadataError> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.persist_node_snapshot(&snapshot)).await
    }

    pub async fn remove_node(&self, node_id: impl Into<String>) -> Result<bool, MetadataError> {
        let inner = Arc::clone(&self.inner);
        let node_id = node_id.into();
        run_blocking(move || inner.remove_node(&node_id)).await
    }
}

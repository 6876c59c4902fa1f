use crate::config::MetadataConfig;
use crate::error::MetadataError;
use crate::records::{Ace, AceKey};
use crate::repository::Repository;
use crate::session::SessionProvider;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Access-control lists keyed by inode. The `index` field defines the logical
/// order and is never renumbered here; callers that delete entries re-index
/// the survivors and stage them back.
pub struct AceStore {
    provider: Arc<dyn SessionProvider>,
    aces: Repository<Ace>,
}

impl AceStore {
    pub fn new(provider: Arc<dyn SessionProvider>, config: &MetadataConfig) -> Self {
        Self {
            provider,
            aces: Repository::new(config),
        }
    }

    pub fn add(&self, ace: &Ace) -> Result<Ace, MetadataError> {
        let mut session = self.provider.obtain_session()?;
        let persisted = self.aces.add(session.as_mut(), ace)?;
        debug!(inode_id = ace.inode_id, id = ace.id, "ace added");
        Ok(persisted)
    }

    pub fn get(&self, id: i32, inode_id: i32) -> Result<Option<Ace>, MetadataError> {
        let mut session = self.provider.obtain_session()?;
        self.aces.find(session.as_mut(), &AceKey { id, inode_id })
    }

    /// Entries owned by `inode_id` in store order.
    pub fn list_by_owner(&self, inode_id: i32) -> Result<Vec<Ace>, MetadataError> {
        let mut session = self.provider.obtain_session()?;
        self.aces.get_by_owner(session.as_mut(), &inode_id)
    }

    /// Entries owned by `inode_id` sorted by `index`.
    pub fn list_by_owner_ordered(&self, inode_id: i32) -> Result<Vec<Ace>, MetadataError> {
        let mut aces = self.list_by_owner(inode_id)?;
        aces.sort_by_key(|ace| (ace.index, ace.id));
        let distinct: BTreeSet<i32> = aces.iter().map(|ace| ace.index).collect();
        if distinct.len() != aces.len() {
            warn!(
                inode_id,
                entries = aces.len(),
                distinct_indexes = distinct.len(),
                "acl has duplicate index values"
            );
        }
        Ok(aces)
    }

    /// Removes every entry of `inode_id`: one read, then one batched delete.
    pub fn remove_all_by_owner(&self, inode_id: i32) -> Result<usize, MetadataError> {
        let mut session = self.provider.obtain_session()?;
        let removed = self.aces.remove_all_by_owner(session.as_mut(), &inode_id)?;
        debug!(inode_id, removed, "acl cleared");
        Ok(removed)
    }

    /// Looks up `(id, inode_id)` for each id with a single flush. Ids with no
    /// entry under this inode are omitted.
    pub fn get_by_ids_batched(&self, ids: &[i32], inode_id: i32) -> Result<Vec<Ace>, MetadataError> {
        let keys: Vec<AceKey> = ids.iter().map(|&id| AceKey { id, inode_id }).collect();
        let mut session = self.provider.obtain_session()?;
        self.aces.get_by_key_batched(session.as_mut(), &keys)
    }

    /// Deletes `removed` then saves `modified` in one session.
    pub fn stage(&self, removed: &[Ace], modified: &[Ace]) -> Result<(), MetadataError> {
        let mut session = self.provider.obtain_session()?;
        self.aces.stage(session.as_mut(), removed, modified)
    }
}

#[cfg(test)]
mod tests {
    use super::AceStore;
    use crate::config::MetadataConfig;
    use crate::records::{Ace, AceType};
    use crate::storage::memory::MemoryStore;
    use std::sync::Arc;

    fn ace(id: i32, inode_id: i32, index: i32) -> Ace {
        Ace {
            id,
            inode_id,
            subject: format!("user{id}"),
            ace_type: AceType::Access,
            is_default: false,
            permission: 0b101,
            index,
        }
    }

    fn store() -> (MemoryStore, AceStore) {
        let backing = MemoryStore::default();
        let aces = AceStore::new(Arc::new(backing.clone()), &MetadataConfig::default());
        (backing, aces)
    }

    #[test]
    fn ordered_listing_sorts_by_index() {
        let (_, aces) = store();
        aces.stage(&[], &[ace(1, 3, 2), ace(2, 3, 0), ace(3, 3, 1)])
            .expect("stage");

        let ordered: Vec<i32> = aces
            .list_by_owner_ordered(3)
            .expect("list")
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ordered, vec![2, 3, 1]);
    }

    #[test]
    fn batched_ids_are_scoped_to_the_owner() {
        let (_, aces) = store();
        aces.add(&ace(1, 10, 0)).expect("add");
        aces.add(&ace(1, 11, 0)).expect("add same id under another inode");

        let found = aces.get_by_ids_batched(&[1], 11).expect("batched");
        assert_eq!(found, vec![ace(1, 11, 0)]);
    }

    #[test]
    fn remove_all_reads_then_deletes_in_one_batch() {
        let (backing, aces) = store();
        aces.stage(&[], &[ace(1, 4, 0), ace(2, 4, 1), ace(9, 5, 0)])
            .expect("seed");
        let before = backing.stats();

        assert_eq!(aces.remove_all_by_owner(4).expect("remove"), 2);
        let after = backing.stats();
        assert_eq!(after.queries - before.queries, 1);
        assert_eq!(after.batches - before.batches, 1);
        assert_eq!(aces.list_by_owner(5).expect("list").len(), 1);
    }

    #[test]
    fn get_returns_none_for_missing_entry() {
        let (_, aces) = store();
        assert_eq!(aces.get(1, 1).expect("get"), None);
        let added = aces.add(&ace(1, 1, 0)).expect("add");
        assert_eq!(aces.get(1, 1).expect("get"), Some(added));
    }
}

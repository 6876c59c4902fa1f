use metadal::MetadataStore;
use metadal::config::MetadataConfig;
use metadal::error::MetadataError;
use metadal::records::{ACES_TABLE, Ace, AceType, PERMISSION_READ, PERMISSION_WRITE};
use metadal::storage::memory::MemoryStore;
use std::sync::Arc;

fn open() -> (MemoryStore, MetadataStore) {
    let backing = MemoryStore::default();
    let store = MetadataStore::new(Arc::new(backing.clone()), MetadataConfig::development());
    (backing, store)
}

fn entry(id: i32, inode_id: i32, subject: &str, index: i32) -> Ace {
    Ace {
        id,
        inode_id,
        subject: subject.to_string(),
        ace_type: AceType::Access,
        is_default: false,
        permission: PERMISSION_READ,
        index,
    }
}

#[test]
fn added_entry_is_returned_by_batched_lookup() {
    let (_, store) = open();
    let added = store.add_entry(&entry(7, 100, "alice", 0)).expect("add");
    assert_eq!(added, entry(7, 100, "alice", 0));

    let found = store
        .get_entries_by_ids_batched(&[7], 100)
        .expect("batched lookup");
    assert_eq!(found, vec![added]);
}

#[test]
fn adding_an_existing_key_is_rejected() {
    let (backing, store) = open();
    store.add_entry(&entry(1, 100, "alice", 0)).expect("add");
    let err = store
        .add_entry(&entry(1, 100, "bob", 1))
        .expect_err("duplicate key");
    assert!(matches!(err, MetadataError::DuplicateKey { .. }));
    assert_eq!(err.code_str(), "duplicate_key");
    assert_eq!(backing.row_count(&ACES_TABLE), 1);
}

#[test]
fn listing_returns_only_entries_of_the_owner() {
    let (_, store) = open();
    for (id, inode_id) in [(1, 42), (2, 42), (3, 42), (1, 43)] {
        store
            .add_entry(&entry(id, inode_id, "carol", id))
            .expect("add");
    }

    let mut ids: Vec<i32> = store
        .list_entries_by_owner(42)
        .expect("list")
        .into_iter()
        .map(|ace| ace.id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(store.list_entries_by_owner(44).expect("list").is_empty());
}

#[test]
fn remove_all_then_list_is_empty() {
    let (_, store) = open();
    store
        .stage_entries(
            &[],
            &[
                entry(1, 42, "alice", 0),
                entry(2, 42, "bob", 1),
                entry(3, 42, "carol", 2),
                entry(1, 7, "dave", 0),
            ],
        )
        .expect("seed");

    assert_eq!(store.remove_all_entries(42).expect("remove"), 3);
    assert!(store.list_entries_by_owner(42).expect("list").is_empty());
    assert_eq!(store.list_entries_by_owner(7).expect("list").len(), 1);
    assert_eq!(store.remove_all_entries(42).expect("remove again"), 0);
}

#[test]
fn stage_applies_deletes_before_saves() {
    let (_, store) = open();
    let original = entry(5, 9, "alice", 0);
    store.add_entry(&original).expect("add");
    store.add_entry(&entry(6, 9, "bob", 1)).expect("add");

    let mut modified = original.clone();
    modified.permission = PERMISSION_READ | PERMISSION_WRITE;
    store
        .stage_entries(&[original, entry(6, 9, "bob", 1)], &[modified.clone()])
        .expect("stage");

    assert_eq!(store.get_entry(5, 9).expect("get"), Some(modified));
    assert_eq!(store.get_entry(6, 9).expect("get"), None);
}

#[test]
fn empty_stage_makes_no_round_trip() {
    let (backing, store) = open();
    let before = backing.stats();
    store.stage_entries(&[], &[]).expect("empty stage");
    assert_eq!(backing.stats().round_trips(), before.round_trips());
}

#[test]
fn batched_lookup_omits_misses() {
    let (backing, store) = open();
    store.add_entry(&entry(1, 5, "alice", 0)).expect("add");
    let before = backing.stats();

    let found = store
        .get_entries_by_ids_batched(&[1, 99], 5)
        .expect("batched lookup");
    let after = backing.stats();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 1);
    assert_eq!(after.flushes - before.flushes, 1);
    assert_eq!(after.round_trips() - before.round_trips(), 1);
}

#[test]
fn batched_lookup_of_nothing_returns_nothing() {
    let (backing, store) = open();
    let before = backing.stats();
    assert!(
        store
            .get_entries_by_ids_batched(&[], 5)
            .expect("empty lookup")
            .is_empty()
    );
    assert_eq!(backing.stats().round_trips(), before.round_trips());
}

#[test]
fn batched_lookup_beyond_the_key_limit_is_rejected() {
    let backing = MemoryStore::default();
    let store = MetadataStore::new(
        Arc::new(backing.clone()),
        MetadataConfig::default().with_max_batch_keys(2),
    );
    let err = store
        .get_entries_by_ids_batched(&[1, 2, 3], 5)
        .expect_err("too many keys");
    assert_eq!(err.code_str(), "invalid_key");
    assert_eq!(backing.stats().round_trips(), 0);
}

#[test]
fn listing_works_with_the_largest_configured_scan_limit() {
    let config: MetadataConfig =
        serde_json::from_str(&format!(r#"{{"max_scan_rows": {}}}"#, usize::MAX))
            .expect("parse config");
    assert_eq!(config.max_scan_rows, usize::MAX);
    let backing = MemoryStore::new(&config);
    let store = MetadataStore::new(Arc::new(backing.clone()), config);
    store.add_entry(&entry(1, 1, "alice", 0)).expect("add");

    let listed = store.list_entries_by_owner(1).expect("list");
    assert_eq!(listed, vec![entry(1, 1, "alice", 0)]);
}

#[test]
fn negative_ids_are_invalid_keys() {
    let (backing, store) = open();
    let err = store.get_entry(-1, 5).expect_err("negative id");
    assert_eq!(err.code_str(), "invalid_key");
    let err = store.list_entries_by_owner(-3).expect_err("negative owner");
    assert_eq!(err.code_str(), "invalid_key");
    assert_eq!(backing.stats().round_trips(), 0);
}

#[test]
fn unavailable_store_surfaces_a_retryable_failure() {
    let (backing, store) = open();
    backing.set_available(false);
    let err = store.list_entries_by_owner(1).expect_err("store down");
    assert!(err.is_retryable());
    assert_eq!(err.code_str(), "storage_failure");

    backing.set_available(true);
    assert!(store.list_entries_by_owner(1).expect("recovered").is_empty());
}

#[test]
fn ordered_listing_follows_the_index_field() {
    let (_, store) = open();
    store
        .stage_entries(
            &[],
            &[
                entry(10, 1, "mask", 2),
                entry(11, 1, "alice", 0),
                entry(12, 1, "group", 1),
            ],
        )
        .expect("seed");

    let subjects: Vec<String> = store
        .aces()
        .list_by_owner_ordered(1)
        .expect("ordered")
        .into_iter()
        .map(|ace| ace.subject)
        .collect();
    assert_eq!(subjects, vec!["alice", "group", "mask"]);
}

#[test]
fn default_entries_keep_their_type() {
    let (_, store) = open();
    let mut inherited = entry(1, 3, "alice", 0);
    inherited.ace_type = AceType::Default;
    inherited.is_default = true;
    store.add_entry(&inherited).expect("add");

    let fetched = store.get_entry(1, 3).expect("get").expect("present");
    assert_eq!(fetched.ace_type, AceType::Default);
    assert!(fetched.is_default);
    assert!(fetched.allows(PERMISSION_READ));
    assert!(!fetched.allows(PERMISSION_WRITE));
}

#[test]
fn no_handles_outlive_their_session() {
    let (backing, store) = open();
    store.add_entry(&entry(1, 8, "alice", 0)).expect("add");
    store.get_entries_by_ids_batched(&[1, 2], 8).expect("lookup");
    store.remove_all_entries(8).expect("remove");
    backing.fail_next(1);
    store.get_entry(1, 8).expect_err("injected failure");
    assert_eq!(backing.stats().leaked_handles, 0);
}

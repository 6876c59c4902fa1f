use super::*;
use crate::records::{
    AceType, ContainerStatus, NEXT_HEARTBEAT_TABLE, NodeCore, NodeState, UpdatedContainerInfo,
};
use crate::repository::SubRecord;
use crate::session::SessionProvider;
use crate::storage::memory::MemoryStore;

fn metadata() -> (MemoryStore, MetadataStore) {
    let backing = MemoryStore::default();
    let store = MetadataStore::new(Arc::new(backing.clone()), MetadataConfig::default());
    (backing, store)
}

fn ace(id: i32, inode_id: i32, index: i32) -> Ace {
    Ace {
        id,
        inode_id,
        subject: format!("user{id}"),
        ace_type: AceType::Access,
        is_default: false,
        permission: 0b100,
        index,
    }
}

fn core(node_id: &str) -> NodeCore {
    NodeCore {
        node_id: node_id.into(),
        host_name: Some("worker-1".into()),
        command_port: 8041,
        http_port: 8042,
        health_report: "healthy".into(),
        last_health_report_time: 1_700_000_000_000,
        current_state: NodeState::Running,
        node_manager_version: "3.2.0".into(),
        pending_event_id: None,
    }
}

fn seed_rows<R: SubRecord>(backing: &MemoryStore, records: &[R]) {
    let mut session = backing.obtain_session().expect("session");
    session
        .save_all(R::TABLE, records.iter().map(SubRecord::to_row).collect())
        .expect("seed rows");
}

#[test]
fn snapshot_assembly_uses_a_single_flush() {
    let (backing, store) = metadata();
    seed_rows(&backing, &[core("n1:8041")]);
    seed_rows(
        &backing,
        &[
            UpdatedContainerInfo {
                node_id: "n1:8041".into(),
                container_id: "c1".into(),
                update_seq: 1,
                pending_event_id: 1,
            },
            UpdatedContainerInfo {
                node_id: "n1:8041".into(),
                container_id: "c2".into(),
                update_seq: 1,
                pending_event_id: 1,
            },
        ],
    );
    let before = backing.stats();

    let snapshot = store
        .find_node_snapshot("n1:8041")
        .expect("find")
        .expect("node exists");
    let after = backing.stats();

    assert_eq!(after.flushes - before.flushes, 1);
    // core + heartbeat + one status per container update
    assert_eq!(after.point_loads - before.point_loads, 4);
    assert_eq!(after.leaked_handles, 0);
    assert!(snapshot.container_statuses.is_empty());
    assert_eq!(snapshot.updated_container_infos.len(), 2);
}

#[test]
fn failed_flush_aborts_assembly_and_releases_handles() {
    let (backing, store) = metadata();
    seed_rows(&backing, &[core("n1:8041")]);

    // Four owner-scoped reads succeed, the flush of the dependent loads fails.
    backing.fail_on_round_trip(5);
    let err = store
        .find_node_snapshot("n1:8041")
        .expect_err("flush fails");
    assert!(err.is_retryable());
    assert_eq!(backing.stats().leaked_handles, 0);

    let retried = store.find_node_snapshot("n1:8041").expect("retry succeeds");
    assert!(retried.is_some());
}

#[test]
fn failed_pending_event_lookup_returns_no_partial_snapshot() {
    let (backing, store) = metadata();
    let mut with_event = core("n1:8041");
    with_event.pending_event_id = Some(7);
    seed_rows(&backing, &[with_event]);

    backing.fail_on_round_trip(6);
    let err = store
        .find_node_snapshot("n1:8041")
        .expect_err("pending event lookup fails");
    assert_eq!(err.code_str(), "storage_failure");
    assert_eq!(backing.stats().leaked_handles, 0);
}

#[test]
fn heartbeat_without_core_is_not_a_node() {
    let (backing, store) = metadata();
    let mut session = backing.obtain_session().expect("session");
    session
        .save_all(
            &NEXT_HEARTBEAT_TABLE,
            vec![
                crate::records::NextHeartbeat {
                    node_id: "ghost:1".into(),
                    next_heartbeat: true,
                    pending_event_id: 0,
                }
                .to_row(),
            ],
        )
        .expect("seed");

    assert_eq!(store.find_node_snapshot("ghost:1").expect("find"), None);
    assert!(!store.node_exists("ghost:1").expect("exists"));
}

#[test]
fn blank_node_id_is_rejected_before_any_round_trip() {
    let (backing, store) = metadata();
    let err = store.find_node_snapshot("  ").expect_err("blank id");
    assert_eq!(err.code_str(), "invalid_key");
    assert_eq!(backing.stats().round_trips(), 0);
}

#[test]
fn status_rows_follow_info_order() {
    let (backing, store) = metadata();
    seed_rows(&backing, &[core("n1:8041")]);
    let infos: Vec<UpdatedContainerInfo> = [("c2", 1), ("c1", 2), ("c1", 1)]
        .into_iter()
        .map(|(container_id, update_seq)| UpdatedContainerInfo {
            node_id: "n1:8041".into(),
            container_id: container_id.into(),
            update_seq,
            pending_event_id: 3,
        })
        .collect();
    let statuses: Vec<ContainerStatus> = infos
        .iter()
        .map(|info| ContainerStatus {
            container_id: info.container_id.clone(),
            node_id: info.node_id.clone(),
            update_seq: info.update_seq,
            state: "RUNNING".into(),
            diagnostics: format!("seq {}", info.update_seq),
            exit_status: 0,
            pending_event_id: 3,
        })
        .collect();
    seed_rows(&backing, &infos);
    seed_rows(&backing, &statuses);

    let snapshot = store
        .find_node_snapshot("n1:8041")
        .expect("find")
        .expect("node exists");
    let order: Vec<(&str, i32)> = snapshot
        .updated_container_infos
        .iter()
        .map(|i| (i.container_id.as_str(), i.update_seq))
        .collect();
    assert_eq!(order, vec![("c1", 1), ("c1", 2), ("c2", 1)]);
    for (info, status) in snapshot
        .updated_container_infos
        .iter()
        .zip(&snapshot.container_statuses)
    {
        assert_eq!(info.status_key(), status.key());
    }
}

#[test]
fn ace_operations_leave_no_live_handles() {
    let (backing, store) = metadata();
    store.add_entry(&ace(1, 42, 0)).expect("add");
    store.add_entry(&ace(2, 42, 1)).expect("add");
    store.list_entries_by_owner(42).expect("list");
    store
        .get_entries_by_ids_batched(&[1, 2, 3], 42)
        .expect("batched");
    store.get_entry(1, 42).expect("get");
    store.stage_entries(&[ace(1, 42, 0)], &[]).expect("stage");
    store.remove_all_entries(42).expect("remove");
    assert_eq!(backing.stats().leaked_handles, 0);
}

use crate::catalog::types::Value;
use crate::config::MetadataConfig;
use crate::error::MetadataError;
use crate::records::{
    ContainerStatus, ContainerToClean, FinishedApplication, NextHeartbeat, NodeCore, PendingEvent,
    PendingEventKey, ResourceCapacity, UpdatedContainerInfo,
};
use crate::repository::{Repository, SubRecord, check_key};
use crate::session::{HandleScope, Session, SessionProvider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Point-in-time view of a worker node. Parts may come from different
/// transactions; callers wanting fresher state fetch again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    pub core: NodeCore,
    pub next_heartbeat: Option<NextHeartbeat>,
    pub resource: Option<ResourceCapacity>,
    pub pending_event: Option<PendingEvent>,
    /// Sorted by `(container_id, update_seq)`.
    pub updated_container_infos: Vec<UpdatedContainerInfo>,
    /// One entry per info whose status row exists, in info order.
    pub container_statuses: Vec<ContainerStatus>,
    /// Sorted by container id.
    pub containers_to_clean: Vec<ContainerToClean>,
    /// Sorted by application id.
    pub finished_applications: Vec<FinishedApplication>,
    /// Node id as reported to the scheduler; see [`reported_node_id`].
    pub reported_node_id: Option<String>,
}

impl NodeSnapshot {
    pub fn container_ids_to_clean(&self) -> BTreeSet<&str> {
        self.containers_to_clean
            .iter()
            .map(|c| c.container_id.as_str())
            .collect()
    }

    pub fn finished_application_ids(&self) -> BTreeSet<&str> {
        self.finished_applications
            .iter()
            .map(|a| a.application_id.as_str())
            .collect()
    }

    /// Status recorded for `info`, matched by container, node and update sequence.
    pub fn status_for(&self, info: &UpdatedContainerInfo) -> Option<&ContainerStatus> {
        let key = info.status_key();
        self.container_statuses.iter().find(|s| s.key() == key)
    }

    fn check_parts_belong_to_node(&self) -> Result<(), MetadataError> {
        let node_id = self.node_id.as_str();
        let foreign = [
            (NodeCore::TABLE.name, self.core.node_id != node_id),
            (
                NextHeartbeat::TABLE.name,
                self.next_heartbeat.as_ref().is_some_and(|h| h.node_id != node_id),
            ),
            (
                ResourceCapacity::TABLE.name,
                self.resource.as_ref().is_some_and(|r| r.node_id != node_id),
            ),
            (
                PendingEvent::TABLE.name,
                self.pending_event.as_ref().is_some_and(|e| e.node_id != node_id),
            ),
            (
                UpdatedContainerInfo::TABLE.name,
                self.updated_container_infos.iter().any(|i| i.node_id != node_id),
            ),
            (
                ContainerStatus::TABLE.name,
                self.container_statuses.iter().any(|s| s.node_id != node_id),
            ),
            (
                ContainerToClean::TABLE.name,
                self.containers_to_clean.iter().any(|c| c.node_id != node_id),
            ),
            (
                FinishedApplication::TABLE.name,
                self.finished_applications.iter().any(|a| a.node_id != node_id),
            ),
        ];
        match foreign.iter().find(|(_, mismatch)| *mismatch).map(|&(table, _)| table) {
            Some(table) => Err(MetadataError::invalid_key(
                table,
                format!("part does not belong to node '{node_id}'"),
            )),
            None => Ok(()),
        }
    }
}

/// The pending event's own node id when an event exists, otherwise the core
/// record's node id. `None` only when the node is entirely absent.
pub fn reported_node_id(
    pending_event: Option<&PendingEvent>,
    core: Option<&NodeCore>,
) -> Option<String> {
    pending_event
        .map(|event| event.node_id.clone())
        .or_else(|| core.map(|core| core.node_id.clone()))
}

pub struct NodeSnapshotStore {
    provider: Arc<dyn SessionProvider>,
    slow_operation_threshold: Duration,
    cores: Repository<NodeCore>,
    heartbeats: Repository<NextHeartbeat>,
    resources: Repository<ResourceCapacity>,
    pending_events: Repository<PendingEvent>,
    updated_infos: Repository<UpdatedContainerInfo>,
    statuses: Repository<ContainerStatus>,
    to_clean: Repository<ContainerToClean>,
    finished: Repository<FinishedApplication>,
}

impl NodeSnapshotStore {
    pub fn new(provider: Arc<dyn SessionProvider>, config: &MetadataConfig) -> Self {
        Self {
            provider,
            slow_operation_threshold: Duration::from_millis(config.slow_operation_threshold_ms),
            cores: Repository::new(config),
            heartbeats: Repository::new(config),
            resources: Repository::new(config),
            pending_events: Repository::new(config),
            updated_infos: Repository::new(config),
            statuses: Repository::new(config),
            to_clean: Repository::new(config),
            finished: Repository::new(config),
        }
    }

    /// Assembles the snapshot of `node_id`, or `None` when the node's core
    /// record is missing or has no host name.
    pub fn find_by_node_id(&self, node_id: &str) -> Result<Option<NodeSnapshot>, MetadataError> {
        check_node_id(node_id)?;
        let started = Instant::now();
        let mut session = self.provider.obtain_session()?;
        let result = self.assemble(session.as_mut(), node_id);
        self.record_elapsed("find_by_node_id", node_id, started);
        result
    }

    /// Checks only the core record: one deferred load and one flush.
    pub fn exists(&self, node_id: &str) -> Result<bool, MetadataError> {
        check_node_id(node_id)?;
        let mut session = self.provider.obtain_session()?;
        let mut scope = HandleScope::new(session.as_mut());
        let core = scope.load(NodeCore::TABLE, NodeCore::key_values(&node_id.to_string()))?;
        scope.flush()?;
        Ok(scope
            .decode::<NodeCore>(core)?
            .is_some_and(|core| core.has_host()))
    }

    /// Writes every part of `snapshot`, one save batch per sub-table, in one
    /// session. Parts must all belong to `snapshot.node_id`.
    pub fn persist(&self, snapshot: &NodeSnapshot) -> Result<(), MetadataError> {
        check_node_id(&snapshot.node_id)?;
        snapshot.check_parts_belong_to_node()?;
        let started = Instant::now();
        let mut session = self.provider.obtain_session()?;
        let session = session.as_mut();

        self.cores.add_all(session, std::slice::from_ref(&snapshot.core))?;
        if let Some(heartbeat) = &snapshot.next_heartbeat {
            self.heartbeats.add_all(session, std::slice::from_ref(heartbeat))?;
        }
        if let Some(resource) = &snapshot.resource {
            self.resources.add_all(session, std::slice::from_ref(resource))?;
        }
        if let Some(event) = &snapshot.pending_event {
            self.pending_events.add_all(session, std::slice::from_ref(event))?;
        }
        self.updated_infos
            .add_all(session, &snapshot.updated_container_infos)?;
        self.statuses.add_all(session, &snapshot.container_statuses)?;
        self.to_clean.add_all(session, &snapshot.containers_to_clean)?;
        self.finished
            .add_all(session, &snapshot.finished_applications)?;

        self.record_elapsed("persist", &snapshot.node_id, started);
        Ok(())
    }

    /// Deletes every part stored for `node_id`. Returns whether a core record
    /// was removed.
    pub fn remove(&self, node_id: &str) -> Result<bool, MetadataError> {
        check_node_id(node_id)?;
        let mut session = self.provider.obtain_session()?;
        let session = session.as_mut();

        self.statuses.remove_all_by_owner(session, node_id)?;
        self.updated_infos.remove_all_by_owner(session, node_id)?;
        self.to_clean.remove_all_by_owner(session, node_id)?;
        self.finished.remove_all_by_owner(session, node_id)?;
        self.pending_events.remove_all_by_owner(session, node_id)?;
        self.resources.remove_all_by_owner(session, node_id)?;
        self.heartbeats.remove_all_by_owner(session, node_id)?;
        let removed = self.cores.remove_all_by_owner(session, node_id)? > 0;
        debug!(node_id, removed, "node removed");
        Ok(removed)
    }

    fn assemble(
        &self,
        session: &mut dyn Session,
        node_id: &str,
    ) -> Result<Option<NodeSnapshot>, MetadataError> {
        let owned_id = node_id.to_string();

        // Independent owner-scoped reads.
        let mut updated_container_infos = self.updated_infos.get_by_owner(session, node_id)?;
        updated_container_infos.sort_by(|a, b| {
            (&a.container_id, a.update_seq).cmp(&(&b.container_id, b.update_seq))
        });
        let resource = self.resources.find(session, &owned_id)?;
        let mut containers_to_clean = self.to_clean.get_by_owner(session, node_id)?;
        containers_to_clean.sort_by(|a, b| a.container_id.cmp(&b.container_id));
        let mut finished_applications = self.finished.get_by_owner(session, node_id)?;
        finished_applications.sort_by(|a, b| a.application_id.cmp(&b.application_id));

        // Dependent point loads, materialized by one flush.
        let mut scope = HandleScope::new(session);
        let core_handle = scope.load(NodeCore::TABLE, NodeCore::key_values(&owned_id))?;
        let heartbeat_handle =
            scope.load(NextHeartbeat::TABLE, NextHeartbeat::key_values(&owned_id))?;
        let mut status_handles = Vec::with_capacity(updated_container_infos.len());
        for info in &updated_container_infos {
            let key = ContainerStatus::key_values(&info.status_key());
            status_handles.push(scope.load(ContainerStatus::TABLE, key)?);
        }
        scope.flush()?;

        let core = match scope.decode::<NodeCore>(core_handle)? {
            Some(core) if core.has_host() => core,
            _ => {
                debug!(node_id, "node not found");
                return Ok(None);
            }
        };
        let next_heartbeat = scope.decode::<NextHeartbeat>(heartbeat_handle)?;
        let container_statuses = scope.decode_all::<ContainerStatus>(&status_handles)?;
        if container_statuses.len() != updated_container_infos.len() {
            debug!(
                node_id,
                infos = updated_container_infos.len(),
                statuses = container_statuses.len(),
                "container statuses missing for some updates"
            );
        }

        let pending_event = match core.pending_event_id {
            Some(event_id) => self.pending_events.find(
                scope.session(),
                &PendingEventKey {
                    event_id,
                    node_id: owned_id.clone(),
                },
            )?,
            None => None,
        };
        let reported_node_id = reported_node_id(pending_event.as_ref(), Some(&core));

        Ok(Some(NodeSnapshot {
            node_id: owned_id,
            core,
            next_heartbeat,
            resource,
            pending_event,
            updated_container_infos,
            container_statuses,
            containers_to_clean,
            finished_applications,
            reported_node_id,
        }))
    }

    fn record_elapsed(&self, op: &'static str, node_id: &str, started: Instant) {
        let elapsed = started.elapsed();
        let elapsed_micros = micros(elapsed);
        if elapsed > self.slow_operation_threshold {
            warn!(op, node_id, elapsed_micros, "slow node snapshot operation");
        } else {
            debug!(op, node_id, elapsed_micros, "node snapshot operation");
        }
    }
}

fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

fn check_node_id(node_id: &str) -> Result<(), MetadataError> {
    check_key(NodeCore::TABLE, &[Value::text(node_id)])
}

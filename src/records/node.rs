use crate::catalog::types::{ColumnType, Row, Value};
use crate::catalog::{ColumnDef, KeyValues, TableDef};
use crate::repository::{
    RowDecodeError, SubRecord, TryFromRow, bool_at, i32_at, i64_at, opt_i32_at, opt_text_at,
    text_at,
};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

pub static RMNODE_TABLE: TableDef = TableDef {
    name: "yarn_rmnode",
    columns: &[
        ColumnDef::required("rmnodeid", ColumnType::Text),
        ColumnDef::nullable("hostname", ColumnType::Text),
        ColumnDef::required("commandport", ColumnType::Integer),
        ColumnDef::required("httpport", ColumnType::Integer),
        ColumnDef::required("healthreport", ColumnType::Text),
        ColumnDef::required("lasthealthreporttime", ColumnType::Integer),
        ColumnDef::required("currentstate", ColumnType::Text),
        ColumnDef::required("nodemanager_version", ColumnType::Text),
        ColumnDef::nullable("pendingeventid", ColumnType::Integer),
    ],
    primary_key: &[0],
    owner_column: 0,
};

pub static NEXT_HEARTBEAT_TABLE: TableDef = TableDef {
    name: "yarn_nextheartbeat",
    columns: &[
        ColumnDef::required("rmnodeid", ColumnType::Text),
        ColumnDef::required("nextheartbeat", ColumnType::Boolean),
        ColumnDef::required("pendingeventid", ColumnType::Integer),
    ],
    primary_key: &[0],
    owner_column: 0,
};

pub static RESOURCE_TABLE: TableDef = TableDef {
    name: "yarn_resource",
    columns: &[
        ColumnDef::required("id", ColumnType::Text),
        ColumnDef::required("memory", ColumnType::Integer),
        ColumnDef::required("virtualcores", ColumnType::Integer),
        ColumnDef::required("pendingeventid", ColumnType::Integer),
    ],
    primary_key: &[0],
    owner_column: 0,
};

pub static PENDING_EVENT_TABLE: TableDef = TableDef {
    name: "yarn_pendingevents",
    columns: &[
        ColumnDef::required("id", ColumnType::Integer),
        ColumnDef::required("rmnodeid", ColumnType::Text),
        ColumnDef::required("type", ColumnType::Integer),
        ColumnDef::required("status", ColumnType::Integer),
        ColumnDef::required("contains", ColumnType::Integer),
    ],
    primary_key: &[0, 1],
    owner_column: 1,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    New,
    Running,
    Unhealthy,
    Decommissioned,
    Lost,
    Rebooted,
    Shutdown,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::New => "NEW",
            NodeState::Running => "RUNNING",
            NodeState::Unhealthy => "UNHEALTHY",
            NodeState::Decommissioned => "DECOMMISSIONED",
            NodeState::Lost => "LOST",
            NodeState::Rebooted => "REBOOTED",
            NodeState::Shutdown => "SHUTDOWN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEW" => Some(NodeState::New),
            "RUNNING" => Some(NodeState::Running),
            "UNHEALTHY" => Some(NodeState::Unhealthy),
            "DECOMMISSIONED" => Some(NodeState::Decommissioned),
            "LOST" => Some(NodeState::Lost),
            "REBOOTED" => Some(NodeState::Rebooted),
            "SHUTDOWN" => Some(NodeState::Shutdown),
            _ => None,
        }
    }

    pub fn is_usable(self) -> bool {
        matches!(self, NodeState::New | NodeState::Running)
    }
}

/// Core attributes of a worker node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCore {
    pub node_id: String,
    /// Empty or absent means the node does not exist.
    pub host_name: Option<String>,
    pub command_port: i32,
    pub http_port: i32,
    pub health_report: String,
    pub last_health_report_time: i64,
    pub current_state: NodeState,
    pub node_manager_version: String,
    pub pending_event_id: Option<i32>,
}

impl NodeCore {
    pub fn has_host(&self) -> bool {
        self.host_name.as_deref().is_some_and(|h| !h.is_empty())
    }
}

impl TryFromRow for NodeCore {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        let state = text_at(&row, 6, "currentstate")?;
        let current_state = NodeState::parse(state).ok_or_else(|| RowDecodeError::Custom {
            message: format!("unknown node state '{state}'"),
        })?;
        Ok(Self {
            node_id: text_at(&row, 0, "rmnodeid")?.to_string(),
            host_name: opt_text_at(&row, 1, "hostname")?.map(str::to_string),
            command_port: i32_at(&row, 2, "commandport")?,
            http_port: i32_at(&row, 3, "httpport")?,
            health_report: text_at(&row, 4, "healthreport")?.to_string(),
            last_health_report_time: i64_at(&row, 5, "lasthealthreporttime")?,
            current_state,
            node_manager_version: text_at(&row, 7, "nodemanager_version")?.to_string(),
            pending_event_id: opt_i32_at(&row, 8, "pendingeventid")?,
        })
    }
}

impl SubRecord for NodeCore {
    type Key = String;
    type Owner = str;

    const TABLE: &'static TableDef = &RMNODE_TABLE;

    fn key(&self) -> String {
        self.node_id.clone()
    }

    fn key_values(key: &String) -> KeyValues {
        smallvec![Value::text(key)]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::text(&self.node_id),
            Value::opt_text(self.host_name.as_deref()),
            Value::from(self.command_port),
            Value::from(self.http_port),
            Value::text(&self.health_report),
            Value::Integer(self.last_health_report_time),
            Value::text(self.current_state.as_str()),
            Value::text(&self.node_manager_version),
            self.pending_event_id.map_or(Value::Null, Value::from),
        ])
    }
}

/// Whether the node is due a heartbeat response on its next report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHeartbeat {
    pub node_id: String,
    pub next_heartbeat: bool,
    pub pending_event_id: i32,
}

impl TryFromRow for NextHeartbeat {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            node_id: text_at(&row, 0, "rmnodeid")?.to_string(),
            next_heartbeat: bool_at(&row, 1, "nextheartbeat")?,
            pending_event_id: i32_at(&row, 2, "pendingeventid")?,
        })
    }
}

impl SubRecord for NextHeartbeat {
    type Key = String;
    type Owner = str;

    const TABLE: &'static TableDef = &NEXT_HEARTBEAT_TABLE;

    fn key(&self) -> String {
        self.node_id.clone()
    }

    fn key_values(key: &String) -> KeyValues {
        smallvec![Value::text(key)]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::text(&self.node_id),
            Value::Boolean(self.next_heartbeat),
            Value::from(self.pending_event_id),
        ])
    }
}

/// Total capacity the node advertises to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapacity {
    pub node_id: String,
    pub memory_mb: i64,
    pub virtual_cores: i32,
    pub pending_event_id: i32,
}

impl TryFromRow for ResourceCapacity {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            node_id: text_at(&row, 0, "id")?.to_string(),
            memory_mb: i64_at(&row, 1, "memory")?,
            virtual_cores: i32_at(&row, 2, "virtualcores")?,
            pending_event_id: i32_at(&row, 3, "pendingeventid")?,
        })
    }
}

impl SubRecord for ResourceCapacity {
    type Key = String;
    type Owner = str;

    const TABLE: &'static TableDef = &RESOURCE_TABLE;

    fn key(&self) -> String {
        self.node_id.clone()
    }

    fn key_values(key: &String) -> KeyValues {
        smallvec![Value::text(key)]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::text(&self.node_id),
            Value::Integer(self.memory_mb),
            Value::from(self.virtual_cores),
            Value::from(self.pending_event_id),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingEventType {
    NodeAdded,
    NodeRemoved,
    NodeUpdated,
}

impl PendingEventType {
    pub fn code(self) -> i64 {
        match self {
            PendingEventType::NodeAdded => 0,
            PendingEventType::NodeRemoved => 1,
            PendingEventType::NodeUpdated => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PendingEventType::NodeAdded),
            1 => Some(PendingEventType::NodeRemoved),
            2 => Some(PendingEventType::NodeUpdated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingEventStatus {
    New,
    Scheduled,
    Completed,
}

impl PendingEventStatus {
    pub fn code(self) -> i64 {
        match self {
            PendingEventStatus::New => 0,
            PendingEventStatus::Scheduled => 1,
            PendingEventStatus::Completed => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PendingEventStatus::New),
            1 => Some(PendingEventStatus::Scheduled),
            2 => Some(PendingEventStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingEventKey {
    pub event_id: i32,
    pub node_id: String,
}

/// The node's outstanding state-change event, at most one per node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    pub event_id: i32,
    pub node_id: String,
    pub event_type: PendingEventType,
    pub status: PendingEventStatus,
    /// Number of sub-records written under this event.
    pub contains: i32,
}

impl TryFromRow for PendingEvent {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        let type_code = i64_at(&row, 2, "type")?;
        let status_code = i64_at(&row, 3, "status")?;
        Ok(Self {
            event_id: i32_at(&row, 0, "id")?,
            node_id: text_at(&row, 1, "rmnodeid")?.to_string(),
            event_type: PendingEventType::from_code(type_code).ok_or_else(|| {
                RowDecodeError::Custom {
                    message: format!("unknown pending event type code {type_code}"),
                }
            })?,
            status: PendingEventStatus::from_code(status_code).ok_or_else(|| {
                RowDecodeError::Custom {
                    message: format!("unknown pending event status code {status_code}"),
                }
            })?,
            contains: i32_at(&row, 4, "contains")?,
        })
    }
}

impl SubRecord for PendingEvent {
    type Key = PendingEventKey;
    type Owner = str;

    const TABLE: &'static TableDef = &PENDING_EVENT_TABLE;

    fn key(&self) -> PendingEventKey {
        PendingEventKey {
            event_id: self.event_id,
            node_id: self.node_id.clone(),
        }
    }

    fn key_values(key: &PendingEventKey) -> KeyValues {
        smallvec![Value::from(key.event_id), Value::text(&key.node_id)]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::from(self.event_id),
            Value::text(&self.node_id),
            Value::Integer(self.event_type.code()),
            Value::Integer(self.status.code()),
            Value::from(self.contains),
        ])
    }
}

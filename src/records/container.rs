use crate::catalog::types::{ColumnType, Row, Value};
use crate::catalog::{ColumnDef, KeyValues, TableDef};
use crate::repository::{RowDecodeError, SubRecord, TryFromRow, i32_at, text_at};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

pub static UPDATED_CONTAINER_INFO_TABLE: TableDef = TableDef {
    name: "yarn_updatedcontainerinfo",
    columns: &[
        ColumnDef::required("rmnodeid", ColumnType::Text),
        ColumnDef::required("containerid", ColumnType::Text),
        ColumnDef::required("updatedcontainerinfoid", ColumnType::Integer),
        ColumnDef::required("pendingeventid", ColumnType::Integer),
    ],
    primary_key: &[0, 1, 2],
    owner_column: 0,
};

pub static CONTAINER_STATUS_TABLE: TableDef = TableDef {
    name: "yarn_containerstatus",
    columns: &[
        ColumnDef::required("containerid", ColumnType::Text),
        ColumnDef::required("rmnodeid", ColumnType::Text),
        ColumnDef::required("uciid", ColumnType::Integer),
        ColumnDef::required("state", ColumnType::Text),
        ColumnDef::required("diagnostics", ColumnType::Text),
        ColumnDef::required("exitstatus", ColumnType::Integer),
        ColumnDef::required("pendingeventid", ColumnType::Integer),
    ],
    primary_key: &[0, 1, 2],
    owner_column: 1,
};

pub static CONTAINER_TO_CLEAN_TABLE: TableDef = TableDef {
    name: "yarn_containerid_toclean",
    columns: &[
        ColumnDef::required("rmnodeid", ColumnType::Text),
        ColumnDef::required("containerid", ColumnType::Text),
        ColumnDef::required("pendingeventid", ColumnType::Integer),
    ],
    primary_key: &[0, 1],
    owner_column: 0,
};

pub static FINISHED_APPLICATION_TABLE: TableDef = TableDef {
    name: "yarn_rmnode_finishedapplications",
    columns: &[
        ColumnDef::required("rmnodeid", ColumnType::Text),
        ColumnDef::required("applicationid", ColumnType::Text),
        ColumnDef::required("pendingeventid", ColumnType::Integer),
    ],
    primary_key: &[0, 1],
    owner_column: 0,
};

/// Identifies one container status delta: which container, on which node,
/// at which update sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerUpdateKey {
    pub container_id: String,
    pub node_id: String,
    pub update_seq: i32,
}

/// A container status change reported by the node and not yet consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedContainerInfo {
    pub node_id: String,
    pub container_id: String,
    pub update_seq: i32,
    pub pending_event_id: i32,
}

impl UpdatedContainerInfo {
    /// Key of the matching [`ContainerStatus`] row.
    pub fn status_key(&self) -> ContainerUpdateKey {
        ContainerUpdateKey {
            container_id: self.container_id.clone(),
            node_id: self.node_id.clone(),
            update_seq: self.update_seq,
        }
    }
}

impl TryFromRow for UpdatedContainerInfo {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            node_id: text_at(&row, 0, "rmnodeid")?.to_string(),
            container_id: text_at(&row, 1, "containerid")?.to_string(),
            update_seq: i32_at(&row, 2, "updatedcontainerinfoid")?,
            pending_event_id: i32_at(&row, 3, "pendingeventid")?,
        })
    }
}

impl SubRecord for UpdatedContainerInfo {
    type Key = ContainerUpdateKey;
    type Owner = str;

    const TABLE: &'static TableDef = &UPDATED_CONTAINER_INFO_TABLE;

    fn key(&self) -> ContainerUpdateKey {
        self.status_key()
    }

    fn key_values(key: &ContainerUpdateKey) -> KeyValues {
        smallvec![
            Value::text(&key.node_id),
            Value::text(&key.container_id),
            Value::from(key.update_seq),
        ]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::text(&self.node_id),
            Value::text(&self.container_id),
            Value::from(self.update_seq),
            Value::from(self.pending_event_id),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub container_id: String,
    pub node_id: String,
    pub update_seq: i32,
    pub state: String,
    pub diagnostics: String,
    pub exit_status: i32,
    pub pending_event_id: i32,
}

impl TryFromRow for ContainerStatus {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            container_id: text_at(&row, 0, "containerid")?.to_string(),
            node_id: text_at(&row, 1, "rmnodeid")?.to_string(),
            update_seq: i32_at(&row, 2, "uciid")?,
            state: text_at(&row, 3, "state")?.to_string(),
            diagnostics: text_at(&row, 4, "diagnostics")?.to_string(),
            exit_status: i32_at(&row, 5, "exitstatus")?,
            pending_event_id: i32_at(&row, 6, "pendingeventid")?,
        })
    }
}

impl SubRecord for ContainerStatus {
    type Key = ContainerUpdateKey;
    type Owner = str;

    const TABLE: &'static TableDef = &CONTAINER_STATUS_TABLE;

    fn key(&self) -> ContainerUpdateKey {
        ContainerUpdateKey {
            container_id: self.container_id.clone(),
            node_id: self.node_id.clone(),
            update_seq: self.update_seq,
        }
    }

    fn key_values(key: &ContainerUpdateKey) -> KeyValues {
        smallvec![
            Value::text(&key.container_id),
            Value::text(&key.node_id),
            Value::from(key.update_seq),
        ]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::text(&self.container_id),
            Value::text(&self.node_id),
            Value::from(self.update_seq),
            Value::text(&self.state),
            Value::text(&self.diagnostics),
            Value::from(self.exit_status),
            Value::from(self.pending_event_id),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeMemberKey {
    pub node_id: String,
    pub member_id: String,
}

/// A container the node must clean up on its next heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerToClean {
    pub node_id: String,
    pub container_id: String,
    pub pending_event_id: i32,
}

impl TryFromRow for ContainerToClean {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            node_id: text_at(&row, 0, "rmnodeid")?.to_string(),
            container_id: text_at(&row, 1, "containerid")?.to_string(),
            pending_event_id: i32_at(&row, 2, "pendingeventid")?,
        })
    }
}

impl SubRecord for ContainerToClean {
    type Key = NodeMemberKey;
    type Owner = str;

    const TABLE: &'static TableDef = &CONTAINER_TO_CLEAN_TABLE;

    fn key(&self) -> NodeMemberKey {
        NodeMemberKey {
            node_id: self.node_id.clone(),
            member_id: self.container_id.clone(),
        }
    }

    fn key_values(key: &NodeMemberKey) -> KeyValues {
        smallvec![Value::text(&key.node_id), Value::text(&key.member_id)]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::text(&self.node_id),
            Value::text(&self.container_id),
            Value::from(self.pending_event_id),
        ])
    }
}

/// An application that finished while it had containers on the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedApplication {
    pub node_id: String,
    pub application_id: String,
    pub pending_event_id: i32,
}

impl TryFromRow for FinishedApplication {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            node_id: text_at(&row, 0, "rmnodeid")?.to_string(),
            application_id: text_at(&row, 1, "applicationid")?.to_string(),
            pending_event_id: i32_at(&row, 2, "pendingeventid")?,
        })
    }
}

impl SubRecord for FinishedApplication {
    type Key = NodeMemberKey;
    type Owner = str;

    const TABLE: &'static TableDef = &FINISHED_APPLICATION_TABLE;

    fn key(&self) -> NodeMemberKey {
        NodeMemberKey {
            node_id: self.node_id.clone(),
            member_id: self.application_id.clone(),
        }
    }

    fn key_values(key: &NodeMemberKey) -> KeyValues {
        smallvec![Value::text(&key.node_id), Value::text(&key.member_id)]
    }

    fn owner_value(owner: &str) -> Value {
        Value::text(owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::text(&self.node_id),
            Value::text(&self.application_id),
            Value::from(self.pending_event_id),
        ])
    }
}

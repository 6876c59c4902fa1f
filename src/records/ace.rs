use crate::catalog::types::{ColumnType, Row, Value};
use crate::catalog::{ColumnDef, KeyValues, TableDef};
use crate::repository::{RowDecodeError, SubRecord, TryFromRow, flag_at, i32_at, i64_at, text_at};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;

pub const PERMISSION_EXECUTE: i32 = 0b001;
pub const PERMISSION_WRITE: i32 = 0b010;
pub const PERMISSION_READ: i32 = 0b100;

pub static ACES_TABLE: TableDef = TableDef {
    name: "hdfs_aces",
    columns: &[
        ColumnDef::required("id", ColumnType::Integer),
        ColumnDef::required("inode_id", ColumnType::Integer),
        ColumnDef::required("subject", ColumnType::Text),
        ColumnDef::required("type", ColumnType::Integer),
        ColumnDef::required("is_default", ColumnType::Boolean),
        ColumnDef::required("permission", ColumnType::Integer),
        ColumnDef::required("index", ColumnType::Integer),
    ],
    primary_key: &[0, 1],
    owner_column: 1,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AceType {
    Access,
    Default,
}

impl AceType {
    pub fn code(self) -> i64 {
        match self {
            AceType::Access => 0,
            AceType::Default => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AceType::Access),
            1 => Some(AceType::Default),
            _ => None,
        }
    }
}

/// Composite key of an access-control entry. `id` is unique only within the
/// owning inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AceKey {
    pub id: i32,
    pub inode_id: i32,
}

/// Access-control entry attached to a filesystem inode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    pub id: i32,
    pub inode_id: i32,
    pub subject: String,
    pub ace_type: AceType,
    pub is_default: bool,
    /// Bitmask of `PERMISSION_*` flags.
    pub permission: i32,
    /// Position within the owner's ordered ACL.
    pub index: i32,
}

impl Ace {
    pub fn ace_key(&self) -> AceKey {
        AceKey {
            id: self.id,
            inode_id: self.inode_id,
        }
    }

    pub fn allows(&self, flag: i32) -> bool {
        self.permission & flag == flag
    }
}

impl TryFromRow for Ace {
    fn try_from_row(row: Row) -> Result<Self, RowDecodeError> {
        let type_code = i64_at(&row, 3, "type")?;
        let ace_type = AceType::from_code(type_code).ok_or_else(|| RowDecodeError::Custom {
            message: format!("unknown ace type code {type_code}"),
        })?;
        Ok(Self {
            id: i32_at(&row, 0, "id")?,
            inode_id: i32_at(&row, 1, "inode_id")?,
            subject: text_at(&row, 2, "subject")?.to_string(),
            ace_type,
            is_default: flag_at(&row, 4, "is_default")?,
            permission: i32_at(&row, 5, "permission")?,
            index: i32_at(&row, 6, "index")?,
        })
    }
}

impl SubRecord for Ace {
    type Key = AceKey;
    type Owner = i32;

    const TABLE: &'static TableDef = &ACES_TABLE;

    fn key(&self) -> AceKey {
        self.ace_key()
    }

    fn key_values(key: &AceKey) -> KeyValues {
        smallvec![Value::from(key.id), Value::from(key.inode_id)]
    }

    fn owner_value(owner: &i32) -> Value {
        Value::from(*owner)
    }

    fn to_row(&self) -> Row {
        Row::from_values(vec![
            Value::from(self.id),
            Value::from(self.inode_id),
            Value::text(&self.subject),
            Value::Integer(self.ace_type.code()),
            Value::Boolean(self.is_default),
            Value::from(self.permission),
            Value::from(self.index),
        ])
    }
}

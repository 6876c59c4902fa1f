pub mod types;

use crate::catalog::types::{ColumnType, Row, Value};
use smallvec::SmallVec;

/// Primary-key values in declared key order. Every table key has at most
/// three parts.
pub type KeyValues = SmallVec<[Value; 3]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
        }
    }
}

/// Static shape of one backing-store table.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// Column positions forming the primary key, in key order.
    pub primary_key: &'static [usize],
    /// Column holding the owning entity's id.
    pub owner_column: usize,
}

impl TableDef {
    pub fn owner_column_name(&self) -> &'static str {
        self.columns[self.owner_column].name
    }

    /// Extracts the primary key from a full row.
    pub fn key_of(&self, row: &Row) -> Option<KeyValues> {
        self.primary_key
            .iter()
            .map(|&idx| row.values.get(idx).cloned())
            .collect()
    }

    /// Checks arity, nullability and column types of a row about to be written.
    pub fn check_row(&self, row: &Row) -> Result<(), String> {
        if row.values.len() != self.columns.len() {
            return Err(format!(
                "expected {} columns, got {}",
                self.columns.len(),
                row.values.len()
            ));
        }
        for (column, value) in self.columns.iter().zip(&row.values) {
            if matches!(value, Value::Null) {
                if !column.nullable || self.primary_key_contains(column.name) {
                    return Err(format!("column '{}' may not be NULL", column.name));
                }
                continue;
            }
            if !value.matches_type(column.col_type) {
                return Err(format!(
                    "column '{}' expects {:?}, got {value}",
                    column.name, column.col_type
                ));
            }
        }
        Ok(())
    }

    fn primary_key_contains(&self, column: &str) -> bool {
        self.primary_key
            .iter()
            .any(|&idx| self.columns[idx].name == column)
    }
}

pub fn format_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

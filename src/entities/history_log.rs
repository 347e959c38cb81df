//! History log entity - The undo/redo journal for ledger mutations.
//!
//! Every create, update and delete of a stock operation or transaction
//! appends one entry holding a JSON snapshot of the row (and, for updates,
//! the pre-change state). Undone entries stay in place flagged `is_undone`
//! until the next fresh mutation discards them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which ledger table a journal entry refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum TargetTable {
    /// Bulk stock movements
    #[sea_orm(string_value = "stock_operation")]
    StockOperation,
    /// Per-vehicle consumption records
    #[sea_orm(string_value = "transaction")]
    Transaction,
}

impl std::fmt::Display for TargetTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StockOperation => "stock_operation",
            Self::Transaction => "transaction",
        };
        write!(f, "{name}")
    }
}

/// What kind of mutation a journal entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// A row was inserted
    #[sea_orm(string_value = "CREATE")]
    Create,
    /// A row was changed in place
    #[sea_orm(string_value = "UPDATE")]
    Update,
    /// A row was removed
    #[sea_orm(string_value = "DELETE")]
    Delete,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        write!(f, "{tag}")
    }
}

/// History journal database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "history_log")]
pub struct Model {
    /// Unique identifier for the journal entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Ledger table the entry refers to
    pub table_name: TargetTable,
    /// Row id the entry refers to; rewritten when undo/redo re-inserts the row
    pub record_id: i64,
    /// Kind of mutation recorded
    pub action_type: ActionType,
    /// JSON snapshot of the row after the mutation (or before, for DELETE)
    pub data_snapshot: String,
    /// JSON snapshot of the row before an UPDATE, absent otherwise
    pub pre_update_snapshot: Option<String>,
    /// When the mutation was journaled
    pub timestamp: DateTimeUtc,
    /// True while the entry sits on the redo side of the journal
    pub is_undone: bool,
    /// Profile the mutated row belongs to
    pub gestiune_id: i64,
}

/// Defines relationships between `HistoryLog` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each journal entry belongs to one profile
    #[sea_orm(
        belongs_to = "super::gestiune::Entity",
        from = "Column::GestiuneId",
        to = "super::gestiune::Column::Id"
    )]
    Gestiune,
}

impl Related<super::gestiune::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gestiune.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

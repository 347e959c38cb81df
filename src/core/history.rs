//! Undo/redo journal - Records and inverts every ledger mutation.
//!
//! Each create, update and delete of a stock operation or consumption
//! transaction appends one journal entry holding a typed snapshot of the row.
//! Undo walks the entries newest-first, inverting them; redo re-applies the
//! most recently undone one. A fresh mutation discards the profile's undone
//! tail, so the journal stays a single linear stack per profile.
//!
//! Re-inserting a deleted row never reuses its original id: the store picks
//! a fresh one and the entry's `record_id` pointer is rewritten, both on the
//! undo of a DELETE and the redo of a CREATE. Autoincrement ids issued since
//! the deletion therefore never collide with a resurrected row.

use crate::{
    entities::{
        ActionType, HistoryLog, StockOperation, TargetTable, Transaction, history_log,
        stock_operation, transaction,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Snapshot of one stock operation row. Only `id` is identity; every other
/// field is restored verbatim by undo/redo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockOperationSnapshot {
    /// Row id at the time the snapshot was taken, never restored
    pub id: i64,
    /// Direction of the movement
    pub operation_type: crate::entities::OperationType,
    /// Quantity in liters
    pub quantity: f64,
    /// When the movement happened
    pub date: chrono::NaiveDateTime,
    /// Free-form note
    pub description: Option<String>,
    /// Attributed company
    pub company_id: Option<i64>,
    /// Owning profile
    pub gestiune_id: i64,
}

/// Snapshot of one consumption transaction row. Only `id` is identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    /// Row id at the time the snapshot was taken, never restored
    pub id: i64,
    /// When the refueling happened
    pub date: chrono::NaiveDateTime,
    /// Vehicle that drew the fuel
    pub vehicle_id: Option<i64>,
    /// Billed company
    pub company_id: Option<i64>,
    /// Quantity in liters
    pub quantity: f64,
    /// Owning profile
    pub gestiune_id: i64,
}

/// Typed snapshot of a journaled row.
///
/// The tag names which ledger table the snapshot belongs to, and each
/// variant spells out its columns, so "which fields may be restored" is
/// checked at compile time instead of being a property of loose JSON maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum RecordSnapshot {
    /// Snapshot of a `stock_operation` row
    StockOperation(StockOperationSnapshot),
    /// Snapshot of a `transaction` row
    Transaction(TransactionSnapshot),
}

impl From<&stock_operation::Model> for RecordSnapshot {
    fn from(model: &stock_operation::Model) -> Self {
        Self::StockOperation(StockOperationSnapshot {
            id: model.id,
            operation_type: model.operation_type,
            quantity: model.quantity,
            date: model.date,
            description: model.description.clone(),
            company_id: model.company_id,
            gestiune_id: model.gestiune_id,
        })
    }
}

impl From<&transaction::Model> for RecordSnapshot {
    fn from(model: &transaction::Model) -> Self {
        Self::Transaction(TransactionSnapshot {
            id: model.id,
            date: model.date,
            vehicle_id: model.vehicle_id,
            company_id: model.company_id,
            quantity: model.quantity,
            gestiune_id: model.gestiune_id,
        })
    }
}

impl RecordSnapshot {
    /// Ledger table this snapshot belongs to.
    #[must_use]
    pub fn table(&self) -> TargetTable {
        match self {
            Self::StockOperation(_) => TargetTable::StockOperation,
            Self::Transaction(_) => TargetTable::Transaction,
        }
    }

    /// Row id recorded in the snapshot.
    #[must_use]
    pub fn record_id(&self) -> i64 {
        match self {
            Self::StockOperation(snap) => snap.id,
            Self::Transaction(snap) => snap.id,
        }
    }

    /// Profile the snapshotted row belongs to.
    #[must_use]
    pub fn gestiune_id(&self) -> i64 {
        match self {
            Self::StockOperation(snap) => snap.gestiune_id,
            Self::Transaction(snap) => snap.gestiune_id,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(Into::into)
    }
}

/// Appends a journal entry inside the caller's database transaction.
///
/// Any fresh mutation invalidates the redo side: all undone entries of the
/// profile are purged first. For UPDATE pass the pre-change state in
/// `pre_snapshot`.
///
/// # Arguments
/// * `action` - Kind of mutation being journaled
/// * `snapshot` - Row state after the mutation (before it, for DELETE)
/// * `pre_snapshot` - Row state before an UPDATE, None otherwise
pub async fn record_action<C: ConnectionTrait>(
    conn: &C,
    action: ActionType,
    snapshot: &RecordSnapshot,
    pre_snapshot: Option<&RecordSnapshot>,
) -> Result<history_log::Model> {
    let gestiune_id = snapshot.gestiune_id();

    HistoryLog::delete_many()
        .filter(history_log::Column::IsUndone.eq(true))
        .filter(history_log::Column::GestiuneId.eq(gestiune_id))
        .exec(conn)
        .await?;

    let pre_json = match pre_snapshot {
        Some(pre) => Some(pre.to_json()?),
        None => None,
    };

    history_log::ActiveModel {
        table_name: Set(snapshot.table()),
        record_id: Set(snapshot.record_id()),
        action_type: Set(action),
        data_snapshot: Set(snapshot.to_json()?),
        pre_update_snapshot: Set(pre_json),
        timestamp: Set(chrono::Utc::now()),
        is_undone: Set(false),
        gestiune_id: Set(gestiune_id),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Whether the profile has an entry left to undo.
pub async fn can_undo(db: &DatabaseConnection, gestiune_id: i64) -> Result<bool> {
    let count = HistoryLog::find()
        .filter(history_log::Column::GestiuneId.eq(gestiune_id))
        .filter(history_log::Column::IsUndone.eq(false))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Whether the profile has an undone entry left to redo.
pub async fn can_redo(db: &DatabaseConnection, gestiune_id: i64) -> Result<bool> {
    let count = HistoryLog::find()
        .filter(history_log::Column::GestiuneId.eq(gestiune_id))
        .filter(history_log::Column::IsUndone.eq(true))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Recent journal entries of a profile, newest first.
pub async fn list_entries(
    db: &DatabaseConnection,
    gestiune_id: i64,
    limit: u64,
) -> Result<Vec<history_log::Model>> {
    use sea_orm::QuerySelect;

    HistoryLog::find()
        .filter(history_log::Column::GestiuneId.eq(gestiune_id))
        .order_by_desc(history_log::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Undoes the profile's most recent active journal entry.
///
/// The inverse runs in one database transaction together with the entry
/// flip; any failure rolls back completely and leaves the entry active.
///
/// # Errors
/// [`Error::NothingToUndo`] when no active entry exists;
/// [`Error::UndoFailed`] wrapping the underlying problem otherwise.
pub async fn undo_last(db: &DatabaseConnection, gestiune_id: i64) -> Result<String> {
    let entry = HistoryLog::find()
        .filter(history_log::Column::GestiuneId.eq(gestiune_id))
        .filter(history_log::Column::IsUndone.eq(false))
        .order_by_desc(history_log::Column::Id)
        .one(db)
        .await?
        .ok_or(Error::NothingToUndo)?;

    let txn = db.begin().await?;
    let applied = apply_undo(&txn, &entry).await;
    match applied {
        Ok(new_record_id) => {
            let action = entry.action_type;
            let table = entry.table_name;
            let mut active: history_log::ActiveModel = entry.into();
            active.is_undone = Set(true);
            if let Some(id) = new_record_id {
                active.record_id = Set(id);
            }
            active.update(&txn).await?;
            txn.commit().await?;

            info!("Undid {action} on {table}");
            Ok(format!("Undid {action} on {table}"))
        }
        Err(e) => {
            txn.rollback().await?;
            warn!("Undo of {} failed: {e}", entry.action_type);
            Err(Error::UndoFailed {
                action: entry.action_type.to_string(),
                message: e.to_string(),
            })
        }
    }
}

/// Redoes the profile's most recently undone journal entry.
///
/// Same transactional contract as [`undo_last`]. Re-creating a row assigns
/// a fresh id and rewrites the entry's pointer, exactly like undo does.
///
/// # Errors
/// [`Error::NothingToRedo`] when no undone entry exists;
/// [`Error::UndoFailed`] wrapping the underlying problem otherwise.
pub async fn redo_last(db: &DatabaseConnection, gestiune_id: i64) -> Result<String> {
    let entry = HistoryLog::find()
        .filter(history_log::Column::GestiuneId.eq(gestiune_id))
        .filter(history_log::Column::IsUndone.eq(true))
        .order_by_desc(history_log::Column::Id)
        .one(db)
        .await?
        .ok_or(Error::NothingToRedo)?;

    let txn = db.begin().await?;
    let applied = apply_redo(&txn, &entry).await;
    match applied {
        Ok(new_record_id) => {
            let action = entry.action_type;
            let table = entry.table_name;
            let mut active: history_log::ActiveModel = entry.into();
            active.is_undone = Set(false);
            if let Some(id) = new_record_id {
                active.record_id = Set(id);
            }
            active.update(&txn).await?;
            txn.commit().await?;

            info!("Redid {action} on {table}");
            Ok(format!("Redid {action} on {table}"))
        }
        Err(e) => {
            txn.rollback().await?;
            warn!("Redo of {} failed: {e}", entry.action_type);
            Err(Error::UndoFailed {
                action: entry.action_type.to_string(),
                message: e.to_string(),
            })
        }
    }
}

/// Applies the inverse of one entry, returning the fresh row id when the
/// inverse re-inserted something.
async fn apply_undo<C: ConnectionTrait>(
    conn: &C,
    entry: &history_log::Model,
) -> Result<Option<i64>> {
    match entry.action_type {
        ActionType::Create => {
            delete_row(conn, entry.table_name, entry.record_id, entry.gestiune_id).await?;
            Ok(None)
        }
        ActionType::Update => {
            // Older entries may lack the pre snapshot; the post state is the
            // best information available then.
            let raw = entry
                .pre_update_snapshot
                .as_deref()
                .unwrap_or(&entry.data_snapshot);
            let pre = RecordSnapshot::parse(raw)?;
            restore_fields(conn, entry.record_id, &pre).await?;
            Ok(None)
        }
        ActionType::Delete => {
            let snapshot = RecordSnapshot::parse(&entry.data_snapshot)?;
            let new_id = insert_fresh(conn, &snapshot).await?;
            Ok(Some(new_id))
        }
    }
}

/// Re-applies one undone entry, returning the fresh row id when a row was
/// re-inserted.
async fn apply_redo<C: ConnectionTrait>(
    conn: &C,
    entry: &history_log::Model,
) -> Result<Option<i64>> {
    match entry.action_type {
        ActionType::Create => {
            let snapshot = RecordSnapshot::parse(&entry.data_snapshot)?;
            let new_id = insert_fresh(conn, &snapshot).await?;
            Ok(Some(new_id))
        }
        ActionType::Update => {
            let post = RecordSnapshot::parse(&entry.data_snapshot)?;
            restore_fields(conn, entry.record_id, &post).await?;
            Ok(None)
        }
        ActionType::Delete => {
            delete_row(conn, entry.table_name, entry.record_id, entry.gestiune_id).await?;
            Ok(None)
        }
    }
}

/// Inserts a row from a snapshot letting the store assign the id.
async fn insert_fresh<C: ConnectionTrait>(conn: &C, snapshot: &RecordSnapshot) -> Result<i64> {
    match snapshot {
        RecordSnapshot::StockOperation(snap) => {
            let model = stock_operation::ActiveModel {
                operation_type: Set(snap.operation_type),
                quantity: Set(snap.quantity),
                date: Set(snap.date),
                description: Set(snap.description.clone()),
                company_id: Set(snap.company_id),
                gestiune_id: Set(snap.gestiune_id),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            Ok(model.id)
        }
        RecordSnapshot::Transaction(snap) => {
            let model = transaction::ActiveModel {
                date: Set(snap.date),
                vehicle_id: Set(snap.vehicle_id),
                company_id: Set(snap.company_id),
                quantity: Set(snap.quantity),
                gestiune_id: Set(snap.gestiune_id),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            Ok(model.id)
        }
    }
}

/// Overwrites every non-identity column of an existing row from a snapshot.
async fn restore_fields<C: ConnectionTrait>(
    conn: &C,
    record_id: i64,
    snapshot: &RecordSnapshot,
) -> Result<()> {
    match snapshot {
        RecordSnapshot::StockOperation(snap) => {
            let row = StockOperation::find_by_id(record_id)
                .filter(stock_operation::Column::GestiuneId.eq(snap.gestiune_id))
                .one(conn)
                .await?
                .ok_or_else(|| Error::RecordNotFound {
                    table: TargetTable::StockOperation.to_string(),
                    id: record_id,
                })?;
            let mut active: stock_operation::ActiveModel = row.into();
            active.operation_type = Set(snap.operation_type);
            active.quantity = Set(snap.quantity);
            active.date = Set(snap.date);
            active.description = Set(snap.description.clone());
            active.company_id = Set(snap.company_id);
            active.gestiune_id = Set(snap.gestiune_id);
            active.update(conn).await?;
        }
        RecordSnapshot::Transaction(snap) => {
            let row = Transaction::find_by_id(record_id)
                .filter(transaction::Column::GestiuneId.eq(snap.gestiune_id))
                .one(conn)
                .await?
                .ok_or_else(|| Error::RecordNotFound {
                    table: TargetTable::Transaction.to_string(),
                    id: record_id,
                })?;
            let mut active: transaction::ActiveModel = row.into();
            active.date = Set(snap.date);
            active.vehicle_id = Set(snap.vehicle_id);
            active.company_id = Set(snap.company_id);
            active.quantity = Set(snap.quantity);
            active.gestiune_id = Set(snap.gestiune_id);
            active.update(conn).await?;
        }
    }
    Ok(())
}

/// Deletes a journaled row, failing loudly when it is already gone.
async fn delete_row<C: ConnectionTrait>(
    conn: &C,
    table: TargetTable,
    record_id: i64,
    gestiune_id: i64,
) -> Result<()> {
    let affected = match table {
        TargetTable::StockOperation => {
            StockOperation::delete_many()
                .filter(stock_operation::Column::Id.eq(record_id))
                .filter(stock_operation::Column::GestiuneId.eq(gestiune_id))
                .exec(conn)
                .await?
                .rows_affected
        }
        TargetTable::Transaction => {
            Transaction::delete_many()
                .filter(transaction::Column::Id.eq(record_id))
                .filter(transaction::Column::GestiuneId.eq(gestiune_id))
                .exec(conn)
                .await?
                .rows_affected
        }
    };
    if affected == 0 {
        return Err(Error::RecordNotFound {
            table: table.to_string(),
            id: record_id,
        });
    }
    Ok(())
}

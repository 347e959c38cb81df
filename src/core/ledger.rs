//! Journaled mutations of the two ledger tables.
//!
//! Every create, update and delete of a stock operation or consumption
//! transaction goes through here so the undo/redo journal sees it before the
//! commit. Each operation runs in one database transaction: the row change
//! and its journal entry land together or not at all.
//!
//! One quirk inherited from the paper workflow: an OUT movement whose
//! description is a license plate is really a vehicle refueling, so it is
//! recorded as a consumption transaction against that vehicle instead of a
//! bare stock operation.

use crate::{
    core::{
        history::{self, RecordSnapshot},
        vehicle::{find_or_create_normalized, get_vehicle},
    },
    entities::{
        ActionType, OperationType, Transaction, Vehicle, stock_operation, transaction, vehicle,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Input for a new stock movement.
#[derive(Debug, Clone)]
pub struct NewStockOperation {
    /// Direction of the movement
    pub operation_type: OperationType,
    /// Quantity in liters, must be positive
    pub quantity: f64,
    /// When the movement happened
    pub date: chrono::NaiveDateTime,
    /// Free-form note; for OUT a plate number reroutes to a transaction
    pub description: Option<String>,
    /// Company the movement is attributed to
    pub company_id: Option<i64>,
}

/// What a stock entry call actually created.
#[derive(Debug, Clone)]
pub enum LedgerEntry {
    /// A bulk stock movement was recorded
    StockOperation(stock_operation::Model),
    /// The movement named a vehicle, so a consumption record was created
    Transaction(transaction::Model),
}

/// Field-level changes for a stock operation update.
///
/// `None` leaves the column untouched; the nested options distinguish
/// "set to NULL" from "keep".
#[derive(Debug, Clone, Default)]
pub struct StockOperationChanges {
    /// New direction of the movement
    pub operation_type: Option<OperationType>,
    /// New quantity in liters
    pub quantity: Option<f64>,
    /// New date of the movement
    pub date: Option<chrono::NaiveDateTime>,
    /// New description, `Some(None)` clears it
    pub description: Option<Option<String>>,
    /// New attributed company, `Some(None)` detaches
    pub company_id: Option<Option<i64>>,
}

/// Field-level changes for a transaction update.
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    /// New date of the refueling
    pub date: Option<chrono::NaiveDateTime>,
    /// New quantity in liters
    pub quantity: Option<f64>,
    /// New plate; the vehicle is found or created and the company re-derived
    pub plate: Option<String>,
}

fn check_quantity(quantity: f64) -> Result<()> {
    if quantity <= 0.0 || !quantity.is_finite() {
        return Err(Error::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Looks for an existing transaction with the duplicate-detection key.
async fn find_duplicate<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    vehicle_id: i64,
    date: chrono::NaiveDateTime,
    quantity: f64,
    exclude_id: Option<i64>,
) -> Result<Option<transaction::Model>> {
    let mut query = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .filter(transaction::Column::VehicleId.eq(vehicle_id))
        .filter(transaction::Column::Date.eq(date))
        .filter(transaction::Column::Quantity.eq(quantity));
    if let Some(id) = exclude_id {
        query = query.filter(transaction::Column::Id.ne(id));
    }
    query.one(conn).await.map_err(Into::into)
}

/// Records a stock movement, journaled.
///
/// An OUT whose description is non-empty is taken to name a vehicle: the
/// plate is normalized, the vehicle found or created (filed under the
/// profile's default category and attached to the paying company when it had
/// none), and a consumption transaction is recorded instead.
pub async fn create_stock_operation(
    db: &DatabaseConnection,
    gestiune_id: i64,
    input: NewStockOperation,
) -> Result<LedgerEntry> {
    check_quantity(input.quantity)?;

    let plate = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty() && input.operation_type == OperationType::Out);

    let txn = db.begin().await?;

    let entry = if let Some(plate) = plate {
        let vehicle = find_or_create_normalized(&txn, gestiune_id, plate).await?;
        if vehicle.company_id.is_none() && input.company_id.is_some() {
            let mut active: vehicle::ActiveModel = vehicle.clone().into();
            active.company_id = Set(input.company_id);
            active.update(&txn).await?;
        }

        if let Some(existing) =
            find_duplicate(&txn, gestiune_id, vehicle.id, input.date, input.quantity, None).await?
        {
            txn.rollback().await?;
            return Err(Error::DuplicateEntry {
                message: format!(
                    "transaction for {} on {} with {:.2} L already exists (id {})",
                    vehicle.plate_number, input.date, input.quantity, existing.id
                ),
            });
        }

        let created = transaction::ActiveModel {
            date: Set(input.date),
            vehicle_id: Set(Some(vehicle.id)),
            company_id: Set(input.company_id),
            quantity: Set(input.quantity),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        history::record_action(&txn, ActionType::Create, &RecordSnapshot::from(&created), None)
            .await?;
        info!(
            "Recorded {:.2} L consumption for {} via stock entry",
            created.quantity, vehicle.plate_number
        );
        LedgerEntry::Transaction(created)
    } else {
        let created = stock_operation::ActiveModel {
            operation_type: Set(input.operation_type),
            quantity: Set(input.quantity),
            date: Set(input.date),
            description: Set(input.description),
            company_id: Set(input.company_id),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        history::record_action(&txn, ActionType::Create, &RecordSnapshot::from(&created), None)
            .await?;
        info!(
            "Recorded {} of {:.2} L (operation {})",
            created.operation_type, created.quantity, created.id
        );
        LedgerEntry::StockOperation(created)
    };

    txn.commit().await?;
    Ok(entry)
}

/// Retrieves a stock operation by id within a profile.
pub async fn get_stock_operation(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
) -> Result<stock_operation::Model> {
    crate::entities::StockOperation::find_by_id(id)
        .filter(stock_operation::Column::GestiuneId.eq(gestiune_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::RecordNotFound {
            table: "stock_operation".to_string(),
            id,
        })
}

/// Retrieves a transaction by id within a profile.
pub async fn get_transaction(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
) -> Result<transaction::Model> {
    Transaction::find_by_id(id)
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::RecordNotFound {
            table: "transaction".to_string(),
            id,
        })
}

/// Updates a stock operation in place, journaled with pre and post state.
pub async fn update_stock_operation(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
    changes: StockOperationChanges,
) -> Result<stock_operation::Model> {
    if let Some(quantity) = changes.quantity {
        check_quantity(quantity)?;
    }

    let before = get_stock_operation(db, gestiune_id, id).await?;
    let pre_snapshot = RecordSnapshot::from(&before);

    let txn = db.begin().await?;

    let mut active: stock_operation::ActiveModel = before.into();
    if let Some(operation_type) = changes.operation_type {
        active.operation_type = Set(operation_type);
    }
    if let Some(quantity) = changes.quantity {
        active.quantity = Set(quantity);
    }
    if let Some(date) = changes.date {
        active.date = Set(date);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(company_id) = changes.company_id {
        active.company_id = Set(company_id);
    }
    let updated = active.update(&txn).await?;

    history::record_action(
        &txn,
        ActionType::Update,
        &RecordSnapshot::from(&updated),
        Some(&pre_snapshot),
    )
    .await?;

    txn.commit().await?;
    Ok(updated)
}

/// Deletes a stock operation, journaling its final state first.
pub async fn delete_stock_operation(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
) -> Result<()> {
    let row = get_stock_operation(db, gestiune_id, id).await?;

    let txn = db.begin().await?;
    history::record_action(&txn, ActionType::Delete, &RecordSnapshot::from(&row), None).await?;
    crate::entities::StockOperation::delete_by_id(row.id)
        .exec(&txn)
        .await?;
    txn.commit().await?;

    info!("Deleted stock operation {id}");
    Ok(())
}

/// Records a manual consumption transaction, journaled.
///
/// The company is derived from the vehicle at creation time.
///
/// # Errors
/// [`Error::DuplicateEntry`] when a transaction with the same
/// (date, vehicle, quantity) already exists in the profile.
pub async fn create_transaction(
    db: &DatabaseConnection,
    gestiune_id: i64,
    vehicle_id: i64,
    date: chrono::NaiveDateTime,
    quantity: f64,
) -> Result<transaction::Model> {
    check_quantity(quantity)?;
    let vehicle = get_vehicle(db, gestiune_id, vehicle_id).await?;

    let txn = db.begin().await?;

    if let Some(existing) =
        find_duplicate(&txn, gestiune_id, vehicle.id, date, quantity, None).await?
    {
        txn.rollback().await?;
        return Err(Error::DuplicateEntry {
            message: format!(
                "transaction for {} on {date} with {quantity:.2} L already exists (id {})",
                vehicle.plate_number, existing.id
            ),
        });
    }

    let created = transaction::ActiveModel {
        date: Set(date),
        vehicle_id: Set(Some(vehicle.id)),
        company_id: Set(vehicle.company_id),
        quantity: Set(quantity),
        gestiune_id: Set(gestiune_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    history::record_action(&txn, ActionType::Create, &RecordSnapshot::from(&created), None)
        .await?;

    txn.commit().await?;
    Ok(created)
}

/// Updates a transaction, journaled with pre and post state.
///
/// A plate change finds or creates the vehicle and re-derives the billed
/// company from it.
pub async fn update_transaction(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
    changes: TransactionChanges,
) -> Result<transaction::Model> {
    if let Some(quantity) = changes.quantity {
        check_quantity(quantity)?;
    }

    let before = get_transaction(db, gestiune_id, id).await?;
    let pre_snapshot = RecordSnapshot::from(&before);

    let txn = db.begin().await?;

    let (vehicle_id, company_id) = match &changes.plate {
        Some(plate) => {
            let vehicle = find_or_create_normalized(&txn, gestiune_id, plate).await?;
            (Some(vehicle.id), vehicle.company_id)
        }
        None => (before.vehicle_id, before.company_id),
    };

    let date = changes.date.unwrap_or(before.date);
    let quantity = changes.quantity.unwrap_or(before.quantity);
    if let Some(vehicle_id) = vehicle_id {
        if let Some(existing) =
            find_duplicate(&txn, gestiune_id, vehicle_id, date, quantity, Some(id)).await?
        {
            txn.rollback().await?;
            return Err(Error::DuplicateEntry {
                message: format!(
                    "another transaction already holds this date, vehicle and quantity (id {})",
                    existing.id
                ),
            });
        }
    }

    let mut active: transaction::ActiveModel = before.into();
    active.date = Set(date);
    active.quantity = Set(quantity);
    active.vehicle_id = Set(vehicle_id);
    active.company_id = Set(company_id);
    let updated = active.update(&txn).await?;

    history::record_action(
        &txn,
        ActionType::Update,
        &RecordSnapshot::from(&updated),
        Some(&pre_snapshot),
    )
    .await?;

    txn.commit().await?;
    Ok(updated)
}

/// Deletes a transaction, journaling its final state first.
pub async fn delete_transaction(db: &DatabaseConnection, gestiune_id: i64, id: i64) -> Result<()> {
    let row = get_transaction(db, gestiune_id, id).await?;

    let txn = db.begin().await?;
    history::record_action(&txn, ActionType::Delete, &RecordSnapshot::from(&row), None).await?;
    Transaction::delete_by_id(row.id).exec(&txn).await?;
    txn.commit().await?;

    info!("Deleted transaction {id}");
    Ok(())
}

/// Moves every transaction of one company to another (or to unallocated),
/// journaling each row as an UPDATE. Returns how many rows moved.
pub async fn reassign_company_transactions(
    db: &DatabaseConnection,
    gestiune_id: i64,
    from_company_id: i64,
    to_company_id: Option<i64>,
) -> Result<u64> {
    let rows = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .filter(transaction::Column::CompanyId.eq(from_company_id))
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await?;

    let txn = db.begin().await?;
    let mut moved = 0u64;
    for row in rows {
        let pre = RecordSnapshot::from(&row);
        let mut active: transaction::ActiveModel = row.into();
        active.company_id = Set(to_company_id);
        let updated = active.update(&txn).await?;
        history::record_action(
            &txn,
            ActionType::Update,
            &RecordSnapshot::from(&updated),
            Some(&pre),
        )
        .await?;
        moved += 1;
    }
    txn.commit().await?;

    info!("Reassigned {moved} transactions from company {from_company_id}");
    Ok(moved)
}

/// Deletes a set of transactions, journaling each one. Ids outside the
/// profile are ignored. Returns how many rows were deleted.
pub async fn delete_transactions_bulk(
    db: &DatabaseConnection,
    gestiune_id: i64,
    ids: &[i64],
) -> Result<u64> {
    let rows = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .filter(transaction::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?;

    let txn = db.begin().await?;
    let mut deleted = 0u64;
    for row in rows {
        history::record_action(&txn, ActionType::Delete, &RecordSnapshot::from(&row), None)
            .await?;
        Transaction::delete_by_id(row.id).exec(&txn).await?;
        deleted += 1;
    }
    txn.commit().await?;

    Ok(deleted)
}

/// Deletes transactions whose vehicle is gone (NULL or dangling id),
/// journaling each one. Returns how many rows were cleaned up.
pub async fn cleanup_orphan_transactions(
    db: &DatabaseConnection,
    gestiune_id: i64,
) -> Result<u64> {
    let vehicle_ids: Vec<i64> = Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| v.id)
        .collect();

    let rows = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?;
    let orphans: Vec<transaction::Model> = rows
        .into_iter()
        .filter(|t| !t.vehicle_id.is_some_and(|id| vehicle_ids.contains(&id)))
        .collect();

    let txn = db.begin().await?;
    let mut deleted = 0u64;
    for row in orphans {
        history::record_action(&txn, ActionType::Delete, &RecordSnapshot::from(&row), None)
            .await?;
        Transaction::delete_by_id(row.id).exec(&txn).await?;
        deleted += 1;
    }
    txn.commit().await?;

    if deleted > 0 {
        info!("Cleaned up {deleted} orphaned transactions");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]

    use super::*;
    use crate::core::vehicle::{DEFAULT_CATEGORY_NAME, create_category};
    use crate::test_utils::{
        create_test_company, create_test_profile, create_test_transaction, create_test_vehicle,
        setup_test_db, test_date,
    };

    #[tokio::test]
    async fn test_create_stock_operation_journals() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        let entry = create_stock_operation(
            &db,
            profile.id,
            NewStockOperation {
                operation_type: OperationType::Initial,
                quantity: 5000.0,
                date: test_date(1, 8, 0),
                description: None,
                company_id: None,
            },
        )
        .await?;

        let LedgerEntry::StockOperation(operation) = entry else {
            panic!("expected a stock operation");
        };
        assert_eq!(operation.quantity, 5000.0);
        assert!(history::can_undo(&db, profile.id).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_out_with_plate_becomes_transaction() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Fleet SRL").await?;
        let category = create_category(&db, profile.id, DEFAULT_CATEGORY_NAME, None, None).await?;

        let entry = create_stock_operation(
            &db,
            profile.id,
            NewStockOperation {
                operation_type: OperationType::Out,
                quantity: 55.0,
                date: test_date(2, 9, 30),
                description: Some("gl 44 xyz".to_string()),
                company_id: Some(company.id),
            },
        )
        .await?;

        let LedgerEntry::Transaction(created) = entry else {
            panic!("expected a transaction");
        };
        assert_eq!(created.company_id, Some(company.id));

        let vehicle = get_vehicle(&db, profile.id, created.vehicle_id.unwrap()).await?;
        assert_eq!(vehicle.plate_number, "GL44XYZ");
        assert_eq!(vehicle.category_id, Some(category.id));
        assert_eq!(vehicle.company_id, Some(company.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_out_without_plate_stays_stock_operation() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        let entry = create_stock_operation(
            &db,
            profile.id,
            NewStockOperation {
                operation_type: OperationType::Out,
                quantity: 120.0,
                date: test_date(3, 7, 15),
                description: None,
                company_id: None,
            },
        )
        .await?;

        assert!(matches!(entry, LedgerEntry::StockOperation(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_quantity_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 30 AAA", None).await?;

        let result =
            create_transaction(&db, profile.id, vehicle.id, test_date(4, 10, 0), -5.0).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity } if quantity == -5.0
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_transaction_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 31 BBB", None).await?;
        let date = test_date(5, 11, 20);

        create_transaction(&db, profile.id, vehicle.id, date, 80.0).await?;
        let result = create_transaction(&db, profile.id, vehicle.id, date, 80.0).await;
        assert!(matches!(result.unwrap_err(), Error::DuplicateEntry { .. }));

        // Same key under another profile is no conflict
        let other = crate::core::profile::create_profile(&db, "Other site", None).await?;
        let other_vehicle = create_test_vehicle(&db, other.id, "GL 31 BBB", None).await?;
        create_transaction(&db, other.id, other_vehicle.id, date, 80.0).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_update_transaction_repoints_vehicle() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Owner SRL").await?;
        let old_vehicle = create_test_vehicle(&db, profile.id, "GL 32 CCC", None).await?;
        let new_vehicle =
            create_test_vehicle(&db, profile.id, "GL33DDD", Some(company.id)).await?;
        let recorded = create_test_transaction(&db, profile.id, old_vehicle.id, 33.0).await?;

        let updated = update_transaction(
            &db,
            profile.id,
            recorded.id,
            TransactionChanges {
                plate: Some("gl-33 ddd".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(updated.vehicle_id, Some(new_vehicle.id));
        assert_eq!(updated.company_id, Some(company.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_collision_surfaces_as_duplicate() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 34 EEE", None).await?;
        let date = test_date(6, 14, 45);

        create_transaction(&db, profile.id, vehicle.id, date, 70.0).await?;
        let second = create_transaction(&db, profile.id, vehicle.id, date, 71.0).await?;

        let result = update_transaction(
            &db,
            profile.id,
            second.id,
            TransactionChanges {
                quantity: Some(70.0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::DuplicateEntry { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_reassign_company_transactions() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let from = create_test_company(&db, profile.id, "From SRL").await?;
        let to = create_test_company(&db, profile.id, "To SRL").await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 35 FFF", Some(from.id)).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 10.0).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 20.0).await?;

        let moved = reassign_company_transactions(&db, profile.id, from.id, Some(to.id)).await?;
        assert_eq!(moved, 2);

        let remaining = Transaction::find()
            .filter(transaction::Column::CompanyId.eq(from.id))
            .count(&db)
            .await?;
        assert_eq!(remaining, 0);

        // Each move is journaled, so two undos restore both rows
        history::undo_last(&db, profile.id).await?;
        history::undo_last(&db, profile.id).await?;
        let restored = Transaction::find()
            .filter(transaction::Column::CompanyId.eq(from.id))
            .count(&db)
            .await?;
        assert_eq!(restored, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_cleanup_orphans() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 36 GGG", None).await?;
        let kept = create_test_transaction(&db, profile.id, vehicle.id, 12.0).await?;

        // Insert a dangling row directly, bypassing the ledger
        let orphan = transaction::ActiveModel {
            date: Set(test_date(7, 6, 0)),
            vehicle_id: Set(None),
            company_id: Set(None),
            quantity: Set(9.0),
            gestiune_id: Set(profile.id),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let deleted = cleanup_orphan_transactions(&db, profile.id).await?;
        assert_eq!(deleted, 1);
        assert!(Transaction::find_by_id(orphan.id).one(&db).await?.is_none());
        assert!(Transaction::find_by_id(kept.id).one(&db).await?.is_some());

        Ok(())
    }
}

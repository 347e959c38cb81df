//! Profile (gestiune) business logic - Handles the tenant partitions.
//!
//! Every business row belongs to exactly one profile and all queries filter
//! by it, so creating, renaming and deleting profiles is the only place the
//! partition boundary itself is mutated. Deleting a profile cascades over
//! everything it owns inside one database transaction.

use crate::{
    entities::{
        AppSetting, Company, Gestiune, HistoryLog, StockOperation, Transaction, Vehicle,
        VehicleCategory, app_setting, company, gestiune, history_log, stock_operation, transaction,
        vehicle, vehicle_category,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Fuel sort used when a profile does not specify one.
pub const DEFAULT_FUEL_TYPE: &str = "Motorină";

/// Creates a new profile.
///
/// # Arguments
/// * `name` - Display name, unique across the database
/// * `site_code` - Optional short code printed on documents
pub async fn create_profile(
    db: &DatabaseConnection,
    name: &str,
    site_code: Option<String>,
) -> Result<gestiune::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config {
            message: "Profile name cannot be empty".to_string(),
        });
    }

    let existing = Gestiune::find()
        .filter(gestiune::Column::Name.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::NameTaken {
            name: name.to_string(),
        });
    }

    let profile = gestiune::ActiveModel {
        name: Set(name.to_string()),
        site_code: Set(site_code),
        default_fuel_type: Set(DEFAULT_FUEL_TYPE.to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created profile '{}' (id {})", profile.name, profile.id);
    Ok(profile)
}

/// Retrieves a profile by id.
pub async fn get_profile(db: &DatabaseConnection, id: i64) -> Result<gestiune::Model> {
    Gestiune::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::ProfileNotFound { id })
}

/// Retrieves all profiles ordered by name.
pub async fn list_profiles(db: &DatabaseConnection) -> Result<Vec<gestiune::Model>> {
    Gestiune::find()
        .order_by_asc(gestiune::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a profile's display fields.
///
/// # Arguments
/// * `name` - New display name (must stay unique)
/// * `site_code` - New site code, None clears it
/// * `default_fuel_type` - Fuel sort shown on documents
pub async fn update_profile(
    db: &DatabaseConnection,
    id: i64,
    name: &str,
    site_code: Option<String>,
    default_fuel_type: &str,
) -> Result<gestiune::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config {
            message: "Profile name cannot be empty".to_string(),
        });
    }

    let profile = get_profile(db, id).await?;

    let taken = Gestiune::find()
        .filter(gestiune::Column::Name.eq(name))
        .filter(gestiune::Column::Id.ne(id))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::NameTaken {
            name: name.to_string(),
        });
    }

    let mut active: gestiune::ActiveModel = profile.into();
    active.name = Set(name.to_string());
    active.site_code = Set(site_code);
    active.default_fuel_type = Set(default_fuel_type.to_string());
    active.update(db).await.map_err(Into::into)
}

/// Deletes a profile and everything it owns.
///
/// Children go first so foreign keys stay satisfied: transactions, stock
/// operations, vehicles, companies, categories, settings, journal entries,
/// then the profile row itself. Runs in one database transaction.
pub async fn delete_profile(db: &DatabaseConnection, id: i64) -> Result<()> {
    let profile = get_profile(db, id).await?;

    let txn = db.begin().await?;

    Transaction::delete_many()
        .filter(transaction::Column::GestiuneId.eq(id))
        .exec(&txn)
        .await?;
    StockOperation::delete_many()
        .filter(stock_operation::Column::GestiuneId.eq(id))
        .exec(&txn)
        .await?;
    Vehicle::delete_many()
        .filter(vehicle::Column::GestiuneId.eq(id))
        .exec(&txn)
        .await?;
    Company::delete_many()
        .filter(company::Column::GestiuneId.eq(id))
        .exec(&txn)
        .await?;
    VehicleCategory::delete_many()
        .filter(vehicle_category::Column::GestiuneId.eq(id))
        .exec(&txn)
        .await?;
    AppSetting::delete_many()
        .filter(app_setting::Column::GestiuneId.eq(id))
        .exec(&txn)
        .await?;
    HistoryLog::delete_many()
        .filter(history_log::Column::GestiuneId.eq(id))
        .exec(&txn)
        .await?;
    Gestiune::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    info!("Deleted profile '{}' (id {id}) with all owned data", profile.name);
    Ok(())
}

//! Vehicle and category business logic.
//!
//! Plates are the natural key drivers actually type, so they get trimmed and
//! uppercased everywhere, and free-text entry points additionally strip
//! spaces and dashes. Moving a vehicle between companies cascades onto its
//! consumption records so past fuel follows the vehicle. A vehicle with
//! transactions cannot be deleted, and a category in use cannot be deleted.

use crate::{
    entities::{
        Transaction, Vehicle, VehicleCategory, transaction, vehicle, vehicle_category,
        vehicle_category::DEFAULT_ICON,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Category auto-created vehicles are filed under when it exists.
pub const DEFAULT_CATEGORY_NAME: &str = "Autoturism";

/// Uppercases a plate and trims the ends, keeping interior spaces.
#[must_use]
pub fn canonical_plate(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Normalizes a free-text plate: uppercase with spaces and dashes stripped.
#[must_use]
pub fn normalized_plate(raw: &str) -> String {
    canonical_plate(raw).replace([' ', '-'], "")
}

/// Creates a new vehicle within a profile.
///
/// # Arguments
/// * `plate` - License plate (stored trimmed and uppercased)
/// * `company_id` - Owning company, None for unallocated
/// * `category_id` - Analysis category, None for uncategorized
pub async fn create_vehicle(
    db: &DatabaseConnection,
    gestiune_id: i64,
    plate: &str,
    company_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<vehicle::Model> {
    let plate = canonical_plate(plate);
    if plate.is_empty() {
        return Err(Error::Config {
            message: "Plate number cannot be empty".to_string(),
        });
    }

    if get_vehicle_by_plate(db, gestiune_id, &plate).await?.is_some() {
        return Err(Error::NameTaken { name: plate });
    }

    let vehicle = vehicle::ActiveModel {
        plate_number: Set(plate),
        company_id: Set(company_id),
        category_id: Set(category_id),
        gestiune_id: Set(gestiune_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created vehicle {} (id {})", vehicle.plate_number, vehicle.id);
    Ok(vehicle)
}

/// Retrieves a vehicle by id within a profile.
pub async fn get_vehicle(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
) -> Result<vehicle::Model> {
    Vehicle::find_by_id(id)
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .one(db)
        .await?
        .ok_or(Error::VehicleNotFound { id })
}

/// Looks a vehicle up by exact plate within a profile.
pub async fn get_vehicle_by_plate(
    db: &DatabaseConnection,
    gestiune_id: i64,
    plate: &str,
) -> Result<Option<vehicle::Model>> {
    Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .filter(vehicle::Column::PlateNumber.eq(plate))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all vehicles of a profile ordered by plate.
pub async fn list_vehicles(
    db: &DatabaseConnection,
    gestiune_id: i64,
) -> Result<Vec<vehicle::Model>> {
    Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .order_by_asc(vehicle::Column::PlateNumber)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a vehicle by plate or creates a bare one, inside the caller's
/// transaction.
///
/// Import path: the plate keeps interior spaces, the new vehicle has no
/// company and no category.
pub async fn find_or_create_vehicle<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    plate: &str,
) -> Result<vehicle::Model> {
    let plate = canonical_plate(plate);
    let existing = Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .filter(vehicle::Column::PlateNumber.eq(plate.clone()))
        .one(conn)
        .await?;
    if let Some(vehicle) = existing {
        return Ok(vehicle);
    }

    debug!("Auto-creating vehicle {plate}");
    vehicle::ActiveModel {
        plate_number: Set(plate),
        company_id: Set(None),
        category_id: Set(None),
        gestiune_id: Set(gestiune_id),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Finds or creates a vehicle from free text, inside the caller's
/// transaction.
///
/// The plate is fully normalized (no spaces, no dashes) and a newly created
/// vehicle is filed under the `Autoturism` category when the profile has it,
/// else under the profile's first category, else left uncategorized.
pub async fn find_or_create_normalized<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    raw: &str,
) -> Result<vehicle::Model> {
    let plate = normalized_plate(raw);
    if plate.is_empty() {
        return Err(Error::Config {
            message: "Plate number cannot be empty".to_string(),
        });
    }

    let existing = Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .filter(vehicle::Column::PlateNumber.eq(plate.clone()))
        .one(conn)
        .await?;
    if let Some(vehicle) = existing {
        return Ok(vehicle);
    }

    let default_category = VehicleCategory::find()
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .filter(vehicle_category::Column::Name.eq(DEFAULT_CATEGORY_NAME))
        .one(conn)
        .await?;
    let category = match default_category {
        Some(category) => Some(category),
        None => {
            VehicleCategory::find()
                .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
                .order_by_asc(vehicle_category::Column::Id)
                .one(conn)
                .await?
        }
    };

    debug!("Auto-creating vehicle {plate} from free text");
    vehicle::ActiveModel {
        plate_number: Set(plate),
        company_id: Set(None),
        category_id: Set(category.map(|c| c.id)),
        gestiune_id: Set(gestiune_id),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Updates a vehicle's plate, company and category.
///
/// A company change cascades onto all of the vehicle's consumption records
/// so past fuel follows the vehicle to its new owner.
pub async fn update_vehicle(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
    plate: &str,
    company_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<vehicle::Model> {
    let plate = canonical_plate(plate);
    if plate.is_empty() {
        return Err(Error::Config {
            message: "Plate number cannot be empty".to_string(),
        });
    }

    let vehicle = get_vehicle(db, gestiune_id, id).await?;

    let txn = db.begin().await?;

    if vehicle.company_id != company_id {
        Transaction::update_many()
            .col_expr(transaction::Column::CompanyId, Expr::value(company_id))
            .filter(transaction::Column::VehicleId.eq(id))
            .filter(transaction::Column::GestiuneId.eq(gestiune_id))
            .exec(&txn)
            .await?;
    }

    let mut active: vehicle::ActiveModel = vehicle.into();
    active.plate_number = Set(plate);
    active.company_id = Set(company_id);
    active.category_id = Set(category_id);
    let updated = active.update(&txn).await?;

    txn.commit().await?;
    Ok(updated)
}

/// Moves a vehicle to another company (or to unallocated), cascading onto
/// its consumption records.
pub async fn move_vehicle(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
    company_id: Option<i64>,
) -> Result<vehicle::Model> {
    let vehicle = get_vehicle(db, gestiune_id, id).await?;
    update_vehicle(
        db,
        gestiune_id,
        id,
        &vehicle.plate_number,
        company_id,
        vehicle.category_id,
    )
    .await
}

/// Assigns a category (or clears it) on a set of vehicles at once.
///
/// Returns how many vehicles were updated; ids outside the profile are
/// ignored.
pub async fn assign_category_bulk(
    db: &DatabaseConnection,
    gestiune_id: i64,
    vehicle_ids: &[i64],
    category_id: Option<i64>,
) -> Result<u64> {
    let result = Vehicle::update_many()
        .col_expr(vehicle::Column::CategoryId, Expr::value(category_id))
        .filter(vehicle::Column::Id.is_in(vehicle_ids.iter().copied()))
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Attaches a set of vehicles to a company, cascading onto each vehicle's
/// consumption records.
pub async fn assign_company_bulk(
    db: &DatabaseConnection,
    gestiune_id: i64,
    vehicle_ids: &[i64],
    company_id: i64,
) -> Result<u64> {
    let txn = db.begin().await?;

    let result = Vehicle::update_many()
        .col_expr(vehicle::Column::CompanyId, Expr::value(Some(company_id)))
        .filter(vehicle::Column::Id.is_in(vehicle_ids.iter().copied()))
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    Transaction::update_many()
        .col_expr(transaction::Column::CompanyId, Expr::value(Some(company_id)))
        .filter(transaction::Column::VehicleId.is_in(vehicle_ids.iter().copied()))
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(result.rows_affected)
}

/// Deletes a vehicle that has no consumption records.
///
/// # Errors
/// [`Error::VehicleInUse`] when transactions still reference the vehicle;
/// move the vehicle or delete the transactions first.
pub async fn delete_vehicle(db: &DatabaseConnection, gestiune_id: i64, id: i64) -> Result<()> {
    let vehicle = get_vehicle(db, gestiune_id, id).await?;

    let count = Transaction::find()
        .filter(transaction::Column::VehicleId.eq(id))
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .count(db)
        .await?;
    if count > 0 {
        return Err(Error::VehicleInUse {
            plate: vehicle.plate_number,
            count,
        });
    }

    Vehicle::delete_by_id(id).exec(db).await?;
    info!("Deleted vehicle {} (id {id})", vehicle.plate_number);
    Ok(())
}

/// Creates a new vehicle category within a profile.
pub async fn create_category(
    db: &DatabaseConnection,
    gestiune_id: i64,
    name: &str,
    description: Option<String>,
    icon: Option<String>,
) -> Result<vehicle_category::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config {
            message: "Category name cannot be empty".to_string(),
        });
    }

    let existing = VehicleCategory::find()
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .filter(vehicle_category::Column::Name.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::NameTaken {
            name: name.to_string(),
        });
    }

    vehicle_category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        icon: Set(icon.unwrap_or_else(|| DEFAULT_ICON.to_string())),
        gestiune_id: Set(gestiune_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Retrieves a category by id within a profile.
pub async fn get_category(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
) -> Result<vehicle_category::Model> {
    VehicleCategory::find_by_id(id)
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .one(db)
        .await?
        .ok_or(Error::CategoryNotFound { id })
}

/// Retrieves all categories of a profile ordered by name.
pub async fn list_categories(
    db: &DatabaseConnection,
    gestiune_id: i64,
) -> Result<Vec<vehicle_category::Model>> {
    VehicleCategory::find()
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .order_by_asc(vehicle_category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a category's name, description and icon.
pub async fn update_category(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
    name: &str,
    description: Option<String>,
    icon: Option<String>,
) -> Result<vehicle_category::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config {
            message: "Category name cannot be empty".to_string(),
        });
    }

    let category = get_category(db, gestiune_id, id).await?;

    let taken = VehicleCategory::find()
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .filter(vehicle_category::Column::Name.eq(name))
        .filter(vehicle_category::Column::Id.ne(id))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::NameTaken {
            name: name.to_string(),
        });
    }

    let mut active: vehicle_category::ActiveModel = category.into();
    active.name = Set(name.to_string());
    active.description = Set(description);
    if let Some(icon) = icon {
        active.icon = Set(icon);
    }
    active.update(db).await.map_err(Into::into)
}

/// Deletes a category no vehicle uses.
///
/// # Errors
/// [`Error::CategoryInUse`] when vehicles still carry the category.
pub async fn delete_category(db: &DatabaseConnection, gestiune_id: i64, id: i64) -> Result<()> {
    let category = get_category(db, gestiune_id, id).await?;

    let count = Vehicle::find()
        .filter(vehicle::Column::CategoryId.eq(id))
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .count(db)
        .await?;
    if count > 0 {
        return Err(Error::CategoryInUse {
            name: category.name,
            count,
        });
    }

    VehicleCategory::delete_by_id(id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::test_utils::{
        create_test_company, create_test_profile, create_test_transaction, create_test_vehicle,
        setup_test_db,
    };

    #[test]
    fn test_plate_normalization() {
        assert_eq!(canonical_plate("  gl 07 xyz "), "GL 07 XYZ");
        assert_eq!(normalized_plate(" gl-07 xyz "), "GL07XYZ");
        assert_eq!(normalized_plate("B-123-ABC"), "B123ABC");
    }

    #[tokio::test]
    async fn test_create_vehicle_uppercases_plate() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        let vehicle = create_vehicle(&db, profile.id, " gl 99 zzz ", None, None).await?;
        assert_eq!(vehicle.plate_number, "GL 99 ZZZ");

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_plate_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        create_test_vehicle(&db, profile.id, "GL 99 ZZZ", None).await?;

        let result = create_vehicle(&db, profile.id, "gl 99 zzz", None, None).await;
        assert!(matches!(result.unwrap_err(), Error::NameTaken { name } if name == "GL 99 ZZZ"));

        Ok(())
    }

    #[tokio::test]
    async fn test_find_or_create_reuses_existing() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let first = find_or_create_vehicle(&db, profile.id, "GL 10 AAA").await?;
        let second = find_or_create_vehicle(&db, profile.id, " gl 10 aaa ").await?;
        assert_eq!(first.id, second.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_normalized_creation_assigns_default_category() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let other = create_category(&db, profile.id, "Camion", None, None).await?;
        let default =
            create_category(&db, profile.id, DEFAULT_CATEGORY_NAME, None, None).await?;

        let vehicle = find_or_create_normalized(&db, profile.id, "gl-11 bbb").await?;
        assert_eq!(vehicle.plate_number, "GL11BBB");
        assert_eq!(vehicle.category_id, Some(default.id));
        assert_ne!(vehicle.category_id, Some(other.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_normalized_creation_falls_back_to_first_category() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let first = create_category(&db, profile.id, "Camion", None, None).await?;
        create_category(&db, profile.id, "Utilaj", None, None).await?;

        let vehicle = find_or_create_normalized(&db, profile.id, "gl 12 ccc").await?;
        assert_eq!(vehicle.category_id, Some(first.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_company_change_cascades_to_transactions() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let old_company = create_test_company(&db, profile.id, "Old SRL").await?;
        let new_company = create_test_company(&db, profile.id, "New SRL").await?;
        let vehicle =
            create_test_vehicle(&db, profile.id, "GL 13 DDD", Some(old_company.id)).await?;
        let recorded = create_test_transaction(&db, profile.id, vehicle.id, 40.0).await?;
        assert_eq!(recorded.company_id, Some(old_company.id));

        move_vehicle(&db, profile.id, vehicle.id, Some(new_company.id)).await?;

        let transaction = Transaction::find_by_id(recorded.id).one(&db).await?.unwrap();
        assert_eq!(transaction.company_id, Some(new_company.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_vehicle_with_transactions_refused() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 14 EEE", None).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 25.0).await?;

        let result = delete_vehicle(&db, profile.id, vehicle.id).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::VehicleInUse { plate, count: 1 } if plate == "GL 14 EEE"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_category_in_use_refused() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let category = create_category(&db, profile.id, "Camion", None, None).await?;
        create_vehicle(&db, profile.id, "GL 15 FFF", None, Some(category.id)).await?;

        let result = delete_category(&db, profile.id, category.id).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::CategoryInUse { name, count: 1 } if name == "Camion"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_company_assignment() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Fleet SRL").await?;
        let a = create_test_vehicle(&db, profile.id, "GL 16 GGG", None).await?;
        let b = create_test_vehicle(&db, profile.id, "GL 17 HHH", None).await?;
        let recorded = create_test_transaction(&db, profile.id, a.id, 15.0).await?;

        let updated =
            assign_company_bulk(&db, profile.id, &[a.id, b.id], company.id).await?;
        assert_eq!(updated, 2);

        let a = get_vehicle(&db, profile.id, a.id).await?;
        assert_eq!(a.company_id, Some(company.id));
        let transaction = Transaction::find_by_id(recorded.id).one(&db).await?.unwrap();
        assert_eq!(transaction.company_id, Some(company.id));

        Ok(())
    }
}

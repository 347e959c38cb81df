//! Database configuration module for the fuel ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! It provides functions for establishing database connections and creating all necessary tables
//! based on the entity definitions. The module uses `SeaORM`'s `Schema::create_table_from_entity`
//! method to automatically generate SQL statements from the entity models, ensuring that the
//! database schema matches the Rust struct definitions without requiring manual SQL. The
//! composite UNIQUE constraints (duplicate-detection key, per-profile name uniqueness) are not
//! expressible on a single entity column, so they are added as explicit index statements.

use crate::entities::{
    AppSetting, Company, Gestiune, HistoryLog, StockOperation, Transaction, Vehicle,
    VehicleCategory, app_setting, company, transaction, vehicle, vehicle_category,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/fuel_ledger.sqlite".to_string())
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL` environment variable.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
/// This function handles connection errors and provides a clean interface for database access
/// throughout the application.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();

    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Works against any connection, so the profile export code can reuse it to
/// lay out a fresh standalone backup file.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut gestiune_table = schema.create_table_from_entity(Gestiune);
    let mut company_table = schema.create_table_from_entity(Company);
    let mut category_table = schema.create_table_from_entity(VehicleCategory);
    let mut vehicle_table = schema.create_table_from_entity(Vehicle);
    let mut stock_operation_table = schema.create_table_from_entity(StockOperation);
    let mut transaction_table = schema.create_table_from_entity(Transaction);
    let mut history_log_table = schema.create_table_from_entity(HistoryLog);
    let mut app_settings_table = schema.create_table_from_entity(AppSetting);

    db.execute(builder.build(gestiune_table.if_not_exists())).await?;
    db.execute(builder.build(company_table.if_not_exists())).await?;
    db.execute(builder.build(category_table.if_not_exists())).await?;
    db.execute(builder.build(vehicle_table.if_not_exists())).await?;
    db.execute(builder.build(stock_operation_table.if_not_exists())).await?;
    db.execute(builder.build(transaction_table.if_not_exists())).await?;
    db.execute(builder.build(history_log_table.if_not_exists())).await?;
    db.execute(builder.build(app_settings_table.if_not_exists())).await?;

    for mut index in unique_indexes() {
        db.execute(builder.build(index.if_not_exists())).await?;
    }

    Ok(())
}

/// Composite UNIQUE constraints enforced on top of the generated tables.
///
/// The transaction index is the duplicate-detection key; the rest keep names,
/// plates and setting keys unique within a profile.
fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("ux_company_name_gestiune")
            .table(Company)
            .col(company::Column::Name)
            .col(company::Column::GestiuneId)
            .unique()
            .to_owned(),
        Index::create()
            .name("ux_category_name_gestiune")
            .table(VehicleCategory)
            .col(vehicle_category::Column::Name)
            .col(vehicle_category::Column::GestiuneId)
            .unique()
            .to_owned(),
        Index::create()
            .name("ux_vehicle_plate_gestiune")
            .table(Vehicle)
            .col(vehicle::Column::PlateNumber)
            .col(vehicle::Column::GestiuneId)
            .unique()
            .to_owned(),
        Index::create()
            .name("ux_transaction_dedup")
            .table(Transaction)
            .col(transaction::Column::Date)
            .col(transaction::Column::VehicleId)
            .col(transaction::Column::Quantity)
            .col(transaction::Column::GestiuneId)
            .unique()
            .to_owned(),
        Index::create()
            .name("ux_setting_key_gestiune")
            .table(AppSetting)
            .col(app_setting::Column::Key)
            .col(app_setting::Column::GestiuneId)
            .unique()
            .to_owned(),
    ]
}

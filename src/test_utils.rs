//! Shared test utilities for the fuel ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults. Creation helpers go
//! through the ledger so journal entries exist, exactly like production
//! writes.

use crate::{
    core::{company, ledger, profile, vehicle},
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A deterministic timestamp inside February 2026.
#[must_use]
pub fn test_date(day: u32, hour: u32, minute: u32) -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2026, 2, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap_or_default()
}

/// Creates a test profile named "Test depot".
pub async fn create_test_profile(db: &DatabaseConnection) -> Result<entities::gestiune::Model> {
    profile::create_profile(db, "Test depot", Some("TD".to_string())).await
}

/// Creates a test company with no invoicing details.
pub async fn create_test_company(
    db: &DatabaseConnection,
    gestiune_id: i64,
    name: &str,
) -> Result<entities::company::Model> {
    company::create_company(db, gestiune_id, name, None, None, None).await
}

/// Creates a test vehicle with no category.
pub async fn create_test_vehicle(
    db: &DatabaseConnection,
    gestiune_id: i64,
    plate: &str,
    company_id: Option<i64>,
) -> Result<entities::vehicle::Model> {
    vehicle::create_vehicle(db, gestiune_id, plate, company_id, None).await
}

/// Creates a journaled IN stock operation with no company.
///
/// The date is derived from the quantity so repeated calls with different
/// quantities never collide.
///
/// # Panics
/// Never; the missing description rules out the transaction reroute.
pub async fn create_test_stock_operation(
    db: &DatabaseConnection,
    gestiune_id: i64,
    quantity: f64,
) -> Result<entities::stock_operation::Model> {
    #[allow(clippy::cast_possible_truncation)]
    let offset = quantity.abs().round().min(86000.0) as i64;
    let entry = ledger::create_stock_operation(
        db,
        gestiune_id,
        ledger::NewStockOperation {
            operation_type: entities::OperationType::In,
            quantity,
            date: test_date(1, 12, 0) + chrono::Duration::seconds(offset),
            description: None,
            company_id: None,
        },
    )
    .await?;
    match entry {
        ledger::LedgerEntry::StockOperation(operation) => Ok(operation),
        ledger::LedgerEntry::Transaction(_) => unreachable!("no description was given"),
    }
}

/// Creates a journaled consumption transaction.
///
/// The company comes from the vehicle; the date is derived from the quantity
/// so repeated calls with different quantities never collide on the
/// duplicate-detection key.
pub async fn create_test_transaction(
    db: &DatabaseConnection,
    gestiune_id: i64,
    vehicle_id: i64,
    quantity: f64,
) -> Result<entities::transaction::Model> {
    #[allow(clippy::cast_possible_truncation)]
    let offset = quantity.abs().round().min(86000.0) as i64;
    let date = test_date(2, 8, 0) + chrono::Duration::seconds(offset);
    ledger::create_transaction(db, gestiune_id, vehicle_id, date, quantity).await
}

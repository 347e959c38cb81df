//! Profile export and import.
//!
//! A backup is a standalone `SQLite` file holding one profile's rows under
//! the same schema as the live database. Export copies the profile out with
//! fresh ids; import wipes the target profile and copies the backup in.
//! Imports read the source through raw statements so legacy files with
//! missing columns or no `gestiune` table still load.

use crate::{
    busy::{BusyLock, BusyState},
    config::database::create_tables,
    core::{profile, restore},
    entities::{
        AppSetting, Company, HistoryLog, OperationType, StockOperation, Transaction,
        Vehicle, VehicleCategory, app_setting, company, gestiune, history_log, stock_operation,
        transaction, vehicle, vehicle_category,
    },
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::Set,
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult, Statement,
    TransactionTrait, prelude::*,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Per-table row counts of an export or import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCounts {
    /// Vehicle categories copied
    pub categories: u64,
    /// Companies copied
    pub companies: u64,
    /// Vehicles copied
    pub vehicles: u64,
    /// Stock operations copied
    pub stock_operations: u64,
    /// Transactions copied
    pub transactions: u64,
    /// Settings copied
    pub settings: u64,
    /// Transactions dropped because their vehicle did not map
    pub skipped_transactions: u64,
}

/// Exports one profile into a fresh standalone `SQLite` file at `path`.
///
/// The file must not exist yet. Rows are copied in dependency order with
/// fresh ids; only the profile row keeps its id so a re-import can detect
/// it. Transactions whose vehicle is gone are skipped and counted.
pub async fn export_profile(
    db: &DatabaseConnection,
    gestiune_id: i64,
    path: &Path,
) -> Result<TableCounts> {
    if path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("backup target {} already exists", path.display()),
        )));
    }
    let source_profile = profile::get_profile(db, gestiune_id).await?;

    let target = Database::connect(format!("sqlite://{}?mode=rwc", path.display())).await?;
    create_tables(&target).await?;

    gestiune::ActiveModel {
        id: Set(source_profile.id),
        name: Set(source_profile.name.clone()),
        site_code: Set(source_profile.site_code.clone()),
        default_fuel_type: Set(source_profile.default_fuel_type.clone()),
        created_at: Set(source_profile.created_at),
    }
    .insert(&target)
    .await?;

    let mut counts = TableCounts::default();

    let mut category_map = HashMap::new();
    for row in VehicleCategory::find()
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
    {
        let inserted = vehicle_category::ActiveModel {
            name: Set(row.name.clone()),
            description: Set(row.description.clone()),
            icon: Set(row.icon.clone()),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&target)
        .await?;
        category_map.insert(row.id, inserted.id);
        counts.categories += 1;
    }

    let mut company_map = HashMap::new();
    for row in Company::find()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
    {
        let inserted = company::ActiveModel {
            name: Set(row.name.clone()),
            cui: Set(row.cui.clone()),
            address: Set(row.address.clone()),
            product_code: Set(row.product_code.clone()),
            capacity: Set(row.capacity),
            last_report_start: Set(row.last_report_start),
            last_report_end: Set(row.last_report_end),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&target)
        .await?;
        company_map.insert(row.id, inserted.id);
        counts.companies += 1;
    }

    let mut vehicle_map = HashMap::new();
    for row in Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
    {
        let inserted = vehicle::ActiveModel {
            plate_number: Set(row.plate_number.clone()),
            company_id: Set(row.company_id.and_then(|id| company_map.get(&id).copied())),
            category_id: Set(row.category_id.and_then(|id| category_map.get(&id).copied())),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&target)
        .await?;
        vehicle_map.insert(row.id, inserted.id);
        counts.vehicles += 1;
    }

    for row in StockOperation::find()
        .filter(stock_operation::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
    {
        stock_operation::ActiveModel {
            operation_type: Set(row.operation_type),
            quantity: Set(row.quantity),
            date: Set(row.date),
            description: Set(row.description.clone()),
            company_id: Set(row.company_id.and_then(|id| company_map.get(&id).copied())),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&target)
        .await?;
        counts.stock_operations += 1;
    }

    for row in Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
    {
        let Some(vehicle_id) = row.vehicle_id.and_then(|id| vehicle_map.get(&id).copied())
        else {
            warn!(transaction = row.id, "skipping transaction with no mapped vehicle");
            counts.skipped_transactions += 1;
            continue;
        };
        transaction::ActiveModel {
            date: Set(row.date),
            vehicle_id: Set(Some(vehicle_id)),
            company_id: Set(row.company_id.and_then(|id| company_map.get(&id).copied())),
            quantity: Set(row.quantity),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&target)
        .await?;
        counts.transactions += 1;
    }

    for row in AppSetting::find()
        .filter(app_setting::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
    {
        app_setting::ActiveModel {
            key: Set(row.key.clone()),
            value: Set(row.value.clone()),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&target)
        .await?;
        counts.settings += 1;
    }

    info!(
        gestiune_id,
        path = %path.display(),
        transactions = counts.transactions,
        skipped = counts.skipped_transactions,
        "profile exported"
    );
    Ok(counts)
}

fn col_i64(row: &QueryResult, col: &str) -> Option<i64> {
    row.try_get::<Option<i64>>("", col).ok().flatten()
}

fn col_f64(row: &QueryResult, col: &str) -> Option<f64> {
    row.try_get::<Option<f64>>("", col).ok().flatten()
}

fn col_string(row: &QueryResult, col: &str) -> Option<String> {
    row.try_get::<Option<String>>("", col).ok().flatten()
}

/// Dates in a backup may come from several writers; try their formats in
/// order of likelihood.
fn col_datetime(row: &QueryResult, col: &str) -> Option<NaiveDateTime> {
    let raw = col_string(row, col)?;
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&raw, format) {
            return Some(parsed);
        }
    }
    chrono::NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

async fn table_exists(conn: &DatabaseConnection, table: &str) -> Result<bool> {
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Sqlite,
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        [table.into()],
    );
    Ok(conn.query_one(stmt).await?.is_some())
}

async fn table_columns(conn: &DatabaseConnection, table: &str) -> Result<HashSet<String>> {
    let stmt = Statement::from_string(
        DatabaseBackend::Sqlite,
        format!("PRAGMA table_info(\"{table}\")"),
    );
    let rows = conn.query_all(stmt).await?;
    let mut columns = HashSet::with_capacity(rows.len());
    for row in &rows {
        columns.insert(row.try_get::<String>("", "name")?);
    }
    Ok(columns)
}

/// Reads every row of `table`, filtered by profile when both the filter and
/// the column exist. Returns nothing when the table itself is absent.
async fn fetch_rows(
    conn: &DatabaseConnection,
    table: &str,
    source_gestiune: Option<i64>,
) -> Result<Vec<QueryResult>> {
    if !table_exists(conn, table).await? {
        return Ok(Vec::new());
    }
    let columns = table_columns(conn, table).await?;
    let stmt = match source_gestiune {
        Some(gid) if columns.contains("gestiune_id") => Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            format!("SELECT * FROM \"{table}\" WHERE gestiune_id = ?"),
            [gid.into()],
        ),
        _ => Statement::from_string(DatabaseBackend::Sqlite, format!("SELECT * FROM \"{table}\"")),
    };
    Ok(conn.query_all(stmt).await?)
}

/// First profile id in the source, when the source is multi-profile at all.
async fn detect_source_profile(source: &DatabaseConnection) -> Result<Option<i64>> {
    if !table_exists(source, "gestiune").await? {
        return Ok(None);
    }
    let stmt = Statement::from_string(
        DatabaseBackend::Sqlite,
        "SELECT id FROM gestiune ORDER BY id LIMIT 1".to_string(),
    );
    Ok(source
        .query_one(stmt)
        .await?
        .as_ref()
        .and_then(|row| col_i64(row, "id")))
}

/// Replaces the target profile's data with the contents of a backup file.
///
/// The source is opened read-only and never modified. All target writes
/// happen in one transaction: the profile's journal and business rows are
/// deleted in dependency order, then the source rows are inserted with
/// fresh ids. A failure anywhere rolls the target back untouched. Holds the
/// restore busy token for the whole run.
pub async fn import_profile_overwrite(
    db: &DatabaseConnection,
    busy: &BusyLock,
    gestiune_id: i64,
    path: &Path,
) -> Result<TableCounts> {
    let _guard = busy.acquire(BusyState::Restoring)?;
    restore::validate_sqlite_header(path)?;
    profile::get_profile(db, gestiune_id).await?;

    let source = Database::connect(format!("sqlite://{}?mode=ro", path.display())).await?;
    let source_gestiune = detect_source_profile(&source).await?;
    info!(
        gestiune_id,
        source_profile = ?source_gestiune,
        path = %path.display(),
        "importing profile from backup"
    );

    let categories = fetch_rows(&source, "vehicle_category", source_gestiune).await?;
    let companies = fetch_rows(&source, "company", source_gestiune).await?;
    let vehicles = fetch_rows(&source, "vehicle", source_gestiune).await?;
    let operations = fetch_rows(&source, "stock_operation", source_gestiune).await?;
    let transactions = fetch_rows(&source, "transaction", source_gestiune).await?;
    let settings = fetch_rows(&source, "app_settings", source_gestiune).await?;

    let txn = db.begin().await?;
    let mut counts = TableCounts::default();

    // A fresh dataset invalidates every journaled snapshot.
    HistoryLog::delete_many()
        .filter(history_log::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    Transaction::delete_many()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    StockOperation::delete_many()
        .filter(stock_operation::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    Vehicle::delete_many()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    Company::delete_many()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    VehicleCategory::delete_many()
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    AppSetting::delete_many()
        .filter(app_setting::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;

    let mut category_map = HashMap::new();
    for row in &categories {
        let Some(name) = col_string(row, "name") else {
            warn!("skipping category with no name");
            continue;
        };
        let inserted = vehicle_category::ActiveModel {
            name: Set(name),
            description: Set(col_string(row, "description")),
            icon: Set(col_string(row, "icon")
                .unwrap_or_else(|| vehicle_category::DEFAULT_ICON.to_string())),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        if let Some(old_id) = col_i64(row, "id") {
            category_map.insert(old_id, inserted.id);
        }
        counts.categories += 1;
    }

    let mut company_map = HashMap::new();
    for row in &companies {
        let Some(name) = col_string(row, "name") else {
            warn!("skipping company with no name");
            continue;
        };
        let inserted = company::ActiveModel {
            name: Set(name),
            cui: Set(col_string(row, "cui")),
            address: Set(col_string(row, "address")),
            product_code: Set(col_string(row, "product_code")),
            capacity: Set(col_f64(row, "capacity")),
            last_report_start: Set(col_datetime(row, "last_report_start")),
            last_report_end: Set(col_datetime(row, "last_report_end")),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        if let Some(old_id) = col_i64(row, "id") {
            company_map.insert(old_id, inserted.id);
        }
        counts.companies += 1;
    }

    let mut vehicle_map = HashMap::new();
    for row in &vehicles {
        let Some(plate) = col_string(row, "plate_number") else {
            warn!("skipping vehicle with no plate");
            continue;
        };
        let inserted = vehicle::ActiveModel {
            plate_number: Set(plate),
            company_id: Set(col_i64(row, "company_id")
                .and_then(|id| company_map.get(&id).copied())),
            category_id: Set(col_i64(row, "category_id")
                .and_then(|id| category_map.get(&id).copied())),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        if let Some(old_id) = col_i64(row, "id") {
            vehicle_map.insert(old_id, inserted.id);
        }
        counts.vehicles += 1;
    }

    for row in &operations {
        let operation_type = match col_string(row, "operation_type").as_deref() {
            Some("INITIAL") => OperationType::Initial,
            Some("IN") => OperationType::In,
            Some("OUT") => OperationType::Out,
            other => {
                warn!(?other, "skipping stock operation with unknown type");
                continue;
            }
        };
        let (Some(quantity), Some(date)) = (col_f64(row, "quantity"), col_datetime(row, "date"))
        else {
            warn!("skipping stock operation with no quantity or date");
            continue;
        };
        stock_operation::ActiveModel {
            operation_type: Set(operation_type),
            quantity: Set(quantity),
            date: Set(date),
            description: Set(col_string(row, "description")),
            company_id: Set(col_i64(row, "company_id")
                .and_then(|id| company_map.get(&id).copied())),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        counts.stock_operations += 1;
    }

    for row in &transactions {
        let vehicle_id =
            col_i64(row, "vehicle_id").and_then(|id| vehicle_map.get(&id).copied());
        let (Some(vehicle_id), Some(quantity), Some(date)) =
            (vehicle_id, col_f64(row, "quantity"), col_datetime(row, "date"))
        else {
            counts.skipped_transactions += 1;
            warn!("skipping transaction with no mapped vehicle, quantity or date");
            continue;
        };
        transaction::ActiveModel {
            date: Set(date),
            vehicle_id: Set(Some(vehicle_id)),
            company_id: Set(col_i64(row, "company_id")
                .and_then(|id| company_map.get(&id).copied())),
            quantity: Set(quantity),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        counts.transactions += 1;
    }

    // Last write wins on duplicated keys in legacy files.
    let mut unique_settings: HashMap<String, String> = HashMap::new();
    for row in &settings {
        if let Some(key) = col_string(row, "key") {
            unique_settings.insert(key, col_string(row, "value").unwrap_or_default());
        }
    }
    for (key, value) in unique_settings {
        app_setting::ActiveModel {
            key: Set(key),
            value: Set(value),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        counts.settings += 1;
    }

    txn.commit().await?;
    info!(
        gestiune_id,
        transactions = counts.transactions,
        skipped = counts.skipped_transactions,
        "profile import finished"
    );
    Ok(counts)
}

//! Heuristic CSV import of pump-station exports.
//!
//! The source files have no header, are encoded as Windows-1252 and mix two
//! column layouts: the standard one puts the quantity in column 14, the
//! shifted one (machines and transports) puts it in column 16 as an integer
//! whose last two digits are decimals, so `26005` means 260.05 liters. The
//! plate is reliably in column 15 either way. Quantity resolution is an
//! explicit decision table so a new export variant is one more row, not a
//! new branch.
//!
//! A bad row never aborts the batch: it is skipped with a warning. Rows that
//! collide on the duplicate-detection key are diverted into a review list
//! instead of being inserted. Everything that does get inserted commits
//! atomically at the end.

use crate::{
    busy::{BusyLock, BusyState},
    config::import::ImportConfig,
    core::vehicle::find_or_create_vehicle,
    entities::{Company, Transaction, company, transaction},
    errors::Result,
};
use sea_orm::{ConnectionTrait, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// 0-based column of the license plate.
const PLATE_COLUMN: usize = 15;
/// 0-based column of the date (`%d.%m.%Y`).
const DATE_COLUMN: usize = 10;
/// 0-based column of the time (`%H:%M`).
const TIME_COLUMN: usize = 11;
/// Rows narrower than this are malformed exports.
const MIN_COLUMNS: usize = 14;
/// Missing-value marker the exporter writes into empty plate cells.
const MISSING_MARKER: &str = "NAN";

/// One row of the quantity decision table: read `column`, divide by
/// `divisor`. The first rule whose parsed value is positive wins.
struct QuantityRule {
    column: usize,
    divisor: f64,
}

/// Ordered candidate columns for the quantity.
///
/// Column 16 is the shifted layout and carries hundredths of a liter;
/// column 14 is the standard layout in plain liters; column 13 is a last
/// resort seen in partial exports.
const QUANTITY_RULES: [QuantityRule; 3] = [
    QuantityRule {
        column: 16,
        divisor: 100.0,
    },
    QuantityRule {
        column: 14,
        divisor: 1.0,
    },
    QuantityRule {
        column: 13,
        divisor: 1.0,
    },
];

/// A row that collided with an existing transaction, surfaced for review.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateRecord {
    /// 0-based row index in the source file
    pub row_index: usize,
    /// Parsed date, `%Y-%m-%d`
    pub date: String,
    /// Parsed time, `%H:%M`
    pub time: String,
    /// Plate as it appears in the file
    pub plate: String,
    /// Resolved quantity in liters
    pub quantity: f64,
    /// Resolved company name, `"N/A"` when unallocated
    pub company: String,
    /// Resolved company id
    pub company_id: Option<i64>,
    /// Id of the pre-existing transaction
    pub existing_id: i64,
}

/// Outcome of one import batch.
#[derive(Debug)]
pub struct ImportReport {
    /// Rows inserted
    pub imported: usize,
    /// Rows skipped as malformed or unparsable
    pub skipped: usize,
    /// Rows diverted for duplicate review, none of them inserted
    pub duplicates: Vec<DuplicateRecord>,
    /// Human-readable summary
    pub message: String,
}

/// External plate-to-company mapping hook.
///
/// Company assignment is deferred to manual review, so this resolves
/// nothing; it stays as the seam where a site-specific mapping would plug
/// in.
#[allow(clippy::missing_const_for_fn)]
fn company_for_plate(_plate: &str) -> Option<i64> {
    None
}

/// Lenient numeric parse: comma as decimal separator, anything unparsable
/// is zero.
fn lenient_number(raw: &str) -> f64 {
    raw.trim().replace(',', ".").parse().unwrap_or(0.0)
}

/// Runs the quantity decision table over one record.
fn resolve_quantity(record: &csv::StringRecord) -> Option<f64> {
    QUANTITY_RULES.iter().find_map(|rule| {
        let value = lenient_number(record.get(rule.column).unwrap_or(""));
        (value > 0.0).then_some(value / rule.divisor)
    })
}

/// Parses the date and time cells into a timestamp.
///
/// A missing or too-short time defaults to midnight; the literal word
/// `date` guards against header rows that slipped into the data.
fn resolve_date(date_raw: &str, time_raw: &str) -> Option<chrono::NaiveDateTime> {
    let date_val = date_raw.trim();
    if date_val.is_empty() || date_val.eq_ignore_ascii_case("date") {
        return None;
    }
    let time_val = time_raw.trim();
    let time_val = if time_val.len() < 3 { "00:00" } else { time_val };

    let stamp = format!("{date_val} {time_val}");
    chrono::NaiveDateTime::parse_from_str(&stamp, "%d.%m.%Y %H:%M")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(date_val, "%d.%m.%Y")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Imports a pump-station CSV file into a profile, holding the import busy
/// token for the duration.
///
/// # Errors
/// [`crate::errors::Error::OperationInProgress`] when another exclusive
/// operation is running; I/O and database failures abort the whole batch
/// with nothing committed.
pub async fn import_csv_file<P: AsRef<Path>>(
    db: &DatabaseConnection,
    busy: &BusyLock,
    gestiune_id: i64,
    path: P,
    config: &ImportConfig,
) -> Result<ImportReport> {
    let _guard = busy.acquire(BusyState::Importing)?;
    let bytes = std::fs::read(path.as_ref())?;
    import_csv_bytes(db, gestiune_id, &bytes, config).await
}

/// Imports raw CSV bytes into a profile.
///
/// Decodes as Windows-1252, parses with a comma separator and falls back to
/// semicolon when the first record has fewer than two fields.
pub async fn import_csv_bytes(
    db: &DatabaseConnection,
    gestiune_id: i64,
    bytes: &[u8],
    config: &ImportConfig,
) -> Result<ImportReport> {
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);

    let mut records = read_records(decoded.as_ref(), b',')?;
    if records.first().is_some_and(|r| r.len() < 2) {
        debug!("Comma parse yielded a single column, retrying with semicolon");
        records = read_records(decoded.as_ref(), b';')?;
    }
    info!("Importing {} rows into profile {gestiune_id}", records.len());

    let legacy_company = config.legacy_company().map(str::to_uppercase);

    let mut imported = 0usize;
    let mut skipped = 0usize;
    let mut duplicates = Vec::new();

    let txn = db.begin().await?;

    for (index, record) in records.iter().enumerate() {
        if record.len() < MIN_COLUMNS {
            warn!("Row {index}: skipped, only {} columns", record.len());
            skipped += 1;
            continue;
        }

        let plate = record
            .get(PLATE_COLUMN)
            .unwrap_or("")
            .trim()
            .to_uppercase();
        if plate.len() <= 1 || plate == MISSING_MARKER {
            warn!("Row {index}: skipped, invalid plate '{plate}'");
            skipped += 1;
            continue;
        }

        let Some(date) = resolve_date(
            record.get(DATE_COLUMN).unwrap_or(""),
            record.get(TIME_COLUMN).unwrap_or(""),
        ) else {
            warn!(
                "Row {index}: skipped, unparsable date '{}'",
                record.get(DATE_COLUMN).unwrap_or("")
            );
            skipped += 1;
            continue;
        };

        let Some(quantity) = resolve_quantity(record) else {
            warn!("Row {index}: skipped, no positive quantity candidate");
            skipped += 1;
            continue;
        };

        let vehicle = find_or_create_vehicle(&txn, gestiune_id, &plate).await?;
        let company =
            resolve_company(&txn, &vehicle, legacy_company.as_deref(), gestiune_id).await?;

        let existing = Transaction::find()
            .filter(transaction::Column::GestiuneId.eq(gestiune_id))
            .filter(transaction::Column::VehicleId.eq(vehicle.id))
            .filter(transaction::Column::Date.eq(date))
            .filter(transaction::Column::Quantity.eq(quantity))
            .one(&txn)
            .await?;

        if let Some(existing) = existing {
            duplicates.push(DuplicateRecord {
                row_index: index,
                date: date.format("%Y-%m-%d").to_string(),
                time: date.format("%H:%M").to_string(),
                plate,
                quantity,
                company: company
                    .as_ref()
                    .map_or_else(|| "N/A".to_string(), |c| c.name.clone()),
                company_id: company.as_ref().map(|c| c.id),
                existing_id: existing.id,
            });
            continue;
        }

        transaction::ActiveModel {
            date: Set(date),
            vehicle_id: Set(Some(vehicle.id)),
            company_id: Set(company.as_ref().map(|c| c.id)),
            quantity: Set(quantity),
            gestiune_id: Set(gestiune_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        imported += 1;
        debug!("Row {index}: imported {plate} {quantity:.2} L");
    }

    txn.commit().await?;

    let message = format!(
        "Imported {imported} records. Found {} duplicates.",
        duplicates.len()
    );
    info!("{message}");
    Ok(ImportReport {
        imported,
        skipped,
        duplicates,
        message,
    })
}

/// Summary message for the human review step.
///
/// Keep-or-discard was already applied at import time; this step mutates
/// nothing and only reports what happened.
#[must_use]
pub fn review_summary(report: &ImportReport) -> String {
    format!(
        "Import finished: {} rows taken, {} duplicates ignored.",
        report.imported,
        report.duplicates.len()
    )
}

fn read_records(text: &str, delimiter: u8) -> Result<Vec<csv::StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }
    Ok(records)
}

/// Resolves the company a transaction is billed to.
///
/// Order: the external plate mapping (currently empty), then the vehicle's
/// own company, except the legacy rule: the legacy default company's
/// uncategorized vehicles were auto-created by an old fallback, so their
/// fuel is booked as unallocated.
async fn resolve_company<C: ConnectionTrait>(
    conn: &C,
    vehicle: &crate::entities::vehicle::Model,
    legacy_company: Option<&str>,
    gestiune_id: i64,
) -> Result<Option<company::Model>> {
    if let Some(mapped_id) = company_for_plate(&vehicle.plate_number) {
        let mapped = Company::find_by_id(mapped_id)
            .filter(company::Column::GestiuneId.eq(gestiune_id))
            .one(conn)
            .await?;
        if mapped.is_some() {
            return Ok(mapped);
        }
    }

    let Some(company_id) = vehicle.company_id else {
        return Ok(None);
    };
    let Some(owner) = Company::find_by_id(company_id)
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    let is_legacy = legacy_company.is_some_and(|name| owner.name.to_uppercase() == name);
    if is_legacy && vehicle.category_id.is_none() {
        debug!(
            "Vehicle {} belongs to the legacy default company and has no category, booking as unallocated",
            vehicle.plate_number
        );
        return Ok(None);
    }
    Ok(Some(owner))
}

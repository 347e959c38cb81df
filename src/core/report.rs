//! Report aggregation business logic.
//!
//! This module produces the structured data behind fuel tickets and the
//! monthly depot summary. Rendering is a caller concern; every derived
//! figure is computed here exactly once so a renderer never has to redo
//! arithmetic.

use crate::{
    entities::{
        Company, OperationType, StockOperation, Transaction, Vehicle, company, stock_operation,
        transaction, vehicle,
    },
    errors::Result,
};
use chrono::NaiveDateTime;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, IntoActiveModel, QueryOrder, prelude::*};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Series code printed on tickets with no resolvable company.
pub const UNKNOWN_SERIES: &str = "---";

/// Company name printed on tickets with no resolvable company.
pub const UNKNOWN_COMPANY: &str = "NECUNOSCUT";

/// One fuel ticket, ready for rendering.
#[derive(Debug, Clone)]
pub struct FuelTicket {
    /// Per-company sequence number, restarting at 1 on company change
    pub annex_number: u32,
    /// Three-letter series code of the company
    pub series: String,
    /// Moment of the draw
    pub date: NaiveDateTime,
    /// Vehicle plate, `"N/A"` when the vehicle is gone
    pub plate: String,
    /// Liters drawn
    pub quantity: f64,
    /// Company id, None for unattributed draws
    pub company_id: Option<i64>,
    /// Company name or [`UNKNOWN_COMPANY`]
    pub company_name: String,
    /// Fiscal code, `"-"` when absent
    pub company_cui: String,
    /// Registered address, `"-"` when absent
    pub company_address: String,
}

/// Per-company row of the monthly summary.
#[derive(Debug, Clone)]
pub struct CompanySummary {
    /// Company id
    pub company_id: i64,
    /// Company name
    pub name: String,
    /// Sum of INITIAL operations, all time
    pub stock_initial: f64,
    /// Sum of IN operations within the period
    pub total_in: f64,
    /// Manual OUT plus all consumption within the period
    pub total_out: f64,
    /// `stock_initial + total_in - total_out`
    pub stock_final: f64,
}

/// One line of the chronological consumption listing.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    /// Moment of the draw
    pub date: NaiveDateTime,
    /// Vehicle plate, `"N/A"` when the vehicle is gone
    pub plate: String,
    /// Company name, `"N/A"` when unattributed
    pub company: String,
    /// Liters drawn
    pub quantity: f64,
}

/// Pump totalizer reconciliation against the computed outflow.
#[derive(Debug, Clone)]
pub struct PumpCheck {
    /// Operator-entered initial reading
    pub meter_initial: f64,
    /// Operator-entered final reading
    pub meter_final: f64,
    /// `meter_final - meter_initial`
    pub meter_diff: f64,
    /// Total outflow computed from the ledger
    pub total_out: f64,
    /// `meter_diff - total_out`
    pub discrepancy: f64,
    /// Whether the readings agree within [`PUMP_TOLERANCE`] liters
    pub matches: bool,
}

/// Tolerance in liters under which pump readings count as matching.
pub const PUMP_TOLERANCE: f64 = 1.0;

/// The complete monthly summary for a period.
#[derive(Debug, Clone)]
pub struct MonthlySummary {
    /// Per-company rows, ordered by company id
    pub companies: Vec<CompanySummary>,
    /// Σ `stock_initial` over all companies
    pub total_initial: f64,
    /// Σ `total_in` over all companies
    pub total_in: f64,
    /// Σ `total_out` over all companies
    pub total_out: f64,
    /// Σ `stock_final` over all companies
    pub total_final: f64,
    /// Chronological consumption listing for the period
    pub entries: Vec<ReportEntry>,
    /// Pump reconciliation, present when meter readings were supplied
    pub pump_check: Option<PumpCheck>,
}

/// Assigns a deterministic three-letter series code to each company.
///
/// Companies are processed in id order so codes never shuffle when a new
/// company appears. A name shorter than three letters is uppercased and
/// right-padded with `X`. Longer names try, in order: first+second+last
/// letter, then first+nth+last over the internal letters, then the word
/// initials of multi-word names, and finally the literal first+`X`+last.
/// The first candidate not already claimed wins; the final fallback is
/// used even when claimed, so every company gets a code.
#[must_use]
pub fn series_codes(companies: &[company::Model]) -> HashMap<i64, String> {
    let mut map = HashMap::with_capacity(companies.len());
    let mut taken: HashSet<String> = HashSet::new();

    let mut ordered: Vec<&company::Model> = companies.iter().collect();
    ordered.sort_by_key(|c| c.id);

    for company in ordered {
        let code = series_candidates(&company.name)
            .into_iter()
            .find(|cand| !taken.contains(cand))
            .unwrap_or_else(|| fallback_code(&company.name));
        taken.insert(code.clone());
        map.insert(company.id, code);
    }
    map
}

fn fallback_code(name: &str) -> String {
    let chars: Vec<char> = name.to_uppercase().chars().collect();
    match (chars.first(), chars.last()) {
        (Some(first), Some(last)) => format!("{first}X{last}"),
        _ => "XXX".to_string(),
    }
}

fn series_candidates(name: &str) -> Vec<String> {
    let upper = name.to_uppercase();
    let chars: Vec<char> = upper.chars().collect();

    if chars.len() < 3 {
        let mut padded: String = chars.iter().collect();
        while padded.chars().count() < 3 {
            padded.push('X');
        }
        return vec![padded];
    }

    let first = chars[0];
    let last = chars[chars.len() - 1];
    let mut candidates = vec![format!("{first}{}{last}", chars[1])];

    // Internal letter scan, skipping separators
    for &mid in &chars[2..chars.len() - 1] {
        if !mid.is_alphanumeric() {
            continue;
        }
        let cand = format!("{first}{mid}{last}");
        if !candidates.contains(&cand) {
            candidates.push(cand);
        }
    }

    // Word initials for multi-word names
    let words: Vec<&str> = upper
        .split([' ', '\t', '-'])
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() > 1 {
        for word in &words[1..] {
            if let Some(initial) = word.chars().next() {
                let cand = format!("{first}{initial}{last}");
                if !candidates.contains(&cand) {
                    candidates.push(cand);
                }
            }
        }
    }

    candidates.push(format!("{first}X{last}"));
    candidates
}

/// Generates the fuel tickets for a period.
///
/// Transactions are ordered by company then date; the annex number restarts
/// at 1 whenever the company changes in that order. When `company_id` is
/// given, only that company's draws are listed and the period is persisted
/// on the company as its last reported range.
pub async fn fuel_tickets(
    db: &DatabaseConnection,
    gestiune_id: i64,
    start: NaiveDateTime,
    end: NaiveDateTime,
    company_id: Option<i64>,
) -> Result<Vec<FuelTicket>> {
    let companies = Company::find()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?;
    let series = series_codes(&companies);
    let companies: HashMap<i64, company::Model> =
        companies.into_iter().map(|c| (c.id, c)).collect();
    let vehicles: HashMap<i64, vehicle::Model> = Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let mut query = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .filter(transaction::Column::Date.gte(start))
        .filter(transaction::Column::Date.lte(end));
    if let Some(id) = company_id {
        query = query.filter(transaction::Column::CompanyId.eq(id));
    }
    let transactions = query
        .order_by_asc(transaction::Column::CompanyId)
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await?;

    let mut tickets = Vec::with_capacity(transactions.len());
    let mut last_company: Option<Option<i64>> = None;
    let mut annex = 0u32;
    for t in &transactions {
        if last_company == Some(t.company_id) {
            annex += 1;
        } else {
            annex = 1;
            last_company = Some(t.company_id);
        }

        let company = t.company_id.and_then(|id| companies.get(&id));
        tickets.push(FuelTicket {
            annex_number: annex,
            series: t
                .company_id
                .and_then(|id| series.get(&id).cloned())
                .unwrap_or_else(|| UNKNOWN_SERIES.to_string()),
            date: t.date,
            plate: t
                .vehicle_id
                .and_then(|id| vehicles.get(&id))
                .map_or_else(|| "N/A".to_string(), |v| v.plate_number.clone()),
            quantity: t.quantity,
            company_id: t.company_id,
            company_name: company
                .map_or_else(|| UNKNOWN_COMPANY.to_string(), |c| c.name.clone()),
            company_cui: company
                .and_then(|c| c.cui.clone())
                .unwrap_or_else(|| "-".to_string()),
            company_address: company
                .and_then(|c| c.address.clone())
                .unwrap_or_else(|| "-".to_string()),
        });
    }

    if let Some(id) = company_id {
        if let Some(company) = companies.get(&id) {
            let mut active = company.clone().into_active_model();
            active.last_report_start = Set(Some(start));
            active.last_report_end = Set(Some(end));
            active.update(db).await?;
        }
    }

    info!(
        gestiune_id,
        tickets = tickets.len(),
        company = ?company_id,
        "generated fuel tickets"
    );
    Ok(tickets)
}

/// Checks pump totalizer readings against a computed outflow.
#[must_use]
pub fn pump_meter_check(meter_initial: f64, meter_final: f64, total_out: f64) -> PumpCheck {
    let meter_diff = meter_final - meter_initial;
    let discrepancy = meter_diff - total_out;
    PumpCheck {
        meter_initial,
        meter_final,
        meter_diff,
        total_out,
        discrepancy,
        matches: discrepancy.abs() < PUMP_TOLERANCE,
    }
}

/// Builds the monthly depot summary for a period.
///
/// `stock_initial` sums INITIAL operations across all time, treating them as
/// the baseline snapshot; IN, manual OUT and consumption are restricted to
/// the period. Consumption is category-blind here: a company is charged for
/// every attributed draw, unlike the live stock view.
pub async fn monthly_summary(
    db: &DatabaseConnection,
    gestiune_id: i64,
    start: NaiveDateTime,
    end: NaiveDateTime,
    meters: Option<(f64, f64)>,
) -> Result<MonthlySummary> {
    let companies = Company::find()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .order_by_asc(company::Column::Id)
        .all(db)
        .await?;
    let operations = StockOperation::find()
        .filter(stock_operation::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?;
    let transactions = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .filter(transaction::Column::Date.gte(start))
        .filter(transaction::Column::Date.lte(end))
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await?;
    let vehicles: HashMap<i64, vehicle::Model> = Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let mut rows = Vec::with_capacity(companies.len());
    let mut total_initial = 0.0;
    let mut total_in = 0.0;
    let mut total_out = 0.0;
    let mut total_final = 0.0;
    for company in &companies {
        let mut stock_initial = 0.0;
        let mut in_period = 0.0;
        let mut out_manual = 0.0;
        for op in operations.iter().filter(|o| o.company_id == Some(company.id)) {
            match op.operation_type {
                OperationType::Initial => stock_initial += op.quantity,
                OperationType::In if op.date >= start && op.date <= end => {
                    in_period += op.quantity;
                }
                OperationType::Out if op.date >= start && op.date <= end => {
                    out_manual += op.quantity;
                }
                OperationType::In | OperationType::Out => {}
            }
        }
        let consumed: f64 = transactions
            .iter()
            .filter(|t| t.company_id == Some(company.id))
            .map(|t| t.quantity)
            .sum();

        let out_period = out_manual + consumed;
        let stock_final = stock_initial + in_period - out_period;
        total_initial += stock_initial;
        total_in += in_period;
        total_out += out_period;
        total_final += stock_final;
        rows.push(CompanySummary {
            company_id: company.id,
            name: company.name.clone(),
            stock_initial,
            total_in: in_period,
            total_out: out_period,
            stock_final,
        });
    }

    let company_names: HashMap<i64, &str> =
        companies.iter().map(|c| (c.id, c.name.as_str())).collect();
    let entries = transactions
        .iter()
        .map(|t| ReportEntry {
            date: t.date,
            plate: t
                .vehicle_id
                .and_then(|id| vehicles.get(&id))
                .map_or_else(|| "N/A".to_string(), |v| v.plate_number.clone()),
            company: t
                .company_id
                .and_then(|id| company_names.get(&id))
                .map_or_else(|| "N/A".to_string(), |name| (*name).to_string()),
            quantity: t.quantity,
        })
        .collect();

    let pump_check =
        meters.map(|(initial, final_)| pump_meter_check(initial, final_, total_out));

    Ok(MonthlySummary {
        companies: rows,
        total_initial,
        total_in,
        total_out,
        total_final,
        entries,
        pump_check,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]

    use super::*;
    use crate::core::{company as companies, ledger};
    use crate::entities::OperationType;
    use crate::test_utils::{
        create_test_company, create_test_profile, create_test_transaction, create_test_vehicle,
        setup_test_db, test_date,
    };

    fn named(id: i64, name: &str) -> company::Model {
        company::Model {
            id,
            name: name.to_string(),
            cui: None,
            address: None,
            product_code: None,
            capacity: None,
            last_report_start: None,
            last_report_end: None,
            gestiune_id: 1,
        }
    }

    #[test]
    fn test_series_code_standard() {
        let map = series_codes(&[named(1, "Transgat")]);
        assert_eq!(map[&1], "TRT");
    }

    #[test]
    fn test_series_code_short_name_padded() {
        let map = series_codes(&[named(1, "Go")]);
        assert_eq!(map[&1], "GOX");
    }

    #[test]
    fn test_series_code_collision_falls_back_to_scan() {
        // Both names produce TRT first; the second must scan inward.
        let map = series_codes(&[named(1, "Transgat"), named(2, "Trsagt")]);
        assert_eq!(map[&1], "TRT");
        assert_eq!(map[&2], "TST");
    }

    #[test]
    fn test_series_code_word_initials() {
        // The scan has nothing left to offer, so the second word's initial
        // disambiguates.
        let map = series_codes(&[named(1, "AAAB"), named(2, "AA-B")]);
        assert_eq!(map[&1], "AAB");
        assert_eq!(map[&2], "ABB");
    }

    #[test]
    fn test_series_codes_stable_across_input_order() {
        let forward = series_codes(&[named(1, "Transgat"), named(2, "Trsagt")]);
        let reversed = series_codes(&[named(2, "Trsagt"), named(1, "Transgat")]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_pump_meter_check_tolerance_edges() {
        assert!(pump_meter_check(0.0, 100.0, 100.0).matches);
        assert!(pump_meter_check(0.0, 100.0, 99.01).matches);
        assert!(!pump_meter_check(0.0, 100.0, 99.0).matches);
        assert!(pump_meter_check(0.0, 100.0, 100.99).matches);
        assert!(!pump_meter_check(0.0, 100.0, 101.0).matches);
    }

    #[tokio::test]
    async fn test_annex_number_resets_on_company_change() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let first = create_test_company(&db, profile.id, "Alpha SRL").await?;
        let second = create_test_company(&db, profile.id, "Beta SRL").await?;
        let v1 = create_test_vehicle(&db, profile.id, "GL 01 AAA", Some(first.id)).await?;
        let v2 = create_test_vehicle(&db, profile.id, "GL 02 BBB", Some(second.id)).await?;

        create_test_transaction(&db, profile.id, v1.id, 10.0).await?;
        create_test_transaction(&db, profile.id, v1.id, 20.0).await?;
        create_test_transaction(&db, profile.id, v2.id, 30.0).await?;

        let tickets = fuel_tickets(
            &db,
            profile.id,
            test_date(1, 0, 0),
            test_date(28, 23, 59),
            None,
        )
        .await?;
        assert_eq!(tickets.len(), 3);
        let annexes: Vec<(Option<i64>, u32)> = tickets
            .iter()
            .map(|t| (t.company_id, t.annex_number))
            .collect();
        assert_eq!(
            annexes,
            vec![
                (Some(first.id), 1),
                (Some(first.id), 2),
                (Some(second.id), 1),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_company_filter_persists_report_range() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Alpha SRL").await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 03 CCC", Some(company.id)).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 15.0).await?;

        let start = test_date(1, 0, 0);
        let end = test_date(28, 23, 59);
        let tickets = fuel_tickets(&db, profile.id, start, end, Some(company.id)).await?;
        assert_eq!(tickets.len(), 1);

        let stored = companies::get_company(&db, profile.id, company.id).await?;
        assert_eq!(stored.last_report_start, Some(start));
        assert_eq!(stored.last_report_end, Some(end));

        Ok(())
    }

    #[tokio::test]
    async fn test_ticket_for_unattributed_draw() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 04 DDD", None).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 22.0).await?;

        let tickets = fuel_tickets(
            &db,
            profile.id,
            test_date(1, 0, 0),
            test_date(28, 23, 59),
            None,
        )
        .await?;
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].series, UNKNOWN_SERIES);
        assert_eq!(tickets[0].company_name, UNKNOWN_COMPANY);
        assert_eq!(tickets[0].company_cui, "-");

        Ok(())
    }

    #[tokio::test]
    async fn test_monthly_summary_figures() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Alpha SRL").await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 05 EEE", Some(company.id)).await?;

        // INITIAL before the period still counts as baseline
        ledger::create_stock_operation(
            &db,
            profile.id,
            ledger::NewStockOperation {
                operation_type: OperationType::Initial,
                quantity: 1000.0,
                date: test_date(1, 6, 0),
                description: None,
                company_id: Some(company.id),
            },
        )
        .await?;
        ledger::create_stock_operation(
            &db,
            profile.id,
            ledger::NewStockOperation {
                operation_type: OperationType::In,
                quantity: 200.0,
                date: test_date(10, 6, 0),
                description: None,
                company_id: Some(company.id),
            },
        )
        .await?;
        ledger::create_stock_operation(
            &db,
            profile.id,
            ledger::NewStockOperation {
                operation_type: OperationType::Out,
                quantity: 50.0,
                date: test_date(11, 6, 0),
                description: None,
                company_id: Some(company.id),
            },
        )
        .await?;
        // Uncategorized vehicle: the summary is category-blind and charges
        // the company anyway.
        create_test_transaction(&db, profile.id, vehicle.id, 120.0).await?;

        let summary = monthly_summary(
            &db,
            profile.id,
            test_date(2, 0, 0),
            test_date(28, 23, 59),
            Some((1000.0, 1170.5)),
        )
        .await?;

        let row = &summary.companies[0];
        // INITIAL dated day 1 is before the period but still the baseline
        assert_eq!(row.stock_initial, 1000.0);
        assert_eq!(row.total_in, 200.0);
        assert_eq!(row.total_out, 170.0);
        assert_eq!(row.stock_final, 1030.0);
        assert_eq!(summary.total_out, 170.0);
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].plate, "GL 05 EEE");

        let check = summary.pump_check.unwrap();
        assert_eq!(check.meter_diff, 170.5);
        assert!(check.matches);

        Ok(())
    }
}

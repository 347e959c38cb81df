//! Read-side stock reconciliation.
//!
//! Nothing here mutates or caches: every request recomputes from the ledger
//! rows, so the figures always reconcile with what is stored. A company's
//! position is `initial + refill - manual_out - consumed`, where consumed
//! only counts transactions whose vehicle carries a category; everything
//! else lands in the unallocated bucket.

use crate::{
    core::settings,
    entities::{
        Company, OperationType, StockOperation, Transaction, Vehicle, VehicleCategory, company,
        stock_operation, transaction, vehicle, vehicle_category,
        company::UNALLOCATED_COLOR,
    },
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use std::collections::HashMap;

/// Stock position of one company.
#[derive(Debug, Clone)]
pub struct CompanyStock {
    /// Company row id
    pub company_id: i64,
    /// Company name
    pub name: String,
    /// Sum of INITIAL operations
    pub initial: f64,
    /// Sum of IN operations
    pub refill: f64,
    /// Sum of OUT operations
    pub manual_out: f64,
    /// Sum of categorized consumption transactions
    pub consumed: f64,
    /// `initial + refill - manual_out - consumed`
    pub current: f64,
    /// Dashboard badge color
    pub color: &'static str,
    /// Hex value of the badge color
    pub color_hex: &'static str,
    /// Latest transaction or operation date, None when the company is empty
    pub last_update: Option<chrono::NaiveDateTime>,
}

/// The pseudo-bucket for fuel that cannot be attributed to a company.
#[derive(Debug, Clone, Default)]
pub struct UnallocatedStock {
    /// INITIAL and IN operations with no company
    pub incoming: f64,
    /// Unattributed transactions plus company-less OUT operations
    pub consumed: f64,
    /// `incoming - consumed`
    pub current: f64,
    /// How many rows feed the consumption side
    pub count: u64,
    /// Latest date on the consumption side
    pub last_update: Option<chrono::NaiveDateTime>,
}

/// Whole-depot position against the configured tank capacity.
#[derive(Debug, Clone)]
pub struct StockSummary {
    /// Per-company positions, ordered by company id
    pub companies: Vec<CompanyStock>,
    /// The unallocated bucket
    pub unallocated: UnallocatedStock,
    /// Sum of company currents plus the unallocated current
    pub total_stock: f64,
    /// Tank capacity from settings
    pub capacity: f64,
    /// `total / capacity * 100`, uncapped
    pub percent: f64,
    /// [`Self::percent`] capped at 100 for gauges
    pub display_percent: f64,
    /// Liters above capacity, zero when within it
    pub overload: f64,
    /// Liters of free space, zero when overloaded
    pub free_space: f64,
    /// Latest activity of any kind in the profile
    pub last_update: Option<chrono::NaiveDateTime>,
}

/// Consumption of one vehicle category over an analysis period.
#[derive(Debug, Clone)]
pub struct CategoryConsumption {
    /// Category id, None for uncategorized vehicles
    pub category_id: Option<i64>,
    /// Category name, `"Necategorizat"` for the None bucket
    pub name: String,
    /// Summed quantity over the period
    pub total: f64,
    /// Number of transactions
    pub count: u64,
    /// Whether the saved analysis filter shows this category
    pub visible: bool,
}

/// Category-level analysis slice over a date range.
#[derive(Debug, Clone)]
pub struct AnalysisSlice {
    /// Per-category consumption, largest first
    pub categories: Vec<CategoryConsumption>,
    /// Grand total; hidden categories are excluded when the profile's
    /// exclude-hidden toggle is set
    pub total: f64,
}

fn max_date(
    a: Option<chrono::NaiveDateTime>,
    b: Option<chrono::NaiveDateTime>,
) -> Option<chrono::NaiveDateTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Computes the full depot summary for a profile.
///
/// `capacity_default` is used when the profile has no stored tank capacity;
/// pass [`settings::DEFAULT_TANK_CAPACITY`] unless the deployment configures
/// another one.
pub async fn stock_summary(
    db: &DatabaseConnection,
    gestiune_id: i64,
    capacity_default: f64,
) -> Result<StockSummary> {
    let companies = Company::find()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .order_by_asc(company::Column::Id)
        .all(db)
        .await?;
    let vehicles: HashMap<i64, vehicle::Model> = Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();
    let operations = StockOperation::find()
        .filter(stock_operation::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?;
    let transactions = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?;

    let mut company_stocks = Vec::with_capacity(companies.len());
    for company in &companies {
        let mut initial = 0.0;
        let mut refill = 0.0;
        let mut manual_out = 0.0;
        let mut last_update = None;
        for op in operations.iter().filter(|o| o.company_id == Some(company.id)) {
            match op.operation_type {
                OperationType::Initial => initial += op.quantity,
                OperationType::In => refill += op.quantity,
                OperationType::Out => manual_out += op.quantity,
            }
            last_update = max_date(last_update, Some(op.date));
        }

        let mut consumed = 0.0;
        for t in transactions.iter().filter(|t| t.company_id == Some(company.id)) {
            let categorized = t
                .vehicle_id
                .and_then(|id| vehicles.get(&id))
                .is_some_and(|v| v.category_id.is_some());
            if categorized {
                consumed += t.quantity;
            }
            last_update = max_date(last_update, Some(t.date));
        }

        company_stocks.push(CompanyStock {
            company_id: company.id,
            name: company.name.clone(),
            initial,
            refill,
            manual_out,
            consumed,
            current: initial + refill - manual_out - consumed,
            color: company.color(),
            color_hex: company.color_hex(),
            last_update,
        });
    }

    let unallocated = unallocated_bucket(&vehicles, &operations, &transactions);

    let total_stock: f64 =
        company_stocks.iter().map(|s| s.current).sum::<f64>() + unallocated.current;
    let capacity = settings::get_tank_capacity(db, gestiune_id, capacity_default).await?;
    let percent = if capacity > 0.0 {
        total_stock / capacity * 100.0
    } else {
        0.0
    };

    let last_update = operations
        .iter()
        .map(|o| o.date)
        .chain(transactions.iter().map(|t| t.date))
        .max();

    Ok(StockSummary {
        companies: company_stocks,
        unallocated,
        total_stock,
        capacity,
        percent,
        display_percent: percent.min(100.0),
        overload: (total_stock - capacity).max(0.0),
        free_space: (capacity - total_stock).max(0.0),
        last_update,
    })
}

/// Builds the unallocated bucket from already-loaded ledger rows.
///
/// A transaction is unallocated when it has no company, its vehicle is
/// missing, or its vehicle has no category. Only company-less OUT
/// operations count as unallocated consumption; company-less INITIAL and IN
/// feed the bucket's incoming side instead.
fn unallocated_bucket(
    vehicles: &HashMap<i64, vehicle::Model>,
    operations: &[stock_operation::Model],
    transactions: &[transaction::Model],
) -> UnallocatedStock {
    let mut bucket = UnallocatedStock::default();

    for t in transactions {
        let vehicle = t.vehicle_id.and_then(|id| vehicles.get(&id));
        let unallocated = t.company_id.is_none()
            || vehicle.is_none()
            || vehicle.is_some_and(|v| v.category_id.is_none());
        if unallocated {
            bucket.consumed += t.quantity;
            bucket.count += 1;
            bucket.last_update = max_date(bucket.last_update, Some(t.date));
        }
    }

    for op in operations.iter().filter(|o| o.company_id.is_none()) {
        match op.operation_type {
            OperationType::Out => {
                bucket.consumed += op.quantity;
                bucket.count += 1;
                bucket.last_update = max_date(bucket.last_update, Some(op.date));
            }
            OperationType::Initial | OperationType::In => bucket.incoming += op.quantity,
        }
    }

    bucket.current = bucket.incoming - bucket.consumed;
    bucket
}

/// Badge color of the unallocated bucket.
#[must_use]
pub const fn unallocated_color() -> &'static str {
    UNALLOCATED_COLOR
}

/// Consumption grouped by vehicle category over a date range, honoring the
/// profile's saved analysis filter.
pub async fn analysis_by_category(
    db: &DatabaseConnection,
    gestiune_id: i64,
    start: chrono::NaiveDateTime,
    end: chrono::NaiveDateTime,
) -> Result<AnalysisSlice> {
    let categories = VehicleCategory::find()
        .filter(vehicle_category::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?;
    let vehicles: HashMap<i64, vehicle::Model> = Vehicle::find()
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();
    let transactions = Transaction::find()
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .filter(transaction::Column::Date.gte(start))
        .filter(transaction::Column::Date.lte(end))
        .all(db)
        .await?;

    let visible_names = settings::get_visible_categories(db, gestiune_id).await?;
    let exclude_hidden = settings::get_exclude_hidden(db, gestiune_id).await?;

    let mut totals: HashMap<Option<i64>, (f64, u64)> = HashMap::new();
    for t in &transactions {
        let category_id = t
            .vehicle_id
            .and_then(|id| vehicles.get(&id))
            .and_then(|v| v.category_id);
        let entry = totals.entry(category_id).or_insert((0.0, 0));
        entry.0 += t.quantity;
        entry.1 += 1;
    }

    let category_names: HashMap<i64, String> =
        categories.into_iter().map(|c| (c.id, c.name)).collect();
    let mut slices: Vec<CategoryConsumption> = totals
        .into_iter()
        .map(|(category_id, (total, count))| {
            let name = category_id
                .and_then(|id| category_names.get(&id).cloned())
                .unwrap_or_else(|| "Necategorizat".to_string());
            let visible = visible_names
                .as_ref()
                .is_none_or(|names| names.contains(&name));
            CategoryConsumption {
                category_id,
                name,
                total,
                count,
                visible,
            }
        })
        .collect();
    slices.sort_by(|a, b| b.total.total_cmp(&a.total));

    let total = slices
        .iter()
        .filter(|s| s.visible || !exclude_hidden)
        .map(|s| s.total)
        .sum();

    Ok(AnalysisSlice {
        categories: slices,
        total,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]

    use super::*;
    use crate::core::settings::DEFAULT_TANK_CAPACITY;
    use crate::core::vehicle::create_category;
    use crate::core::{ledger, settings};
    use crate::entities::OperationType;
    use crate::test_utils::{
        create_test_company, create_test_profile, create_test_transaction, create_test_vehicle,
        setup_test_db, test_date,
    };

    const EPSILON: f64 = 1e-6;

    async fn add_operation(
        db: &DatabaseConnection,
        gestiune_id: i64,
        operation_type: OperationType,
        quantity: f64,
        company_id: Option<i64>,
        date: chrono::NaiveDateTime,
    ) -> Result<()> {
        ledger::create_stock_operation(
            db,
            gestiune_id,
            ledger::NewStockOperation {
                operation_type,
                quantity,
                date,
                description: None,
                company_id,
            },
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_stock_conservation_per_company() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Fleet SRL").await?;
        let category = create_category(&db, profile.id, "Camion", None, None).await?;
        let vehicle = crate::core::vehicle::create_vehicle(
            &db,
            profile.id,
            "GL 50 AAA",
            Some(company.id),
            Some(category.id),
        )
        .await?;

        add_operation(&db, profile.id, OperationType::Initial, 1000.0, Some(company.id), test_date(1, 8, 0)).await?;
        add_operation(&db, profile.id, OperationType::In, 333.33, Some(company.id), test_date(2, 8, 0)).await?;
        add_operation(&db, profile.id, OperationType::Out, 50.5, Some(company.id), test_date(3, 8, 0)).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 120.25).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 79.75).await?;

        let summary = stock_summary(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        let stock = &summary.companies[0];
        assert!((stock.initial - 1000.0).abs() < EPSILON);
        assert!((stock.refill - 333.33).abs() < EPSILON);
        assert!((stock.manual_out - 50.5).abs() < EPSILON);
        assert!((stock.consumed - 200.0).abs() < EPSILON);
        assert!(
            (stock.current - (stock.initial + stock.refill - stock.manual_out - stock.consumed))
                .abs()
                < EPSILON
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_uncategorized_consumption_is_unallocated() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Fleet SRL").await?;
        // No category on the vehicle
        let vehicle =
            create_test_vehicle(&db, profile.id, "GL 51 BBB", Some(company.id)).await?;
        create_test_transaction(&db, profile.id, vehicle.id, 60.0).await?;

        let summary = stock_summary(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        // The company is not charged
        assert!((summary.companies[0].consumed - 0.0).abs() < EPSILON);
        // The bucket picks the fuel up
        assert!((summary.unallocated.consumed - 60.0).abs() < EPSILON);
        assert_eq!(summary.unallocated.count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_unallocated_bucket_shapes() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let vehicle = create_test_vehicle(&db, profile.id, "GL 52 CCC", None).await?;

        // (a) transaction with no company
        create_test_transaction(&db, profile.id, vehicle.id, 30.0).await?;
        // (c) company-less OUT counts as consumption
        add_operation(&db, profile.id, OperationType::Out, 10.0, None, test_date(4, 9, 0)).await?;
        // Company-less INITIAL and IN feed the incoming side only
        add_operation(&db, profile.id, OperationType::Initial, 500.0, None, test_date(1, 9, 0)).await?;
        add_operation(&db, profile.id, OperationType::In, 100.0, None, test_date(2, 9, 0)).await?;

        let summary = stock_summary(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        assert!((summary.unallocated.incoming - 600.0).abs() < EPSILON);
        assert!((summary.unallocated.consumed - 40.0).abs() < EPSILON);
        assert!((summary.unallocated.current - 560.0).abs() < EPSILON);
        assert_eq!(summary.unallocated.count, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_global_conservation() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let company = create_test_company(&db, profile.id, "Fleet SRL").await?;
        let category = create_category(&db, profile.id, "Camion", None, None).await?;
        let categorized = crate::core::vehicle::create_vehicle(
            &db,
            profile.id,
            "GL 53 DDD",
            Some(company.id),
            Some(category.id),
        )
        .await?;
        let bare = create_test_vehicle(&db, profile.id, "GL 54 EEE", None).await?;

        add_operation(&db, profile.id, OperationType::Initial, 2000.0, Some(company.id), test_date(1, 10, 0)).await?;
        add_operation(&db, profile.id, OperationType::In, 400.0, None, test_date(2, 10, 0)).await?;
        add_operation(&db, profile.id, OperationType::Out, 100.0, None, test_date(3, 10, 0)).await?;
        create_test_transaction(&db, profile.id, categorized.id, 250.0).await?;
        create_test_transaction(&db, profile.id, bare.id, 75.0).await?;

        let summary = stock_summary(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        let expected = 2000.0 + 400.0 - 100.0 - 250.0 - 75.0;
        assert!((summary.total_stock - expected).abs() < EPSILON);

        Ok(())
    }

    #[tokio::test]
    async fn test_capacity_percent_and_overload() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        settings::set_tank_capacity(&db, profile.id, 1000.0).await?;

        add_operation(&db, profile.id, OperationType::Initial, 1200.0, None, test_date(1, 11, 0)).await?;

        let summary = stock_summary(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        assert!((summary.capacity - 1000.0).abs() < EPSILON);
        assert!((summary.percent - 120.0).abs() < EPSILON);
        assert!((summary.display_percent - 100.0).abs() < EPSILON);
        assert!((summary.overload - 200.0).abs() < EPSILON);
        assert!((summary.free_space - 0.0).abs() < EPSILON);

        Ok(())
    }

    #[tokio::test]
    async fn test_last_update_absent_when_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        create_test_company(&db, profile.id, "Quiet SRL").await?;

        let summary = stock_summary(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        assert!(summary.last_update.is_none());
        assert!(summary.companies[0].last_update.is_none());
        assert!(summary.unallocated.last_update.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_analysis_respects_hidden_filter() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;
        let trucks = create_category(&db, profile.id, "Camion", None, None).await?;
        let cars = create_category(&db, profile.id, "Autoturism", None, None).await?;
        let truck = crate::core::vehicle::create_vehicle(
            &db, profile.id, "GL 55 FFF", None, Some(trucks.id),
        )
        .await?;
        let car = crate::core::vehicle::create_vehicle(
            &db, profile.id, "GL 56 GGG", None, Some(cars.id),
        )
        .await?;
        create_test_transaction(&db, profile.id, truck.id, 100.0).await?;
        create_test_transaction(&db, profile.id, car.id, 40.0).await?;

        let start = test_date(1, 0, 0);
        let end = test_date(28, 23, 59);

        let slice = analysis_by_category(&db, profile.id, start, end).await?;
        assert_eq!(slice.categories.len(), 2);
        assert!((slice.total - 140.0).abs() < EPSILON);

        settings::set_visible_categories(&db, profile.id, &["Camion".to_string()]).await?;
        settings::set_exclude_hidden(&db, profile.id, true).await?;

        let filtered = analysis_by_category(&db, profile.id, start, end).await?;
        assert!((filtered.total - 100.0).abs() < EPSILON);
        let hidden = filtered.categories.iter().find(|c| c.name == "Autoturism").unwrap();
        assert!(!hidden.visible);

        Ok(())
    }
}

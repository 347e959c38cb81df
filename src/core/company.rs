//! Company business logic - Handles the client companies of a profile.
//!
//! Deleting a company never deletes its history: vehicles, consumption
//! records and stock operations are detached (their company becomes NULL,
//! i.e. unallocated) so the ledger keeps balancing. Everything runs scoped
//! to one profile.

use crate::{
    entities::{Company, StockOperation, Transaction, Vehicle, company, stock_operation,
        transaction, vehicle},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Creates a new company within a profile.
///
/// # Arguments
/// * `gestiune_id` - Profile the company belongs to
/// * `name` - Company name, unique within the profile
/// * `cui` - Fiscal identification code
/// * `address` - Registered address for fuel tickets
/// * `product_code` - Product code for fuel tickets
pub async fn create_company(
    db: &DatabaseConnection,
    gestiune_id: i64,
    name: &str,
    cui: Option<String>,
    address: Option<String>,
    product_code: Option<String>,
) -> Result<company::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config {
            message: "Company name cannot be empty".to_string(),
        });
    }

    if get_company_by_name(db, gestiune_id, name).await?.is_some() {
        return Err(Error::NameTaken {
            name: name.to_string(),
        });
    }

    let company = company::ActiveModel {
        name: Set(name.to_string()),
        cui: Set(cui),
        address: Set(address),
        product_code: Set(product_code),
        capacity: Set(None),
        last_report_start: Set(None),
        last_report_end: Set(None),
        gestiune_id: Set(gestiune_id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created company '{}' (id {})", company.name, company.id);
    Ok(company)
}

/// Retrieves a company by id within a profile.
pub async fn get_company(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
) -> Result<company::Model> {
    Company::find_by_id(id)
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .one(db)
        .await?
        .ok_or(Error::CompanyNotFound { id })
}

/// Looks a company up by exact name within a profile.
pub async fn get_company_by_name(
    db: &DatabaseConnection,
    gestiune_id: i64,
    name: &str,
) -> Result<Option<company::Model>> {
    Company::find()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .filter(company::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all companies of a profile ordered by name.
pub async fn list_companies(
    db: &DatabaseConnection,
    gestiune_id: i64,
) -> Result<Vec<company::Model>> {
    Company::find()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .order_by_asc(company::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Updates a company's invoicing details.
pub async fn update_company(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
    name: &str,
    cui: Option<String>,
    address: Option<String>,
    product_code: Option<String>,
) -> Result<company::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config {
            message: "Company name cannot be empty".to_string(),
        });
    }

    let company = get_company(db, gestiune_id, id).await?;

    let taken = Company::find()
        .filter(company::Column::GestiuneId.eq(gestiune_id))
        .filter(company::Column::Name.eq(name))
        .filter(company::Column::Id.ne(id))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(Error::NameTaken {
            name: name.to_string(),
        });
    }

    let mut active: company::ActiveModel = company.into();
    active.name = Set(name.to_string());
    active.cui = Set(cui);
    active.address = Set(address);
    active.product_code = Set(product_code);
    active.update(db).await.map_err(Into::into)
}

/// Sets or clears the per-company tank capacity override in liters.
pub async fn set_company_capacity(
    db: &DatabaseConnection,
    gestiune_id: i64,
    id: i64,
    capacity: Option<f64>,
) -> Result<company::Model> {
    if let Some(quantity) = capacity {
        if quantity <= 0.0 || !quantity.is_finite() {
            return Err(Error::InvalidQuantity { quantity });
        }
    }

    let company = get_company(db, gestiune_id, id).await?;
    let mut active: company::ActiveModel = company.into();
    active.capacity = Set(capacity);
    active.update(db).await.map_err(Into::into)
}

/// Deletes a company, detaching everything that referenced it.
///
/// Vehicles, consumption records and stock operations of the company keep
/// their rows but lose the attribution (company becomes NULL), which moves
/// their quantities into the unallocated bucket.
pub async fn delete_company(db: &DatabaseConnection, gestiune_id: i64, id: i64) -> Result<()> {
    let company = get_company(db, gestiune_id, id).await?;

    let txn = db.begin().await?;

    Vehicle::update_many()
        .col_expr(vehicle::Column::CompanyId, Expr::value(Option::<i64>::None))
        .filter(vehicle::Column::CompanyId.eq(id))
        .filter(vehicle::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    Transaction::update_many()
        .col_expr(
            transaction::Column::CompanyId,
            Expr::value(Option::<i64>::None),
        )
        .filter(transaction::Column::CompanyId.eq(id))
        .filter(transaction::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    StockOperation::update_many()
        .col_expr(
            stock_operation::Column::CompanyId,
            Expr::value(Option::<i64>::None),
        )
        .filter(stock_operation::Column::CompanyId.eq(id))
        .filter(stock_operation::Column::GestiuneId.eq(gestiune_id))
        .exec(&txn)
        .await?;
    Company::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    info!("Deleted company '{}' (id {id}), children detached", company.name);
    Ok(())
}

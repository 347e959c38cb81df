//! Gestiune entity - Represents a storage-site profile (tenant partition).
//!
//! Every business row except history entries belongs to exactly one gestiune,
//! and no operation ever reads across profile boundaries. Two profiles may
//! hold byte-identical business data without conflict.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Gestiune (profile) database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gestiune")]
pub struct Model {
    /// Unique identifier for the profile
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique across the database
    #[sea_orm(unique)]
    pub name: String,
    /// Optional short site code used on printed documents
    pub site_code: Option<String>,
    /// Fuel sort dispensed at this site (e.g. `"Motorină"`)
    pub default_fuel_type: String,
    /// When the profile was created
    pub created_at: DateTimeUtc,
}

/// One profile owns companies, vehicles, stock movements and settings
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Companies registered under this profile
    #[sea_orm(has_many = "super::company::Entity")]
    Companies,
    /// Vehicles registered under this profile
    #[sea_orm(has_many = "super::vehicle::Entity")]
    Vehicles,
    /// Stock movements recorded under this profile
    #[sea_orm(has_many = "super::stock_operation::Entity")]
    StockOperations,
    /// Consumption records recorded under this profile
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

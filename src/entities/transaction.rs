//! Transaction entity - A single vehicle refueling at the pump.
//!
//! The company is denormalized from the vehicle at creation time and may
//! diverge afterwards (the vehicle changes owner, the record is reassigned).
//! The tuple `(date, vehicle_id, quantity, gestiune_id)` is the duplicate
//! detection key and is enforced UNIQUE.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Consumption transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// When the refueling happened
    pub date: DateTime,
    /// Vehicle that drew the fuel; None only for orphaned legacy rows
    pub vehicle_id: Option<i64>,
    /// Company billed for the fuel, None when unallocated
    pub company_id: Option<i64>,
    /// Quantity drawn, in liters
    pub quantity: f64,
    /// Profile this transaction belongs to
    pub gestiune_id: i64,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one profile
    #[sea_orm(
        belongs_to = "super::gestiune::Entity",
        from = "Column::GestiuneId",
        to = "super::gestiune::Column::Id"
    )]
    Gestiune,
    /// Vehicle the fuel was pumped into
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id"
    )]
    Vehicle,
    /// Company billed for the fuel
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
}

impl Related<super::gestiune::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gestiune.def()
    }
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

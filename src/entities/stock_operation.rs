//! Stock operation entity - A bulk movement of fuel in or out of the depot.
//!
//! `INITIAL` seeds the opening stock, `IN` records a tanker refill, `OUT`
//! records a manual outflow not tied to a vehicle. Operations may be
//! attributed to a company or left unallocated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of bulk stock movement, stored as its uppercase tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Opening stock when a tank enters service
    #[sea_orm(string_value = "INITIAL")]
    Initial,
    /// Refill delivered to the depot
    #[sea_orm(string_value = "IN")]
    In,
    /// Manual outflow not tied to a vehicle
    #[sea_orm(string_value = "OUT")]
    Out,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Initial => "INITIAL",
            Self::In => "IN",
            Self::Out => "OUT",
        };
        write!(f, "{tag}")
    }
}

/// Stock operation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_operation")]
pub struct Model {
    /// Unique identifier for the operation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Direction of the movement
    pub operation_type: OperationType,
    /// Quantity moved, in liters
    pub quantity: f64,
    /// When the movement happened
    pub date: DateTime,
    /// Free-form note (delivery slip number, reason for the outflow)
    pub description: Option<String>,
    /// Company the movement is attributed to, None for the shared tank
    pub company_id: Option<i64>,
    /// Profile this operation belongs to
    pub gestiune_id: i64,
}

/// Defines relationships between `StockOperation` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each operation belongs to one profile
    #[sea_orm(
        belongs_to = "super::gestiune::Entity",
        from = "Column::GestiuneId",
        to = "super::gestiune::Column::Id"
    )]
    Gestiune,
    /// Operation may be attributed to a company
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

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

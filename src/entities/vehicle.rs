//! Vehicle entity - A fleet vehicle identified by its plate number.
//!
//! Plates are stored uppercase and are unique within a profile. Both the
//! company and the category are optional: imports create bare vehicles and
//! the operator attaches them later.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vehicle database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicle")]
pub struct Model {
    /// Unique identifier for the vehicle
    #[sea_orm(primary_key)]
    pub id: i64,
    /// License plate, uppercase, unique within its profile
    pub plate_number: String,
    /// Company operating this vehicle, if attached
    pub company_id: Option<i64>,
    /// Category for analysis grouping, if assigned
    pub category_id: Option<i64>,
    /// Profile this vehicle belongs to
    pub gestiune_id: i64,
}

/// Defines relationships between Vehicle and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each vehicle belongs to one profile
    #[sea_orm(
        belongs_to = "super::gestiune::Entity",
        from = "Column::GestiuneId",
        to = "super::gestiune::Column::Id"
    )]
    Gestiune,
    /// Vehicle may be attached to a company
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
    /// Vehicle may be assigned a category
    #[sea_orm(
        belongs_to = "super::vehicle_category::Entity",
        from = "Column::CategoryId",
        to = "super::vehicle_category::Column::Id"
    )]
    Category,
    /// One vehicle has many consumption records
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
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

impl Related<super::vehicle_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

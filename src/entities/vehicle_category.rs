//! Vehicle category entity - Groups vehicles for analysis and filtering.
//!
//! A vehicle without a category is "uncategorized": its consumption may be
//! reclassified into the unallocated bucket by the stock reconciliation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vehicle category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicle_category")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Category name, unique within its profile (e.g. `"Autoturism"`)
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Bootstrap icon class shown next to the name
    pub icon: String,
    /// Profile this category belongs to
    pub gestiune_id: i64,
}

/// Defines relationships between `VehicleCategory` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each category belongs to one profile
    #[sea_orm(
        belongs_to = "super::gestiune::Entity",
        from = "Column::GestiuneId",
        to = "super::gestiune::Column::Id"
    )]
    Gestiune,
    /// One category has many vehicles
    #[sea_orm(has_many = "super::vehicle::Entity")]
    Vehicles,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Default icon for categories created without an explicit one.
pub const DEFAULT_ICON: &str = "bi-tag-fill";

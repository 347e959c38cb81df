//! Application settings entity - Stores key-value pairs per profile.
//! Used for the tank capacity, analysis filters, and the last report range.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Application setting database model - stores key-value pairs per profile
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_settings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Setting key (e.g. `"tank_capacity"`), unique within its profile
    pub key: String,
    /// Setting value stored as string (numbers and JSON included)
    pub value: String,
    /// Profile this setting belongs to
    pub gestiune_id: i64,
}

/// Defines relationships between `AppSetting` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each setting belongs to one profile
    #[sea_orm(
        belongs_to = "super::gestiune::Entity",
        from = "Column::GestiuneId",
        to = "super::gestiune::Column::Id"
    )]
    Gestiune,
}

impl Related<super::gestiune::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gestiune.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

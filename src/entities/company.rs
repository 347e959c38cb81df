//! Company entity - A client company whose fleet draws fuel from the depot.
//!
//! Companies are scoped to a gestiune and carry invoicing details plus the
//! persisted date range of the last generated report. The dashboard color is
//! derived, never stored: well-known names keep their historical colors and
//! everyone else cycles through a palette keyed by row id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Company database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "company")]
pub struct Model {
    /// Unique identifier for the company
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Company name, unique within its profile
    pub name: String,
    /// Fiscal identification code
    pub cui: Option<String>,
    /// Registered address printed on fuel tickets
    pub address: Option<String>,
    /// Product code printed on fuel tickets
    pub product_code: Option<String>,
    /// Per-company tank capacity override in liters
    pub capacity: Option<f64>,
    /// Start of the most recently generated report period
    pub last_report_start: Option<DateTime>,
    /// End of the most recently generated report period
    pub last_report_end: Option<DateTime>,
    /// Profile this company belongs to
    pub gestiune_id: i64,
}

/// Defines relationships between Company and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each company belongs to one profile
    #[sea_orm(
        belongs_to = "super::gestiune::Entity",
        from = "Column::GestiuneId",
        to = "super::gestiune::Column::Id"
    )]
    Gestiune,
    /// One company has many vehicles
    #[sea_orm(has_many = "super::vehicle::Entity")]
    Vehicles,
    /// One company has many stock movements
    #[sea_orm(has_many = "super::stock_operation::Entity")]
    StockOperations,
    /// One company has many consumption records
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::gestiune::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gestiune.def()
    }
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Badge color reserved for the unallocated bucket, never assigned to a company.
pub const UNALLOCATED_COLOR: &str = "secondary";

/// Rotating palette for companies without a fixed historical color.
const PALETTE: [&str; 9] = [
    "orange", "teal", "pink", "indigo", "warning", "danger", "success", "info", "primary",
];

/// Derives the dashboard badge color for a company name and (optional) row id.
///
/// Four long-standing client names keep the colors their drivers know, with or
/// without the trailing legal suffix. Everyone else cycles through [`PALETTE`]
/// by `id % 9`; an unsaved row falls back to `primary`.
#[must_use]
pub fn display_color(name: &str, id: Option<i64>) -> &'static str {
    let fixed = match name.to_uppercase().as_str() {
        "TRANSGAT-SORT" | "TRANSGAT-SORT SRL" => Some("primary"),
        "VINATI" | "VINATI SRL" => Some("purple"),
        "PETROIL-IMPEX" | "PETROIL-IMPEX SRL" => Some("success"),
        "TRANSGAT-TIR" | "TRANSGAT-TIR SRL" => Some("info"),
        _ => None,
    };
    if let Some(color) = fixed {
        return color;
    }
    match id {
        Some(id) if id > 0 => PALETTE[usize::try_from(id).unwrap_or_default() % PALETTE.len()],
        _ => "primary",
    }
}

/// Maps a badge color name to its hex value for inline styles.
///
/// Unknown names resolve to the unallocated gray so a renderer never paints
/// an unstyled element.
#[must_use]
pub fn color_hex(color: &str) -> &'static str {
    match color {
        "primary" => "#0d6efd",
        "success" => "#198754",
        "info" => "#0dcaf0",
        "warning" => "#ffc107",
        "danger" => "#dc3545",
        "purple" => "#6f42c1",
        "pink" => "#d63384",
        "orange" => "#fd7e14",
        "teal" => "#20c997",
        "indigo" => "#6610f2",
        _ => "#6c757d",
    }
}

impl Model {
    /// Dashboard badge color for this company.
    #[must_use]
    pub fn color(&self) -> &'static str {
        display_color(&self.name, Some(self.id))
    }

    /// Hex value of [`Model::color`] for inline styles.
    #[must_use]
    pub fn color_hex(&self) -> &'static str {
        color_hex(self.color())
    }
}

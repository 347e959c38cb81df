//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod app_setting;
pub mod company;
pub mod gestiune;
pub mod history_log;
pub mod stock_operation;
pub mod transaction;
pub mod vehicle;
pub mod vehicle_category;

// Re-export specific types to avoid conflicts
pub use app_setting::{Column as AppSettingColumn, Entity as AppSetting, Model as AppSettingModel};
pub use company::{Column as CompanyColumn, Entity as Company, Model as CompanyModel};
pub use gestiune::{Column as GestiuneColumn, Entity as Gestiune, Model as GestiuneModel};
pub use history_log::{
    ActionType, Column as HistoryLogColumn, Entity as HistoryLog, Model as HistoryLogModel,
    TargetTable,
};
pub use stock_operation::{
    Column as StockOperationColumn, Entity as StockOperation, Model as StockOperationModel,
    OperationType,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use vehicle::{Column as VehicleColumn, Entity as Vehicle, Model as VehicleModel};
pub use vehicle_category::{
    Column as VehicleCategoryColumn, Entity as VehicleCategory, Model as VehicleCategoryModel,
};

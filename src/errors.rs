//! Error types shared across the crate.
//!
//! Row-level import problems are deliberately NOT errors: the parser skips
//! the row and logs a warning. Everything that aborts an operation flows
//! through [`Error`].

use thiserror::Error;

/// All failure modes surfaced by the ledger core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: f64 },

    #[error("Profile {id} not found")]
    ProfileNotFound { id: i64 },

    #[error("Company {id} not found")]
    CompanyNotFound { id: i64 },

    #[error("Vehicle {id} not found")]
    VehicleNotFound { id: i64 },

    #[error("Category {id} not found")]
    CategoryNotFound { id: i64 },

    #[error("No {table} row with id {id}")]
    RecordNotFound { table: String, id: i64 },

    #[error("Name already in use: {name}")]
    NameTaken { name: String },

    #[error("Duplicate entry: {message}")]
    DuplicateEntry { message: String },

    #[error("Vehicle {plate} still has {count} transactions")]
    VehicleInUse { plate: String, count: u64 },

    #[error("Category {name} is still used by {count} vehicles")]
    CategoryInUse { name: String, count: u64 },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Undo/redo of {action} failed: {message}")]
    UndoFailed { action: String, message: String },

    #[error("Another exclusive operation is running: {current}")]
    OperationInProgress { current: String },

    #[error("Invalid backup file: {message}")]
    InvalidBackup { message: String },

    #[error("Database restore failed: {message}")]
    RestoreFailed { message: String },
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

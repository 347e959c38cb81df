//! Core business logic, independent of any web or UI layer.
//!
//! Each submodule owns one concern of the fuel ledger: profiles, companies,
//! vehicles, journaled mutations, CSV ingestion, stock reconciliation,
//! report data assembly, settings, and profile-level backup. Everything here
//! takes a [`sea_orm::DatabaseConnection`] and a profile id and never reads
//! across profile boundaries.

/// Profile backup: export to and destructive import from standalone files
pub mod backup;
/// Client company management
pub mod company;
/// Undo/redo journal over ledger mutations
pub mod history;
/// Heuristic CSV import of pump-station exports
pub mod import;
/// Journaled mutations of stock operations and consumption transactions
pub mod ledger;
/// Profile (gestiune) management
pub mod profile;
/// Report data assembly for the external renderer
pub mod report;
/// Database-file replacement with backup and retry
pub mod restore;
/// Per-profile key/value settings with typed accessors
pub mod settings;
/// Read-side stock reconciliation
pub mod stock;
/// Vehicle and category management
pub mod vehicle;

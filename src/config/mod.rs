/// Database configuration and connection management
pub mod database;

/// Business tunables loading from config.toml
pub mod import;

use crate::errors::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Everything the host application needs to stand the core up.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Connection string for the `SQLite` store
    pub database_url: String,
    /// Tunables from config.toml (defaults when the file is absent)
    pub tunables: import::Config,
}

/// Initializes tracing with an environment-driven filter.
///
/// Call once, as early as possible. `RUST_LOG` overrides the default `info`
/// level.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Loads the main application configuration.
///
/// Reads `.env` (non-fatal if absent), resolves the database URL and parses
/// config.toml when present.
///
/// # Errors
/// Currently infallible in practice; kept fallible so future mandatory
/// settings do not change the signature.
pub fn load_app_configuration() -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let database_url = database::get_database_url();
    let tunables = import::load_or_default();
    info!("Configuration loaded, database at {database_url}");

    Ok(AppConfig {
        database_url,
        tunables,
    })
}

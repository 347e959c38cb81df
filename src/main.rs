#![allow(clippy::result_large_err)]

//! Thin host binary: stands the database up and reports status.
//!
//! The ledger core is a library; a web or desktop shell embeds
//! [`fuel_ledger`] and drives it. This binary exists for provisioning and
//! smoke-testing a deployment.

use fuel_ledger::config;
use fuel_ledger::core::profile;
use fuel_ledger::errors::Result;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    config::init_logging();

    let app_config = config::load_app_configuration()?;

    let db = config::database::create_connection()
        .await
        .inspect(|_| info!("Database connection established."))
        .inspect_err(|e| error!("Failed to connect to the database: {e}"))?;
    config::database::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    let profiles = profile::list_profiles(&db).await?;
    info!(
        profiles = profiles.len(),
        tank_capacity = app_config.tunables.tank.capacity,
        "Fuel ledger ready."
    );

    Ok(())
}

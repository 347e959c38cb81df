//! Per-profile settings stored as key/value rows.
//!
//! Everything the operator can tune at runtime lives here: the depot tank
//! capacity, which categories the analysis page shows, and the last used
//! analysis date range. Values are strings in the store; the typed accessors
//! below parse them and fall back to defaults on anything unreadable.

use crate::{
    entities::{AppSetting, app_setting},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, Set, prelude::*};
use tracing::debug;

/// Depot capacity in liters used when a profile has no stored setting.
pub const DEFAULT_TANK_CAPACITY: f64 = 27000.0;

/// Key of the tank capacity setting.
pub const KEY_TANK_CAPACITY: &str = "tank_capacity";
/// Key of the analysis visible-category list (JSON array of names).
pub const KEY_ANALYSIS_VISIBLE: &str = "analysis_visible_categories";
/// Key of the analysis exclude-hidden toggle.
pub const KEY_ANALYSIS_EXCLUDE_HIDDEN: &str = "analysis_exclude_hidden";
/// Key of the persisted analysis range start.
pub const KEY_ANALYSIS_LAST_START: &str = "analysis_last_start";
/// Key of the persisted analysis range end.
pub const KEY_ANALYSIS_LAST_END: &str = "analysis_last_end";

/// Reads one raw setting value for a profile.
pub async fn get_setting<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    key: &str,
) -> Result<Option<String>> {
    let row = AppSetting::find()
        .filter(app_setting::Column::GestiuneId.eq(gestiune_id))
        .filter(app_setting::Column::Key.eq(key))
        .one(conn)
        .await?;
    Ok(row.map(|s| s.value))
}

/// Writes one setting value for a profile, inserting or overwriting.
pub async fn set_setting<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    key: &str,
    value: &str,
) -> Result<()> {
    let existing = AppSetting::find()
        .filter(app_setting::Column::GestiuneId.eq(gestiune_id))
        .filter(app_setting::Column::Key.eq(key))
        .one(conn)
        .await?;

    match existing {
        Some(row) => {
            let mut active: app_setting::ActiveModel = row.into();
            active.value = Set(value.to_string());
            active.update(conn).await?;
        }
        None => {
            app_setting::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value.to_string()),
                gestiune_id: Set(gestiune_id),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }
    }
    debug!("Setting {key} updated for profile {gestiune_id}");
    Ok(())
}

/// Tank capacity for a profile, in liters.
///
/// Unset or unparsable values fall back to `default`; pass
/// [`DEFAULT_TANK_CAPACITY`] unless the deployment configures another one.
pub async fn get_tank_capacity<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    default: f64,
) -> Result<f64> {
    let raw = get_setting(conn, gestiune_id, KEY_TANK_CAPACITY).await?;
    Ok(raw
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(default))
}

/// Stores the tank capacity for a profile.
///
/// # Errors
/// [`Error::InvalidQuantity`] for non-positive or non-finite values.
pub async fn set_tank_capacity<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    capacity: f64,
) -> Result<()> {
    if capacity <= 0.0 || !capacity.is_finite() {
        return Err(Error::InvalidQuantity { quantity: capacity });
    }
    set_setting(conn, gestiune_id, KEY_TANK_CAPACITY, &capacity.to_string()).await
}

/// Category names visible on the analysis page.
///
/// `None` means no filter was ever saved, so every category is visible.
pub async fn get_visible_categories<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
) -> Result<Option<Vec<String>>> {
    let raw = get_setting(conn, gestiune_id, KEY_ANALYSIS_VISIBLE).await?;
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Stores the analysis visible-category list as a JSON array of names.
pub async fn set_visible_categories<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    names: &[String],
) -> Result<()> {
    let json = serde_json::to_string(names)?;
    set_setting(conn, gestiune_id, KEY_ANALYSIS_VISIBLE, &json).await
}

/// Whether hidden categories are excluded from analysis totals.
pub async fn get_exclude_hidden<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
) -> Result<bool> {
    let raw = get_setting(conn, gestiune_id, KEY_ANALYSIS_EXCLUDE_HIDDEN).await?;
    Ok(raw.as_deref() == Some("true"))
}

/// Stores the analysis exclude-hidden toggle.
pub async fn set_exclude_hidden<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    exclude: bool,
) -> Result<()> {
    let value = if exclude { "true" } else { "false" };
    set_setting(conn, gestiune_id, KEY_ANALYSIS_EXCLUDE_HIDDEN, value).await
}

/// Last analysis date range saved for a profile, as the raw ISO strings
/// the host handed over.
pub async fn get_analysis_range<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
) -> Result<Option<(String, String)>> {
    let start = get_setting(conn, gestiune_id, KEY_ANALYSIS_LAST_START).await?;
    let end = get_setting(conn, gestiune_id, KEY_ANALYSIS_LAST_END).await?;
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some((start, end))),
        _ => Ok(None),
    }
}

/// Persists the analysis date range for the next session.
pub async fn set_analysis_range<C: ConnectionTrait>(
    conn: &C,
    gestiune_id: i64,
    start: &str,
    end: &str,
) -> Result<()> {
    set_setting(conn, gestiune_id, KEY_ANALYSIS_LAST_START, start).await?;
    set_setting(conn, gestiune_id, KEY_ANALYSIS_LAST_END, end).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]

    use super::*;
    use crate::test_utils::{create_test_profile, setup_test_db};

    #[tokio::test]
    async fn test_tank_capacity_default_and_roundtrip() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        let capacity = get_tank_capacity(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        assert_eq!(capacity, 27000.0);

        set_tank_capacity(&db, profile.id, 18000.0).await?;
        let capacity = get_tank_capacity(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        assert_eq!(capacity, 18000.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_capacity_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        assert!(matches!(
            set_tank_capacity(&db, profile.id, 0.0).await.unwrap_err(),
            Error::InvalidQuantity { .. }
        ));
        assert!(set_tank_capacity(&db, profile.id, f64::NAN).await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_unparsable_capacity_falls_back() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        set_setting(&db, profile.id, KEY_TANK_CAPACITY, "garbage").await?;
        let capacity = get_tank_capacity(&db, profile.id, DEFAULT_TANK_CAPACITY).await?;
        assert_eq!(capacity, DEFAULT_TANK_CAPACITY);

        Ok(())
    }

    #[tokio::test]
    async fn test_visible_categories_roundtrip() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        assert!(get_visible_categories(&db, profile.id).await?.is_none());

        let names = vec!["Autoturism".to_string(), "Camion".to_string()];
        set_visible_categories(&db, profile.id, &names).await?;
        assert_eq!(get_visible_categories(&db, profile.id).await?, Some(names));

        Ok(())
    }

    #[tokio::test]
    async fn test_exclude_hidden_toggle() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        assert!(!get_exclude_hidden(&db, profile.id).await?);
        set_exclude_hidden(&db, profile.id, true).await?;
        assert!(get_exclude_hidden(&db, profile.id).await?);
        set_exclude_hidden(&db, profile.id, false).await?;
        assert!(!get_exclude_hidden(&db, profile.id).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_analysis_range_requires_both_ends() -> Result<()> {
        let db = setup_test_db().await?;
        let profile = create_test_profile(&db).await?;

        set_setting(&db, profile.id, KEY_ANALYSIS_LAST_START, "2026-02-01").await?;
        assert!(get_analysis_range(&db, profile.id).await?.is_none());

        set_analysis_range(&db, profile.id, "2026-02-01", "2026-02-28").await?;
        assert_eq!(
            get_analysis_range(&db, profile.id).await?,
            Some(("2026-02-01".to_string(), "2026-02-28".to_string()))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_settings_are_profile_scoped() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_profile(&db).await?;
        let second = crate::core::profile::create_profile(&db, "Second site", None).await?;

        set_tank_capacity(&db, first.id, 9000.0).await?;
        let other = get_tank_capacity(&db, second.id, DEFAULT_TANK_CAPACITY).await?;
        assert_eq!(other, DEFAULT_TANK_CAPACITY);

        Ok(())
    }
}

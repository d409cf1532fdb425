use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use crate::model::settings::Settings;
use crate::repo;

const SETTINGS_KEY: &str = "settings";

/// Settings are read on every attendance mark and report, written rarely.
pub static SETTINGS_CACHE: Lazy<Cache<&'static str, Arc<Settings>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(60))
        .build()
});

/// Current settings, loaded from the database on a miss.
pub async fn get(pool: &MySqlPool) -> Result<Arc<Settings>, sqlx::Error> {
    if let Some(settings) = SETTINGS_CACHE.get(SETTINGS_KEY).await {
        return Ok(settings);
    }

    let settings = Arc::new(repo::settings::load(pool).await?);
    SETTINGS_CACHE.insert(SETTINGS_KEY, settings.clone()).await;
    Ok(settings)
}

/// Drop the cached copy after any write to the settings table.
pub async fn invalidate() {
    SETTINGS_CACHE.invalidate(SETTINGS_KEY).await;
}

/// Load settings once at startup so the first request does not pay for it.
pub async fn warmup(pool: &MySqlPool) -> anyhow::Result<()> {
    let settings = get(pool).await?;

    tracing::info!(
        shifts = settings.shifts.len(),
        holidays = settings.holidays.len(),
        "Settings cache warmup complete"
    );

    Ok(())
}

use sqlx::{Executor, MySql, MySqlConnection, MySqlPool, QueryBuilder};

use super::BATCH_SIZE;
use crate::model::settings::{SettingRow, Settings};

pub async fn rows<'c, E>(executor: E) -> Result<Vec<SettingRow>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, SettingRow>(
        "SELECT setting_key, setting_value FROM settings ORDER BY setting_key",
    )
    .fetch_all(executor)
    .await
}

pub async fn load(pool: &MySqlPool) -> Result<Settings, sqlx::Error> {
    Ok(Settings::from_rows(&rows(pool).await?))
}

pub async fn save(pool: &MySqlPool, row: &SettingRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO settings (setting_key, setting_value)
        VALUES (?, ?)
        ON DUPLICATE KEY UPDATE setting_value = VALUES(setting_value)
        "#,
    )
    .bind(&row.key)
    .bind(&row.value)
    .execute(pool)
    .await?;

    tracing::debug!(key = %row.key, "Setting saved");
    Ok(())
}

pub async fn insert_batch(
    conn: &mut MySqlConnection,
    rows: &[SettingRow],
) -> Result<(), sqlx::Error> {
    for chunk in rows.chunks(BATCH_SIZE) {
        let mut qb: QueryBuilder<MySql> =
            QueryBuilder::new("INSERT INTO settings (setting_key, setting_value) ");
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(&row.key).push_bind(&row.value);
        });
        qb.build().execute(&mut *conn).await?;
    }
    Ok(())
}

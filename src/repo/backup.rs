use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::interchange::sql::SqlDump;
use crate::repo::{attendance, employee, settings};

#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    pub employees: usize,
    pub attendance: usize,
    pub settings: usize,
}

impl ImportCounts {
    pub fn of(dump: &SqlDump) -> Self {
        ImportCounts {
            employees: dump.employees.len(),
            attendance: dump.attendance.len(),
            settings: dump.settings.len(),
        }
    }
}

/// A consistent snapshot of all three tables.
pub async fn export(pool: &MySqlPool) -> Result<SqlDump, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let dump = SqlDump {
        employees: employee::all(&mut *tx).await?,
        attendance: attendance::all(&mut *tx).await?,
        settings: settings::rows(&mut *tx).await?,
    };

    tx.commit().await?;
    Ok(dump)
}

/// Replaces the whole database with `dump`. Delete and insert run in one
/// transaction, so a failed insert leaves the previous data in place.
pub async fn replace_all(pool: &MySqlPool, dump: &SqlDump) -> Result<ImportCounts, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result: Result<(), sqlx::Error> = async {
        sqlx::query("DELETE FROM attendance").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM employees").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM settings").execute(&mut *tx).await?;

        employee::insert_batch(&mut *tx, &dump.employees).await?;
        attendance::insert_batch(&mut *tx, &dump.attendance).await?;
        settings::insert_batch(&mut *tx, &dump.settings).await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        warn!(error = %e, "Full import failed, rolling back");
        tx.rollback().await?;
        return Err(e);
    }

    tx.commit().await?;

    let counts = ImportCounts::of(dump);
    info!(
        employees = counts.employees,
        attendance = counts.attendance,
        settings = counts.settings,
        "Database replaced from backup"
    );
    Ok(counts)
}

/// Adds rows without deleting anything; used for sample data.
pub async fn append(pool: &MySqlPool, dump: &SqlDump) -> Result<ImportCounts, sqlx::Error> {
    let mut tx = pool.begin().await?;

    employee::insert_batch(&mut *tx, &dump.employees).await?;
    attendance::insert_batch(&mut *tx, &dump.attendance).await?;

    tx.commit().await?;
    Ok(ImportCounts {
        settings: 0,
        ..ImportCounts::of(dump)
    })
}

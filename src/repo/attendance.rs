use chrono::NaiveDate;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use sqlx::{Executor, MySql, MySqlConnection, MySqlPool, QueryBuilder};
use tracing::debug;

use super::BATCH_SIZE;
use crate::model::attendance::{AttendanceRecord, AttendanceRow};
use crate::model::summary::DateRange;

const COLUMNS: &str =
    "employee_id, date, present, time_in, time_out, shift, hours, overtime_hours";

#[derive(Debug, Default, Clone)]
pub struct AttendanceFilter {
    pub employee_id: Option<String>,
    pub range: Option<DateRange>,
}

pub async fn list(
    pool: &MySqlPool,
    filter: &AttendanceFilter,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {} FROM attendance WHERE 1 = 1", COLUMNS));

    if let Some(employee_id) = &filter.employee_id {
        qb.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(range) = filter.range {
        qb.push(" AND date BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
    }
    qb.push(" ORDER BY date, employee_id");

    debug!(sql = %qb.sql(), "Fetching attendance");
    let rows = qb
        .build_query_as::<AttendanceRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(AttendanceRecord::from).collect())
}

pub async fn all<'c, E>(executor: E) -> Result<Vec<AttendanceRecord>, sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    let sql = format!(
        "SELECT {} FROM attendance ORDER BY date, employee_id",
        COLUMNS
    );
    let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(AttendanceRecord::from).collect())
}

/// Every record, row by row, for exports that should not hold the whole
/// table in memory.
pub fn stream_all(pool: &MySqlPool) -> BoxStream<'_, Result<AttendanceRecord, sqlx::Error>> {
    sqlx::query_as::<_, AttendanceRow>(
        "SELECT employee_id, date, present, time_in, time_out, shift, hours, overtime_hours \
         FROM attendance ORDER BY date, employee_id",
    )
    .fetch(pool)
    .map(|row| row.map(AttendanceRecord::from))
    .boxed()
}

pub async fn find(
    pool: &MySqlPool,
    employee_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM attendance WHERE employee_id = ? AND date = ?",
        COLUMNS
    );
    let row = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(AttendanceRecord::from))
}

/// Last write wins on (employee_id, date).
pub async fn upsert<'c, E>(executor: E, record: &AttendanceRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO attendance
        (employee_id, date, present, time_in, time_out, shift, hours, overtime_hours)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            present = VALUES(present),
            time_in = VALUES(time_in),
            time_out = VALUES(time_out),
            shift = VALUES(shift),
            hours = VALUES(hours),
            overtime_hours = VALUES(overtime_hours)
        "#,
    )
    .bind(&record.employee_id)
    .bind(record.date)
    .bind(record.present)
    .bind(&record.time_in)
    .bind(&record.time_out)
    .bind(record.shift.as_str())
    .bind(record.hours)
    .bind(record.overtime_hours)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete(
    pool: &MySqlPool,
    employee_id: &str,
    date: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM attendance WHERE employee_id = ? AND date = ?")
        .bind(employee_id)
        .bind(date)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_batch(
    conn: &mut MySqlConnection,
    records: &[AttendanceRecord],
) -> Result<(), sqlx::Error> {
    for chunk in records.chunks(BATCH_SIZE) {
        let mut qb: QueryBuilder<MySql> =
            QueryBuilder::new(format!("INSERT INTO attendance ({}) ", COLUMNS));
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(&r.employee_id)
                .push_bind(r.date)
                .push_bind(r.present)
                .push_bind(&r.time_in)
                .push_bind(&r.time_out)
                .push_bind(r.shift.as_str())
                .push_bind(r.hours)
                .push_bind(r.overtime_hours);
        });
        qb.build().execute(&mut *conn).await?;
    }
    Ok(())
}

use crate::{
    auth::session::Session,
    error::{AppError, AppResult},
    interchange::{backup::Backup, sample::sample_dump, sql, sql::SqlDump},
    model::{role::Permission, settings::Settings, summary::DateRange},
    repo::{self, backup::ImportCounts},
    utils::settings_cache,
};
use actix_web::{HttpResponse, web};
use chrono::{Days, Local, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use std::collections::HashSet;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

const DEFAULT_SAMPLE_EMPLOYEES: usize = 10;
const MAX_SAMPLE_EMPLOYEES: usize = 200;
const DEFAULT_SAMPLE_DAYS: u64 = 30;
const MAX_SAMPLE_DAYS: u64 = 366;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SampleQuery {
    /// Number of employees to generate (1-200, default 10).
    pub employees: Option<usize>,
    /// Days of history ending today (1-366, default 30).
    pub days: Option<u64>,
}

/// Attendance must point at employees in the same dump; the database would
/// reject the insert anyway, but this reports it as bad input.
fn check_references(dump: &SqlDump) -> AppResult<()> {
    let ids: HashSet<&str> = dump.employees.iter().map(|e| e.id.as_str()).collect();

    if let Some(orphan) = dump
        .attendance
        .iter()
        .find(|r| !ids.contains(r.employee_id.as_str()))
    {
        return Err(AppError::validation(format!(
            "Attendance on {} references unknown employee '{}'",
            orphan.date, orphan.employee_id
        )));
    }
    Ok(())
}

/// Employees may only be assigned shifts the dump's own settings define.
fn check_shifts(dump: &SqlDump) -> AppResult<()> {
    let settings = Settings::from_rows(&dump.settings);

    if let Some(employee) = dump
        .employees
        .iter()
        .find(|e| !settings.has_shift(&e.shift))
    {
        return Err(AppError::validation(format!(
            "Employee '{}' is assigned unknown shift '{}'",
            employee.id, employee.shift
        )));
    }
    Ok(())
}

async fn restore(pool: &MySqlPool, dump: &SqlDump) -> AppResult<ImportCounts> {
    check_references(dump)?;
    check_shifts(dump)?;
    let counts = repo::backup::replace_all(pool, dump).await?;
    settings_cache::invalidate().await;
    Ok(counts)
}

fn attachment(name: &str) -> (&'static str, String) {
    ("Content-Disposition", format!("attachment; filename=\"{name}\""))
}

#[utoipa::path(
    get,
    path = "/api/backup/json",
    responses(
        (status = 200, description = "Full JSON backup", body = Backup)
    ),
    tag = "Backup",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn export_json(
    session: Session,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageBackups)?;

    let now = Utc::now();
    let backup = Backup::new(repo::backup::export(pool.get_ref()).await?, now);
    let body = backup.to_json()?;

    info!(
        employees = backup.employees.len(),
        attendance = backup.attendance.len(),
        "JSON backup exported"
    );
    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .insert_header(attachment(&format!(
            "attendance-backup-{}.json",
            now.format("%Y-%m-%d")
        )))
        .body(body))
}

/// Replaces all employees, attendance and settings with the backup's
/// contents, all or nothing.
#[utoipa::path(
    post,
    path = "/api/backup/json",
    request_body = Backup,
    responses(
        (status = 200, description = "Rows restored per table", body = ImportCounts),
        (status = 400, description = "Malformed backup document")
    ),
    tag = "Backup",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn import_json(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: String,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageBackups)?;

    let backup = Backup::from_json(&body)?;
    info!(version = %backup.version, exported = %backup.export_date, by = %session.username, "Restoring JSON backup");

    let counts = restore(pool.get_ref(), &backup.into_dump()?).await?;
    Ok(HttpResponse::Ok().json(counts))
}

#[utoipa::path(
    get,
    path = "/api/backup/sql",
    responses(
        (status = 200, description = "INSERT statements for every table", content_type = "application/sql", body = String)
    ),
    tag = "Backup",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn export_sql(
    session: Session,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageBackups)?;

    let now = Utc::now();
    let dump = repo::backup::export(pool.get_ref()).await?;

    info!(
        employees = dump.employees.len(),
        attendance = dump.attendance.len(),
        "SQL dump exported"
    );
    Ok(HttpResponse::Ok()
        .content_type("application/sql; charset=utf-8")
        .insert_header(attachment(&format!(
            "attendance-backup-{}.sql",
            now.format("%Y-%m-%d")
        )))
        .body(sql::encode(&dump, now)))
}

#[utoipa::path(
    post,
    path = "/api/backup/sql",
    request_body(content = String, content_type = "application/sql"),
    responses(
        (status = 200, description = "Rows restored per table", body = ImportCounts),
        (status = 400, description = "Malformed statement; nothing was changed")
    ),
    tag = "Backup",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn import_sql(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: String,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageBackups)?;

    let dump = sql::decode(&body)?;
    info!(by = %session.username, "Restoring SQL dump");

    let counts = restore(pool.get_ref(), &dump).await?;
    Ok(HttpResponse::Ok().json(counts))
}

/// Adds demo employees with attendance for the last `days` days. Existing
/// data is left alone.
#[utoipa::path(
    post,
    path = "/api/backup/sample-data",
    params(SampleQuery),
    responses(
        (status = 201, description = "Rows inserted per table", body = ImportCounts)
    ),
    tag = "Backup",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn sample_data(
    session: Session,
    pool: web::Data<MySqlPool>,
    query: web::Query<SampleQuery>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageBackups)?;

    let employees = query
        .employees
        .unwrap_or(DEFAULT_SAMPLE_EMPLOYEES)
        .clamp(1, MAX_SAMPLE_EMPLOYEES);
    let days = query.days.unwrap_or(DEFAULT_SAMPLE_DAYS).clamp(1, MAX_SAMPLE_DAYS);

    let today = Local::now().date_naive();
    let start = today
        .checked_sub_days(Days::new(days - 1))
        .ok_or_else(|| AppError::validation("days reaches before the calendar start"))?;
    let range = DateRange::new(start, today)
        .ok_or_else(|| AppError::Internal("sample range is reversed".into()))?;

    // unique prefix per run so repeated seeding never collides
    let tag = format!("DEMO-{}", &Uuid::new_v4().to_string()[..8]).to_uppercase();

    let settings = settings_cache::get(pool.get_ref()).await?;
    let dump = sample_dump(employees, range, &settings, &tag);
    let counts = repo::backup::append(pool.get_ref(), &dump).await?;

    info!(
        tag = %tag,
        employees = counts.employees,
        attendance = counts.attendance,
        by = %session.username,
        "Sample data inserted"
    );
    Ok(HttpResponse::Created().json(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceRecord;
    use crate::model::employee::{Employee, Shift};
    use crate::model::settings::ShiftWindow;
    use chrono::NaiveDate;

    fn employee(id: &str) -> Employee {
        Employee {
            id: id.into(),
            name: "Ada".into(),
            department: String::new(),
            email: None,
            phone: None,
            position: None,
            join_date: None,
            shift: Shift::Morning,
            weekends: None,
        }
    }

    fn absent(id: &str) -> AttendanceRecord {
        AttendanceRecord::normalized(
            id,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            false,
            None,
            None,
            Shift::Morning,
            None,
        )
        .unwrap()
    }

    #[test]
    fn dump_with_matching_ids_passes() {
        let dump = SqlDump {
            employees: vec![employee("E1"), employee("E2")],
            attendance: vec![absent("E1"), absent("E2")],
            settings: Vec::new(),
        };
        assert!(check_references(&dump).is_ok());
    }

    #[test]
    fn orphan_attendance_is_a_validation_error() {
        let dump = SqlDump {
            employees: vec![employee("E1")],
            attendance: vec![absent("E1"), absent("GHOST")],
            settings: Vec::new(),
        };
        match check_references(&dump) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("GHOST")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn employee_shifts_must_exist_in_the_dump_settings() {
        let mut evening = employee("E2");
        evening.shift = Shift::Custom("evening".into());

        let mut dump = SqlDump {
            employees: vec![employee("E1"), evening],
            attendance: Vec::new(),
            settings: Settings::default().to_rows(),
        };
        assert!(matches!(check_shifts(&dump), Err(AppError::Validation(_))));

        let mut settings = Settings::default();
        settings
            .set_shift("evening", &ShiftWindow::new("14:00", "22:00"))
            .unwrap();
        dump.settings = settings.to_rows();
        assert!(check_shifts(&dump).is_ok());
    }
}

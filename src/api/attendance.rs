use crate::{
    api::employee::ImportResponse,
    auth::session::Session,
    calc::hours::TimeError,
    error::{AppError, AppResult},
    interchange::csv,
    model::{
        attendance::AttendanceRecord,
        employee::Employee,
        role::Permission,
        settings::Settings,
        summary::DateRange,
    },
    repo::{self, attendance::AttendanceFilter},
    utils::settings_cache,
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendance {
    #[schema(example = "EMP-001")]
    pub employee_id: String,
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub date: NaiveDate,
    pub present: bool,
    /// `HH:MM`; the shift start is used when omitted.
    #[schema(example = "09:00")]
    pub time_in: Option<String>,
    /// `HH:MM`; the shift end is used when omitted.
    #[schema(example = "17:00")]
    pub time_out: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkEntry {
    pub employee_id: String,
    pub present: bool,
    pub time_in: Option<String>,
    pub time_out: Option<String>,
}

/// One day's attendance for many employees.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAttendance {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub entries: Vec<BulkEntry>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// A single day; takes precedence over `start`/`end`.
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub start: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub end: Option<NaiveDate>,
    pub employee_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BulkResponse {
    pub success: bool,
    pub saved: usize,
}

impl AttendanceQuery {
    fn range(&self) -> AppResult<Option<DateRange>> {
        match (self.date, self.start, self.end) {
            (Some(date), _, _) => Ok(Some(DateRange::single(date))),
            (None, Some(start), Some(end)) => DateRange::new(start, end)
                .map(Some)
                .ok_or_else(|| AppError::validation("start must not be after end")),
            (None, None, None) => Ok(None),
            _ => Err(AppError::validation("start and end must be given together")),
        }
    }
}

/// The shift is copied from the employee; missing times fall back to that
/// shift's configured window.
fn build_record(
    employee: &Employee,
    date: NaiveDate,
    present: bool,
    time_in: Option<&str>,
    time_out: Option<&str>,
    settings: &Settings,
) -> Result<AttendanceRecord, TimeError> {
    AttendanceRecord::normalized(
        employee.id.clone(),
        date,
        present,
        time_in,
        time_out,
        employee.shift.clone(),
        settings.shift_window(&employee.shift),
    )
}

/// A decoded CSV row marked against its employee.
fn remark(
    row: &AttendanceRecord,
    employee: &Employee,
    settings: &Settings,
) -> Result<AttendanceRecord, TimeError> {
    build_record(
        employee,
        row.date,
        row.present,
        row.time_in.as_deref(),
        row.time_out.as_deref(),
        settings,
    )
}

async fn load_employee(pool: &MySqlPool, employee_id: &str) -> AppResult<Employee> {
    repo::employee::find(pool, employee_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Employee '{employee_id}' not found")))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Matching attendance records", body = [AttendanceRecord]),
        (status = 400, description = "Invalid date range")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_attendance(
    session: Session,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> AppResult<HttpResponse> {
    // self-service accounts only ever see their own records
    let employee_id = if session.can(Permission::ViewAttendance) {
        query.employee_id.clone()
    } else {
        session.require(Permission::SelfService)?;
        Some(session.own_employee_id()?.to_string())
    };

    let filter = AttendanceFilter {
        employee_id,
        range: query.range()?,
    };
    let records = repo::attendance::list(pool.get_ref(), &filter).await?;
    debug!(rows = records.len(), "Attendance listed");

    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    put,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Record saved with computed hours", body = AttendanceRecord),
        (status = 400, description = "Invalid time"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_attendance(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: web::Json<MarkAttendance>,
) -> AppResult<HttpResponse> {
    session.require(Permission::MarkAttendance)?;

    let employee = load_employee(pool.get_ref(), &body.employee_id).await?;
    let settings = settings_cache::get(pool.get_ref()).await?;

    let record = build_record(
        &employee,
        body.date,
        body.present,
        body.time_in.as_deref(),
        body.time_out.as_deref(),
        &settings,
    )?;

    repo::attendance::upsert(pool.get_ref(), &record).await?;
    info!(
        employee_id = %record.employee_id,
        date = %record.date,
        present = record.present,
        hours = record.hours,
        overtime = record.overtime_hours,
        "Attendance marked"
    );

    Ok(HttpResponse::Ok().json(record))
}

/// Every entry is validated before anything is written; the writes then
/// run in one transaction.
#[utoipa::path(
    post,
    path = "/api/attendance/bulk",
    request_body = BulkAttendance,
    responses(
        (status = 200, description = "All entries saved", body = BulkResponse),
        (status = 400, description = "An entry has an invalid time"),
        (status = 404, description = "An entry names an unknown employee")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn bulk_mark(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: web::Json<BulkAttendance>,
) -> AppResult<HttpResponse> {
    session.require(Permission::MarkAttendance)?;

    let settings = settings_cache::get(pool.get_ref()).await?;
    let employees: HashMap<String, Employee> = repo::employee::all(pool.get_ref())
        .await?
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect();

    let records = body
        .entries
        .iter()
        .map(|entry| -> AppResult<AttendanceRecord> {
            let employee = employees.get(&entry.employee_id).ok_or_else(|| {
                AppError::not_found(format!("Employee '{}' not found", entry.employee_id))
            })?;
            Ok(build_record(
                employee,
                body.date,
                entry.present,
                entry.time_in.as_deref(),
                entry.time_out.as_deref(),
                &settings,
            )?)
        })
        .collect::<AppResult<Vec<_>>>()?;

    let mut tx = pool.begin().await?;
    for record in &records {
        repo::attendance::upsert(&mut *tx, record).await?;
    }
    tx.commit().await?;

    info!(date = %body.date, saved = records.len(), by = %session.username, "Bulk attendance saved");
    Ok(HttpResponse::Ok().json(BulkResponse {
        success: true,
        saved: records.len(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{employee_id}/{date}",
    params(
        ("employee_id", Path, description = "Employee ID"),
        ("date", Path, description = "Day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "No record for that day")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_attendance(
    session: Session,
    pool: web::Data<MySqlPool>,
    path: web::Path<(String, NaiveDate)>,
) -> AppResult<HttpResponse> {
    session.require(Permission::MarkAttendance)?;
    let (employee_id, date) = path.into_inner();

    if repo::attendance::delete(pool.get_ref(), &employee_id, date).await? == 0 {
        return Err(AppError::not_found("Attendance record not found"));
    }

    info!(employee_id = %employee_id, date = %date, "Attendance deleted");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Attendance deleted"
    })))
}

#[utoipa::path(
    get,
    path = "/api/attendance/export",
    responses(
        (status = 200, description = "All attendance as CSV", content_type = "text/csv", body = String)
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn export_attendance(
    session: Session,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewAttendance)?;

    let mut body = csv::attendance_header();
    let mut rows = repo::attendance::stream_all(pool.get_ref());
    let mut count = 0usize;
    while let Some(record) = rows.try_next().await? {
        body.push('\n');
        body.push_str(&csv::attendance_line(&record));
        count += 1;
    }
    body.push('\n');
    debug!(rows = count, "Attendance exported as CSV");

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"attendance.csv\"",
        ))
        .body(body))
}

/// Rows for unknown employees are skipped. Each row is marked the same way
/// as `PUT /attendance`: the shift comes from the employee, missing times
/// from that shift's window, and hours from the times.
#[utoipa::path(
    post,
    path = "/api/attendance/import",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 200, description = "Import result", body = ImportResponse),
        (status = 400, description = "CSV has no header row")
    ),
    tag = "Attendance",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn import_attendance(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: String,
) -> AppResult<HttpResponse> {
    session.require(Permission::MarkAttendance)?;

    let parsed = csv::decode_attendance(&body)?;
    let settings = settings_cache::get(pool.get_ref()).await?;
    let employees: HashMap<String, Employee> = repo::employee::all(pool.get_ref())
        .await?
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect();

    let mut imported = 0;
    let mut skipped = parsed.skipped;

    for (idx, row) in parsed.rows.iter().enumerate() {
        let Some(employee) = employees.get(&row.employee_id) else {
            warn!(row = idx + 1, employee_id = %row.employee_id, "Attendance CSV row for unknown employee");
            skipped += 1;
            continue;
        };
        let record = match remark(row, employee, &settings) {
            Ok(record) => record,
            Err(e) => {
                warn!(row = idx + 1, error = %e, "Attendance CSV row rejected");
                skipped += 1;
                continue;
            }
        };

        match repo::attendance::upsert(pool.get_ref(), &record).await {
            Ok(()) => imported += 1,
            Err(e) => {
                warn!(row = idx + 1, employee_id = %record.employee_id, error = %e, "Attendance CSV row failed");
                skipped += 1;
            }
        }
    }

    info!(imported, skipped, by = %session.username, "Attendance CSV imported");
    Ok(HttpResponse::Ok().json(ImportResponse {
        success: true,
        imported,
        skipped,
    }))
}

/// The still-open record to close: today's, or yesterday's for a shift
/// that started before midnight.
fn open_record(
    today: Option<AttendanceRecord>,
    yesterday: Option<AttendanceRecord>,
) -> Option<AttendanceRecord> {
    let is_open = |r: &AttendanceRecord| r.present && r.time_in.is_some() && r.time_out.is_none();
    today.filter(is_open).or(yesterday.filter(is_open))
}

fn close_record(open: &AttendanceRecord, time_out: &str) -> Result<AttendanceRecord, TimeError> {
    AttendanceRecord::normalized(
        open.employee_id.clone(),
        open.date,
        true,
        open.time_in.as_deref(),
        Some(time_out),
        open.shift.clone(),
        None,
    )
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Account not linked to an employee"),
        (status = 409, description = "Already checked in today")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(session: Session, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    session.require(Permission::SelfService)?;
    let employee = load_employee(pool.get_ref(), session.own_employee_id()?).await?;

    let now = Local::now();
    let today = now.date_naive();

    if let Some(existing) = repo::attendance::find(pool.get_ref(), &employee.id, today).await? {
        if existing.time_in.is_some() {
            return Err(AppError::conflict("Already checked in today"));
        }
    }

    let time_in = now.format("%H:%M").to_string();
    let record = AttendanceRecord::normalized(
        employee.id.clone(),
        today,
        true,
        Some(&time_in),
        None,
        employee.shift.clone(),
        None,
    )?;
    repo::attendance::upsert(pool.get_ref(), &record).await?;

    info!(employee_id = %employee.id, time_in = %time_in, "Checked in");
    Ok(HttpResponse::Ok().json(record))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceRecord),
        (status = 400, description = "No active check-in found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Account not linked to an employee")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(session: Session, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    session.require(Permission::SelfService)?;
    let employee_id = session.own_employee_id()?;

    let now = Local::now();
    let today = now.date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);

    let open = open_record(
        repo::attendance::find(pool.get_ref(), employee_id, today).await?,
        repo::attendance::find(pool.get_ref(), employee_id, yesterday).await?,
    )
    .ok_or_else(|| AppError::validation("No active check-in found"))?;

    let record = close_record(&open, &now.format("%H:%M").to_string())?;
    repo::attendance::upsert(pool.get_ref(), &record).await?;

    info!(
        employee_id = %employee_id,
        date = %record.date,
        hours = record.hours,
        overtime = record.overtime_hours,
        "Checked out"
    );
    Ok(HttpResponse::Ok().json(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::Shift;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn employee(shift: Shift) -> Employee {
        Employee {
            id: "E1".into(),
            name: "Ada".into(),
            department: "Ops".into(),
            email: None,
            phone: None,
            position: None,
            join_date: None,
            shift,
            weekends: None,
        }
    }

    fn query(date: Option<u32>, start: Option<u32>, end: Option<u32>) -> AttendanceQuery {
        AttendanceQuery {
            date: date.map(day),
            start: start.map(day),
            end: end.map(day),
            employee_id: None,
        }
    }

    #[test]
    fn query_range_resolution() {
        assert_eq!(query(Some(3), Some(1), None).range().unwrap(), Some(DateRange::single(day(3))));
        assert_eq!(
            query(None, Some(1), Some(5)).range().unwrap(),
            DateRange::new(day(1), day(5))
        );
        assert_eq!(query(None, None, None).range().unwrap(), None);
        assert!(query(None, Some(5), Some(1)).range().is_err());
        assert!(query(None, Some(5), None).range().is_err());
    }

    #[test]
    fn marking_fills_times_from_the_employee_shift() {
        let record = build_record(
            &employee(Shift::Night),
            day(2),
            true,
            None,
            None,
            &Settings::default(),
        )
        .unwrap();

        assert_eq!(record.shift, Shift::Night);
        assert_eq!(record.time_in.as_deref(), Some("21:00"));
        assert_eq!(record.time_out.as_deref(), Some("05:00"));
        assert_eq!(record.hours, 8.0);
    }

    #[test]
    fn marking_absent_clears_everything() {
        let record = build_record(
            &employee(Shift::Morning),
            day(2),
            false,
            Some("09:00"),
            Some("19:00"),
            &Settings::default(),
        )
        .unwrap();

        assert_eq!(record.time_in, None);
        assert_eq!(record.hours, 0.0);
        assert_eq!(record.overtime_hours, 0.0);
    }

    #[test]
    fn imported_rows_take_the_employee_shift() {
        let rows = csv::decode_attendance(
            "employeeId,date,present,timeIn,timeOut\n\
             E1,2026-03-02,true,,\n\
             E1,2026-03-03,1,21:00,07:30\n",
        )
        .unwrap();
        assert_eq!(rows.rows[0].shift, Shift::Morning);

        let night = employee(Shift::Night);
        let filled = remark(&rows.rows[0], &night, &Settings::default()).unwrap();
        assert_eq!(filled.shift, Shift::Night);
        assert_eq!(filled.time_in.as_deref(), Some("21:00"));
        assert_eq!(filled.time_out.as_deref(), Some("05:00"));
        assert_eq!(filled.hours, 8.0);

        let late = remark(&rows.rows[1], &night, &Settings::default()).unwrap();
        assert_eq!(late.shift, Shift::Night);
        assert_eq!(late.hours, 8.0);
        assert_eq!(late.overtime_hours, 2.5);
    }

    #[test]
    fn check_out_closes_yesterdays_night_shift() {
        let open = AttendanceRecord::normalized(
            "E1",
            day(2),
            true,
            Some("21:00"),
            None,
            Shift::Night,
            None,
        )
        .unwrap();
        assert_eq!(open.hours, 0.0);

        let found = open_record(None, Some(open)).unwrap();
        let closed = close_record(&found, "07:30").unwrap();

        assert_eq!(closed.date, day(2));
        assert_eq!(closed.hours, 8.0);
        assert_eq!(closed.overtime_hours, 2.5);
    }

    #[test]
    fn closed_records_are_not_reopened() {
        let closed = AttendanceRecord::normalized(
            "E1",
            day(3),
            true,
            Some("09:00"),
            Some("17:00"),
            Shift::Morning,
            None,
        )
        .unwrap();
        assert!(open_record(Some(closed), None).is_none());
    }
}

use crate::{
    auth::session::Session,
    calc::aggregate::{Aggregator, totals},
    config::Config,
    error::{AppError, AppResult},
    model::{
        role::Permission,
        summary::{DailyOverview, DateRange, PeriodReport},
    },
    repo::{self, attendance::AttendanceFilter},
    utils::settings_cache,
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::IntoParams;

/// Longest period a single summary may cover.
const MAX_REPORT_DAYS: i64 = 366;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    #[param(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[param(value_type = String, format = "date")]
    pub end: NaiveDate,
    /// Limit the report to one employee.
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthlyQuery {
    /// `YYYY-MM`
    #[param(example = "2026-03")]
    pub month: String,
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Defaults to today.
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

fn report_range(start: NaiveDate, end: NaiveDate) -> AppResult<DateRange> {
    let range = DateRange::new(start, end)
        .ok_or_else(|| AppError::validation("start must not be after end"))?;

    if range.len_days() > MAX_REPORT_DAYS {
        return Err(AppError::validation(format!(
            "A report covers at most {MAX_REPORT_DAYS} days, got {}",
            range.len_days()
        )));
    }
    Ok(range)
}

async fn period_report(
    pool: &MySqlPool,
    config: &Config,
    range: DateRange,
    employee_id: Option<String>,
) -> AppResult<PeriodReport> {
    let employees = match &employee_id {
        Some(id) => vec![
            repo::employee::find(pool, id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Employee '{id}' not found")))?,
        ],
        None => repo::employee::all(pool).await?,
    };

    let records = repo::attendance::list(
        pool,
        &AttendanceFilter {
            employee_id,
            range: Some(range),
        },
    )
    .await?;
    let settings = settings_cache::get(pool).await?;

    debug!(
        start = %range.start,
        end = %range.end,
        employees = employees.len(),
        records = records.len(),
        "Aggregating period report"
    );

    let summaries = Aggregator::new(&settings, config.punctuality_source)
        .summarize_all(&employees, &records, range);

    Ok(PeriodReport {
        range,
        totals: totals(&summaries),
        summaries,
    })
}

#[utoipa::path(
    get,
    path = "/api/reports/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Per-employee summaries for the period", body = PeriodReport),
        (status = 400, description = "start is after end, or the period is longer than 366 days"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Reports",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn summary(
    session: Session,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<SummaryQuery>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewReports)?;

    let query = query.into_inner();
    let range = report_range(query.start, query.end)?;

    let report = period_report(pool.get_ref(), &config, range, query.employee_id).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/api/reports/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Per-employee summaries for the month", body = PeriodReport),
        (status = 400, description = "month is not YYYY-MM")
    ),
    tag = "Reports",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn monthly(
    session: Session,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<MonthlyQuery>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewReports)?;

    let query = query.into_inner();
    let range = DateRange::parse_month(&query.month).ok_or_else(|| {
        AppError::validation(format!("Invalid month '{}', expected YYYY-MM", query.month))
    })?;

    let report = period_report(pool.get_ref(), &config, range, query.employee_id).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/api/reports/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "Attendance snapshot for one day", body = DailyOverview)
    ),
    tag = "Reports",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn daily(
    session: Session,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<DailyQuery>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewReports)?;

    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let employees = repo::employee::all(pool.get_ref()).await?;
    let records = repo::attendance::list(
        pool.get_ref(),
        &AttendanceFilter {
            employee_id: None,
            range: Some(DateRange::single(date)),
        },
    )
    .await?;
    let settings = settings_cache::get(pool.get_ref()).await?;

    let overview: DailyOverview = Aggregator::new(&settings, config.punctuality_source)
        .daily_overview(&employees, &records, date);
    Ok(HttpResponse::Ok().json(overview))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn report_range_accepts_up_to_a_leap_year() {
        let range = report_range(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        assert_eq!(range.len_days(), 366);
        assert!(report_range(date(2026, 3, 2), date(2026, 3, 2)).is_ok());
    }

    #[test]
    fn report_range_rejects_reversed_and_oversized_periods() {
        assert!(matches!(
            report_range(date(2026, 3, 5), date(2026, 3, 1)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            report_range(date(2024, 1, 1), date(2025, 1, 1)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            report_range(date(1, 1, 1), date(9999, 12, 31)),
            Err(AppError::Validation(_))
        ));
    }
}

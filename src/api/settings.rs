use crate::{
    auth::session::Session,
    error::{AppError, AppResult},
    model::{
        employee::Shift,
        role::Permission,
        settings::{Holiday, KEY_HOLIDAYS, KEY_SHIFTS, KEY_WEEKENDS, Settings, ShiftWindow},
    },
    repo,
    utils::settings_cache,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct WeekendsReq {
    /// Weekday indices, 0 = Sunday.
    #[schema(example = json!([0, 6]))]
    pub weekends: Vec<u8>,
}

/// Writes go through a fresh read, not the cache, so two admins editing
/// different keys do not overwrite each other with stale copies.
async fn persist(pool: &MySqlPool, settings: &Settings, key: &str) -> AppResult<()> {
    let row = settings
        .row(key)
        .ok_or_else(|| AppError::Internal(format!("no setting row for key '{key}'")))?;
    repo::settings::save(pool, &row).await?;
    settings_cache::invalidate().await;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "Weekends, holidays and shifts", body = Settings)
    ),
    tag = "Settings",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_settings(
    session: Session,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewSettings)?;

    let settings = settings_cache::get(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(settings.as_ref()))
}

#[utoipa::path(
    put,
    path = "/api/settings/weekends",
    request_body = WeekendsReq,
    responses(
        (status = 200, description = "Updated settings", body = Settings),
        (status = 400, description = "Weekday index out of range")
    ),
    tag = "Settings",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_weekends(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: web::Json<WeekendsReq>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageSettings)?;

    let mut settings = repo::settings::load(pool.get_ref()).await?;
    settings.set_weekends(&body.weekends)?;
    persist(pool.get_ref(), &settings, KEY_WEEKENDS).await?;

    info!(weekends = ?settings.weekends, by = %session.username, "Global weekends updated");
    Ok(HttpResponse::Ok().json(settings))
}

#[utoipa::path(
    post,
    path = "/api/settings/holidays",
    request_body = Holiday,
    responses(
        (status = 201, description = "Holiday added", body = Settings),
        (status = 400, description = "Holiday name missing"),
        (status = 409, description = "A holiday already exists on that date")
    ),
    tag = "Settings",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_holiday(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: web::Json<Holiday>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageSettings)?;

    let holiday = body.into_inner();
    let date = holiday.date;

    let mut settings = repo::settings::load(pool.get_ref()).await?;
    settings.add_holiday(holiday)?;
    persist(pool.get_ref(), &settings, KEY_HOLIDAYS).await?;

    info!(date = %date, by = %session.username, "Holiday added");
    Ok(HttpResponse::Created().json(settings))
}

#[utoipa::path(
    delete,
    path = "/api/settings/holidays/{date}",
    params(
        ("date", Path, description = "Holiday date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Holiday removed", body = Settings),
        (status = 404, description = "No holiday on that date")
    ),
    tag = "Settings",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remove_holiday(
    session: Session,
    pool: web::Data<MySqlPool>,
    path: web::Path<NaiveDate>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageSettings)?;
    let date = path.into_inner();

    let mut settings = repo::settings::load(pool.get_ref()).await?;
    let removed = settings.remove_holiday(date)?;
    persist(pool.get_ref(), &settings, KEY_HOLIDAYS).await?;

    info!(date = %date, name = %removed.name, by = %session.username, "Holiday removed");
    Ok(HttpResponse::Ok().json(settings))
}

/// Creates a shift or changes its times. Built-in shifts may be retimed.
#[utoipa::path(
    put,
    path = "/api/settings/shifts/{name}",
    params(
        ("name", Path, description = "Shift name, case-insensitive")
    ),
    request_body = ShiftWindow,
    responses(
        (status = 200, description = "Shift saved", body = Settings),
        (status = 400, description = "Invalid time")
    ),
    tag = "Settings",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_shift(
    session: Session,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    body: web::Json<ShiftWindow>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageSettings)?;
    let name = path.into_inner();

    let mut settings = repo::settings::load(pool.get_ref()).await?;
    settings.set_shift(&name, &body)?;
    persist(pool.get_ref(), &settings, KEY_SHIFTS).await?;

    info!(shift = %name, start = %body.start, end = %body.end, by = %session.username, "Shift saved");
    Ok(HttpResponse::Ok().json(settings))
}

#[utoipa::path(
    delete,
    path = "/api/settings/shifts/{name}",
    params(
        ("name", Path, description = "Shift name, case-insensitive")
    ),
    responses(
        (status = 200, description = "Shift removed", body = Settings),
        (status = 400, description = "Built-in shifts cannot be deleted"),
        (status = 404, description = "Unknown shift"),
        (status = 409, description = "Employees are still assigned to the shift")
    ),
    tag = "Settings",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remove_shift(
    session: Session,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageSettings)?;
    let shift = Shift::parse(&path.into_inner());

    let mut settings = repo::settings::load(pool.get_ref()).await?;
    settings.remove_shift(shift.as_str())?;

    let assigned = repo::employee::count_on_shift(pool.get_ref(), shift.as_str()).await?;
    if assigned > 0 {
        return Err(AppError::conflict(format!(
            "{assigned} employee(s) are still assigned to shift '{shift}'"
        )));
    }

    persist(pool.get_ref(), &settings, KEY_SHIFTS).await?;

    info!(shift = %shift, by = %session.username, "Shift removed");
    Ok(HttpResponse::Ok().json(settings))
}

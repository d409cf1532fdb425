use crate::{
    auth::session::Session,
    error::{AppError, AppResult},
    interchange::csv,
    model::{
        employee::{Employee, Shift, normalize_weekdays},
        role::Permission,
        settings::Settings,
    },
    repo::{self, employee::EmployeeFilter},
    utils::{
        db_utils::{SqlValue, UpdateBuilder, execute_update},
        settings_cache,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployee {
    /// Generated when omitted.
    #[schema(example = "EMP-001")]
    pub id: Option<String>,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    #[schema(example = "jane@company.com", format = "email")]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    #[schema(example = "2026-01-01", format = "date")]
    pub join_date: Option<String>,
    #[schema(example = "morning")]
    pub shift: Option<String>,
    /// Weekday indices, 0 = Sunday. Overrides the global weekends.
    #[schema(example = json!([5, 6]))]
    pub weekends: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub shift: Option<String>,
    /// Matches name, email or id.
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployee {
    pub name: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    #[schema(format = "date")]
    pub join_date: Option<String>,
    pub shift: Option<String>,
    pub weekends: Option<Vec<u8>>,
    /// Drop the per-employee weekends and fall back to the global ones.
    #[serde(default)]
    pub use_global_weekends: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub success: bool,
    /// Rows written to the database.
    pub imported: usize,
    /// Rows rejected by the parser or by validation.
    pub skipped: usize,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_shift(shift: &Shift, settings: &Settings) -> AppResult<()> {
    if settings.has_shift(shift) {
        Ok(())
    } else {
        Err(AppError::validation(format!("Unknown shift '{shift}'")))
    }
}

fn check_weekends(days: &[u8]) -> AppResult<Vec<u8>> {
    normalize_weekdays(days)
        .map_err(|bad| AppError::validation(format!("Invalid weekday index {bad}, expected 0-6")))
}

/// Applies the same rules to form input and CSV rows.
fn validate_employee(mut employee: Employee, settings: &Settings) -> AppResult<Employee> {
    employee.name = employee.name.trim().to_string();
    if employee.name.is_empty() {
        return Err(AppError::validation("Employee name is required"));
    }

    employee.id = employee.id.trim().to_string();
    if employee.id.is_empty() {
        employee.id = Uuid::new_v4().to_string();
    }

    check_shift(&employee.shift, settings)?;
    if let Some(days) = &employee.weekends {
        employee.weekends = Some(check_weekends(days)?);
    }
    Ok(employee)
}

impl CreateEmployee {
    fn into_employee(self, settings: &Settings) -> AppResult<Employee> {
        let employee = Employee {
            id: self.id.unwrap_or_default(),
            name: self.name,
            department: non_blank(self.department).unwrap_or_default(),
            email: non_blank(self.email),
            phone: non_blank(self.phone),
            position: non_blank(self.position),
            join_date: non_blank(self.join_date),
            shift: Shift::parse(self.shift.as_deref().unwrap_or_default()),
            weekends: self.weekends,
        };
        validate_employee(employee, settings)
    }
}

impl UpdateEmployee {
    fn into_update(self, settings: &Settings) -> AppResult<UpdateBuilder> {
        let mut update = UpdateBuilder::new("employees");

        if let Some(name) = self.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::validation("Employee name is required"));
            }
            update.set("name", SqlValue::String(name));
        }
        if let Some(department) = self.department {
            update.set("department", SqlValue::String(department.trim().to_string()));
        }
        if let Some(email) = self.email {
            update.set("email", non_blank(Some(email)).into());
        }
        if let Some(phone) = self.phone {
            update.set("phone", non_blank(Some(phone)).into());
        }
        if let Some(position) = self.position {
            update.set("position", non_blank(Some(position)).into());
        }
        if let Some(join_date) = self.join_date {
            update.set("join_date", non_blank(Some(join_date)).into());
        }
        if let Some(shift) = self.shift {
            let shift = Shift::parse(&shift);
            check_shift(&shift, settings)?;
            update.set("shift", SqlValue::String(shift.to_string()));
        }

        if self.use_global_weekends {
            update.set("weekends", SqlValue::Null);
        } else if let Some(days) = self.weekends {
            let days = check_weekends(&days)?;
            let encoded = serde_json::to_string(&days)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            update.set("weekends", SqlValue::String(encoded));
        }

        Ok(update)
    }
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Employee id already exists")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    session: Session,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageEmployees)?;

    let settings = settings_cache::get(pool.get_ref()).await?;
    let employee = payload.into_inner().into_employee(&settings)?;

    match repo::employee::insert(pool.get_ref(), &employee).await {
        Ok(()) => {
            info!(employee_id = %employee.id, by = %session.username, "Employee created");
            Ok(HttpResponse::Created().json(employee))
        }
        Err(e) if AppError::is_constraint_violation(&e) => Err(AppError::conflict(format!(
            "Employee '{}' already exists",
            employee.id
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Rows to skip for a 1-based page.
fn page_offset(page: u32, per_page: u32) -> AppResult<u32> {
    page.saturating_sub(1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::validation(format!("Page {page} is out of range")))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 400, description = "Page out of range")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    session: Session,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewEmployees)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page_offset(page, per_page)?;

    let query = query.into_inner();
    let filter = EmployeeFilter {
        department: non_blank(query.department),
        shift: non_blank(query.shift),
        search: non_blank(query.search),
    };

    let (employees, total) =
        repo::employee::list(pool.get_ref(), &filter, per_page, offset).await?;
    debug!(page, per_page, total, "Employees listed");

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    session: Session,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewEmployees)?;
    let employee_id = path.into_inner();

    match repo::employee::find(pool.get_ref(), &employee_id).await? {
        Some(employee) => Ok(HttpResponse::Ok().json(employee)),
        None => Err(AppError::not_found("Employee not found")),
    }
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    session: Session,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    body: web::Json<UpdateEmployee>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageEmployees)?;
    let employee_id = path.into_inner();

    if repo::employee::find(pool.get_ref(), &employee_id).await?.is_none() {
        return Err(AppError::not_found("Employee not found"));
    }

    let settings = settings_cache::get(pool.get_ref()).await?;
    let update = body.into_inner().into_update(&settings)?;

    if let Some(update) = update.build("id", SqlValue::String(employee_id.clone())) {
        execute_update(pool.get_ref(), update).await?;
        info!(employee_id = %employee_id, by = %session.username, "Employee updated");
    }

    let employee = repo::employee::find(pool.get_ref(), &employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Delete Employee together with their attendance
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "success": true,
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    session: Session,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageEmployees)?;
    let employee_id = path.into_inner();

    if !repo::employee::delete_cascade(pool.get_ref(), &employee_id).await? {
        return Err(AppError::not_found("Employee not found"));
    }

    info!(employee_id = %employee_id, by = %session.username, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Successfully deleted"
    })))
}

#[utoipa::path(
    get,
    path = "/api/employees/export",
    responses(
        (status = 200, description = "All employees as CSV", content_type = "text/csv", body = String)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn export_employees(
    session: Session,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    session.require(Permission::ViewEmployees)?;

    let employees = repo::employee::all(pool.get_ref()).await?;
    debug!(rows = employees.len(), "Exporting employees as CSV");

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"employees.csv\"",
        ))
        .body(csv::encode_employees(&employees)))
}

/// Upserts every valid row; bad rows are skipped and counted.
#[utoipa::path(
    post,
    path = "/api/employees/import",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 200, description = "Import result", body = ImportResponse),
        (status = 400, description = "CSV has no header row")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn import_employees(
    session: Session,
    pool: web::Data<MySqlPool>,
    body: String,
) -> AppResult<HttpResponse> {
    session.require(Permission::ManageEmployees)?;

    let parsed = csv::decode_employees(&body)?;
    let settings = settings_cache::get(pool.get_ref()).await?;

    let mut imported = 0;
    let mut skipped = parsed.skipped;

    for (idx, row) in parsed.rows.into_iter().enumerate() {
        let employee = match validate_employee(row, &settings) {
            Ok(e) => e,
            Err(e) => {
                warn!(row = idx + 1, error = %e, "Skipping employee CSV row");
                skipped += 1;
                continue;
            }
        };

        match repo::employee::upsert(pool.get_ref(), &employee).await {
            Ok(()) => imported += 1,
            Err(e) => {
                warn!(row = idx + 1, employee_id = %employee.id, error = %e, "Employee CSV row failed");
                skipped += 1;
            }
        }
    }

    info!(imported, skipped, by = %session.username, "Employee CSV imported");
    Ok(HttpResponse::Ok().json(ImportResponse {
        success: true,
        imported,
        skipped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::ShiftWindow;

    fn payload(name: &str) -> CreateEmployee {
        CreateEmployee {
            id: None,
            name: name.to_string(),
            department: Some("  Sales ".into()),
            email: Some("".into()),
            phone: None,
            position: None,
            join_date: None,
            shift: None,
            weekends: Some(vec![6, 5, 6]),
        }
    }

    #[test]
    fn create_generates_id_and_normalizes_fields() {
        let employee = payload(" Jane ").into_employee(&Settings::default()).unwrap();

        assert_eq!(employee.name, "Jane");
        assert_eq!(employee.department, "Sales");
        assert_eq!(employee.email, None);
        assert_eq!(employee.shift, Shift::Morning);
        assert_eq!(employee.weekends, Some(vec![5, 6]));
        assert!(Uuid::parse_str(&employee.id).is_ok());
    }

    #[test]
    fn page_offset_rejects_pages_past_the_end_of_u32() {
        assert_eq!(page_offset(1, 20).unwrap(), 0);
        assert_eq!(page_offset(3, 20).unwrap(), 40);
        assert!(matches!(
            page_offset(u32::MAX, 100),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn create_rejects_blank_name_and_unknown_shift() {
        assert!(matches!(
            payload("   ").into_employee(&Settings::default()),
            Err(AppError::Validation(_))
        ));

        let mut p = payload("Jane");
        p.shift = Some("graveyard".into());
        assert!(matches!(
            p.into_employee(&Settings::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn custom_shift_must_exist_in_settings() {
        let mut settings = Settings::default();
        settings
            .set_shift("evening", &ShiftWindow::new("14:00", "22:00"))
            .unwrap();

        let mut p = payload("Jane");
        p.shift = Some("Evening".into());
        let employee = p.into_employee(&settings).unwrap();
        assert_eq!(employee.shift.as_str(), "evening");
    }

    #[test]
    fn bad_weekday_index_is_rejected() {
        let mut p = payload("Jane");
        p.weekends = Some(vec![1, 7]);
        assert!(matches!(
            p.into_employee(&Settings::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn update_only_sets_given_columns() {
        let body = UpdateEmployee {
            name: Some("New Name".into()),
            department: None,
            email: Some(" ".into()),
            phone: None,
            position: None,
            join_date: None,
            shift: Some("night".into()),
            weekends: Some(vec![0]),
            use_global_weekends: false,
        };

        let update = body
            .into_update(&Settings::default())
            .unwrap()
            .build("id", SqlValue::String("E1".into()))
            .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET name = ?, email = ?, shift = ?, weekends = ? WHERE id = ?"
        );
        assert_eq!(update.values[1], SqlValue::Null);
        assert_eq!(update.values[2], SqlValue::String("night".into()));
        assert_eq!(update.values[3], SqlValue::String("[0]".into()));
    }
}

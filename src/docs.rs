use crate::api::attendance::{BulkAttendance, BulkEntry, BulkResponse, MarkAttendance};
use crate::api::employee::{
    CreateEmployee, EmployeeListResponse, ImportResponse, UpdateEmployee,
};
use crate::api::settings::WeekendsReq;
use crate::interchange::backup::Backup;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::model::settings::{Holiday, SettingRow, Settings, ShiftWindow};
use crate::model::summary::{DailyOverview, DateRange, PeriodReport, Summary, SummaryTotals};
use crate::models::{LoginReqDto, TokenPair, UserReq};
use crate::repo::backup::ImportCounts;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Tracker API",
        version = "1.0.0",
        description = r#"
## Employee Attendance Tracker

Tracks employees, their daily attendance and the hours and overtime
derived from it.

### Key Features
- **Employees**: create, update, list, delete (with their attendance), CSV import/export
- **Attendance**: mark a day, bulk-mark a day, self-service check-in/check-out, CSV import/export
- **Settings**: global weekends, holidays, named shifts
- **Reports**: period and monthly summaries with punctuality and efficiency, daily overview
- **Backup**: full JSON and SQL export/import, sample data

### Hours
Regular hours are capped at 8 per day; anything beyond is overtime. A
time-out earlier than the time-in means the shift ended the next morning.

### Security
Endpoints under the API prefix need a **JWT Bearer** access token.
What a caller may do depends on their role's permissions.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::export_employees,
        crate::api::employee::import_employees,

        crate::api::attendance::list_attendance,
        crate::api::attendance::mark_attendance,
        crate::api::attendance::bulk_mark,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::export_attendance,
        crate::api::attendance::import_attendance,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,

        crate::api::settings::get_settings,
        crate::api::settings::set_weekends,
        crate::api::settings::add_holiday,
        crate::api::settings::remove_holiday,
        crate::api::settings::set_shift,
        crate::api::settings::remove_shift,

        crate::api::report::summary,
        crate::api::report::monthly,
        crate::api::report::daily,

        crate::api::backup::export_json,
        crate::api::backup::import_json,
        crate::api::backup::export_sql,
        crate::api::backup::import_sql,
        crate::api::backup::sample_data
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            TokenPair,
            Employee,
            CreateEmployee,
            UpdateEmployee,
            EmployeeListResponse,
            ImportResponse,
            AttendanceRecord,
            MarkAttendance,
            BulkEntry,
            BulkAttendance,
            BulkResponse,
            Settings,
            SettingRow,
            ShiftWindow,
            Holiday,
            WeekendsReq,
            DateRange,
            Summary,
            SummaryTotals,
            PeriodReport,
            DailyOverview,
            Backup,
            ImportCounts
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Settings", description = "Weekends, holidays and shifts"),
        (name = "Reports", description = "Attendance summaries"),
        (name = "Backup", description = "Full export, import and sample data"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme the paths refer to.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_routes_and_security() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/attendance"));
        assert!(doc.paths.paths.contains_key("/api/reports/monthly"));
        assert!(doc.paths.paths.contains_key("/auth/login"));
        assert!(
            doc.components
                .as_ref()
                .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"))
        );
    }
}

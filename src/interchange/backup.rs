use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::CodecError;
use super::sql::SqlDump;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::{Employee, normalize_weekdays};
use crate::model::settings::SettingRow;

pub const BACKUP_VERSION: &str = "1.0";

/// Full database snapshot. Importing one replaces everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub employees: Vec<Employee>,
    pub attendance: Vec<AttendanceRecord>,
    pub settings: Vec<SettingRow>,
    #[schema(value_type = String, format = "date-time")]
    pub export_date: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    BACKUP_VERSION.to_string()
}

impl Backup {
    pub fn new(dump: SqlDump, export_date: DateTime<Utc>) -> Self {
        Backup {
            employees: dump.employees,
            attendance: dump.attendance,
            settings: dump.settings,
            export_date,
            version: BACKUP_VERSION.to_string(),
        }
    }

    /// Re-applies the record rules to everything in the document: names
    /// and ids are required, weekdays must be 0-6, and attendance is rebuilt
    /// so absent days carry no times and hours follow the times.
    pub fn into_dump(self) -> Result<SqlDump, CodecError> {
        let employees = self
            .employees
            .into_iter()
            .map(checked_employee)
            .collect::<Result<Vec<_>, _>>()?;

        let attendance = self
            .attendance
            .into_iter()
            .map(|r| {
                let date = r.date;
                AttendanceRecord::normalized(
                    r.employee_id,
                    r.date,
                    r.present,
                    r.time_in.as_deref(),
                    r.time_out.as_deref(),
                    r.shift,
                    None,
                )
                .map_err(|e| CodecError::Record(format!("attendance on {date}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SqlDump {
            employees,
            attendance,
            settings: self.settings,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn checked_employee(mut employee: Employee) -> Result<Employee, CodecError> {
    employee.id = employee.id.trim().to_string();
    employee.name = employee.name.trim().to_string();

    if employee.id.is_empty() {
        return Err(CodecError::Record("employee without an id".into()));
    }
    if employee.name.is_empty() {
        return Err(CodecError::Record(format!(
            "employee '{}' has no name",
            employee.id
        )));
    }
    if let Some(days) = &employee.weekends {
        let days = normalize_weekdays(days).map_err(|bad| {
            CodecError::Record(format!(
                "employee '{}' has weekday {bad}, expected 0-6",
                employee.id
            ))
        })?;
        employee.weekends = Some(days);
    }
    Ok(employee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::Shift;
    use crate::model::settings::Settings;

    #[test]
    fn document_uses_expected_top_level_keys() {
        let backup = Backup::new(
            SqlDump {
                settings: Settings::default().to_rows(),
                ..SqlDump::default()
            },
            DateTime::parse_from_rfc3339("2026-04-01T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );

        let value: serde_json::Value = serde_json::from_str(&backup.to_json().unwrap()).unwrap();
        for key in ["employees", "attendance", "settings", "exportDate", "version"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["settings"][0]["key"], "weekends");
    }

    #[test]
    fn reads_documents_without_version() {
        let text = r#"{
            "employees": [{"id": "E1", "name": "Ada", "shift": "night"}],
            "attendance": [{"employeeId": "E1", "date": "2026-03-02", "present": false}],
            "settings": [],
            "exportDate": "2026-04-01T08:00:00Z"
        }"#;

        let backup = Backup::from_json(text).unwrap();
        assert_eq!(backup.version, BACKUP_VERSION);
        assert_eq!(backup.employees[0].shift, Shift::Night);
        assert!(!backup.attendance[0].present);

        let dump = backup.into_dump().unwrap();
        assert_eq!(dump.employees.len(), 1);
    }

    fn document(employee: &str, attendance: &str) -> String {
        format!(
            r#"{{"employees": [{employee}], "attendance": [{attendance}],
                "settings": [], "exportDate": "2026-04-01T08:00:00Z"}}"#
        )
    }

    #[test]
    fn restored_attendance_is_rebuilt_from_its_times() {
        let text = document(
            r#"{"id": "E1", "name": " Ada ", "weekends": [6, 0, 6]}"#,
            r#"{"employeeId": "E1", "date": "2026-03-02", "present": false,
                "timeIn": "09:00", "timeOut": "17:00", "hours": 12, "overtimeHours": 4},
               {"employeeId": "E1", "date": "2026-03-03", "present": true,
                "timeIn": "9:00", "timeOut": "19:30", "hours": 1}"#,
        );

        let dump = Backup::from_json(&text).unwrap().into_dump().unwrap();

        assert_eq!(dump.employees[0].name, "Ada");
        assert_eq!(dump.employees[0].weekends, Some(vec![0, 6]));

        let absent = &dump.attendance[0];
        assert_eq!(absent.time_in, None);
        assert_eq!(absent.time_out, None);
        assert_eq!(absent.hours, 0.0);
        assert_eq!(absent.overtime_hours, 0.0);

        let present = &dump.attendance[1];
        assert_eq!(present.time_in.as_deref(), Some("09:00"));
        assert_eq!(present.hours, 8.0);
        assert_eq!(present.overtime_hours, 2.5);
    }

    #[test]
    fn invalid_records_reject_the_whole_document() {
        let bad_time = document(
            r#"{"id": "E1", "name": "Ada"}"#,
            r#"{"employeeId": "E1", "date": "2026-03-02", "present": true,
                "timeIn": "09:00", "timeOut": "9am"}"#,
        );
        let no_name = document(r#"{"id": "E1", "name": "  "}"#, "");
        let bad_weekday = document(r#"{"id": "E1", "name": "Ada", "weekends": [9]}"#, "");

        for text in [bad_time, no_name, bad_weekday] {
            assert!(matches!(
                Backup::from_json(&text).unwrap().into_dump(),
                Err(CodecError::Record(_))
            ));
        }
    }

    #[test]
    fn malformed_documents_are_codec_errors() {
        assert!(matches!(
            Backup::from_json("{\"employees\": 3}"),
            Err(CodecError::Json(_))
        ));
    }
}

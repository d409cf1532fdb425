use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::calc::hours::{TimeError, compute_hours, normalize_hhmm};
use crate::model::employee::Shift;
use crate::model::settings::ShiftWindow;

/// One employee's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "employeeId": "EMP-001",
        "date": "2026-03-02",
        "present": true,
        "timeIn": "09:00",
        "timeOut": "19:30",
        "shift": "morning",
        "hours": 8.0,
        "overtimeHours": 2.5
    })
)]
pub struct AttendanceRecord {
    pub employee_id: String,

    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,

    pub present: bool,

    #[serde(default)]
    pub time_in: Option<String>,

    #[serde(default)]
    pub time_out: Option<String>,

    #[serde(default)]
    #[schema(value_type = String)]
    pub shift: Shift,

    #[serde(default)]
    pub hours: f64,

    #[serde(default)]
    pub overtime_hours: f64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub employee_id: String,
    pub date: NaiveDate,
    pub present: bool,
    pub time_in: Option<String>,
    pub time_out: Option<String>,
    pub shift: String,
    pub hours: f64,
    pub overtime_hours: f64,
}

impl From<AttendanceRow> for AttendanceRecord {
    fn from(row: AttendanceRow) -> Self {
        AttendanceRecord {
            employee_id: row.employee_id,
            date: row.date,
            present: row.present,
            time_in: row.time_in,
            time_out: row.time_out,
            shift: Shift::parse(&row.shift),
            hours: row.hours,
            overtime_hours: row.overtime_hours,
        }
    }
}

impl AttendanceRecord {
    /// Builds a record and enforces the presence invariant: an absent day
    /// carries no times and no hours; a present day has its hours derived
    /// from the times, with missing times taken from `defaults`.
    pub fn normalized(
        employee_id: impl Into<String>,
        date: NaiveDate,
        present: bool,
        time_in: Option<&str>,
        time_out: Option<&str>,
        shift: Shift,
        defaults: Option<&ShiftWindow>,
    ) -> Result<Self, TimeError> {
        let mut record = AttendanceRecord {
            employee_id: employee_id.into(),
            date,
            present,
            time_in: None,
            time_out: None,
            shift,
            hours: 0.0,
            overtime_hours: 0.0,
        };

        if !present {
            return Ok(record);
        }

        let time_in = non_blank(time_in).or(defaults.map(|w| w.start.as_str()));
        let time_out = non_blank(time_out).or(defaults.map(|w| w.end.as_str()));

        record.time_in = time_in.map(normalize_hhmm).transpose()?;
        record.time_out = time_out.map(normalize_hhmm).transpose()?;

        let worked = compute_hours(record.time_in.as_deref(), record.time_out.as_deref())?;
        record.hours = worked.regular;
        record.overtime_hours = worked.overtime;

        Ok(record)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn absent_clears_times_and_hours() {
        let record = AttendanceRecord::normalized(
            "E1",
            day(),
            false,
            Some("09:00"),
            Some("19:30"),
            Shift::Morning,
            None,
        )
        .unwrap();

        assert!(!record.present);
        assert_eq!(record.time_in, None);
        assert_eq!(record.time_out, None);
        assert_eq!(record.hours, 0.0);
        assert_eq!(record.overtime_hours, 0.0);
    }

    #[test]
    fn present_computes_overtime() {
        let record = AttendanceRecord::normalized(
            "E1",
            day(),
            true,
            Some("09:00"),
            Some("19:30"),
            Shift::Morning,
            None,
        )
        .unwrap();

        assert_eq!(record.hours, 8.0);
        assert_eq!(record.overtime_hours, 2.5);
    }

    #[test]
    fn missing_times_fall_back_to_shift_window() {
        let window = ShiftWindow::new("21:00", "05:00");
        let record = AttendanceRecord::normalized(
            "E1",
            day(),
            true,
            None,
            Some(" "),
            Shift::Night,
            Some(&window),
        )
        .unwrap();

        assert_eq!(record.time_in.as_deref(), Some("21:00"));
        assert_eq!(record.time_out.as_deref(), Some("05:00"));
        assert_eq!(record.hours, 8.0);
    }

    #[test]
    fn present_without_times_or_defaults_is_zero_hours() {
        let record =
            AttendanceRecord::normalized("E1", day(), true, None, None, Shift::Morning, None)
                .unwrap();
        assert!(record.present);
        assert_eq!(record.hours, 0.0);
    }

    #[test]
    fn bad_time_is_an_error() {
        let result = AttendanceRecord::normalized(
            "E1",
            day(),
            true,
            Some("9am"),
            Some("17:00"),
            Shift::Morning,
            None,
        );
        assert!(result.is_err());
    }
}

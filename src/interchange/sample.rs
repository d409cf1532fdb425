//! Deterministic demo data: a handful of employees and a realistic mix of
//! on-time, late, overtime and absent days on their working days.

use super::sql::SqlDump;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::{Employee, Shift};
use crate::model::settings::Settings;
use crate::model::summary::DateRange;

const FIRST_NAMES: [&str; 10] = [
    "Amina", "Ben", "Chen", "Dara", "Elif", "Femi", "Greta", "Hiro", "Ines", "Jonas",
];
const LAST_NAMES: [&str; 7] = ["Khan", "Lopez", "Meyer", "Nakamura", "Okafor", "Petrov", "Quinn"];
const DEPARTMENTS: [&str; 4] = ["Engineering", "Operations", "Sales", "Support"];

fn sample_employee(tag: &str, idx: usize) -> Employee {
    let shift = if idx % 4 == 3 { Shift::Night } else { Shift::Morning };

    Employee {
        id: format!("{tag}-{:03}", idx + 1),
        name: format!(
            "{} {}",
            FIRST_NAMES[idx % FIRST_NAMES.len()],
            LAST_NAMES[idx % LAST_NAMES.len()]
        ),
        department: DEPARTMENTS[idx % DEPARTMENTS.len()].to_string(),
        email: None,
        phone: None,
        position: Some(if idx % 5 == 0 { "Team Lead" } else { "Associate" }.to_string()),
        join_date: None,
        shift,
        weekends: None,
    }
}

/// (time in, time out) for a day pattern; `None` means absent.
fn day_times(shift: &Shift, pattern: usize) -> Option<(&'static str, &'static str)> {
    match (shift, pattern) {
        (_, 0) => None,
        (Shift::Night, 1) => Some(("21:25", "05:00")),
        (Shift::Night, 2) => Some(("21:00", "07:30")),
        (Shift::Night, 3) => Some(("21:00", "04:15")),
        (Shift::Night, _) => Some(("20:55", "05:00")),
        (_, 1) => Some(("09:20", "17:00")),
        (_, 2) => Some(("09:00", "19:30")),
        (_, 3) => Some(("08:55", "16:30")),
        _ => Some(("09:00", "17:00")),
    }
}

/// `employee_count` employees with ids `<tag>-001`.., and one record per
/// working day in `range` for each of them.
pub fn sample_dump(
    employee_count: usize,
    range: DateRange,
    settings: &Settings,
    tag: &str,
) -> SqlDump {
    let employees: Vec<Employee> = (0..employee_count)
        .map(|idx| sample_employee(tag, idx))
        .collect();

    let mut attendance = Vec::new();
    for (idx, employee) in employees.iter().enumerate() {
        for (day_no, date) in range.days().enumerate() {
            if !settings.is_working_day(employee, date) {
                continue;
            }
            let pattern = (idx * 3 + day_no) % 10;
            let times = day_times(&employee.shift, pattern);
            let record = AttendanceRecord::normalized(
                employee.id.clone(),
                date,
                times.is_some(),
                times.map(|t| t.0),
                times.map(|t| t.1),
                employee.shift.clone(),
                None,
            );
            // every pattern above is a valid HH:MM pair
            if let Ok(record) = record {
                attendance.push(record);
            }
        }
    }

    SqlDump {
        employees,
        attendance,
        settings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn march() -> DateRange {
        DateRange::month(2026, 3).unwrap()
    }

    #[test]
    fn one_record_per_working_day() {
        let settings = Settings::default();
        let dump = sample_dump(4, march(), &settings, "DEMO");

        assert_eq!(dump.employees.len(), 4);
        // 22 weekdays in March 2026
        assert_eq!(dump.attendance.len(), 4 * 22);
        assert_eq!(dump.employees[0].id, "DEMO-001");
        assert_eq!(dump.employees[3].shift, Shift::Night);
        assert!(dump.settings.is_empty());
    }

    #[test]
    fn no_records_on_weekends_or_holidays() {
        let mut settings = Settings::default();
        settings
            .add_holiday(crate::model::settings::Holiday {
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                name: "Closed".into(),
            })
            .unwrap();
        let dump = sample_dump(2, march(), &settings, "DEMO");

        assert!(dump.attendance.iter().all(|r| {
            dump.employees
                .iter()
                .find(|e| e.id == r.employee_id)
                .is_some_and(|e| settings.is_working_day(e, r.date))
        }));
        assert_eq!(dump.attendance.len(), 2 * 21);
    }

    #[test]
    fn generation_is_deterministic_and_varied() {
        let settings = Settings::default();
        let a = sample_dump(8, march(), &settings, "T");
        let b = sample_dump(8, march(), &settings, "T");
        assert_eq!(a, b);

        assert!(a.attendance.iter().any(|r| !r.present));
        assert!(a.attendance.iter().any(|r| r.overtime_hours > 0.0));
        assert!(a.attendance.iter().all(|r| r.present || r.hours == 0.0));
    }
}

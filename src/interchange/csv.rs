//! Comma separated import/export.
//!
//! Fields are joined with bare commas and are never quoted, so a value that
//! itself contains a comma shifts every column after it. On import such a
//! row no longer matches the header width and is skipped. Weekend sets use
//! `;` between weekday indices for the same reason.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use super::CodecError;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::{Employee, Shift, normalize_weekdays};

pub const EMPLOYEE_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "department",
    "email",
    "phone",
    "position",
    "joinDate",
    "shift",
    "weekends",
];

pub const ATTENDANCE_COLUMNS: [&str; 8] = [
    "employeeId",
    "date",
    "present",
    "timeIn",
    "timeOut",
    "shift",
    "hours",
    "overtimeHours",
];

/// Rows that decoded cleanly, plus how many were dropped.
#[derive(Debug)]
pub struct CsvImport<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

pub fn employee_header() -> String {
    EMPLOYEE_COLUMNS.join(",")
}

pub fn employee_line(employee: &Employee) -> String {
    let weekends = employee
        .weekends
        .as_ref()
        .map(|days| {
            days.iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(";")
        })
        .unwrap_or_default();

    [
        employee.id.as_str(),
        employee.name.as_str(),
        employee.department.as_str(),
        employee.email.as_deref().unwrap_or(""),
        employee.phone.as_deref().unwrap_or(""),
        employee.position.as_deref().unwrap_or(""),
        employee.join_date.as_deref().unwrap_or(""),
        employee.shift.as_str(),
        weekends.as_str(),
    ]
    .join(",")
}

pub fn attendance_header() -> String {
    ATTENDANCE_COLUMNS.join(",")
}

pub fn attendance_line(record: &AttendanceRecord) -> String {
    [
        record.employee_id.clone(),
        record.date.format("%Y-%m-%d").to_string(),
        record.present.to_string(),
        record.time_in.clone().unwrap_or_default(),
        record.time_out.clone().unwrap_or_default(),
        record.shift.to_string(),
        record.hours.to_string(),
        record.overtime_hours.to_string(),
    ]
    .join(",")
}

pub fn encode_employees(employees: &[Employee]) -> String {
    let mut out = employee_header();
    for employee in employees {
        out.push('\n');
        out.push_str(&employee_line(employee));
    }
    out.push('\n');
    out
}

pub fn encode_attendance(records: &[AttendanceRecord]) -> String {
    let mut out = attendance_header();
    for record in records {
        out.push('\n');
        out.push_str(&attendance_line(record));
    }
    out.push('\n');
    out
}

/// Header positions keyed by lowercase column name.
struct Header(HashMap<String, usize>);

impl Header {
    fn parse(line: &str) -> Self {
        Header(
            line.split(',')
                .enumerate()
                .map(|(idx, name)| (name.trim().to_lowercase(), idx))
                .collect(),
        )
    }

    fn width(&self) -> usize {
        self.0.values().max().map_or(0, |max| max + 1)
    }

    /// Trimmed, non-empty value of `column` in `row`.
    fn get<'r>(&self, row: &[&'r str], column: &str) -> Option<&'r str> {
        let idx = *self.0.get(&column.to_lowercase())?;
        row.get(idx).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// Splits `text` into a header and the rows whose width matches it.
fn split_rows(text: &str) -> Result<(Header, Vec<Vec<&str>>, usize), CodecError> {
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());

    let header = Header::parse(lines.next().ok_or(CodecError::MissingHeader)?);
    let width = header.width();

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line_no, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != width {
            tracing::debug!(
                line = line_no + 2,
                expected = width,
                found = fields.len(),
                "Skipping CSV row with wrong column count"
            );
            skipped += 1;
            continue;
        }
        rows.push(fields);
    }

    Ok((header, rows, skipped))
}

fn parse_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn parse_weekends(value: Option<&str>) -> Result<Option<Vec<u8>>, ()> {
    let Some(value) = value else {
        return Ok(None);
    };
    let days = value
        .split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<u8>().map_err(|_| ()))
        .collect::<Result<Vec<_>, _>>()?;
    normalize_weekdays(&days).map(Some).map_err(|_| ())
}

fn employee_from_row(header: &Header, row: &[&str]) -> Option<Employee> {
    let name = header.get(row, "name")?;
    let weekends = parse_weekends(header.get(row, "weekends")).ok()?;

    Some(Employee {
        id: header
            .get(row, "id")
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        name: name.to_string(),
        department: header.get(row, "department").unwrap_or_default().to_string(),
        email: header.get(row, "email").map(str::to_string),
        phone: header.get(row, "phone").map(str::to_string),
        position: header.get(row, "position").map(str::to_string),
        join_date: header.get(row, "joinDate").map(str::to_string),
        shift: Shift::parse(header.get(row, "shift").unwrap_or_default()),
        weekends,
    })
}

fn attendance_from_row(header: &Header, row: &[&str]) -> Option<AttendanceRecord> {
    let employee_id = header.get(row, "employeeId")?;
    let date = NaiveDate::parse_from_str(header.get(row, "date")?, "%Y-%m-%d").ok()?;

    AttendanceRecord::normalized(
        employee_id,
        date,
        parse_present(header.get(row, "present")),
        header.get(row, "timeIn"),
        header.get(row, "timeOut"),
        Shift::parse(header.get(row, "shift").unwrap_or_default()),
        None,
    )
    .ok()
}

fn decode_with<T>(
    text: &str,
    convert: impl Fn(&Header, &[&str]) -> Option<T>,
) -> Result<CsvImport<T>, CodecError> {
    let (header, rows, mut skipped) = split_rows(text)?;

    let mut decoded = Vec::with_capacity(rows.len());
    for row in rows {
        match convert(&header, &row) {
            Some(value) => decoded.push(value),
            None => skipped += 1,
        }
    }

    Ok(CsvImport {
        rows: decoded,
        skipped,
    })
}

/// Rows without a name, or with an unreadable weekend list, are skipped.
/// A missing id gets a fresh UUID.
pub fn decode_employees(text: &str) -> Result<CsvImport<Employee>, CodecError> {
    decode_with(text, employee_from_row)
}

/// Hours are recomputed from the times rather than trusted from the file,
/// and absent rows have their times cleared.
pub fn decode_attendance(text: &str) -> Result<CsvImport<AttendanceRecord>, CodecError> {
    decode_with(text, attendance_from_row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: &str, name: &str, shift: Shift, weekends: Option<Vec<u8>>) -> Employee {
        Employee {
            id: id.into(),
            name: name.into(),
            department: "Engineering".into(),
            email: Some(format!("{}@example.com", id.to_lowercase())),
            phone: None,
            position: Some("Engineer".into()),
            join_date: Some("2024-01-15".into()),
            shift,
            weekends,
        }
    }

    #[test]
    fn employee_round_trip_keeps_core_fields() {
        let employees = vec![
            employee("E1", "Ada Lovelace", Shift::Morning, None),
            employee("E2", "Alan Turing", Shift::Night, Some(vec![5, 6])),
            employee("E3", "Grace Hopper", Shift::Custom("evening".into()), Some(vec![0])),
        ];

        let csv = encode_employees(&employees);
        let import = decode_employees(&csv).unwrap();

        assert_eq!(import.skipped, 0);
        assert_eq!(import.rows, employees);
    }

    #[test]
    fn header_is_case_insensitive_and_extra_columns_ignored() {
        let csv = "NAME,Department,SHIFT,notes\nAda,Ops,night,hello\n";
        let import = decode_employees(csv).unwrap();

        assert_eq!(import.rows.len(), 1);
        let ada = &import.rows[0];
        assert_eq!(ada.name, "Ada");
        assert_eq!(ada.department, "Ops");
        assert_eq!(ada.shift, Shift::Night);
        // id regenerated
        assert_eq!(ada.id.len(), 36);
    }

    #[test]
    fn mismatched_rows_are_skipped_and_decoding_continues() {
        let csv = "\
id,name,department
E1,Ada,Ops
E2,Smith, John,Sales
E3,Grace,R&D
";
        let import = decode_employees(csv).unwrap();

        assert_eq!(import.skipped, 1);
        let ids: Vec<_> = import.rows.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["E1", "E3"]);
    }

    #[test]
    fn rows_without_name_or_with_bad_weekends_are_skipped() {
        let csv = "id,name,weekends\nE1,,\nE2,Bob,0;9\nE3,Cy,x\nE4,Di,6;0\n";
        let import = decode_employees(csv).unwrap();

        assert_eq!(import.skipped, 3);
        assert_eq!(import.rows.len(), 1);
        assert_eq!(import.rows[0].weekends, Some(vec![0, 6]));
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(
            decode_employees("\n  \n"),
            Err(CodecError::MissingHeader)
        ));
    }

    #[test]
    fn attendance_present_flag_accepts_one_and_true() {
        let csv = "\
employeeId,date,present,timeIn,timeOut
E1,2026-03-02,1,09:00,17:00
E1,2026-03-03,TRUE,09:00,19:30
E1,2026-03-04,yes,09:00,17:00
E1,2026-03-05,false,09:00,17:00
";
        let import = decode_attendance(csv).unwrap();
        let present: Vec<_> = import.rows.iter().map(|r| r.present).collect();

        assert_eq!(present, [true, true, false, false]);
        assert_eq!(import.rows[1].overtime_hours, 2.5);
        assert_eq!(import.rows[2].time_in, None);
        assert_eq!(import.rows[3].hours, 0.0);
    }

    #[test]
    fn attendance_hours_are_recomputed_not_trusted() {
        let csv = "employeeId,date,present,timeIn,timeOut,shift,hours,overtimeHours\n\
                   N1,2026-03-02,true,21:00,05:00,night,99,99\n";
        let import = decode_attendance(csv).unwrap();

        let record = &import.rows[0];
        assert_eq!(record.shift, Shift::Night);
        assert_eq!(record.hours, 8.0);
        assert_eq!(record.overtime_hours, 0.0);
    }

    #[test]
    fn attendance_rows_with_bad_dates_or_times_are_skipped() {
        let csv = "\
employeeId,date,present,timeIn,timeOut
E1,02/03/2026,true,09:00,17:00
E1,2026-03-03,true,9am,17:00
,2026-03-04,true,09:00,17:00
E1,2026-03-05,true,09:00,17:00
";
        let import = decode_attendance(csv).unwrap();
        assert_eq!(import.skipped, 3);
        assert_eq!(import.rows.len(), 1);
    }

    #[test]
    fn attendance_round_trip() {
        let records = vec![
            AttendanceRecord::normalized(
                "E1",
                NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                true,
                Some("09:00"),
                Some("19:30"),
                Shift::Morning,
                None,
            )
            .unwrap(),
            AttendanceRecord::normalized(
                "E1",
                NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
                false,
                None,
                None,
                Shift::Morning,
                None,
            )
            .unwrap(),
        ];

        let csv = encode_attendance(&records);
        assert!(csv.starts_with("employeeId,date,present,timeIn,timeOut,shift,hours,overtimeHours\n"));
        assert!(csv.contains("E1,2026-03-02,true,09:00,19:30,morning,8,2.5"));

        let import = decode_attendance(&csv).unwrap();
        assert_eq!(import.rows, records);
    }

    #[test]
    fn windows_line_endings_are_accepted() {
        let csv = "id,name\r\nE1,Ada\r\n";
        let import = decode_employees(csv).unwrap();
        assert_eq!(import.rows[0].name, "Ada");
    }
}

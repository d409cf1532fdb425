//! SQL dump made of plain `INSERT` statements.
//!
//! This is a closed-loop format: `decode` reads what `encode` writes. It only
//! understands `INSERT INTO <table> (...) VALUES (...), (...);` for the
//! `employees`, `attendance` and `settings` tables, with literal values
//! (quoted strings, bare numbers/booleans, `NULL`). It is not a SQL parser.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::CodecError;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::{Employee, Shift, normalize_weekdays};
use crate::model::settings::SettingRow;

pub const EMPLOYEE_SQL_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "department",
    "email",
    "phone",
    "position",
    "join_date",
    "shift",
    "weekends",
];

pub const ATTENDANCE_SQL_COLUMNS: [&str; 8] = [
    "employee_id",
    "date",
    "present",
    "time_in",
    "time_out",
    "shift",
    "hours",
    "overtime_hours",
];

pub const SETTINGS_SQL_COLUMNS: [&str; 2] = ["setting_key", "setting_value"];

static INSERT_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?im)^[ \t]*insert[ \t]+into[ \t]+[`"]?(\w+)[`"]?\s*(?:\([^)]*\))?\s*values\s*"#)
        .expect("insert head pattern is valid")
});

/// Everything a dump carries.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SqlDump {
    pub employees: Vec<Employee>,
    pub attendance: Vec<AttendanceRecord>,
    pub settings: Vec<SettingRow>,
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote_opt(value: Option<&str>) -> String {
    value.map_or_else(|| "NULL".to_string(), quote)
}

fn push_insert(out: &mut String, table: &str, columns: &[&str], tuples: Vec<Vec<String>>) {
    if tuples.is_empty() {
        return;
    }

    out.push_str(&format!(
        "INSERT INTO {} ({}) VALUES\n",
        table,
        columns.join(", ")
    ));
    let body = tuples
        .into_iter()
        .map(|fields| format!("  ({})", fields.join(", ")))
        .collect::<Vec<_>>()
        .join(",\n");
    out.push_str(&body);
    out.push_str(";\n\n");
}

pub fn encode(dump: &SqlDump, generated_at: DateTime<Utc>) -> String {
    let mut out = format!(
        "-- Attendance tracker SQL export\n-- Generated: {}\n\n",
        generated_at.to_rfc3339()
    );

    let employees = dump
        .employees
        .iter()
        .map(|e| {
            vec![
                quote(&e.id),
                quote(&e.name),
                quote(&e.department),
                quote_opt(e.email.as_deref()),
                quote_opt(e.phone.as_deref()),
                quote_opt(e.position.as_deref()),
                quote_opt(e.join_date.as_deref()),
                quote(e.shift.as_str()),
                quote_opt(e.weekends_json().as_deref()),
            ]
        })
        .collect();
    push_insert(&mut out, "employees", &EMPLOYEE_SQL_COLUMNS, employees);

    let attendance = dump
        .attendance
        .iter()
        .map(|r| {
            vec![
                quote(&r.employee_id),
                quote(&r.date.format("%Y-%m-%d").to_string()),
                r.present.to_string(),
                quote_opt(r.time_in.as_deref()),
                quote_opt(r.time_out.as_deref()),
                quote(r.shift.as_str()),
                r.hours.to_string(),
                r.overtime_hours.to_string(),
            ]
        })
        .collect();
    push_insert(&mut out, "attendance", &ATTENDANCE_SQL_COLUMNS, attendance);

    let settings = dump
        .settings
        .iter()
        .map(|s| vec![quote(&s.key), quote(&s.value)])
        .collect();
    push_insert(&mut out, "settings", &SETTINGS_SQL_COLUMNS, settings);

    out
}

/// A literal inside a VALUES tuple.
#[derive(Debug, Clone, PartialEq)]
enum Field {
    Null,
    Quoted(String),
    Bare(String),
}

impl Field {
    fn text(&self) -> Option<&str> {
        match self {
            Field::Null => None,
            Field::Quoted(s) | Field::Bare(s) => Some(s),
        }
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    statement: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, reason: impl Into<String>) -> CodecError {
        CodecError::sql(self.statement, reason)
    }

    /// A quoted literal; the opening quote is the next char. A doubled quote
    /// stands for one literal quote.
    fn quoted(&mut self) -> Result<String, CodecError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("expected a quoted value"));
        };
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.bump();
                        value.push(quote);
                    } else {
                        return Ok(value);
                    }
                }
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string literal")),
            }
        }
    }

    fn field(&mut self) -> Result<Field, CodecError> {
        self.skip_ws();
        match self.peek() {
            Some('\'' | '"') => self.quoted().map(Field::Quoted),
            Some(_) => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ',' && c != ')') {
                    self.bump();
                }
                let raw = self.text[start..self.pos].trim();
                if raw.is_empty() {
                    Err(self.error("empty value"))
                } else if raw.eq_ignore_ascii_case("null") {
                    Ok(Field::Null)
                } else {
                    Ok(Field::Bare(raw.to_string()))
                }
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn tuple(&mut self) -> Result<Vec<Field>, CodecError> {
        self.skip_ws();
        if self.bump() != Some('(') {
            return Err(self.error("expected '(' to open a tuple"));
        }

        let mut fields = Vec::new();
        loop {
            fields.push(self.field()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(fields),
                _ => return Err(self.error("expected ',' or ')' inside tuple")),
            }
        }
    }

    /// Tuples up to the terminating `;` (or end of input).
    fn tuples(&mut self) -> Result<Vec<Vec<Field>>, CodecError> {
        let mut tuples = Vec::new();
        loop {
            tuples.push(self.tuple()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(';') => {
                    self.bump();
                    return Ok(tuples);
                }
                None => return Ok(tuples),
                Some(_) => return Err(self.error("expected ',' or ';' after tuple")),
            }
        }
    }
}

/// Typed access to one decoded tuple.
struct Row<'f> {
    fields: &'f [Field],
    columns: &'static [&'static str],
    statement: usize,
}

impl<'f> Row<'f> {
    fn error(&self, column: &str, reason: &str) -> CodecError {
        CodecError::sql(self.statement, format!("column {column}: {reason}"))
    }

    fn index(&self, column: &str) -> usize {
        self.columns
            .iter()
            .position(|c| *c == column)
            .unwrap_or(usize::MAX)
    }

    fn opt(&self, column: &str) -> Option<&'f str> {
        self.fields.get(self.index(column)).and_then(Field::text)
    }

    fn req(&self, column: &str) -> Result<&'f str, CodecError> {
        self.opt(column)
            .ok_or_else(|| self.error(column, "value is required"))
    }

    fn boolean(&self, column: &str) -> Result<bool, CodecError> {
        match self.req(column)? {
            v if v == "1" || v.eq_ignore_ascii_case("true") => Ok(true),
            v if v == "0" || v.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(self.error(column, "expected a boolean")),
        }
    }

    fn date(&self, column: &str) -> Result<NaiveDate, CodecError> {
        NaiveDate::parse_from_str(self.req(column)?, "%Y-%m-%d")
            .map_err(|_| self.error(column, "expected YYYY-MM-DD"))
    }

    fn weekends(&self, column: &str) -> Result<Option<Vec<u8>>, CodecError> {
        let Some(raw) = self.opt(column) else {
            return Ok(None);
        };
        let days: Vec<u8> =
            serde_json::from_str(raw).map_err(|_| self.error(column, "expected a JSON array"))?;
        normalize_weekdays(&days)
            .map(Some)
            .map_err(|_| self.error(column, "weekday out of range"))
    }
}

fn employee_from(row: &Row) -> Result<Employee, CodecError> {
    Ok(Employee {
        id: row.req("id")?.to_string(),
        name: row.req("name")?.to_string(),
        department: row.opt("department").unwrap_or_default().to_string(),
        email: row.opt("email").map(str::to_string),
        phone: row.opt("phone").map(str::to_string),
        position: row.opt("position").map(str::to_string),
        join_date: row.opt("join_date").map(str::to_string),
        shift: Shift::parse(row.opt("shift").unwrap_or_default()),
        weekends: row.weekends("weekends")?,
    })
}

fn attendance_from(row: &Row) -> Result<AttendanceRecord, CodecError> {
    AttendanceRecord::normalized(
        row.req("employee_id")?,
        row.date("date")?,
        row.boolean("present")?,
        row.opt("time_in"),
        row.opt("time_out"),
        Shift::parse(row.opt("shift").unwrap_or_default()),
        None,
    )
    .map_err(|e| CodecError::sql(row.statement, e.to_string()))
}

fn setting_from(row: &Row) -> Result<SettingRow, CodecError> {
    let value = row.req("setting_value")?;
    serde_json::from_str::<serde_json::Value>(value)
        .map_err(|_| row.error("setting_value", "expected JSON"))?;

    Ok(SettingRow {
        key: row.req("setting_key")?.to_string(),
        value: value.to_string(),
    })
}

/// Decodes a dump produced by [`encode`]. Any malformed statement fails the
/// whole decode; statements for other tables are skipped.
pub fn decode(text: &str) -> Result<SqlDump, CodecError> {
    let mut dump = SqlDump::default();
    let mut pos = 0;
    let mut statement = 0;

    while let Some(caps) = INSERT_HEAD.captures_at(text, pos) {
        statement += 1;
        let table = caps[1].to_lowercase();
        let head_end = caps.get(0).map_or(text.len(), |m| m.end());

        let mut scanner = Scanner {
            text,
            pos: head_end,
            statement,
        };
        let tuples = scanner.tuples()?;
        pos = scanner.pos;

        let columns: &'static [&'static str] = match table.as_str() {
            "employees" => &EMPLOYEE_SQL_COLUMNS,
            "attendance" => &ATTENDANCE_SQL_COLUMNS,
            "settings" => &SETTINGS_SQL_COLUMNS,
            other => {
                tracing::debug!(table = other, statement, "Skipping INSERT for unknown table");
                continue;
            }
        };

        for fields in &tuples {
            if fields.len() != columns.len() {
                return Err(CodecError::sql(
                    statement,
                    format!(
                        "{} expects {} values, found {}",
                        table,
                        columns.len(),
                        fields.len()
                    ),
                ));
            }
            let row = Row {
                fields,
                columns,
                statement,
            };
            match table.as_str() {
                "employees" => dump.employees.push(employee_from(&row)?),
                "attendance" => dump.attendance.push(attendance_from(&row)?),
                _ => dump.settings.push(setting_from(&row)?),
            }
        }
    }

    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::Settings;

    fn obrien() -> Employee {
        Employee {
            id: "E-7".into(),
            name: "Siobhan O'Brien".into(),
            department: "Finance".into(),
            email: None,
            phone: Some("+353 1 555".into()),
            position: None,
            join_date: Some("2023-09-01".into()),
            shift: Shift::Night,
            weekends: Some(vec![5, 6]),
        }
    }

    fn generated() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-31T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn apostrophes_survive_a_round_trip() {
        let dump = SqlDump {
            employees: vec![obrien()],
            ..SqlDump::default()
        };

        let sql = encode(&dump, generated());
        assert!(sql.contains("'Siobhan O''Brien'"));
        assert!(sql.contains("NULL"));
        assert!(sql.contains("'[5,6]'"));

        let decoded = decode(&sql).unwrap();
        assert_eq!(decoded.employees[0].name, "Siobhan O'Brien");
        assert_eq!(decoded, dump);
    }

    #[test]
    fn full_dump_round_trips() {
        let record = AttendanceRecord::normalized(
            "E-7",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            true,
            Some("21:00"),
            Some("06:30"),
            Shift::Night,
            None,
        )
        .unwrap();
        let dump = SqlDump {
            employees: vec![obrien()],
            attendance: vec![record],
            settings: Settings::default().to_rows(),
        };

        let decoded = decode(&encode(&dump, generated())).unwrap();
        assert_eq!(decoded, dump);
        assert_eq!(decoded.attendance[0].overtime_hours, 1.5);
        assert_eq!(Settings::from_rows(&decoded.settings), Settings::default());
    }

    #[test]
    fn empty_dump_has_no_statements() {
        let sql = encode(&SqlDump::default(), generated());
        assert!(!sql.contains("INSERT"));
        assert_eq!(decode(&sql).unwrap(), SqlDump::default());
    }

    #[test]
    fn tokenizer_handles_quotes_commas_and_case() {
        let sql = r#"
-- hand written
insert into `employees` (id, name, department, email, phone, position, join_date, shift, weekends)
values ("E1", "Said ""Doc"" Jones", 'Sales, EMEA', null, NULL, 'Lead', NULL, 'MORNING', NULL),
       ('E2', 'Zoë', '', NULL, NULL, NULL, NULL, 'evening', '[0]')
"#;
        let dump = decode(sql).unwrap();

        assert_eq!(dump.employees.len(), 2);
        assert_eq!(dump.employees[0].name, r#"Said "Doc" Jones"#);
        assert_eq!(dump.employees[0].department, "Sales, EMEA");
        assert_eq!(dump.employees[0].shift, Shift::Morning);
        assert_eq!(dump.employees[1].name, "Zoë");
        assert_eq!(dump.employees[1].shift, Shift::Custom("evening".into()));
        assert_eq!(dump.employees[1].weekends, Some(vec![0]));
    }

    #[test]
    fn attendance_flags_accept_numeric_booleans() {
        let sql = "INSERT INTO attendance (employee_id, date, present, time_in, time_out, shift, hours, overtime_hours) VALUES \
                   ('E1', '2026-03-02', 0, '09:00', '17:00', 'morning', 8, 0);";
        let dump = decode(sql).unwrap();

        let record = &dump.attendance[0];
        assert!(!record.present);
        assert_eq!(record.time_in, None);
        assert_eq!(record.hours, 0.0);
    }

    #[test]
    fn unknown_tables_are_skipped() {
        let sql = "INSERT INTO audit_log (id, msg) VALUES (1, 'x;y'), (2, 'z');\n\
                   INSERT INTO settings (setting_key, setting_value) VALUES ('weekends', '[5,6]');";
        let dump = decode(sql).unwrap();

        assert_eq!(dump.settings.len(), 1);
        assert_eq!(dump.settings[0].value, "[5,6]");
    }

    #[test]
    fn wrong_field_count_aborts() {
        let sql = "INSERT INTO settings (setting_key, setting_value) VALUES ('weekends');";
        let err = decode(sql).unwrap_err();
        assert!(err.to_string().contains("expects 2 values, found 1"));
    }

    #[test]
    fn unterminated_string_aborts() {
        let sql = "INSERT INTO employees (id) VALUES ('E1, 'Ada);";
        assert!(matches!(
            decode(sql),
            Err(CodecError::Sql { statement: 1, .. })
        ));
    }

    #[test]
    fn invalid_json_setting_aborts() {
        let sql = "INSERT INTO settings (setting_key, setting_value) VALUES ('shifts', '{oops');";
        assert!(decode(sql).is_err());
    }

    #[test]
    fn missing_required_name_aborts() {
        let sql = "INSERT INTO employees (id, name, department, email, phone, position, join_date, shift, weekends) \
                   VALUES ('E1', NULL, '', NULL, NULL, NULL, NULL, 'morning', NULL);";
        let err = decode(sql).unwrap_err();
        assert!(err.to_string().contains("column name"));
    }
}

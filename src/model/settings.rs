use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::calc::hours::normalize_hhmm;
use crate::error::{AppError, AppResult};
use crate::model::employee::{Employee, Shift, normalize_weekdays};

pub const KEY_WEEKENDS: &str = "weekends";
pub const KEY_HOLIDAYS: &str = "holidays";
pub const KEY_SHIFTS: &str = "shifts";

/// Wall-clock window of a shift. `end` earlier than `start` means the shift
/// ends the next morning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShiftWindow {
    #[schema(example = "09:00")]
    pub start: String,
    #[schema(example = "17:00")]
    pub end: String,
}

impl ShiftWindow {
    pub fn new(start: &str, end: &str) -> Self {
        ShiftWindow {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn normalized(&self) -> AppResult<Self> {
        Ok(ShiftWindow {
            start: normalize_hhmm(&self.start)?,
            end: normalize_hhmm(&self.end)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Holiday {
    #[schema(value_type = String, format = "date", example = "2026-12-25")]
    pub date: NaiveDate,
    #[schema(example = "Christmas Day")]
    pub name: String,
}

/// A raw `settings` table row: key plus JSON encoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SettingRow {
    #[sqlx(rename = "setting_key")]
    pub key: String,
    #[sqlx(rename = "setting_value")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    pub weekends: Vec<u8>,
    pub holidays: Vec<Holiday>,
    #[schema(value_type = Object)]
    pub shifts: BTreeMap<String, ShiftWindow>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut shifts = BTreeMap::new();
        shifts.insert("morning".to_string(), ShiftWindow::new("09:00", "17:00"));
        shifts.insert("night".to_string(), ShiftWindow::new("21:00", "05:00"));

        Settings {
            weekends: vec![0, 6],
            holidays: Vec::new(),
            shifts,
        }
    }
}

impl Settings {
    /// Assembles settings from stored rows. Unknown keys are ignored and
    /// missing or unreadable keys keep their defaults.
    pub fn from_rows(rows: &[SettingRow]) -> Self {
        let mut settings = Settings::default();

        for row in rows {
            let applied = match row.key.as_str() {
                KEY_WEEKENDS => serde_json::from_str(&row.value).map(|v| settings.weekends = v),
                KEY_HOLIDAYS => serde_json::from_str(&row.value).map(|v| settings.holidays = v),
                KEY_SHIFTS => serde_json::from_str::<BTreeMap<String, ShiftWindow>>(&row.value)
                    .map(|v| settings.shifts.extend(v)),
                _ => Ok(()),
            };
            if let Err(e) = applied {
                tracing::warn!(key = %row.key, error = %e, "Ignoring unreadable setting");
            }
        }

        settings
    }

    pub fn to_rows(&self) -> Vec<SettingRow> {
        vec![
            SettingRow {
                key: KEY_WEEKENDS.to_string(),
                value: json_string(&self.weekends),
            },
            SettingRow {
                key: KEY_HOLIDAYS.to_string(),
                value: json_string(&self.holidays),
            },
            SettingRow {
                key: KEY_SHIFTS.to_string(),
                value: json_string(&self.shifts),
            },
        ]
    }

    pub fn row(&self, key: &str) -> Option<SettingRow> {
        self.to_rows().into_iter().find(|r| r.key == key)
    }

    pub fn shift_window(&self, shift: &Shift) -> Option<&ShiftWindow> {
        self.shifts.get(shift.as_str())
    }

    pub fn has_shift(&self, shift: &Shift) -> bool {
        shift.is_reserved() || self.shifts.contains_key(shift.as_str())
    }

    pub fn set_weekends(&mut self, days: &[u8]) -> AppResult<()> {
        self.weekends = normalize_weekdays(days).map_err(|bad| {
            AppError::validation(format!("Weekday index {bad} is out of range 0-6"))
        })?;
        Ok(())
    }

    pub fn add_holiday(&mut self, holiday: Holiday) -> AppResult<()> {
        let name = holiday.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Holiday name is required"));
        }
        if self.holiday_on(holiday.date).is_some() {
            return Err(AppError::conflict(format!(
                "A holiday already exists on {}",
                holiday.date
            )));
        }

        self.holidays.push(Holiday {
            date: holiday.date,
            name: name.to_string(),
        });
        self.holidays.sort_by_key(|h| h.date);
        Ok(())
    }

    pub fn remove_holiday(&mut self, date: NaiveDate) -> AppResult<Holiday> {
        let idx = self
            .holidays
            .iter()
            .position(|h| h.date == date)
            .ok_or_else(|| AppError::not_found(format!("No holiday on {date}")))?;
        Ok(self.holidays.remove(idx))
    }

    pub fn set_shift(&mut self, name: &str, window: &ShiftWindow) -> AppResult<()> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(AppError::validation("Shift name is required"));
        }
        self.shifts.insert(name, window.normalized()?);
        Ok(())
    }

    pub fn remove_shift(&mut self, name: &str) -> AppResult<ShiftWindow> {
        let shift = Shift::parse(name);
        if shift.is_reserved() {
            return Err(AppError::validation(format!(
                "Shift '{shift}' is built in and cannot be deleted"
            )));
        }
        self.shifts
            .remove(shift.as_str())
            .ok_or_else(|| AppError::not_found(format!("Shift '{shift}' not found")))
    }

    pub fn holiday_on(&self, date: NaiveDate) -> Option<&Holiday> {
        self.holidays.iter().find(|h| h.date == date)
    }

    /// The employee's own weekend days, or the global default.
    pub fn weekends_for<'a>(&'a self, employee: &'a Employee) -> &'a [u8] {
        employee.weekends.as_deref().unwrap_or(&self.weekends)
    }

    pub fn is_weekend_for(&self, employee: &Employee, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        self.weekends_for(employee).contains(&weekday)
    }

    /// Days the employee is expected to attend: not their weekend and not a
    /// holiday.
    pub fn is_working_day(&self, employee: &Employee, date: NaiveDate) -> bool {
        !self.is_weekend_for(employee, date) && self.holiday_on(date).is_none()
    }
}

fn json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee(weekends: Option<Vec<u8>>) -> Employee {
        Employee {
            id: "E1".into(),
            name: "Ada".into(),
            department: String::new(),
            email: None,
            phone: None,
            position: None,
            join_date: None,
            shift: Shift::Morning,
            weekends,
        }
    }

    #[test]
    fn defaults_carry_builtin_shifts() {
        let settings = Settings::default();
        assert_eq!(
            settings.shift_window(&Shift::Night),
            Some(&ShiftWindow::new("21:00", "05:00"))
        );
        assert_eq!(settings.weekends, vec![0, 6]);
    }

    #[test]
    fn rows_round_trip_and_keep_builtins() {
        let mut settings = Settings::default();
        settings
            .set_shift("Evening", &ShiftWindow::new("14:00", "22:00"))
            .unwrap();
        settings
            .add_holiday(Holiday {
                date: date(2026, 12, 25),
                name: "Christmas".into(),
            })
            .unwrap();

        let restored = Settings::from_rows(&settings.to_rows());
        assert_eq!(restored, settings);

        let only_custom = vec![SettingRow {
            key: KEY_SHIFTS.into(),
            value: r#"{"evening":{"start":"14:00","end":"22:00"}}"#.into(),
        }];
        let restored = Settings::from_rows(&only_custom);
        assert!(restored.shifts.contains_key("morning"));
        assert!(restored.shifts.contains_key("evening"));
    }

    #[test]
    fn unreadable_rows_keep_defaults() {
        let rows = vec![SettingRow {
            key: KEY_WEEKENDS.into(),
            value: "not json".into(),
        }];
        assert_eq!(Settings::from_rows(&rows).weekends, vec![0, 6]);
    }

    #[test]
    fn holidays_are_unique_by_date() {
        let mut settings = Settings::default();
        let h = Holiday {
            date: date(2026, 1, 1),
            name: "New Year".into(),
        };
        settings.add_holiday(h.clone()).unwrap();
        assert!(matches!(
            settings.add_holiday(h),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(settings.remove_holiday(date(2026, 1, 1)).unwrap().name, "New Year");
        assert!(settings.remove_holiday(date(2026, 1, 1)).is_err());
    }

    #[test]
    fn reserved_shifts_cannot_be_removed() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.remove_shift("Morning"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            settings.remove_shift("late"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn shift_times_are_validated() {
        let mut settings = Settings::default();
        assert!(settings
            .set_shift("late", &ShiftWindow::new("14:00", "26:00"))
            .is_err());
        settings
            .set_shift("late", &ShiftWindow::new("9:30", "18:00"))
            .unwrap();
        assert_eq!(settings.shifts["late"].start, "09:30");
    }

    #[test]
    fn employee_weekends_override_global() {
        let settings = Settings::default();
        // 2026-03-06 is a Friday, 2026-03-08 a Sunday
        let friday = date(2026, 3, 6);
        let sunday = date(2026, 3, 8);

        let global = employee(None);
        assert!(!settings.is_weekend_for(&global, friday));
        assert!(settings.is_weekend_for(&global, sunday));

        let custom = employee(Some(vec![5]));
        assert!(settings.is_weekend_for(&custom, friday));
        assert!(settings.is_working_day(&custom, sunday));
    }

    #[test]
    fn holidays_are_not_working_days() {
        let mut settings = Settings::default();
        settings
            .add_holiday(Holiday {
                date: date(2026, 3, 4),
                name: "Founders Day".into(),
            })
            .unwrap();
        assert!(!settings.is_working_day(&employee(None), date(2026, 3, 4)));
    }

    #[test]
    fn weekends_out_of_range_are_rejected() {
        let mut settings = Settings::default();
        assert!(settings.set_weekends(&[0, 9]).is_err());
        settings.set_weekends(&[6, 5, 5]).unwrap();
        assert_eq!(settings.weekends, vec![5, 6]);
    }
}

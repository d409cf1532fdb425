use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end: NaiveDate,
}

impl DateRange {
    /// `None` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(DateRange { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        DateRange {
            start: date,
            end: date,
        }
    }

    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(DateRange {
            start,
            end: next.pred_opt()?,
        })
    }

    /// Parses `YYYY-MM`.
    pub fn parse_month(value: &str) -> Option<Self> {
        let date = NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d").ok()?;
        Self::month(date.year(), date.month())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |d| {
            d.checked_add_days(Days::new(1)).filter(|next| *next <= end)
        })
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Per-employee aggregate over a period. Derived from attendance records,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub employee_id: String,
    pub employee_name: String,
    pub department: String,
    pub working_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub total_hours: f64,
    pub overtime_hours: f64,
    pub on_time_days: u32,
    pub late_days: u32,
    pub early_departures: u32,
    pub avg_hours_per_day: f64,
    pub punctuality_percentage: f64,
    pub hours_efficiency: f64,
    pub attendance_percentage: f64,
    pub performance_score: f64,
}

/// Totals across every summary in a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTotals {
    pub employees: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub total_hours: f64,
    pub overtime_hours: f64,
    pub average_attendance_percentage: f64,
    pub average_punctuality_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReport {
    pub range: DateRange,
    pub summaries: Vec<Summary>,
    pub totals: SummaryTotals,
}

/// Snapshot of a single day across all employees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyOverview {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub holiday: Option<String>,
    pub total_employees: u32,
    pub present: u32,
    pub absent: u32,
    pub unmarked: u32,
    pub off_today: u32,
    pub total_hours: f64,
    pub overtime_hours: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_covers_whole_calendar_month() {
        let feb = DateRange::month(2028, 2).unwrap();
        assert_eq!(feb.start, date(2028, 2, 1));
        assert_eq!(feb.end, date(2028, 2, 29));
        assert_eq!(feb.len_days(), 29);

        let dec = DateRange::parse_month("2026-12").unwrap();
        assert_eq!(dec.end, date(2026, 12, 31));
        assert!(DateRange::parse_month("2026-13").is_none());
    }

    #[test]
    fn days_iterates_inclusively() {
        let range = DateRange::new(date(2026, 3, 30), date(2026, 4, 2)).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days.last(), Some(&date(2026, 4, 2)));
        assert!(range.contains(date(2026, 3, 31)));
        assert!(!range.contains(date(2026, 4, 3)));
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(DateRange::new(date(2026, 4, 2), date(2026, 4, 1)).is_none());
    }
}

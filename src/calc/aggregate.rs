use std::collections::HashMap;

use chrono::NaiveDate;
use strum_macros::{Display, EnumString};

use crate::calc::hours::{REGULAR_HOURS_CAP, parse_minutes, round2};
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::{Employee, Shift};
use crate::model::settings::Settings;
use crate::model::summary::{DailyOverview, DateRange, Summary, SummaryTotals};

/// Where the nominal start/end used for punctuality comes from.
///
/// `Reference` uses fixed times per built-in shift (morning 09:00-17:00,
/// night 21:00-05:00) whatever the settings say. `Configured` reads the
/// shift windows from settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PunctualitySource {
    #[default]
    Reference,
    Configured,
}

const MORNING_REFERENCE: NominalWindow = NominalWindow {
    start: 9 * 60,
    end: 17 * 60,
};
const NIGHT_REFERENCE: NominalWindow = NominalWindow {
    start: 21 * 60,
    end: 5 * 60,
};

/// Nominal start and end in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NominalWindow {
    start: u32,
    end: u32,
}

/// Running counters for one employee.
#[derive(Debug, Default)]
struct Tally {
    present_days: u32,
    absent_days: u32,
    total_hours: f64,
    overtime_hours: f64,
    on_time_days: u32,
    late_days: u32,
    early_departures: u32,
}

/// Folds attendance records into per-employee summaries. Pure: the same
/// inputs always produce the same output.
pub struct Aggregator<'a> {
    settings: &'a Settings,
    source: PunctualitySource,
}

impl<'a> Aggregator<'a> {
    pub fn new(settings: &'a Settings, source: PunctualitySource) -> Self {
        Aggregator { settings, source }
    }

    fn configured_window(&self, shift: &Shift) -> Option<NominalWindow> {
        let window = self.settings.shift_window(shift)?;
        Some(NominalWindow {
            start: parse_minutes(&window.start).ok()?,
            end: parse_minutes(&window.end).ok()?,
        })
    }

    fn nominal_window(&self, shift: &Shift) -> Option<NominalWindow> {
        let reference = match shift {
            Shift::Morning => Some(MORNING_REFERENCE),
            Shift::Night => Some(NIGHT_REFERENCE),
            Shift::Custom(_) => None,
        };

        match self.source {
            PunctualitySource::Reference => reference.or_else(|| self.configured_window(shift)),
            PunctualitySource::Configured => self.configured_window(shift).or(reference),
        }
    }

    fn tally<'r>(&self, records: impl IntoIterator<Item = &'r AttendanceRecord>) -> Tally {
        let mut tally = Tally::default();

        for record in records {
            if !record.present {
                tally.absent_days += 1;
                continue;
            }

            tally.present_days += 1;
            tally.total_hours += record.hours;
            tally.overtime_hours += record.overtime_hours;

            let Some(window) = self.nominal_window(&record.shift) else {
                // no nominal window: never late, never early
                tally.on_time_days += 1;
                continue;
            };

            match record.time_in.as_deref().map(parse_minutes) {
                Some(Ok(arrival)) if arrival <= window.start => tally.on_time_days += 1,
                Some(Ok(_)) => tally.late_days += 1,
                _ => {}
            }

            if let Some(Ok(departure)) = record.time_out.as_deref().map(parse_minutes) {
                if departure < window.end {
                    tally.early_departures += 1;
                }
            }
        }

        tally
    }

    pub fn summarize<'r>(
        &self,
        employee: &Employee,
        records: impl IntoIterator<Item = &'r AttendanceRecord>,
        range: DateRange,
    ) -> Summary {
        let in_range = records
            .into_iter()
            .filter(|r| r.employee_id == employee.id && range.contains(r.date));
        let tally = self.tally(in_range);

        let working_days = range
            .days()
            .filter(|d| self.settings.is_working_day(employee, *d))
            .count() as u32;

        let present = tally.present_days as f64;
        let avg_hours_per_day = if tally.present_days == 0 {
            0.0
        } else {
            tally.total_hours / present
        };
        let punctuality_percentage = if tally.present_days == 0 {
            100.0
        } else {
            100.0 * tally.on_time_days as f64 / present
        };
        let hours_efficiency = if tally.present_days == 0 {
            0.0
        } else {
            100.0 * tally.total_hours / (present * REGULAR_HOURS_CAP)
        };
        let marked_days = tally.present_days + tally.absent_days;
        let attendance_percentage = if marked_days == 0 {
            0.0
        } else {
            100.0 * present / marked_days as f64
        };
        let performance_score = (punctuality_percentage + hours_efficiency) / 2.0;

        Summary {
            employee_id: employee.id.clone(),
            employee_name: employee.name.clone(),
            department: employee.department.clone(),
            working_days,
            present_days: tally.present_days,
            absent_days: tally.absent_days,
            total_hours: round2(tally.total_hours),
            overtime_hours: round2(tally.overtime_hours),
            on_time_days: tally.on_time_days,
            late_days: tally.late_days,
            early_departures: tally.early_departures,
            avg_hours_per_day: round2(avg_hours_per_day),
            punctuality_percentage: round2(punctuality_percentage),
            hours_efficiency: round2(hours_efficiency),
            attendance_percentage: round2(attendance_percentage),
            performance_score: round2(performance_score),
        }
    }

    /// One summary per employee, in the order employees are given. Records
    /// for employees not in the list are ignored.
    pub fn summarize_all(
        &self,
        employees: &[Employee],
        records: &[AttendanceRecord],
        range: DateRange,
    ) -> Vec<Summary> {
        let mut by_employee: HashMap<&str, Vec<&AttendanceRecord>> = HashMap::new();
        for record in records {
            by_employee
                .entry(record.employee_id.as_str())
                .or_default()
                .push(record);
        }

        employees
            .iter()
            .map(|employee| {
                let own = by_employee
                    .get(employee.id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                self.summarize(employee, own.iter().copied(), range)
            })
            .collect()
    }

    pub fn daily_overview(
        &self,
        employees: &[Employee],
        records: &[AttendanceRecord],
        date: NaiveDate,
    ) -> DailyOverview {
        let day: HashMap<&str, &AttendanceRecord> = records
            .iter()
            .filter(|r| r.date == date)
            .map(|r| (r.employee_id.as_str(), r))
            .collect();

        let mut overview = DailyOverview {
            date,
            holiday: self.settings.holiday_on(date).map(|h| h.name.clone()),
            total_employees: employees.len() as u32,
            present: 0,
            absent: 0,
            unmarked: 0,
            off_today: 0,
            total_hours: 0.0,
            overtime_hours: 0.0,
        };

        for employee in employees {
            match day.get(employee.id.as_str()) {
                Some(record) if record.present => {
                    overview.present += 1;
                    overview.total_hours += record.hours;
                    overview.overtime_hours += record.overtime_hours;
                }
                Some(_) => overview.absent += 1,
                None if !self.settings.is_working_day(employee, date) => overview.off_today += 1,
                None => overview.unmarked += 1,
            }
        }

        overview.total_hours = round2(overview.total_hours);
        overview.overtime_hours = round2(overview.overtime_hours);
        overview
    }
}

pub fn totals(summaries: &[Summary]) -> SummaryTotals {
    if summaries.is_empty() {
        return SummaryTotals::default();
    }

    let count = summaries.len() as f64;
    let mut totals = SummaryTotals {
        employees: summaries.len() as u32,
        ..SummaryTotals::default()
    };
    let mut attendance = 0.0;
    let mut punctuality = 0.0;

    for s in summaries {
        totals.present_days += s.present_days;
        totals.absent_days += s.absent_days;
        totals.total_hours += s.total_hours;
        totals.overtime_hours += s.overtime_hours;
        attendance += s.attendance_percentage;
        punctuality += s.punctuality_percentage;
    }

    totals.total_hours = round2(totals.total_hours);
    totals.overtime_hours = round2(totals.overtime_hours);
    totals.average_attendance_percentage = round2(attendance / count);
    totals.average_punctuality_percentage = round2(punctuality / count);
    totals
}

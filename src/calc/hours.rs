use chrono::{NaiveTime, Timelike};

/// Hours above this in a single day are overtime.
pub const REGULAR_HOURS_CAP: f64 = 8.0;

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid time '{0}', expected HH:MM")]
pub struct TimeError(pub String);

/// Regular and overtime hours for a single day.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorkedHours {
    pub regular: f64,
    pub overtime: f64,
}

impl WorkedHours {
    pub fn total(&self) -> f64 {
        round2(self.regular + self.overtime)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses a 24-hour `HH:MM` wall-clock value into minutes since midnight.
pub fn parse_minutes(value: &str) -> Result<u32, TimeError> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| TimeError(value.to_string()))?;
    Ok(time.hour() * 60 + time.minute())
}

/// Canonical `HH:MM` form, so `9:05` and `09:05` compare equal downstream.
pub fn normalize_hhmm(value: &str) -> Result<String, TimeError> {
    let minutes = parse_minutes(value)?;
    Ok(format!("{:02}:{:02}", minutes / 60, minutes % 60))
}

/// Minutes between time-in and time-out. A time-out earlier than the
/// time-in is read as the next day. Equal values are zero minutes.
pub fn elapsed_minutes(time_in: u32, time_out: u32) -> u32 {
    if time_out < time_in {
        time_out + MINUTES_PER_DAY - time_in
    } else {
        time_out - time_in
    }
}

/// Splits elapsed time into regular hours (capped at 8) and overtime.
pub fn split_hours(elapsed_hours: f64) -> WorkedHours {
    if elapsed_hours > REGULAR_HOURS_CAP {
        WorkedHours {
            regular: REGULAR_HOURS_CAP,
            overtime: round2(elapsed_hours - REGULAR_HOURS_CAP),
        }
    } else {
        WorkedHours {
            regular: elapsed_hours,
            overtime: 0.0,
        }
    }
}

/// Worked hours for a time-in/time-out pair. Either side missing yields zero.
pub fn compute_hours(
    time_in: Option<&str>,
    time_out: Option<&str>,
) -> Result<WorkedHours, TimeError> {
    let (Some(time_in), Some(time_out)) = (time_in, time_out) else {
        return Ok(WorkedHours::default());
    };

    let minutes = elapsed_minutes(parse_minutes(time_in)?, parse_minutes(time_out)?);
    let elapsed_hours = round2(minutes as f64 / 60.0);

    Ok(split_hours(elapsed_hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_day_has_no_overtime() {
        let hours = compute_hours(Some("09:00"), Some("15:30")).unwrap();
        assert_eq!(hours.regular, 6.5);
        assert_eq!(hours.overtime, 0.0);
    }

    #[test]
    fn exactly_eight_hours_is_all_regular() {
        let hours = compute_hours(Some("09:00"), Some("17:00")).unwrap();
        assert_eq!(hours, WorkedHours { regular: 8.0, overtime: 0.0 });
    }

    #[test]
    fn long_day_splits_into_overtime() {
        let hours = compute_hours(Some("09:00"), Some("19:30")).unwrap();
        assert_eq!(hours.regular, 8.0);
        assert_eq!(hours.overtime, 2.5);
        assert_eq!(hours.total(), 10.5);
    }

    #[test]
    fn night_shift_crosses_midnight() {
        let hours = compute_hours(Some("21:00"), Some("05:00")).unwrap();
        assert_eq!(hours.regular, 8.0);
        assert_eq!(hours.overtime, 0.0);

        let hours = compute_hours(Some("22:00"), Some("08:15")).unwrap();
        assert_eq!(hours.regular, 8.0);
        assert_eq!(hours.overtime, 2.25);
    }

    #[test]
    fn equal_times_are_zero_hours() {
        let hours = compute_hours(Some("10:00"), Some("10:00")).unwrap();
        assert_eq!(hours, WorkedHours::default());
    }

    #[test]
    fn missing_side_is_zero_hours() {
        assert_eq!(
            compute_hours(Some("09:00"), None).unwrap(),
            WorkedHours::default()
        );
        assert_eq!(
            compute_hours(None, Some("17:00")).unwrap(),
            WorkedHours::default()
        );
    }

    #[test]
    fn odd_minutes_round_to_two_decimals() {
        // 7h 20m = 7.333..
        let hours = compute_hours(Some("08:00"), Some("15:20")).unwrap();
        assert_eq!(hours.regular, 7.33);
    }

    #[test]
    fn malformed_time_is_rejected() {
        assert_eq!(
            compute_hours(Some("25:00"), Some("17:00")),
            Err(TimeError("25:00".to_string()))
        );
        assert!(parse_minutes("nine").is_err());
    }

    #[test]
    fn normalize_pads_hours() {
        assert_eq!(normalize_hhmm("9:05").unwrap(), "09:05");
        assert_eq!(normalize_hhmm("21:00").unwrap(), "21:00");
    }
}

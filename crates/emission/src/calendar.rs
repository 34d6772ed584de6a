//! Inclusive date ranges, weekdays and the date stamps used by model files.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::EmissionError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EmissionError> {
        if end < start {
            return Err(EmissionError::InvalidDateRange(format!(
                "end date {end} is before start date {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses `YYYY-MM-DD` start and end dates.
    pub fn parse(start: &str, end: &str) -> Result<Self, EmissionError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.num_days()).map(move |i| self.start + Duration::days(i as i64))
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, EmissionError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| EmissionError::InvalidDateRange(format!("'{s}': {e}")))
}

/// Day-of-week index with Monday = 0 and Sunday = 6.
pub fn weekday_index(day: NaiveDate) -> usize {
    day.weekday().num_days_from_monday() as usize
}

/// I/O-API Julian date, `YYYYDDD`.
pub fn julian(day: NaiveDate) -> i32 {
    day.year() * 1000 + day.ordinal() as i32
}

/// WRF `Times` stamp (`YYYY-MM-DD_HH:MM:SS`) of `hour` hours after midnight of `day`.
pub fn wrf_timestamp(day: NaiveDate, hour: usize) -> String {
    let date = day + Duration::days((hour / 24) as i64);
    format!("{}_{:02}:00:00", date.format(DATE_FORMAT), hour % 24)
}

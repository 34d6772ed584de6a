//! Hourly and day-of-week profiles, and the time plan that samples them.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::calendar::{weekday_index, DateRange};
use crate::error::{check_non_negative, EmissionError};

pub const HOURS_PER_DAY: usize = 24;
pub const DAYS_PER_WEEK: usize = 7;

/// Hourly fractions of the daily emission, UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TemporalProfile {
    values: Vec<f64>,
}

impl TemporalProfile {
    /// At least 24 non-negative entries. The first 24 should sum to 1.
    pub fn new(values: Vec<f64>) -> Result<Self, EmissionError> {
        if values.len() < HOURS_PER_DAY {
            return Err(EmissionError::ProfileTooShort {
                profile: "hourly",
                required: HOURS_PER_DAY,
                found: values.len(),
            });
        }
        for (h, &v) in values.iter().enumerate() {
            check_non_negative(format!("hourly profile entry {h}"), v)?;
        }
        let day_sum: f64 = values[..HOURS_PER_DAY].iter().sum();
        if (day_sum - 1.0).abs() > 1e-3 {
            warn!(
                "Hourly profile sums to {day_sum:.6} over the first day; daily totals will be scaled by it"
            );
        }
        Ok(Self { values })
    }

    /// 1/24 every hour.
    pub fn flat() -> Self {
        Self {
            values: vec![1.0 / HOURS_PER_DAY as f64; HOURS_PER_DAY],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Weight of time step `t`: taken directly while the profile is long
    /// enough, otherwise reused cyclically over the first 24 hours.
    pub fn weight(&self, t: usize) -> f64 {
        match self.values.get(t) {
            Some(&w) => w,
            None => self.values[t % HOURS_PER_DAY],
        }
    }

    /// The first 24 hours followed by hour 0 again, the 25-step day used
    /// by CMAQ emission files.
    pub fn to_25hr(&self) -> Vec<f64> {
        let mut out = self.values[..HOURS_PER_DAY].to_vec();
        out.push(self.values[0]);
        out
    }
}

impl TryFrom<Vec<f64>> for TemporalProfile {
    type Error = EmissionError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<TemporalProfile> for Vec<f64> {
    fn from(p: TemporalProfile) -> Self {
        p.values
    }
}

/// Day-of-week multipliers, Monday first. Not normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeekProfile {
    factors: [f64; DAYS_PER_WEEK],
}

impl WeekProfile {
    pub fn new(values: &[f64]) -> Result<Self, EmissionError> {
        if values.len() != DAYS_PER_WEEK {
            return Err(EmissionError::WeekProfileLength(values.len()));
        }
        let mut factors = [0.0; DAYS_PER_WEEK];
        for (i, &v) in values.iter().enumerate() {
            factors[i] = check_non_negative(format!("week profile entry {i}"), v)?;
        }
        Ok(Self { factors })
    }

    pub fn uniform() -> Self {
        Self {
            factors: [1.0; DAYS_PER_WEEK],
        }
    }

    pub fn factors(&self) -> &[f64; DAYS_PER_WEEK] {
        &self.factors
    }

    /// Multiplier for a calendar day.
    pub fn factor_for(&self, day: chrono::NaiveDate) -> f64 {
        self.factors[weekday_index(day)]
    }
}

impl TryFrom<Vec<f64>> for WeekProfile {
    type Error = EmissionError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(&values)
    }
}

impl From<WeekProfile> for Vec<f64> {
    fn from(p: WeekProfile) -> Self {
        p.factors.to_vec()
    }
}

// ---------------------------------------------------------------------------
// TimePlan
// ---------------------------------------------------------------------------

/// One output time step: which hourly weight to sample and the day multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    pub hour: usize,
    pub factor: f64,
}

/// Ordered time steps of an emission tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TimePlan {
    steps: Vec<TimeStep>,
}

impl TimePlan {
    pub fn from_steps(steps: Vec<TimeStep>) -> Self {
        Self { steps }
    }

    /// A representative 24-hour day with no weekly variation.
    pub fn typical_day() -> Self {
        Self::from_steps(
            (0..HOURS_PER_DAY)
                .map(|hour| TimeStep { hour, factor: 1.0 })
                .collect(),
        )
    }

    /// Hourly steps covering every day of `range`, each day scaled by its
    /// week-profile multiplier. Without a week profile this is a typical day.
    pub fn for_range(range: &DateRange, week: Option<&WeekProfile>) -> Self {
        let Some(week) = week else {
            return Self::typical_day();
        };
        let steps = range
            .days()
            .enumerate()
            .flat_map(|(d, day)| {
                let factor = week.factor_for(day);
                (0..HOURS_PER_DAY).map(move |h| TimeStep {
                    hour: d * HOURS_PER_DAY + h,
                    factor,
                })
            })
            .collect();
        Self::from_steps(steps)
    }

    /// The 25 hourly steps of one CMAQ file day (hour 24 samples hour 0).
    pub fn cmaq_day(factor: f64) -> Self {
        Self::from_steps(
            (0..=HOURS_PER_DAY)
                .map(|h| TimeStep {
                    hour: h % HOURS_PER_DAY,
                    factor,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[TimeStep] {
        &self.steps
    }

    /// Effective weight of each step for `profile`.
    pub fn weights(&self, profile: &TemporalProfile) -> Vec<f64> {
        self.steps
            .iter()
            .map(|s| profile.weight(s.hour) * s.factor)
            .collect()
    }
}
